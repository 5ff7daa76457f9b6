use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ItemId = String;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle in radians from `self` towards `other`, as `atan2(dy, dx)`.
    pub fn angle_to(&self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Edge-inclusive containment.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Note,
    Photo,
    Audio,
    Video,
    Todos,
    Timer,
    Thai,
    Ai,
    Verse,
}

impl ItemKind {
    pub const ALL: [ItemKind; 9] = [
        ItemKind::Note,
        ItemKind::Photo,
        ItemKind::Audio,
        ItemKind::Video,
        ItemKind::Todos,
        ItemKind::Timer,
        ItemKind::Thai,
        ItemKind::Ai,
        ItemKind::Verse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Note => "note",
            ItemKind::Photo => "photo",
            ItemKind::Audio => "audio",
            ItemKind::Video => "video",
            ItemKind::Todos => "todos",
            ItemKind::Timer => "timer",
            ItemKind::Thai => "thai",
            ItemKind::Ai => "ai",
            ItemKind::Verse => "verse",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ItemKind::Note => "📝",
            ItemKind::Photo => "📷",
            ItemKind::Audio => "🎵",
            ItemKind::Video => "🎬",
            ItemKind::Todos => "☑",
            ItemKind::Timer => "⏱",
            ItemKind::Thai => "ก",
            ItemKind::Ai => "🤖",
            ItemKind::Verse => "✨",
        }
    }

    /// Fixed on-canvas footprint in pixels.
    pub fn default_size(&self) -> Size {
        match self {
            ItemKind::Note => Size::new(200.0, 150.0),
            ItemKind::Photo => Size::new(150.0, 150.0),
            ItemKind::Audio | ItemKind::Video => Size::new(150.0, 100.0),
            ItemKind::Todos => Size::new(250.0, 200.0),
            ItemKind::Timer => Size::new(120.0, 120.0),
            ItemKind::Thai => Size::new(200.0, 100.0),
            ItemKind::Ai => Size::new(250.0, 150.0),
            ItemKind::Verse => Size::new(200.0, 120.0),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ItemKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| JournalError::UnknownKind(s.to_string()))
    }
}

/// Inlined media payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub mime: String,
    pub data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub duration_secs: u32,
    pub remaining_secs: u32,
    pub running: bool,
    /// Millisecond timestamp the remaining time was last brought up to date.
    #[serde(default)]
    pub last_tick_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThaiWord {
    pub thai: String,
    pub pronunciation: String,
    pub english: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub reference: String,
    pub text: String,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Content {
    Note(String),
    Photo(MediaRef),
    Audio(MediaRef),
    Video(MediaRef),
    Todos(Vec<Todo>),
    Timer(TimerState),
    Thai(ThaiWord),
    Ai(String),
    Verse(Verse),
}

impl Content {
    pub fn kind(&self) -> ItemKind {
        match self {
            Content::Note(_) => ItemKind::Note,
            Content::Photo(_) => ItemKind::Photo,
            Content::Audio(_) => ItemKind::Audio,
            Content::Video(_) => ItemKind::Video,
            Content::Todos(_) => ItemKind::Todos,
            Content::Timer(_) => ItemKind::Timer,
            Content::Thai(_) => ItemKind::Thai,
            Content::Ai(_) => ItemKind::Ai,
            Content::Verse(_) => ItemKind::Verse,
        }
    }

    /// Text fed to the title hash. Binary visual media hash a fixed placeholder.
    fn title_source(&self) -> String {
        match self {
            Content::Note(text) | Content::Ai(text) => text.clone(),
            Content::Photo(_) | Content::Video(_) => "image".to_string(),
            Content::Audio(media) => media.data_uri.clone(),
            Content::Todos(todos) => format_todo_lines(todos),
            Content::Timer(timer) => format_clock(timer.duration_secs),
            Content::Thai(word) => word.thai.clone(),
            Content::Verse(verse) => verse.reference.clone(),
        }
    }

    /// Searchable plain text.
    pub fn text(&self) -> String {
        match self {
            Content::Note(text) | Content::Ai(text) => text.clone(),
            Content::Photo(m) | Content::Audio(m) | Content::Video(m) => m.mime.clone(),
            Content::Todos(todos) => format_todo_lines(todos),
            Content::Timer(timer) => format_clock(timer.remaining_secs),
            Content::Thai(word) => format!("{} {} {}", word.thai, word.pronunciation, word.english),
            Content::Verse(verse) => format!("{} {}", verse.text, verse.reference),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Content::Verse(verse) => verse.reference.clone(),
            other => title_hash(&other.title_source()),
        }
    }
}

/// Colour variant, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Shade(u8);

impl Shade {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&value).then_some(Shade(value))
    }

    pub fn random() -> Self {
        Shade(rand::thread_rng().gen_range(1..=Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Shade {
    fn default() -> Self {
        Shade(1)
    }
}

impl TryFrom<u8> for Shade {
    type Error = JournalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Shade::new(value).ok_or(JournalError::InvalidShade(value))
    }
}

impl From<Shade> for u8 {
    fn from(shade: Shade) -> u8 {
        shade.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub date: String,
    pub content: Content,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub shade: Shade,
    pub timestamp: i64,
    pub title: String,
}

/// Partial update merged by `ContentItem::apply`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub content: Option<Content>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub shade: Option<Shade>,
}

#[derive(thiserror::Error, Debug)]
pub enum JournalError {
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("unknown content kind: {0}")]
    UnknownKind(String),
    #[error("shade must be between 1 and 5, got {0}")]
    InvalidShade(u8),
    #[error("item {id} has no todo at index {index}")]
    TodoIndex { id: String, index: usize },
    #[error("item {id} is a {actual}, expected {expected}")]
    WrongKind {
        id: String,
        expected: ItemKind,
        actual: ItemKind,
    },
}

impl ContentItem {
    pub fn new(date: impl Into<String>, content: Content, at: Point, now_ms: i64) -> Self {
        let date = date.into();
        ContentItem {
            id: generate_id(&date, now_ms),
            title: content.title(),
            date,
            content,
            x: at.x,
            y: at.y,
            shade: Shade::random(),
            timestamp: now_ms,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.content.kind()
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        let size = self.kind().default_size();
        Rect::new(self.x, self.y, size.width, size.height)
    }

    pub fn apply(&mut self, patch: ItemPatch) {
        if let Some(content) = patch.content {
            self.title = content.title();
            self.content = content;
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(shade) = patch.shade {
            self.shade = shade;
        }
    }

    /// Type-specific body lines, as shown inside the item's card.
    pub fn render_lines(&self) -> Vec<String> {
        match &self.content {
            Content::Note(text) | Content::Ai(text) => {
                if text.trim().is_empty() {
                    vec![String::new()]
                } else {
                    text.lines().map(str::to_string).collect()
                }
            }
            Content::Photo(media) => vec![format!("{} photo", ItemKind::Photo.icon()), media.mime.clone()],
            Content::Audio(_) => vec![ItemKind::Audio.icon().to_string(), "audio".to_string()],
            Content::Video(_) => vec![ItemKind::Video.icon().to_string(), "video".to_string()],
            Content::Todos(todos) => todos
                .iter()
                .map(|t| format!("[{}] {}", if t.done { "x" } else { " " }, t.text))
                .collect(),
            Content::Timer(timer) => {
                let mut lines = vec![format_clock(timer.remaining_secs)];
                if timer.running {
                    lines.push("running".to_string());
                }
                lines
            }
            Content::Thai(word) => vec![
                word.thai.clone(),
                word.pronunciation.clone(),
                word.english.clone(),
            ],
            Content::Verse(verse) => vec![verse.text.clone(), format!("— {}", verse.reference)],
        }
    }

    /// One-line summary used by the week/month views and listings.
    pub fn preview(&self) -> String {
        match &self.content {
            Content::Note(text) | Content::Ai(text) => truncate_chars(text, 50),
            Content::Photo(_) => format!("{} Photo", ItemKind::Photo.icon()),
            Content::Audio(_) => format!("{} Audio", ItemKind::Audio.icon()),
            Content::Video(_) => format!("{} Video", ItemKind::Video.icon()),
            Content::Todos(todos) => format!("{} {} items", ItemKind::Todos.icon(), todos.len()),
            Content::Timer(timer) => {
                format!("{} {}", ItemKind::Timer.icon(), format_clock(timer.remaining_secs))
            }
            Content::Thai(word) => format!("{} ({})", word.thai, word.english),
            Content::Verse(verse) => format!("{} {}", ItemKind::Verse.icon(), verse.reference),
        }
    }
}

impl TimerState {
    pub fn new(duration_secs: u32) -> Self {
        TimerState {
            duration_secs,
            remaining_secs: duration_secs,
            running: false,
            last_tick_ms: None,
        }
    }

    /// Brings `remaining_secs` up to `now_ms`. Returns true when the display changed.
    pub fn advance(&mut self, now_ms: i64) -> bool {
        if !self.running {
            return false;
        }
        let last = self.last_tick_ms.unwrap_or(now_ms);
        let elapsed_secs = (now_ms - last).max(0) / 1000;
        if elapsed_secs == 0 {
            self.last_tick_ms = Some(last);
            return false;
        }
        self.last_tick_ms = Some(last + elapsed_secs * 1000);
        let before = self.remaining_secs;
        self.remaining_secs = self.remaining_secs.saturating_sub(elapsed_secs as u32);
        if self.remaining_secs == 0 {
            self.running = false;
            self.last_tick_ms = None;
        }
        before != self.remaining_secs
    }

    pub fn toggle(&mut self, now_ms: i64) {
        if self.running {
            self.advance(now_ms);
            self.running = false;
            self.last_tick_ms = None;
        } else {
            if self.remaining_secs == 0 {
                self.remaining_secs = self.duration_secs;
            }
            self.running = true;
            self.last_tick_ms = Some(now_ms);
        }
    }
}

/// Short deterministic title: 32-bit rolling hash over UTF-16 units, base36, upper-cased.
pub fn title_hash(text: &str) -> String {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    to_base36(i64::from(hash).unsigned_abs())
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// `{date}_{millis}_{9 base36 chars}`.
pub fn generate_id(date_key: &str, now_ms: i64) -> ItemId {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| char::from(DIGITS[rng.gen_range(0..DIGITS.len())]))
        .collect();
    format!("{}_{}_{}", date_key, now_ms, suffix)
}

pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Parses editable todo text: one task per line, `[x]` marks a finished task.
pub fn parse_todo_lines(text: &str) -> Vec<Todo> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let (done, rest) = if let Some(rest) = line
                .strip_prefix("[x]")
                .or_else(|| line.strip_prefix("[X]"))
            {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix("[ ]") {
                (false, rest)
            } else {
                (false, line)
            };
            Todo {
                text: rest.trim().to_string(),
                done,
            }
        })
        .collect()
}

pub fn format_todo_lines(todos: &[Todo]) -> String {
    todos
        .iter()
        .map(|t| format!("[{}] {}", if t.done { "x" } else { " " }, t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_hash_matches_rolling_hash() {
        assert_eq!(title_hash(""), "0");
        assert_eq!(title_hash("a"), "2P");
        assert_eq!(title_hash("ab"), "2E9");
    }

    #[test]
    fn title_hash_is_deterministic_and_bounded() {
        let text = "Walked to the market and bought mangoes";
        let first = title_hash(text);
        assert_eq!(first, title_hash(text));
        assert!(first.len() <= 6);
        assert_eq!(first, first.to_uppercase());
        assert_ne!(first, title_hash("Walked to the market and bought papayas"));
    }

    #[test]
    fn visual_media_titles_use_placeholder() {
        let photo = Content::Photo(MediaRef {
            mime: "image/png".into(),
            data_uri: "data:image/png;base64,AAAA".into(),
        });
        let video = Content::Video(MediaRef {
            mime: "video/mp4".into(),
            data_uri: "data:video/mp4;base64,BBBB".into(),
        });
        assert_eq!(photo.title(), title_hash("image"));
        assert_eq!(video.title(), photo.title());
    }

    #[test]
    fn generated_ids_carry_date_and_timestamp() {
        let id = generate_id("2024-03-05", 1_700_000_000_000);
        assert!(id.starts_with("2024-03-05_1700000000000_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, generate_id("2024-03-05", 1_700_000_000_000));
    }

    #[test]
    fn shade_rejects_out_of_range() {
        assert!(Shade::new(0).is_none());
        assert!(Shade::new(6).is_none());
        assert_eq!(Shade::new(3).map(|s| s.value()), Some(3));
        for _ in 0..50 {
            let s = Shade::random().value();
            assert!((1..=5).contains(&s));
        }
        let parsed: Result<Shade, _> = serde_yaml::from_str("9");
        assert!(parsed.is_err());
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Todos".parse::<ItemKind>().unwrap(), ItemKind::Todos);
        assert!("email".parse::<ItemKind>().is_err());
    }

    #[test]
    fn todo_lines_round_trip_through_editor_text() {
        let todos = parse_todo_lines("[x] buy rice\n\n[ ] call mum\nwater plants");
        assert_eq!(todos.len(), 3);
        assert!(todos[0].done);
        assert_eq!(todos[1].text, "call mum");
        assert!(!todos[2].done);
        assert_eq!(
            format_todo_lines(&todos),
            "[x] buy rice\n[ ] call mum\n[ ] water plants"
        );
    }

    #[test]
    fn timer_counts_down_and_stops_at_zero() {
        let mut timer = TimerState::new(3);
        timer.toggle(0);
        assert!(timer.running);
        assert!(!timer.advance(500));
        assert!(timer.advance(1_000));
        assert_eq!(timer.remaining_secs, 2);
        timer.advance(10_000);
        assert_eq!(timer.remaining_secs, 0);
        assert!(!timer.running);
        timer.toggle(11_000);
        assert_eq!(timer.remaining_secs, 3);
    }

    #[test]
    fn patch_rederives_title_when_content_changes() {
        let mut item = ContentItem::new(
            "2024-01-01",
            Content::Note("first".into()),
            Point::new(10.0, 20.0),
            1,
        );
        let before = item.title.clone();
        item.apply(ItemPatch {
            x: Some(42.0),
            ..ItemPatch::default()
        });
        assert_eq!(item.title, before);
        assert_eq!(item.x, 42.0);
        assert_eq!(item.y, 20.0);
        item.apply(ItemPatch {
            content: Some(Content::Note("second".into())),
            ..ItemPatch::default()
        });
        assert_eq!(item.title, title_hash("second"));
    }

    #[test]
    fn render_templates_follow_kind() {
        let todos = ContentItem::new(
            "2024-01-01",
            Content::Todos(vec![Todo {
                text: "New task".into(),
                done: false,
            }]),
            Point::default(),
            1,
        );
        assert_eq!(todos.render_lines(), vec!["[ ] New task".to_string()]);
        let timer = ContentItem::new(
            "2024-01-01",
            Content::Timer(TimerState::new(25 * 60)),
            Point::default(),
            1,
        );
        assert_eq!(timer.render_lines(), vec!["25:00".to_string()]);
        assert_eq!(timer.bounds().width, 120.0);
    }

    #[test]
    fn rect_containment_is_edge_inclusive() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains(Point::new(10.0, 30.0)));
        assert!(!r.contains(Point::new(30.1, 15.0)));
    }
}
