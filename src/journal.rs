use crate::model::{
    Content, ContentItem, ItemId, ItemKind, ItemPatch, JournalError, Point, Rect, Size, ThaiWord,
    TimerState, Todo, Verse,
};
use crate::storage::{JournalDb, StoreError};
use log::{error, info};

pub const DEFAULT_TIMER_SECS: u32 = 25 * 60;
pub const AI_PROMPT: &str = "Ask me anything...";
pub const FIRST_TODO: &str = "New task";
pub const EMAIL_LINK: &str = "mailto:?subject=Journal%20Entry&body=";

const VERSE_Y: f64 = 150.0;
const VERSE_HALF_WIDTH: f64 = 100.0;

const VERSES: [(&str, &str); 10] = [
    ("John 3:16", "For God so loved the world that he gave his one and only Son, that whoever believes in him shall not perish but have eternal life."),
    ("Psalm 23:1", "The Lord is my shepherd, I lack nothing."),
    ("Romans 8:28", "And we know that in all things God works for the good of those who love him, who have been called according to his purpose."),
    ("Philippians 4:13", "I can do all this through him who gives me strength."),
    ("Jeremiah 29:11", "For I know the plans I have for you, declares the Lord, plans to prosper you and not to harm you, plans to give you hope and a future."),
    ("Isaiah 41:10", "So do not fear, for I am with you; do not be dismayed, for I am your God. I will strengthen you and help you; I will uphold you with my righteous right hand."),
    ("Matthew 28:20", "And surely I am with you always, to the very end of the age."),
    ("Psalm 46:10", "Be still, and know that I am God; I will be exalted among the nations, I will be exalted in the earth."),
    ("Proverbs 3:5-6", "Trust in the Lord with all your heart and lean not on your own understanding; in all your ways submit to him, and he will make your paths straight."),
    ("1 Corinthians 13:4", "Love is patient, love is kind. It does not envy, it does not boast, it is not proud."),
];

const THAI_WORDS: [(&str, &str, &str); 3] = [
    ("สวัสดี", "sawàtdii", "Hello"),
    ("ขอบคุณ", "khɔ̀ɔp khun", "Thank you"),
    ("ไม่เป็นไร", "mâi pen rai", "Never mind"),
];

/// The verse for a day: the digits of the key, modulo the verse count.
pub fn verse_for(date_key: &str) -> Verse {
    let digits: String = date_key.chars().filter(char::is_ascii_digit).collect();
    let number: u64 = digits.parse().unwrap_or(0);
    let (reference, text) = VERSES[(number % VERSES.len() as u64) as usize];
    Verse {
        reference: reference.to_string(),
        text: text.to_string(),
        read: false,
    }
}

pub fn thai_word(seed: i64) -> ThaiWord {
    let (thai, pronunciation, english) = THAI_WORDS[seed.rem_euclid(THAI_WORDS.len() as i64) as usize];
    ThaiWord {
        thai: thai.to_string(),
        pronunciation: pronunciation.to_string(),
        english: english.to_string(),
    }
}

/// Starting payload for kinds that need no user input. Media and verses have none.
pub fn starter_content(kind: ItemKind, now_ms: i64) -> Option<Content> {
    match kind {
        ItemKind::Note => Some(Content::Note(String::new())),
        ItemKind::Todos => Some(Content::Todos(vec![Todo {
            text: FIRST_TODO.to_string(),
            done: false,
        }])),
        ItemKind::Timer => Some(Content::Timer(TimerState::new(DEFAULT_TIMER_SECS))),
        ItemKind::Thai => Some(Content::Thai(thai_word(now_ms))),
        ItemKind::Ai => Some(Content::Ai(AI_PROMPT.to_string())),
        ItemKind::Photo | ItemKind::Audio | ItemKind::Video | ItemKind::Verse => None,
    }
}

/// Drop target for deleting items by drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrashZone {
    pub rect: Rect,
}

impl TrashZone {
    pub fn new(rect: Rect) -> Self {
        TrashZone { rect }
    }

    /// Bottom-right corner placement used by the day canvas.
    pub fn for_viewport(viewport: Size) -> Self {
        let width = (viewport.width * 0.2).clamp(64.0, 160.0);
        let height = (viewport.height * 0.15).clamp(48.0, 96.0);
        TrashZone::new(Rect::new(
            (viewport.width - width).max(0.0),
            (viewport.height - height).max(0.0),
            width,
            height,
        ))
    }

    pub fn contains(&self, pointer: Point) -> bool {
        self.rect.contains(pointer)
    }
}

/// Content manager over the journal store.
///
/// Mutations always land in memory first; a failed write is logged and kept
/// for the front-end to report, while the session carries on.
#[derive(Debug)]
pub struct Journal {
    db: JournalDb,
    last_store_error: Option<String>,
}

impl Journal {
    pub fn new(db: JournalDb) -> Self {
        Journal {
            db,
            last_store_error: None,
        }
    }

    pub fn db(&self) -> &JournalDb {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut JournalDb {
        &mut self.db
    }

    pub fn take_store_error(&mut self) -> Option<String> {
        self.last_store_error.take()
    }

    fn record(&mut self, op: &str, result: Result<(), StoreError>) {
        if let Err(err) = result {
            error!("event=store_write_failed op={} error={}", op, err);
            self.last_store_error = Some(err.to_string());
        }
    }

    pub fn items_for(&self, date: &str) -> Vec<&ContentItem> {
        self.db.items_by_date(date)
    }

    pub fn get(&self, id: &str) -> Option<&ContentItem> {
        self.db.get_item(id)
    }

    pub fn create_item(
        &mut self,
        date: &str,
        content: Content,
        anchor: Option<Point>,
        viewport: Size,
        now_ms: i64,
    ) -> ContentItem {
        let at = anchor.unwrap_or_else(|| viewport.center());
        let item = ContentItem::new(date, content, at, now_ms);
        info!(
            "event=item_create id={} kind={} date={}",
            item.id,
            item.kind(),
            item.date
        );
        let result = self.db.put_item(item.clone());
        self.record("create", result);
        item
    }

    pub fn update_item(&mut self, id: &str, patch: ItemPatch) -> Result<ContentItem, JournalError> {
        let mut item = self
            .db
            .get_item(id)
            .cloned()
            .ok_or_else(|| JournalError::ItemNotFound(id.to_string()))?;
        item.apply(patch);
        let result = self.db.put_item(item.clone());
        self.record("update", result);
        Ok(item)
    }

    pub fn update_position(&mut self, id: &str, at: Point) -> Result<ContentItem, JournalError> {
        self.update_item(
            id,
            ItemPatch {
                x: Some(at.x),
                y: Some(at.y),
                ..ItemPatch::default()
            },
        )
    }

    /// Flips one todo entry. Returns its new state.
    pub fn toggle_todo(&mut self, id: &str, index: usize) -> Result<bool, JournalError> {
        let item = self.expect_kind(id, ItemKind::Todos)?;
        let Content::Todos(mut todos) = item.content.clone() else {
            return Err(wrong_kind(item, ItemKind::Todos));
        };
        let todo = todos.get_mut(index).ok_or_else(|| JournalError::TodoIndex {
            id: id.to_string(),
            index,
        })?;
        todo.done = !todo.done;
        let done = todo.done;
        self.update_item(
            id,
            ItemPatch {
                content: Some(Content::Todos(todos)),
                ..ItemPatch::default()
            },
        )?;
        Ok(done)
    }

    /// Starts or pauses a timer. Returns whether it is now running.
    pub fn toggle_timer(&mut self, id: &str, now_ms: i64) -> Result<bool, JournalError> {
        let item = self.expect_kind(id, ItemKind::Timer)?;
        let Content::Timer(mut timer) = item.content.clone() else {
            return Err(wrong_kind(item, ItemKind::Timer));
        };
        timer.toggle(now_ms);
        let running = timer.running;
        let mut updated = item.clone();
        // The title follows the configured duration, not the countdown.
        updated.content = Content::Timer(timer);
        let result = self.db.put_item(updated);
        self.record("timer", result);
        Ok(running)
    }

    /// Advances running timers on `date`. Returns ids whose display changed.
    pub fn tick_timers(&mut self, date: &str, now_ms: i64) -> Vec<ItemId> {
        let running: Vec<ContentItem> = self
            .db
            .items_by_date(date)
            .into_iter()
            .filter(|item| matches!(&item.content, Content::Timer(t) if t.running))
            .cloned()
            .collect();
        let mut changed = Vec::new();
        let mut finished = false;
        for mut item in running {
            let Content::Timer(timer) = &mut item.content else {
                continue;
            };
            if !timer.advance(now_ms) {
                continue;
            }
            if !timer.running {
                info!("event=timer_finished id={}", item.id);
                finished = true;
            }
            changed.push(item.id.clone());
            self.db.stage_item(item);
        }
        // Running timers carry their last tick, so only a finish needs writing.
        if finished {
            let result = self.db.flush();
            self.record("tick", result);
        }
        changed
    }

    pub fn mark_verse_read(&mut self, id: &str) -> Result<(), JournalError> {
        let item = self.expect_kind(id, ItemKind::Verse)?;
        let Content::Verse(mut verse) = item.content.clone() else {
            return Err(wrong_kind(item, ItemKind::Verse));
        };
        if verse.read {
            return Ok(());
        }
        verse.read = true;
        self.update_item(
            id,
            ItemPatch {
                content: Some(Content::Verse(verse)),
                ..ItemPatch::default()
            },
        )?;
        Ok(())
    }

    /// Deletes an item. Unknown ids are a no-op.
    pub fn delete_item(&mut self, id: &str) -> Option<ContentItem> {
        match self.db.delete_item(id) {
            Ok(removed) => {
                if removed.is_some() {
                    info!("event=item_delete id={}", id);
                }
                removed
            }
            Err(err) => {
                error!("event=store_write_failed op=delete error={}", err);
                self.last_store_error = Some(err.to_string());
                None
            }
        }
    }

    /// Creates the day's verse unless one is already filed. Returns the new item.
    pub fn ensure_daily_verse(
        &mut self,
        date: &str,
        viewport: Size,
        now_ms: i64,
    ) -> Option<ContentItem> {
        if self
            .db
            .items_by_date(date)
            .iter()
            .any(|item| item.kind() == ItemKind::Verse)
        {
            return None;
        }
        let at = Point::new((viewport.width / 2.0 - VERSE_HALF_WIDTH).max(0.0), VERSE_Y);
        Some(self.create_item(date, Content::Verse(verse_for(date)), Some(at), viewport, now_ms))
    }

    fn expect_kind(&self, id: &str, expected: ItemKind) -> Result<&ContentItem, JournalError> {
        let item = self
            .db
            .get_item(id)
            .ok_or_else(|| JournalError::ItemNotFound(id.to_string()))?;
        if item.kind() != expected {
            return Err(wrong_kind(item, expected));
        }
        Ok(item)
    }
}

fn wrong_kind(item: &ContentItem, expected: ItemKind) -> JournalError {
    JournalError::WrongKind {
        id: item.id.clone(),
        expected,
        actual: item.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Shade;
    use tempfile::tempdir;

    const DAY: &str = "2026-10-19";

    fn viewport() -> Size {
        Size::new(800.0, 600.0)
    }

    fn journal() -> Journal {
        Journal::new(JournalDb::in_memory())
    }

    #[test]
    fn create_then_delete_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.yml");
        let mut journal = Journal::new(JournalDb::open(&path).unwrap());
        let before: Vec<ItemId> = journal.items_for(DAY).iter().map(|i| i.id.clone()).collect();
        let item = journal.create_item(
            DAY,
            Content::Note("hello".to_string()),
            None,
            viewport(),
            1_000,
        );
        assert_eq!(journal.items_for(DAY).len(), before.len() + 1);
        assert!(journal.delete_item(&item.id).is_some());
        let after: Vec<ItemId> = journal.items_for(DAY).iter().map(|i| i.id.clone()).collect();
        assert_eq!(before, after);
        let reopened = JournalDb::open(&path).unwrap();
        assert!(reopened.get_item(&item.id).is_none());
    }

    #[test]
    fn delete_unknown_id_is_noop() {
        let mut journal = journal();
        assert!(journal.delete_item("nope").is_none());
        assert!(journal.take_store_error().is_none());
    }

    #[test]
    fn create_defaults_to_viewport_center() {
        let mut journal = journal();
        let item = journal.create_item(DAY, Content::Note("x".into()), None, viewport(), 1);
        assert_eq!(item.position(), Point::new(400.0, 300.0));
        let anchored = journal.create_item(
            DAY,
            Content::Note("y".into()),
            Some(Point::new(12.0, 34.0)),
            viewport(),
            2,
        );
        assert_eq!(anchored.position(), Point::new(12.0, 34.0));
        assert!(anchored.id.starts_with("2026-10-19_2_"));
    }

    #[test]
    fn update_merges_fields_and_retitles() {
        let mut journal = journal();
        let item = journal.create_item(DAY, Content::Note("old".into()), None, viewport(), 1);
        let updated = journal
            .update_item(
                &item.id,
                ItemPatch {
                    content: Some(Content::Note("new".into())),
                    shade: Shade::new(4),
                    ..ItemPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.position(), item.position());
        assert_eq!(updated.shade.value(), 4);
        assert_ne!(updated.title, item.title);
        assert_eq!(journal.get(&item.id), Some(&updated));
    }

    #[test]
    fn update_unknown_id_is_an_error() {
        let mut journal = journal();
        assert!(matches!(
            journal.update_position("missing", Point::default()),
            Err(JournalError::ItemNotFound(_))
        ));
    }

    #[test]
    fn toggling_todos_checks_index_and_kind() {
        let mut journal = journal();
        let todos = journal.create_item(
            DAY,
            starter_content(ItemKind::Todos, 0).unwrap(),
            None,
            viewport(),
            1,
        );
        assert!(journal.toggle_todo(&todos.id, 0).unwrap());
        assert!(!journal.toggle_todo(&todos.id, 0).unwrap());
        assert!(matches!(
            journal.toggle_todo(&todos.id, 3),
            Err(JournalError::TodoIndex { index: 3, .. })
        ));
        let note = journal.create_item(DAY, Content::Note("n".into()), None, viewport(), 2);
        assert!(matches!(
            journal.toggle_todo(&note.id, 0),
            Err(JournalError::WrongKind { .. })
        ));
    }

    #[test]
    fn timer_runs_and_finishes() {
        let mut journal = journal();
        let timer = journal.create_item(
            DAY,
            Content::Timer(TimerState::new(3)),
            None,
            viewport(),
            0,
        );
        assert!(journal.toggle_timer(&timer.id, 10_000).unwrap());
        assert!(journal.tick_timers(DAY, 10_500).is_empty());
        assert_eq!(journal.tick_timers(DAY, 11_000), vec![timer.id.clone()]);
        journal.tick_timers(DAY, 20_000);
        let Content::Timer(state) = &journal.get(&timer.id).unwrap().content else {
            panic!("timer expected");
        };
        assert_eq!(state.remaining_secs, 0);
        assert!(!state.running);
        assert_eq!(journal.get(&timer.id).unwrap().title, timer.title);
    }

    #[test]
    fn daily_verse_is_created_once() {
        let mut journal = journal();
        let first = journal.ensure_daily_verse(DAY, viewport(), 1).unwrap();
        for n in 0..5 {
            assert!(journal.ensure_daily_verse(DAY, viewport(), 2 + n).is_none());
        }
        let verses: Vec<_> = journal
            .items_for(DAY)
            .into_iter()
            .filter(|i| i.kind() == ItemKind::Verse)
            .collect();
        assert_eq!(verses.len(), 1);
        assert_eq!(first.position(), Point::new(300.0, 150.0));
        assert_eq!(first.title, verse_for(DAY).reference);
    }

    #[test]
    fn verse_choice_is_deterministic() {
        // 20261019 % 10 == 9
        assert_eq!(verse_for(DAY).reference, "1 Corinthians 13:4");
        assert_eq!(verse_for("2026-10-20").reference, "John 3:16");
        assert_eq!(verse_for(DAY), verse_for(DAY));
    }

    #[test]
    fn marking_verse_read_persists_flag() {
        let mut journal = journal();
        let verse = journal.ensure_daily_verse(DAY, viewport(), 1).unwrap();
        journal.mark_verse_read(&verse.id).unwrap();
        let Content::Verse(v) = &journal.get(&verse.id).unwrap().content else {
            panic!("verse expected");
        };
        assert!(v.read);
    }

    #[test]
    fn starter_content_matches_factory_defaults() {
        assert_eq!(
            starter_content(ItemKind::Timer, 0),
            Some(Content::Timer(TimerState::new(1500)))
        );
        assert_eq!(
            starter_content(ItemKind::Ai, 0),
            Some(Content::Ai("Ask me anything...".into()))
        );
        assert!(starter_content(ItemKind::Photo, 0).is_none());
        assert_eq!(thai_word(4).english, "Thank you");
    }

    #[test]
    fn trash_zone_sits_bottom_right() {
        let zone = TrashZone::for_viewport(viewport());
        assert!(zone.contains(Point::new(790.0, 590.0)));
        assert!(!zone.contains(Point::new(10.0, 10.0)));
    }
}
