use crate::config::RadialSettings;
use crate::model::{ItemKind, Point};
use std::fmt;

/// Entries of the creation menu, in the order they are reached by distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    Note,
    Photo,
    Audio,
    Video,
    Todos,
    Timer,
    Email,
    Thai,
    Ai,
}

impl MenuAction {
    pub const ALL: [MenuAction; 9] = [
        MenuAction::Note,
        MenuAction::Photo,
        MenuAction::Audio,
        MenuAction::Video,
        MenuAction::Todos,
        MenuAction::Timer,
        MenuAction::Email,
        MenuAction::Thai,
        MenuAction::Ai,
    ];

    pub fn icon(&self) -> &'static str {
        match self {
            MenuAction::Note => "📝",
            MenuAction::Photo => "📷",
            MenuAction::Audio => "🎵",
            MenuAction::Video => "🎬",
            MenuAction::Todos => "☑️",
            MenuAction::Timer => "⏱️",
            MenuAction::Email => "✉️",
            MenuAction::Thai => "🇹🇭",
            MenuAction::Ai => "🤖",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::Note => "Note",
            MenuAction::Photo => "Photo",
            MenuAction::Audio => "Audio",
            MenuAction::Video => "Video",
            MenuAction::Todos => "Todos",
            MenuAction::Timer => "Timer",
            MenuAction::Email => "Email",
            MenuAction::Thai => "Thai",
            MenuAction::Ai => "AI Chat",
        }
    }

    /// The item kind this action creates; email creates nothing.
    pub fn kind(&self) -> Option<ItemKind> {
        match self {
            MenuAction::Note => Some(ItemKind::Note),
            MenuAction::Photo => Some(ItemKind::Photo),
            MenuAction::Audio => Some(ItemKind::Audio),
            MenuAction::Video => Some(ItemKind::Video),
            MenuAction::Todos => Some(ItemKind::Todos),
            MenuAction::Timer => Some(ItemKind::Timer),
            MenuAction::Email => None,
            MenuAction::Thai => Some(ItemKind::Thai),
            MenuAction::Ai => Some(ItemKind::Ai),
        }
    }
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon(), self.label())
    }
}

/// Maps a drag distance to an action.
///
/// The first step around the anchor is a dead zone; each further step arms the
/// next action, and anything past the end stays on the last one.
pub fn select_action(distance: f64, step: f64) -> Option<MenuAction> {
    if distance.is_nan() || distance < 0.0 || step <= 0.0 {
        return None;
    }
    let index = (distance / step).floor() as usize;
    if index == 0 {
        return None;
    }
    let last = MenuAction::ALL.len();
    Some(MenuAction::ALL[index.min(last) - 1])
}

#[derive(Debug, Clone)]
pub struct RadialMenu {
    step: f64,
    radius: f64,
    anchor: Option<Point>,
    current: Point,
    armed: Option<MenuAction>,
}

impl RadialMenu {
    pub fn new(settings: &RadialSettings) -> Self {
        RadialMenu {
            step: settings.distance_per_option,
            radius: settings.radius,
            anchor: None,
            current: Point::default(),
            armed: None,
        }
    }

    pub fn show(&mut self, anchor: Point) {
        self.anchor = Some(anchor);
        self.current = anchor;
        self.armed = None;
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn pointer(&self) -> Point {
        self.current
    }

    pub fn armed(&self) -> Option<MenuAction> {
        self.armed
    }

    pub fn update(&mut self, at: Point) -> Option<MenuAction> {
        if let Some(anchor) = self.anchor {
            self.current = at;
            self.armed = select_action(anchor.distance_to(at), self.step);
        }
        self.armed
    }

    pub fn distance(&self) -> f64 {
        self.anchor
            .map(|anchor| anchor.distance_to(self.current))
            .unwrap_or(0.0)
    }

    pub fn angle(&self) -> f64 {
        self.anchor
            .map(|anchor| anchor.angle_to(self.current))
            .unwrap_or(0.0)
    }

    /// Hides the menu and returns the armed action, if any.
    pub fn confirm(&mut self) -> Option<MenuAction> {
        let armed = self.armed;
        self.hide();
        armed
    }

    pub fn cancel(&mut self) {
        self.hide();
    }

    /// Icon positions laid out along the current pointer direction.
    pub fn option_positions(&self) -> Vec<(MenuAction, Point)> {
        let Some(anchor) = self.anchor else {
            return Vec::new();
        };
        let angle = self.angle();
        MenuAction::ALL
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let reach = (i + 1) as f64 * self.step + self.radius;
                let at = Point::new(
                    anchor.x + angle.cos() * reach,
                    anchor.y + angle.sin() * reach,
                );
                (*action, at)
            })
            .collect()
    }

    fn hide(&mut self) {
        self.anchor = None;
        self.armed = None;
    }
}
