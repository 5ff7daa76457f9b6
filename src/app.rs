//! State transitions for the calendar and the day canvas.
//!
//! `reduce` is pure: it takes the current [`AppState`] and an [`Action`] and
//! returns the next state plus the [`Effect`]s to run. The [`Controller`] owns
//! the journal and performs those effects.

use crate::calendar::{day_key, Navigator, TimeDirection, ViewLevel, ZoomDirection};
use crate::config::{AutoSaveSettings, Settings};
use crate::gesture::{GestureEvent, Gestures, NavIntent, PointerInput, PressPhase};
use crate::journal::{starter_content, Journal, TrashZone, EMAIL_LINK};
use crate::logging::sanitize;
use crate::media::media_content;
use crate::model::{Content, ItemId, ItemKind, ItemPatch, Point, Size};
use crate::radial::{MenuAction, RadialMenu};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde_json::json;
use std::path::Path;

pub const SETTING_LAST_DATE: &str = "lastDate";
pub const SETTING_LAST_LEVEL: &str = "lastViewLevel";

/// What lies under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Empty,
    Item { id: ItemId, origin: Point },
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub id: ItemId,
    /// Pointer position relative to the item's top-left corner.
    pub grab: Point,
    pub pointer: Point,
    pub over_trash: bool,
}

impl DragState {
    pub fn item_position(&self) -> Point {
        Point::new(self.pointer.x - self.grab.x, self.pointer.y - self.grab.y)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub nav: Navigator,
    pub menu: RadialMenu,
    pub drag: Option<DragState>,
    pub trash: TrashZone,
    pub viewport: Size,
}

impl AppState {
    pub fn new(nav: Navigator, settings: &Settings, viewport: Size) -> Self {
        AppState {
            nav,
            menu: RadialMenu::new(&settings.radial),
            drag: None,
            trash: TrashZone::for_viewport(viewport),
            viewport,
        }
    }

    pub fn day_key(&self) -> String {
        day_key(self.nav.current)
    }

    pub fn is_busy(&self) -> bool {
        self.drag.is_some() || self.menu.is_active()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(TimeDirection),
    Zoom(ZoomDirection),
    GoTo(NaiveDate),
    /// Open a tapped date: a month from the year view, a day otherwise.
    Open(NaiveDate),
    OpenMenu(Point),
    MoveMenu(Point),
    ReleaseMenu(Point),
    CancelMenu,
    StartDrag { id: ItemId, pointer: Point, origin: Point },
    MoveDrag(Point),
    EndDrag(Point),
    CancelDrag,
    Create { action: MenuAction, anchor: Option<Point> },
    Activate(ItemId),
    Delete(ItemId),
    Resize(Size),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render,
    SaveNavigator,
    EnsureVerse(String),
    Create {
        action: MenuAction,
        date: String,
        anchor: Point,
    },
    MoveItem { id: ItemId, to: Point },
    DeleteItem(ItemId),
    TrashHover(bool),
    Activate(ItemId),
}

fn moved_effects(before: Navigator, state: &AppState) -> Vec<Effect> {
    if before == state.nav {
        return Vec::new();
    }
    let mut effects = vec![Effect::SaveNavigator];
    if state.nav.level == ViewLevel::Day {
        effects.push(Effect::EnsureVerse(state.day_key()));
    }
    effects.push(Effect::Render);
    effects
}

pub fn reduce(mut state: AppState, action: Action) -> (AppState, Vec<Effect>) {
    let before = state.nav;
    let effects = match action {
        Action::Navigate(direction) => {
            state.nav = state.nav.navigate_period(direction);
            moved_effects(before, &state)
        }
        Action::Zoom(direction) => {
            state.nav = state.nav.zoom(direction);
            moved_effects(before, &state)
        }
        Action::GoTo(date) => {
            state.nav = state.nav.go_to(date);
            moved_effects(before, &state)
        }
        Action::Open(date) => {
            let level = match state.nav.level {
                ViewLevel::Year => ViewLevel::Month,
                _ => ViewLevel::Day,
            };
            state.nav = Navigator::new(date, level);
            moved_effects(before, &state)
        }
        Action::OpenMenu(anchor) => {
            if state.nav.level != ViewLevel::Day || state.drag.is_some() {
                return (state, Vec::new());
            }
            state.menu.show(anchor);
            vec![Effect::Render]
        }
        Action::MoveMenu(at) => {
            if !state.menu.is_active() {
                return (state, Vec::new());
            }
            state.menu.update(at);
            vec![Effect::Render]
        }
        Action::ReleaseMenu(at) => {
            if !state.menu.is_active() {
                return (state, Vec::new());
            }
            let anchor = state.menu.anchor().unwrap_or(at);
            state.menu.update(at);
            let mut effects = Vec::new();
            if let Some(action) = state.menu.confirm() {
                effects.push(Effect::Create {
                    action,
                    date: state.day_key(),
                    anchor,
                });
            }
            effects.push(Effect::Render);
            effects
        }
        Action::CancelMenu => {
            state.menu.cancel();
            vec![Effect::Render]
        }
        Action::StartDrag {
            id,
            pointer,
            origin,
        } => {
            if state.nav.level != ViewLevel::Day || state.menu.is_active() {
                return (state, Vec::new());
            }
            state.drag = Some(DragState {
                id,
                grab: Point::new(pointer.x - origin.x, pointer.y - origin.y),
                pointer,
                over_trash: state.trash.contains(pointer),
            });
            vec![Effect::Render]
        }
        Action::MoveDrag(at) => {
            let over = state.trash.contains(at);
            let mut effects = Vec::new();
            if let Some(drag) = state.drag.as_mut() {
                drag.pointer = at;
                if over != drag.over_trash {
                    drag.over_trash = over;
                    effects.push(Effect::TrashHover(over));
                }
                effects.push(Effect::Render);
            }
            effects
        }
        Action::EndDrag(at) => {
            let Some(mut drag) = state.drag.take() else {
                return (state, Vec::new());
            };
            drag.pointer = at;
            let effect = if state.trash.contains(at) {
                Effect::DeleteItem(drag.id)
            } else {
                Effect::MoveItem {
                    to: drag.item_position(),
                    id: drag.id,
                }
            };
            vec![effect, Effect::TrashHover(false), Effect::Render]
        }
        Action::CancelDrag => {
            state.drag = None;
            vec![Effect::TrashHover(false), Effect::Render]
        }
        Action::Create { action, anchor } => vec![
            Effect::Create {
                action,
                date: state.day_key(),
                anchor: anchor.unwrap_or_else(|| state.viewport.center()),
            },
            Effect::Render,
        ],
        Action::Activate(id) => vec![Effect::Activate(id), Effect::Render],
        Action::Delete(id) => vec![Effect::DeleteItem(id), Effect::Render],
        Action::Resize(viewport) => {
            state.viewport = viewport;
            state.trash = TrashZone::for_viewport(viewport);
            vec![Effect::Render]
        }
    };
    (state, effects)
}

/// Maps a recognised gesture onto an action, given what was under the pointer.
pub fn translate(event: &GestureEvent, hit: &Hit, state: &AppState, today: NaiveDate) -> Option<Action> {
    let day_view = state.nav.level == ViewLevel::Day;
    match event {
        GestureEvent::Swipe(direction) => {
            if state.is_busy() {
                return None;
            }
            Some(match direction.intent() {
                NavIntent::Time(dir) => Action::Navigate(dir),
                NavIntent::Zoom(dir) => Action::Zoom(dir),
            })
        }
        GestureEvent::DoubleTap => Some(Action::GoTo(today)),
        GestureEvent::Pinch(direction) => Some(Action::Zoom(*direction)),
        GestureEvent::LongPressStart(at) | GestureEvent::DragStart(at) if day_view => {
            match hit {
                Hit::Item { id, origin } => Some(Action::StartDrag {
                    id: id.clone(),
                    pointer: *at,
                    origin: *origin,
                }),
                _ if matches!(event, GestureEvent::LongPressStart(_)) => Some(Action::OpenMenu(*at)),
                _ => None,
            }
        }
        GestureEvent::LongPressMove(at) | GestureEvent::DragMove(at) => {
            if state.menu.is_active() {
                Some(Action::MoveMenu(*at))
            } else if state.drag.is_some() {
                Some(Action::MoveDrag(*at))
            } else {
                None
            }
        }
        GestureEvent::LongPressEnd(at) | GestureEvent::DragEnd(at) => {
            if state.menu.is_active() {
                Some(Action::ReleaseMenu(*at))
            } else if state.drag.is_some() {
                Some(Action::EndDrag(*at))
            } else {
                None
            }
        }
        GestureEvent::Tap(_) => match hit {
            Hit::Date(date) if !day_view => Some(Action::Open(*date)),
            Hit::Item { id, .. } if day_view => Some(Action::Activate(id.clone())),
            _ => None,
        },
        GestureEvent::Cancel => {
            if state.menu.is_active() {
                Some(Action::CancelMenu)
            } else if state.drag.is_some() {
                Some(Action::CancelDrag)
            } else {
                None
            }
        }
        GestureEvent::LongPressStart(_) | GestureEvent::DragStart(_) => None,
    }
}

/// Debounced plus periodic flushing of navigator settings.
#[derive(Debug, Clone)]
pub struct AutoSave {
    debounce_ms: u64,
    interval_ms: u64,
    last_change: Option<u64>,
    last_flush: u64,
}

impl AutoSave {
    pub fn new(settings: &AutoSaveSettings, now_ms: u64) -> Self {
        AutoSave {
            debounce_ms: settings.debounce_ms,
            interval_ms: settings.interval_ms,
            last_change: None,
            last_flush: now_ms,
        }
    }

    pub fn mark_dirty(&mut self, now_ms: u64) {
        self.last_change = Some(now_ms);
    }

    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }

    pub fn due(&self, now_ms: u64) -> bool {
        match self.last_change {
            Some(changed) => {
                now_ms.saturating_sub(changed) >= self.debounce_ms
                    || now_ms.saturating_sub(self.last_flush) >= self.interval_ms
            }
            None => false,
        }
    }

    pub fn flushed(&mut self, now_ms: u64) {
        self.last_change = None;
        self.last_flush = now_ms;
    }
}

/// Input the front-end must collect before an item can be created.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    NoteText { date: String, anchor: Point },
    MediaPath { kind: ItemKind, date: String, anchor: Point },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    pub render: bool,
    pub prompts: Vec<Prompt>,
    pub notices: Vec<String>,
}

impl Outcome {
    fn merge(&mut self, other: Outcome) {
        self.render |= other.render;
        self.prompts.extend(other.prompts);
        self.notices.extend(other.notices);
    }
}

/// Restores the navigator from saved settings, defaulting to today's day view.
pub fn restore_navigator(journal: &Journal, today: NaiveDate) -> Navigator {
    let db = journal.db();
    let date = db
        .get_setting(SETTING_LAST_DATE)
        .and_then(|v| v.as_str())
        .and_then(crate::calendar::parse_day_key)
        .unwrap_or(today);
    let level = db
        .get_setting(SETTING_LAST_LEVEL)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<ViewLevel>().ok())
        .unwrap_or(ViewLevel::Day);
    Navigator::new(date, level)
}

pub struct Controller {
    state: AppState,
    journal: Journal,
    autosave: AutoSave,
    gestures: Gestures,
}

impl Controller {
    pub fn new(journal: Journal, settings: &Settings, viewport: Size, today: NaiveDate, now_ms: u64) -> Self {
        let nav = restore_navigator(&journal, today);
        let mut controller = Controller {
            state: AppState::new(nav, settings, viewport),
            journal,
            autosave: AutoSave::new(&settings.autosave, now_ms),
            gestures: Gestures::new(&settings.gestures),
        };
        if nav.level == ViewLevel::Day {
            let key = controller.state.day_key();
            controller
                .journal
                .ensure_daily_verse(&key, viewport, now_ms as i64);
        }
        controller
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn press_phase(&self) -> PressPhase {
        self.gestures.press_phase()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    /// Topmost item of the current day under `at`.
    pub fn hit_item(&self, at: Point) -> Hit {
        self.journal
            .items_for(&self.state.day_key())
            .into_iter()
            .rev()
            .find(|item| item.bounds().contains(at))
            .map(|item| Hit::Item {
                id: item.id.clone(),
                origin: item.position(),
            })
            .unwrap_or(Hit::Empty)
    }

    pub fn dispatch(&mut self, action: Action, now_ms: u64) -> Outcome {
        debug!("event=dispatch action={:?}", action);
        let (next, effects) = reduce(self.state.clone(), action);
        self.state = next;
        let mut outcome = Outcome::default();
        for effect in effects {
            self.run(effect, now_ms, &mut outcome);
        }
        if let Some(err) = self.journal.take_store_error() {
            outcome.notices.push(format!("Could not save: {}", err));
        }
        outcome
    }

    /// Feeds one pointer sample through gesture recognition. Items of the
    /// current day are hit-tested here; `hit_test` answers for calendar cells.
    pub fn pointer(
        &mut self,
        input: PointerInput,
        hit_test: &dyn Fn(Point) -> Hit,
        today: NaiveDate,
        now_ms: u64,
    ) -> Outcome {
        let events = self.gestures.feed(input);
        self.handle_gestures(events, hit_test, today, now_ms)
    }

    /// Fires gesture deadlines, advances timers and flushes pending settings.
    pub fn tick(&mut self, hit_test: &dyn Fn(Point) -> Hit, today: NaiveDate, now_ms: u64) -> Outcome {
        let events = self.gestures.tick(now_ms);
        let mut outcome = self.handle_gestures(events, hit_test, today, now_ms);
        let changed = self
            .journal
            .tick_timers(&self.state.day_key(), now_ms as i64);
        if !changed.is_empty() {
            outcome.render = true;
        }
        if self.autosave.due(now_ms) {
            self.save_navigator(now_ms);
        }
        if let Some(err) = self.journal.take_store_error() {
            outcome.notices.push(format!("Could not save: {}", err));
        }
        outcome
    }

    fn handle_gestures(
        &mut self,
        events: Vec<GestureEvent>,
        hit_test: &dyn Fn(Point) -> Hit,
        today: NaiveDate,
        now_ms: u64,
    ) -> Outcome {
        // A flick that ends an item drag is not also a navigation swipe.
        let busy_at_start = self.state.is_busy();
        let mut outcome = Outcome::default();
        for event in events {
            if busy_at_start && matches!(event, GestureEvent::Swipe(_)) {
                continue;
            }
            let hit = match event {
                GestureEvent::LongPressStart(at) | GestureEvent::DragStart(at) | GestureEvent::Tap(at) => {
                    if self.state.nav.level == ViewLevel::Day {
                        self.hit_item(at)
                    } else {
                        hit_test(at)
                    }
                }
                _ => Hit::Empty,
            };
            if let Some(action) = translate(&event, &hit, &self.state, today) {
                outcome.merge(self.dispatch(action, now_ms));
            }
        }
        outcome
    }

    /// Writes `lastDate` and `lastViewLevel` now.
    pub fn save_navigator(&mut self, now_ms: u64) {
        let entries = vec![
            (SETTING_LAST_DATE.to_string(), json!(self.state.day_key())),
            (
                SETTING_LAST_LEVEL.to_string(),
                json!(self.state.nav.level.as_str()),
            ),
        ];
        match self.journal.db_mut().set_settings(entries) {
            Ok(()) => self.autosave.flushed(now_ms),
            Err(err) => warn!("event=autosave_failed error={}", err),
        }
    }

    /// Flushes pending navigator settings, for shutdown.
    pub fn flush(&mut self, now_ms: u64) {
        if self.autosave.is_dirty() {
            self.save_navigator(now_ms);
        }
    }

    fn run(&mut self, effect: Effect, now_ms: u64, outcome: &mut Outcome) {
        let now = now_ms as i64;
        match effect {
            Effect::Render | Effect::TrashHover(_) => outcome.render = true,
            Effect::SaveNavigator => self.autosave.mark_dirty(now_ms),
            Effect::EnsureVerse(date) => {
                self.journal
                    .ensure_daily_verse(&date, self.state.viewport, now);
            }
            Effect::Create {
                action,
                date,
                anchor,
            } => match action.kind() {
                None => {
                    info!("event=email_link");
                    outcome.notices.push(format!("Compose an email: {}", EMAIL_LINK));
                }
                Some(ItemKind::Note) => outcome.prompts.push(Prompt::NoteText { date, anchor }),
                Some(kind @ (ItemKind::Photo | ItemKind::Audio | ItemKind::Video)) => {
                    outcome
                        .prompts
                        .push(Prompt::MediaPath { kind, date, anchor })
                }
                Some(kind) => match starter_content(kind, now) {
                    Some(content) => {
                        self.journal
                            .create_item(&date, content, Some(anchor), self.state.viewport, now);
                    }
                    None => outcome
                        .notices
                        .push(format!("{} items cannot be created here", kind)),
                },
            },
            Effect::MoveItem { id, to } => {
                if let Err(err) = self.journal.update_position(&id, to) {
                    outcome.notices.push(err.to_string());
                }
            }
            Effect::DeleteItem(id) => {
                self.journal.delete_item(&id);
            }
            Effect::Activate(id) => {
                let kind = self.journal.get(&id).map(|item| item.kind());
                let result = match kind {
                    Some(ItemKind::Verse) => self.journal.mark_verse_read(&id),
                    Some(ItemKind::Timer) => self.journal.toggle_timer(&id, now).map(|_| ()),
                    _ => Ok(()),
                };
                if let Err(err) = result {
                    outcome.notices.push(err.to_string());
                }
            }
        }
    }

    /// Completes a prompt with the user's answer.
    pub fn complete(&mut self, prompt: Prompt, answer: &str, now_ms: u64) -> Outcome {
        let now = now_ms as i64;
        let mut outcome = Outcome {
            render: true,
            ..Outcome::default()
        };
        match prompt {
            Prompt::NoteText { date, anchor } => {
                let text = answer.trim_end().to_string();
                if text.trim().is_empty() {
                    return Outcome::default();
                }
                self.journal
                    .create_item(&date, Content::Note(text), Some(anchor), self.state.viewport, now);
            }
            Prompt::MediaPath { kind, date, anchor } => {
                let path = answer.trim();
                if path.is_empty() {
                    return Outcome::default();
                }
                match media_content(Path::new(path), kind) {
                    Ok(content) => {
                        self.journal
                            .create_item(&date, content, Some(anchor), self.state.viewport, now);
                    }
                    Err(err) => {
                        warn!(
                            "event=media_attach_failed kind={} path={} error={}",
                            kind,
                            sanitize(path, 120),
                            err
                        );
                        outcome.notices.push(err.to_string());
                    }
                }
            }
        }
        if let Some(err) = self.journal.take_store_error() {
            outcome.notices.push(format!("Could not save: {}", err));
        }
        outcome
    }

    /// Replaces a note's text in place.
    pub fn edit_note(&mut self, id: &str, text: &str) -> Result<(), crate::model::JournalError> {
        let content = match self.journal.get(id).map(|item| &item.content) {
            Some(Content::Ai(_)) => Content::Ai(text.to_string()),
            Some(Content::Todos(_)) => Content::Todos(crate::model::parse_todo_lines(text)),
            _ => Content::Note(text.to_string()),
        };
        self.journal.update_item(
            id,
            ItemPatch {
                content: Some(content),
                ..ItemPatch::default()
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JournalDb;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn viewport() -> Size {
        Size::new(800.0, 600.0)
    }

    fn state(level: ViewLevel) -> AppState {
        AppState::new(Navigator::new(today(), level), &Settings::default(), viewport())
    }

    fn controller() -> Controller {
        Controller::new(
            Journal::new(JournalDb::in_memory()),
            &Settings::default(),
            viewport(),
            today(),
            0,
        )
    }

    #[test]
    fn navigation_saves_and_ensures_verse_in_day_view() {
        let (next, effects) = reduce(state(ViewLevel::Day), Action::Navigate(TimeDirection::Forward));
        assert_eq!(day_key(next.nav.current), "2026-10-20");
        assert_eq!(
            effects,
            vec![
                Effect::SaveNavigator,
                Effect::EnsureVerse("2026-10-20".to_string()),
                Effect::Render
            ]
        );
    }

    #[test]
    fn zoom_past_the_end_has_no_effects() {
        let (next, effects) = reduce(state(ViewLevel::Year), Action::Zoom(ZoomDirection::Out));
        assert_eq!(next.nav.level, ViewLevel::Year);
        assert!(effects.is_empty());
    }

    #[test]
    fn menu_only_opens_in_day_view() {
        let (next, effects) = reduce(state(ViewLevel::Week), Action::OpenMenu(Point::new(10.0, 10.0)));
        assert!(!next.menu.is_active());
        assert!(effects.is_empty());
    }

    #[test]
    fn releasing_menu_creates_armed_action_at_anchor() {
        let anchor = Point::new(100.0, 100.0);
        let (s, _) = reduce(state(ViewLevel::Day), Action::OpenMenu(anchor));
        let (s, _) = reduce(s, Action::MoveMenu(Point::new(100.0, 170.0)));
        let (s, effects) = reduce(s, Action::ReleaseMenu(Point::new(100.0, 170.0)));
        assert!(!s.menu.is_active());
        assert_eq!(
            effects[0],
            Effect::Create {
                action: MenuAction::Photo,
                date: "2026-10-19".to_string(),
                anchor
            }
        );
    }

    #[test]
    fn releasing_menu_in_dead_zone_creates_nothing() {
        let (s, _) = reduce(state(ViewLevel::Day), Action::OpenMenu(Point::new(0.0, 0.0)));
        let (_, effects) = reduce(s, Action::ReleaseMenu(Point::new(5.0, 5.0)));
        assert_eq!(effects, vec![Effect::Render]);
    }

    #[test]
    fn drag_onto_trash_deletes_instead_of_moving() {
        let s = state(ViewLevel::Day);
        let trash_point = Point::new(
            s.trash.rect.x + s.trash.rect.width / 2.0,
            s.trash.rect.y + s.trash.rect.height / 2.0,
        );
        let (s, _) = reduce(
            s,
            Action::StartDrag {
                id: "a".into(),
                pointer: Point::new(110.0, 110.0),
                origin: Point::new(100.0, 100.0),
            },
        );
        let (s, effects) = reduce(s, Action::MoveDrag(trash_point));
        assert!(effects.contains(&Effect::TrashHover(true)));
        let (s, effects) = reduce(s, Action::EndDrag(trash_point));
        assert!(s.drag.is_none());
        assert_eq!(effects[0], Effect::DeleteItem("a".into()));
    }

    #[test]
    fn drag_release_moves_by_grab_offset() {
        let (s, _) = reduce(
            state(ViewLevel::Day),
            Action::StartDrag {
                id: "a".into(),
                pointer: Point::new(110.0, 120.0),
                origin: Point::new(100.0, 100.0),
            },
        );
        let (_, effects) = reduce(s, Action::EndDrag(Point::new(210.0, 220.0)));
        assert_eq!(
            effects[0],
            Effect::MoveItem {
                id: "a".into(),
                to: Point::new(200.0, 200.0)
            }
        );
    }

    #[test]
    fn translate_maps_swipes_and_taps() {
        let s = state(ViewLevel::Month);
        assert_eq!(
            translate(
                &GestureEvent::Swipe(crate::gesture::SwipeDirection::Right),
                &Hit::Empty,
                &s,
                today()
            ),
            Some(Action::Zoom(ZoomDirection::In))
        );
        let date = NaiveDate::from_ymd_opt(2026, 10, 3).unwrap();
        assert_eq!(
            translate(&GestureEvent::Tap(Point::default()), &Hit::Date(date), &s, today()),
            Some(Action::Open(date))
        );
        assert_eq!(
            translate(&GestureEvent::DoubleTap, &Hit::Empty, &s, today()),
            Some(Action::GoTo(today()))
        );
    }

    #[test]
    fn long_press_on_item_drags_and_on_empty_opens_menu() {
        let s = state(ViewLevel::Day);
        let at = Point::new(50.0, 50.0);
        let hit = Hit::Item {
            id: "x".into(),
            origin: Point::new(40.0, 40.0),
        };
        assert!(matches!(
            translate(&GestureEvent::LongPressStart(at), &hit, &s, today()),
            Some(Action::StartDrag { .. })
        ));
        assert_eq!(
            translate(&GestureEvent::LongPressStart(at), &Hit::Empty, &s, today()),
            Some(Action::OpenMenu(at))
        );
        assert_eq!(
            translate(&GestureEvent::DragStart(at), &Hit::Empty, &s, today()),
            None
        );
    }

    #[test]
    fn autosave_debounces_and_caps_interval() {
        let mut save = AutoSave::new(&AutoSaveSettings::default(), 0);
        assert!(!save.due(10_000));
        save.mark_dirty(100);
        assert!(!save.due(900));
        assert!(save.due(1_100));
        save.flushed(1_100);
        for t in (2_000..6_000).step_by(500) {
            save.mark_dirty(t);
        }
        assert!(!save.due(5_999));
        assert!(save.due(6_100));
    }

    #[test]
    fn controller_creates_starter_items_and_prompts() {
        let mut c = controller();
        let verse_count = c.journal().items_for("2026-10-19").len();
        assert_eq!(verse_count, 1);
        let outcome = c.dispatch(
            Action::Create {
                action: MenuAction::Timer,
                anchor: None,
            },
            1_000,
        );
        assert!(outcome.render);
        assert_eq!(c.journal().items_for("2026-10-19").len(), 2);

        let outcome = c.dispatch(
            Action::Create {
                action: MenuAction::Note,
                anchor: Some(Point::new(5.0, 5.0)),
            },
            2_000,
        );
        let prompt = outcome.prompts[0].clone();
        c.complete(prompt, "remember the milk", 3_000);
        assert!(c
            .journal()
            .items_for("2026-10-19")
            .iter()
            .any(|i| i.content == Content::Note("remember the milk".into())));

        let outcome = c.dispatch(
            Action::Create {
                action: MenuAction::Email,
                anchor: None,
            },
            4_000,
        );
        assert!(outcome.notices[0].contains("mailto:"));
    }

    #[test]
    fn controller_restores_and_saves_navigator() {
        let mut db = JournalDb::in_memory();
        db.set_settings([(SETTING_LAST_DATE.to_string(), json!("2026-01-05"))]).unwrap();
        db.set_settings([(SETTING_LAST_LEVEL.to_string(), json!("month"))]).unwrap();
        let mut c = Controller::new(Journal::new(db), &Settings::default(), viewport(), today(), 0);
        assert_eq!(c.state().nav.level, ViewLevel::Month);
        c.dispatch(Action::Zoom(ZoomDirection::In), 100);
        c.tick(&|_| Hit::Empty, today(), 1_200);
        assert_eq!(
            c.journal().db().get_setting(SETTING_LAST_LEVEL),
            Some(&json!("week"))
        );
    }

    #[test]
    fn pointer_flick_on_item_moves_it_without_navigating() {
        let mut c = controller();
        let item = c.journal_mut().create_item(
            "2026-10-19",
            Content::Note("drag me".into()),
            Some(Point::new(90.0, 90.0)),
            viewport(),
            10,
        );
        let no_dates = |_: Point| Hit::Empty;
        let down = PointerInput::Down {
            id: 1,
            at: Point::new(100.0, 100.0),
            time_ms: 0,
        };
        c.pointer(down, &no_dates, today(), 0);
        let moved = PointerInput::Move {
            id: 1,
            at: Point::new(100.0, 140.0),
            time_ms: 50,
        };
        c.pointer(moved, &no_dates, today(), 50);
        assert!(c.state().drag.is_some());
        let up = PointerInput::Up {
            id: 1,
            at: Point::new(100.0, 180.0),
            time_ms: 100,
        };
        c.pointer(up, &no_dates, today(), 100);
        assert!(c.state().drag.is_none());
        assert_eq!(day_key(c.state().nav.current), "2026-10-19");
        let moved = c.journal().get(&item.id).unwrap();
        assert_eq!(moved.position(), Point::new(90.0, 170.0));
    }

    #[test]
    fn double_tap_on_a_timer_leaves_it_alone() {
        let mut c = controller();
        let key = c.state().day_key();
        let timer = c.journal_mut().create_item(
            &key,
            Content::Timer(crate::model::TimerState::new(60)),
            Some(Point::new(10.0, 10.0)),
            viewport(),
            0,
        );
        let no_dates = |_: Point| Hit::Empty;
        let on_timer = Point::new(20.0, 20.0);
        let tap = |c: &mut Controller, t: u64| {
            c.pointer(
                PointerInput::Down {
                    id: 1,
                    at: on_timer,
                    time_ms: t,
                },
                &no_dates,
                today(),
                t,
            );
            c.pointer(
                PointerInput::Up {
                    id: 1,
                    at: on_timer,
                    time_ms: t + 40,
                },
                &no_dates,
                today(),
                t + 40,
            );
        };
        let running = |c: &Controller| match &c.journal().get(&timer.id).unwrap().content {
            Content::Timer(state) => state.running,
            _ => panic!("timer expected"),
        };

        tap(&mut c, 1_000);
        assert!(!running(&c));
        tap(&mut c, 1_150);
        c.tick(&no_dates, today(), 2_000);
        assert!(!running(&c));
        assert_eq!(c.state().nav.current, today());

        tap(&mut c, 5_000);
        c.tick(&no_dates, today(), 5_100);
        assert!(!running(&c));
        c.tick(&no_dates, today(), 5_400);
        assert!(running(&c));
    }

    #[test]
    fn tapping_a_month_in_year_view_opens_the_month() {
        let s = state(ViewLevel::Year);
        let march = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (next, _) = reduce(s, Action::Open(march));
        assert_eq!(next.nav, Navigator::new(march, ViewLevel::Month));
    }
}
