//! Pointer gesture recognition.
//!
//! Everything here is driven by explicit millisecond timestamps so the
//! recognisers can be exercised without a terminal or a real clock. Timers
//! (the long-press deadline) fire cooperatively from [`Gestures::tick`].

use crate::calendar::{TimeDirection, ZoomDirection};
use crate::config::GestureSettings;
use crate::model::Point;

pub type PointerId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down { id: PointerId, at: Point, time_ms: u64 },
    Move { id: PointerId, at: Point, time_ms: u64 },
    Up { id: PointerId, at: Point, time_ms: u64 },
    Cancel { id: PointerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// What a navigation gesture asks the calendar to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    Time(TimeDirection),
    Zoom(ZoomDirection),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Tap(Point),
    LongPressStart(Point),
    LongPressMove(Point),
    LongPressEnd(Point),
    DragStart(Point),
    DragMove(Point),
    DragEnd(Point),
    Swipe(SwipeDirection),
    DoubleTap,
    Pinch(ZoomDirection),
    /// A press in progress was abandoned (pointer cancelled or a second pointer arrived).
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressPhase {
    Idle,
    Tracking,
    LongPressing,
    Dragging,
}

impl SwipeDirection {
    pub fn intent(&self) -> NavIntent {
        match self {
            SwipeDirection::Up => NavIntent::Time(TimeDirection::Forward),
            SwipeDirection::Down => NavIntent::Time(TimeDirection::Back),
            SwipeDirection::Left => NavIntent::Zoom(ZoomDirection::Out),
            SwipeDirection::Right => NavIntent::Zoom(ZoomDirection::In),
        }
    }
}

/// Long-press versus drag for a single pointer.
#[derive(Debug, Clone)]
pub struct PressTracker {
    long_press_ms: u64,
    drag_threshold: f64,
    phase: PressPhase,
    pointer: Option<PointerId>,
    start: Point,
    current: Point,
    deadline: Option<u64>,
}

impl PressTracker {
    pub fn new(settings: &GestureSettings) -> Self {
        PressTracker {
            long_press_ms: settings.long_press_ms,
            drag_threshold: settings.drag_threshold,
            phase: PressPhase::Idle,
            pointer: None,
            start: Point::default(),
            current: Point::default(),
            deadline: None,
        }
    }

    pub fn phase(&self) -> PressPhase {
        self.phase
    }

    pub fn down(&mut self, id: PointerId, at: Point, now: u64) -> Vec<GestureEvent> {
        if self.phase != PressPhase::Idle {
            return Vec::new();
        }
        self.phase = PressPhase::Tracking;
        self.pointer = Some(id);
        self.start = at;
        self.current = at;
        self.deadline = Some(now + self.long_press_ms);
        Vec::new()
    }

    pub fn moved(&mut self, id: PointerId, at: Point, now: u64) -> Vec<GestureEvent> {
        if self.pointer != Some(id) {
            return Vec::new();
        }
        let mut events = self.tick(now);
        self.current = at;
        match self.phase {
            PressPhase::Tracking => {
                if self.start.distance_to(at) > self.drag_threshold {
                    self.deadline = None;
                    self.phase = PressPhase::Dragging;
                    events.push(GestureEvent::DragStart(self.start));
                    events.push(GestureEvent::DragMove(at));
                }
            }
            PressPhase::LongPressing => events.push(GestureEvent::LongPressMove(at)),
            PressPhase::Dragging => events.push(GestureEvent::DragMove(at)),
            PressPhase::Idle => {}
        }
        events
    }

    pub fn up(&mut self, id: PointerId, at: Point, now: u64) -> Vec<GestureEvent> {
        if self.pointer != Some(id) {
            return Vec::new();
        }
        let mut events = self.tick(now);
        match self.phase {
            PressPhase::Tracking => events.push(GestureEvent::Tap(at)),
            PressPhase::LongPressing => events.push(GestureEvent::LongPressEnd(at)),
            PressPhase::Dragging => events.push(GestureEvent::DragEnd(at)),
            PressPhase::Idle => {}
        }
        self.reset();
        events
    }

    pub fn cancel(&mut self) -> Vec<GestureEvent> {
        let was_active = matches!(
            self.phase,
            PressPhase::LongPressing | PressPhase::Dragging
        );
        self.reset();
        if was_active {
            vec![GestureEvent::Cancel]
        } else {
            Vec::new()
        }
    }

    /// Fires the long-press deadline once `now` has reached it.
    pub fn tick(&mut self, now: u64) -> Vec<GestureEvent> {
        match self.deadline {
            Some(deadline) if self.phase == PressPhase::Tracking && now >= deadline => {
                self.deadline = None;
                self.phase = PressPhase::LongPressing;
                vec![GestureEvent::LongPressStart(self.start)]
            }
            _ => Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.phase = PressPhase::Idle;
        self.pointer = None;
        self.deadline = None;
    }
}

/// Swipe, double-tap and pinch recognition over the raw pointer stream.
#[derive(Debug, Clone)]
pub struct SwipeDetector {
    settings: GestureSettings,
    start: Option<(Point, u64)>,
    last_down_ms: Option<u64>,
    pointers: Vec<(PointerId, Point)>,
    pinch_base: Option<f64>,
}

impl SwipeDetector {
    pub fn new(settings: &GestureSettings) -> Self {
        SwipeDetector {
            settings: settings.clone(),
            start: None,
            last_down_ms: None,
            pointers: Vec::new(),
            pinch_base: None,
        }
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    pub fn down(&mut self, id: PointerId, at: Point, now: u64) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        self.pointers.retain(|(p, _)| *p != id);
        self.pointers.push((id, at));
        match self.pointers.len() {
            1 => {
                self.start = Some((at, now));
                match self.last_down_ms {
                    Some(last) if now.saturating_sub(last) < self.settings.double_tap_ms => {
                        events.push(GestureEvent::DoubleTap);
                        self.last_down_ms = None;
                    }
                    _ => self.last_down_ms = Some(now),
                }
            }
            2 => {
                self.start = None;
                self.pinch_base = Some(self.pinch_distance());
            }
            _ => {}
        }
        events
    }

    pub fn moved(&mut self, id: PointerId, at: Point) -> Vec<GestureEvent> {
        if let Some(slot) = self.pointers.iter_mut().find(|(p, _)| *p == id) {
            slot.1 = at;
        }
        let base = match self.pinch_base {
            Some(base) if self.pointers.len() == 2 => base,
            _ => return Vec::new(),
        };
        let current = self.pinch_distance();
        let delta = current - base;
        if delta.abs() > self.settings.pinch_threshold {
            self.pinch_base = Some(current);
            let direction = if delta > 0.0 {
                ZoomDirection::Out
            } else {
                ZoomDirection::In
            };
            return vec![GestureEvent::Pinch(direction)];
        }
        Vec::new()
    }

    pub fn up(&mut self, id: PointerId, at: Point, now: u64) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        if self.pointers.len() == 1 {
            if let Some((from, started)) = self.start {
                if let Some(dir) =
                    classify_swipe(&self.settings, from, at, now.saturating_sub(started))
                {
                    events.push(GestureEvent::Swipe(dir));
                }
            }
        }
        self.pointers.retain(|(p, _)| *p != id);
        if self.pointers.is_empty() {
            self.start = None;
            self.pinch_base = None;
        }
        events
    }

    pub fn cancel(&mut self) {
        self.pointers.clear();
        self.start = None;
        self.pinch_base = None;
    }

    fn pinch_distance(&self) -> f64 {
        match self.pointers.as_slice() {
            [(_, a), (_, b), ..] => a.distance_to(*b),
            _ => 0.0,
        }
    }
}

/// A swipe needs enough distance, a short enough duration and enough velocity.
/// The dominant axis picks the direction; ties go vertical.
pub fn classify_swipe(
    settings: &GestureSettings,
    from: Point,
    to: Point,
    elapsed_ms: u64,
) -> Option<SwipeDirection> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let distance = from.distance_to(to);
    if distance < settings.swipe_distance || elapsed_ms > settings.swipe_max_duration_ms {
        return None;
    }
    let velocity = distance / elapsed_ms.max(1) as f64;
    if velocity < settings.swipe_min_velocity {
        return None;
    }
    let dir = if dx.abs() > dy.abs() {
        if dx < 0.0 {
            SwipeDirection::Left
        } else {
            SwipeDirection::Right
        }
    } else if dy < 0.0 {
        SwipeDirection::Up
    } else {
        SwipeDirection::Down
    };
    Some(dir)
}

/// The combined recogniser fed by the front-end.
///
/// A tap is held back for one double-tap window so that the two taps of a
/// double tap never reach the app as single taps.
#[derive(Debug, Clone)]
pub struct Gestures {
    press: PressTracker,
    swipe: SwipeDetector,
    tap_window_ms: u64,
    /// Released tap waiting out the window, with its release time.
    pending_tap: Option<(Point, u64)>,
    /// The press that completed a double tap must not tap again on release.
    swallow_tap: bool,
}

impl Gestures {
    pub fn new(settings: &GestureSettings) -> Self {
        Gestures {
            press: PressTracker::new(settings),
            swipe: SwipeDetector::new(settings),
            tap_window_ms: settings.double_tap_ms,
            pending_tap: None,
            swallow_tap: false,
        }
    }

    pub fn press_phase(&self) -> PressPhase {
        self.press.phase()
    }

    pub fn feed(&mut self, input: PointerInput) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        match input {
            PointerInput::Down { id, at, time_ms } => {
                let swipe_events = self.swipe.down(id, at, time_ms);
                self.swallow_tap = swipe_events.contains(&GestureEvent::DoubleTap);
                match self.pending_tap.take() {
                    Some(_) if self.swallow_tap => {}
                    Some((tapped, _)) => events.push(GestureEvent::Tap(tapped)),
                    None => {}
                }
                if self.swipe.active_pointers() > 1 {
                    events.extend(self.press.cancel());
                } else {
                    events.extend(self.press.down(id, at, time_ms));
                }
                events.extend(swipe_events);
            }
            PointerInput::Move { id, at, time_ms } => {
                events.extend(self.press.moved(id, at, time_ms));
                events.extend(self.swipe.moved(id, at));
            }
            PointerInput::Up { id, at, time_ms } => {
                for event in self.press.up(id, at, time_ms) {
                    match event {
                        GestureEvent::Tap(_) if self.swallow_tap => self.swallow_tap = false,
                        GestureEvent::Tap(tapped) => self.pending_tap = Some((tapped, time_ms)),
                        other => events.push(other),
                    }
                }
                events.extend(self.swipe.up(id, at, time_ms));
            }
            PointerInput::Cancel { .. } => {
                events.extend(self.press.cancel());
                self.swipe.cancel();
            }
        }
        events
    }

    /// Fires the long-press deadline and releases a tap whose window has passed.
    pub fn tick(&mut self, now: u64) -> Vec<GestureEvent> {
        let mut events = self.press.tick(now);
        if let Some((at, released)) = self.pending_tap {
            if now.saturating_sub(released) >= self.tap_window_ms {
                self.pending_tap = None;
                events.push(GestureEvent::Tap(at));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GestureSettings {
        GestureSettings::default()
    }

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn horizontal_sixty_pixels_is_a_horizontal_swipe() {
        let s = settings();
        assert_eq!(
            classify_swipe(&s, p(100.0, 100.0), p(40.0, 110.0), 100),
            Some(SwipeDirection::Left)
        );
        assert_eq!(
            classify_swipe(&s, p(100.0, 100.0), p(160.0, 95.0), 100),
            Some(SwipeDirection::Right)
        );
    }

    #[test]
    fn short_or_slow_drags_are_not_swipes() {
        let s = settings();
        assert_eq!(classify_swipe(&s, p(0.0, 0.0), p(40.0, 0.0), 100), None);
        assert_eq!(classify_swipe(&s, p(0.0, 0.0), p(80.0, 0.0), 400), None);
        assert_eq!(classify_swipe(&s, p(0.0, 0.0), p(60.0, 0.0), 250), None);
    }

    #[test]
    fn vertical_swipes_map_to_time() {
        let s = settings();
        let up = classify_swipe(&s, p(0.0, 200.0), p(5.0, 100.0), 120).unwrap();
        assert_eq!(up, SwipeDirection::Up);
        assert_eq!(up.intent(), NavIntent::Time(TimeDirection::Forward));
        assert_eq!(
            SwipeDirection::Left.intent(),
            NavIntent::Zoom(ZoomDirection::Out)
        );
        assert_eq!(
            SwipeDirection::Right.intent(),
            NavIntent::Zoom(ZoomDirection::In)
        );
    }

    #[test]
    fn holding_still_fires_long_press_on_tick() {
        let mut g = Gestures::new(&settings());
        g.feed(PointerInput::Down {
            id: 1,
            at: p(50.0, 50.0),
            time_ms: 1_000,
        });
        assert!(g.tick(1_400).is_empty());
        assert_eq!(g.tick(1_500), vec![GestureEvent::LongPressStart(p(50.0, 50.0))]);
        assert_eq!(g.press_phase(), PressPhase::LongPressing);
        let moved = g.feed(PointerInput::Move {
            id: 1,
            at: p(90.0, 50.0),
            time_ms: 1_600,
        });
        assert_eq!(moved, vec![GestureEvent::LongPressMove(p(90.0, 50.0))]);
        let up = g.feed(PointerInput::Up {
            id: 1,
            at: p(90.0, 50.0),
            time_ms: 1_700,
        });
        assert_eq!(up, vec![GestureEvent::LongPressEnd(p(90.0, 50.0))]);
        assert_eq!(g.press_phase(), PressPhase::Idle);
    }

    #[test]
    fn moving_past_threshold_starts_drag_and_disarms_long_press() {
        let mut g = Gestures::new(&settings());
        g.feed(PointerInput::Down {
            id: 1,
            at: p(0.0, 0.0),
            time_ms: 0,
        });
        assert!(g
            .feed(PointerInput::Move {
                id: 1,
                at: p(5.0, 5.0),
                time_ms: 50,
            })
            .is_empty());
        let events = g.feed(PointerInput::Move {
            id: 1,
            at: p(20.0, 0.0),
            time_ms: 100,
        });
        assert_eq!(
            events,
            vec![
                GestureEvent::DragStart(p(0.0, 0.0)),
                GestureEvent::DragMove(p(20.0, 0.0))
            ]
        );
        assert!(g.tick(2_000).is_empty());
        let up = g.feed(PointerInput::Up {
            id: 1,
            at: p(30.0, 0.0),
            time_ms: 2_000,
        });
        assert_eq!(up, vec![GestureEvent::DragEnd(p(30.0, 0.0))]);
    }

    #[test]
    fn quick_flick_reports_drag_and_swipe() {
        let mut g = Gestures::new(&settings());
        g.feed(PointerInput::Down {
            id: 1,
            at: p(200.0, 100.0),
            time_ms: 0,
        });
        g.feed(PointerInput::Move {
            id: 1,
            at: p(170.0, 100.0),
            time_ms: 50,
        });
        let up = g.feed(PointerInput::Up {
            id: 1,
            at: p(130.0, 100.0),
            time_ms: 100,
        });
        assert!(up.contains(&GestureEvent::Swipe(SwipeDirection::Left)));
    }

    #[test]
    fn two_downs_within_window_is_double_tap() {
        let mut g = Gestures::new(&settings());
        let tap = |g: &mut Gestures, t: u64| {
            let mut events = g.feed(PointerInput::Down {
                id: 1,
                at: p(10.0, 10.0),
                time_ms: t,
            });
            events.extend(g.feed(PointerInput::Up {
                id: 1,
                at: p(10.0, 10.0),
                time_ms: t + 40,
            }));
            events
        };
        assert!(tap(&mut g, 0).is_empty());
        assert_eq!(tap(&mut g, 200), vec![GestureEvent::DoubleTap]);
        assert!(g.tick(900).is_empty());
        assert!(tap(&mut g, 1_000).is_empty());
        assert!(g.tick(1_200).is_empty());
        assert_eq!(g.tick(1_340), vec![GestureEvent::Tap(p(10.0, 10.0))]);
    }

    #[test]
    fn held_tap_is_released_by_a_late_second_press() {
        let mut g = Gestures::new(&settings());
        g.feed(PointerInput::Down {
            id: 1,
            at: p(10.0, 10.0),
            time_ms: 0,
        });
        g.feed(PointerInput::Up {
            id: 1,
            at: p(10.0, 10.0),
            time_ms: 200,
        });
        let down = g.feed(PointerInput::Down {
            id: 1,
            at: p(40.0, 40.0),
            time_ms: 350,
        });
        assert_eq!(down, vec![GestureEvent::Tap(p(10.0, 10.0))]);
    }

    #[test]
    fn pinch_beyond_threshold_zooms_once_per_step() {
        let mut g = Gestures::new(&settings());
        g.feed(PointerInput::Down {
            id: 1,
            at: p(100.0, 100.0),
            time_ms: 0,
        });
        g.feed(PointerInput::Down {
            id: 2,
            at: p(200.0, 100.0),
            time_ms: 500,
        });
        assert_eq!(g.press_phase(), PressPhase::Idle);
        assert!(g
            .feed(PointerInput::Move {
                id: 2,
                at: p(220.0, 100.0),
                time_ms: 520,
            })
            .is_empty());
        assert_eq!(
            g.feed(PointerInput::Move {
                id: 2,
                at: p(240.0, 100.0),
                time_ms: 540,
            }),
            vec![GestureEvent::Pinch(ZoomDirection::Out)]
        );
        assert_eq!(
            g.feed(PointerInput::Move {
                id: 2,
                at: p(150.0, 100.0),
                time_ms: 560,
            }),
            vec![GestureEvent::Pinch(ZoomDirection::In)]
        );
    }

    #[test]
    fn second_pointer_while_pressing_is_ignored_by_press_tracker() {
        let mut tracker = PressTracker::new(&settings());
        tracker.down(1, p(0.0, 0.0), 0);
        assert!(tracker.down(2, p(50.0, 50.0), 10).is_empty());
        assert!(tracker.moved(2, p(80.0, 80.0), 20).is_empty());
        assert_eq!(tracker.phase(), PressPhase::Tracking);
    }
}
