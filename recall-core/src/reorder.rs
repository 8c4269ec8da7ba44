//! Drag-reorder controller.
//!
//! Turns pointer or keyboard gestures over the rendered slide list into at most one
//! [`Deck::reorder`] call per gesture. While a gesture is live the deck is never
//! written; [`ReorderController::visual_order`] computes the order the surface
//! should paint from the order captured at drag start and the current target.
//!
//! ```text
//! Idle --press--> Pressed --travel > threshold--> Dragging --drop on other--> Idle (reorder)
//!                    |                                 |--drop on self / cancel--> Idle
//!                    '--release--> Idle (click)
//! Idle --key pick-up--> Dragging --key steps--> Dragging --key drop--> Idle
//! ```

use tracing::{debug, warn};

use crate::deck::Deck;
use crate::error::CoreResult;
use crate::telemetry::{KEY_DECK_GENERATION, KEY_SLIDE_ID};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pointer,
    Keyboard,
}

#[derive(Debug, Clone, PartialEq)]
struct Drag {
    active: String,
    over: Option<String>,
    origin_order: Vec<String>,
    generation: u64,
    input: InputKind,
}

#[derive(Debug, Clone, PartialEq)]
enum GestureState {
    Idle,
    Pressed { id: String, origin: Point },
    Dragging(Drag),
}

/// How a gesture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released before the activation threshold: a click on `id`.
    Click { id: String },
    /// The deck was reordered; `order` is the new id order.
    Reordered { from: usize, to: usize, order: Vec<String> },
    /// Dropped on itself or outside any slide.
    Unchanged,
    /// Cancelled or the pointer was lost.
    Cancelled,
    /// The deck was reset while the gesture was live.
    Stale,
    /// There was no gesture to end.
    NoGesture,
}

#[derive(Debug)]
pub struct ReorderController {
    state: GestureState,
    activation_distance: f32,
}

impl ReorderController {
    pub fn new(activation_distance: f32) -> Self {
        Self {
            state: GestureState::Idle,
            activation_distance: activation_distance.max(0.0),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    /// Page scroll is suppressed for the whole drag.
    pub fn scroll_suppressed(&self) -> bool {
        self.is_dragging()
    }

    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            GestureState::Dragging(d) => Some(&d.active),
            _ => None,
        }
    }

    pub fn over_id(&self) -> Option<&str> {
        match &self.state {
            GestureState::Dragging(d) => d.over.as_deref(),
            _ => None,
        }
    }

    pub fn input(&self) -> Option<InputKind> {
        match &self.state {
            GestureState::Dragging(d) => Some(d.input),
            _ => None,
        }
    }

    /// Pointer pressed on slide `id`. Ignored unless idle: one pointer, one gesture.
    pub fn pointer_down(&mut self, id: &str, at: Point, deck: &Deck) -> bool {
        if !self.is_idle() || deck.index_of(id).is_none() {
            return false;
        }
        self.state = GestureState::Pressed { id: id.to_string(), origin: at };
        true
    }

    /// Pointer moved to `at`, hovering `over` (if any). Returns true when this move
    /// turned a press into a drag.
    pub fn pointer_move(&mut self, at: Point, over: Option<&str>, deck: &Deck) -> bool {
        match &mut self.state {
            GestureState::Pressed { id, origin } => {
                if origin.distance(at) <= self.activation_distance {
                    return false;
                }
                let active = std::mem::take(id);
                let over = over.map(str::to_string).or_else(|| Some(active.clone()));
                self.start(active, over, InputKind::Pointer, deck);
                true
            }
            GestureState::Dragging(drag) => {
                drag.over = over.map(str::to_string);
                false
            }
            GestureState::Idle => false,
        }
    }

    /// Pointer released over `over`.
    pub fn pointer_up(&mut self, over: Option<&str>, deck: &mut Deck) -> CoreResult<DropOutcome> {
        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => Ok(DropOutcome::NoGesture),
            GestureState::Pressed { id, .. } => Ok(DropOutcome::Click { id }),
            GestureState::Dragging(drag) => Self::finish(drag, over, deck),
        }
    }

    /// Escape, pointer lost, or the surface went away.
    pub fn cancel(&mut self) -> DropOutcome {
        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => DropOutcome::NoGesture,
            _ => DropOutcome::Cancelled,
        }
    }

    /// Keyboard pick-up of slide `id`. No activation threshold applies.
    pub fn key_pick_up(&mut self, id: &str, deck: &Deck) -> bool {
        if !self.is_idle() || deck.index_of(id).is_none() {
            return false;
        }
        self.start(id.to_string(), Some(id.to_string()), InputKind::Keyboard, deck);
        true
    }

    /// Move the keyboard target by `step` positions (negative is up), clamped to the list.
    pub fn key_step(&mut self, step: isize) -> bool {
        let GestureState::Dragging(drag) = &mut self.state else {
            return false;
        };
        if drag.input != InputKind::Keyboard || drag.origin_order.is_empty() {
            return false;
        }
        let current = drag
            .over
            .as_deref()
            .and_then(|o| drag.origin_order.iter().position(|id| id == o))
            .or_else(|| drag.origin_order.iter().position(|id| *id == drag.active))
            .unwrap_or(0);
        let last = drag.origin_order.len() - 1;
        let target = current.saturating_add_signed(step).min(last);
        drag.over = Some(drag.origin_order[target].clone());
        true
    }

    /// Drop the keyboard-carried slide at its current target.
    pub fn key_drop(&mut self, deck: &mut Deck) -> CoreResult<DropOutcome> {
        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Dragging(drag) => {
                let over = drag.over.clone();
                Self::finish(drag, over.as_deref(), deck)
            }
            other => {
                self.state = other;
                Ok(DropOutcome::NoGesture)
            }
        }
    }

    /// Order the surface should paint right now. During a drag this is the order at
    /// drag start with the active slide moved to the target position; otherwise it
    /// is the deck's order.
    pub fn visual_order(&self, deck: &Deck) -> Vec<String> {
        let GestureState::Dragging(drag) = &self.state else {
            return deck.ids().map(str::to_string).collect();
        };
        let mut order = drag.origin_order.clone();
        let from = order.iter().position(|id| *id == drag.active);
        let to = drag
            .over
            .as_deref()
            .and_then(|o| order.iter().position(|id| id == o));
        if let (Some(from), Some(to)) = (from, to) {
            let id = order.remove(from);
            order.insert(to, id);
        }
        order
    }

    fn start(&mut self, active: String, over: Option<String>, input: InputKind, deck: &Deck) {
        debug!({ KEY_SLIDE_ID } = %active, ?input, "drag started");
        self.state = GestureState::Dragging(Drag {
            active,
            over,
            origin_order: deck.ids().map(str::to_string).collect(),
            generation: deck.generation(),
            input,
        });
    }

    fn finish(drag: Drag, over: Option<&str>, deck: &mut Deck) -> CoreResult<DropOutcome> {
        if drag.generation != deck.generation() {
            warn!({ KEY_DECK_GENERATION } = deck.generation(), "drop after deck reset");
            return Ok(DropOutcome::Stale);
        }
        let Some(over) = over else {
            return Ok(DropOutcome::Unchanged);
        };
        if over == drag.active {
            return Ok(DropOutcome::Unchanged);
        }
        let from = drag.origin_order.iter().position(|id| *id == drag.active);
        let to = drag.origin_order.iter().position(|id| id == over);
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(DropOutcome::Stale);
        };
        deck.reorder(from, to)?;
        debug!({ KEY_SLIDE_ID } = %drag.active, from, to, "drag committed");
        Ok(DropOutcome::Reordered {
            from,
            to,
            order: deck.ids().map(str::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slide::Slide;

    fn deck_of(ids: &[&str]) -> Deck {
        let mut d = Deck::new();
        for id in ids {
            d.append(
                Slide::from_json(&format!(r#"{{"id":"{id}","type":"summary","content":"{id}"}}"#))
                    .unwrap(),
            );
        }
        d
    }

    fn order(d: &Deck) -> Vec<&str> {
        d.ids().collect()
    }

    #[test]
    fn pointer_drag_index_zero_to_two() {
        let mut deck = deck_of(&["S0", "S1", "S2", "S3"]);
        let mut c = ReorderController::new(1.0);
        assert!(c.pointer_down("S0", Point::new(0.0, 0.0), &deck));
        assert!(!c.scroll_suppressed());
        assert!(c.pointer_move(Point::new(0.0, 5.0), Some("S1"), &deck));
        assert!(c.scroll_suppressed());
        c.pointer_move(Point::new(0.0, 40.0), Some("S2"), &deck);

        // visual only while dragging
        assert_eq!(c.visual_order(&deck), ["S1", "S2", "S0", "S3"]);
        assert_eq!(order(&deck), ["S0", "S1", "S2", "S3"]);

        let out = c.pointer_up(Some("S2"), &mut deck).unwrap();
        assert_eq!(
            out,
            DropOutcome::Reordered {
                from: 0,
                to: 2,
                order: vec!["S1".into(), "S2".into(), "S0".into(), "S3".into()],
            }
        );
        assert_eq!(order(&deck), ["S1", "S2", "S0", "S3"]);
        assert!(c.is_idle());
        assert!(!c.scroll_suppressed());
    }

    #[test]
    fn release_below_threshold_is_a_click() {
        let mut deck = deck_of(&["a", "b"]);
        let mut c = ReorderController::new(8.0);
        c.pointer_down("a", Point::new(10.0, 10.0), &deck);
        assert!(!c.pointer_move(Point::new(12.0, 13.0), Some("b"), &deck));
        assert!(!c.is_dragging());
        assert_eq!(
            c.pointer_up(Some("b"), &mut deck).unwrap(),
            DropOutcome::Click { id: "a".into() }
        );
        assert_eq!(order(&deck), ["a", "b"]);
    }

    #[test]
    fn travel_equal_to_threshold_stays_a_press() {
        let mut deck = deck_of(&["a", "b"]);
        let mut c = ReorderController::new(1.0);
        c.pointer_down("a", Point::new(0.0, 0.0), &deck);
        assert!(!c.pointer_move(Point::new(0.0, 1.0), Some("b"), &deck));
        assert!(!c.is_dragging());
        assert_eq!(
            c.pointer_up(Some("b"), &mut deck).unwrap(),
            DropOutcome::Click { id: "a".into() }
        );

        c.pointer_down("a", Point::new(0.0, 0.0), &deck);
        assert!(c.pointer_move(Point::new(0.0, 1.5), Some("b"), &deck));
        assert!(c.is_dragging());
    }

    #[test]
    fn drop_on_self_or_nowhere_leaves_deck_alone() {
        let mut deck = deck_of(&["a", "b", "c"]);
        let mut c = ReorderController::new(1.0);
        c.pointer_down("b", Point::new(0.0, 0.0), &deck);
        c.pointer_move(Point::new(0.0, 10.0), Some("c"), &deck);
        assert_eq!(c.pointer_up(Some("b"), &mut deck).unwrap(), DropOutcome::Unchanged);

        c.pointer_down("b", Point::new(0.0, 0.0), &deck);
        c.pointer_move(Point::new(0.0, 10.0), Some("c"), &deck);
        c.pointer_move(Point::new(500.0, 10.0), None, &deck);
        assert_eq!(c.visual_order(&deck), ["a", "b", "c"]);
        assert_eq!(c.pointer_up(None, &mut deck).unwrap(), DropOutcome::Unchanged);
        assert_eq!(order(&deck), ["a", "b", "c"]);
    }

    #[test]
    fn cancel_releases_scroll_and_keeps_order() {
        let mut deck = deck_of(&["a", "b"]);
        let mut c = ReorderController::new(0.0);
        c.pointer_down("a", Point::new(0.0, 0.0), &deck);
        c.pointer_move(Point::new(0.0, 0.5), Some("b"), &deck);
        assert!(c.scroll_suppressed());
        assert_eq!(c.cancel(), DropOutcome::Cancelled);
        assert!(!c.scroll_suppressed());
        assert_eq!(c.cancel(), DropOutcome::NoGesture);
        assert_eq!(order(&deck), ["a", "b"]);
    }

    #[test]
    fn second_press_during_gesture_is_ignored() {
        let deck = deck_of(&["a", "b"]);
        let mut c = ReorderController::new(1.0);
        assert!(c.pointer_down("a", Point::new(0.0, 0.0), &deck));
        assert!(!c.pointer_down("b", Point::new(0.0, 0.0), &deck));
        assert!(!c.key_pick_up("b", &deck));
    }

    #[test]
    fn press_on_unknown_slide_is_ignored() {
        let deck = deck_of(&["a"]);
        let mut c = ReorderController::new(1.0);
        assert!(!c.pointer_down("ghost", Point::new(0.0, 0.0), &deck));
        assert!(c.is_idle());
    }

    #[test]
    fn reset_during_drag_makes_drop_stale() {
        let mut deck = deck_of(&["a", "b"]);
        let mut c = ReorderController::new(1.0);
        c.pointer_down("a", Point::new(0.0, 0.0), &deck);
        c.pointer_move(Point::new(0.0, 9.0), Some("b"), &deck);
        deck.reset();
        deck.append(Slide::from_json(r#"{"id":"a","type":"title","content":"x"}"#).unwrap());
        deck.append(Slide::from_json(r#"{"id":"b","type":"title","content":"y"}"#).unwrap());
        assert_eq!(c.pointer_up(Some("b"), &mut deck).unwrap(), DropOutcome::Stale);
        assert_eq!(order(&deck), ["a", "b"]);
    }

    #[test]
    fn keyboard_pick_up_step_and_drop() {
        let mut deck = deck_of(&["a", "b", "c", "d"]);
        let mut c = ReorderController::new(50.0);
        assert!(c.key_pick_up("b", &deck));
        assert_eq!(c.input(), Some(InputKind::Keyboard));
        assert!(c.key_step(1));
        assert!(c.key_step(1));
        assert!(c.key_step(1)); // clamped at the end
        assert_eq!(c.over_id(), Some("d"));
        assert_eq!(c.visual_order(&deck), ["a", "c", "d", "b"]);
        assert!(c.key_step(-1));
        assert_eq!(c.visual_order(&deck), ["a", "c", "b", "d"]);

        let out = c.key_drop(&mut deck).unwrap();
        assert!(matches!(out, DropOutcome::Reordered { from: 1, to: 2, .. }));
        assert_eq!(order(&deck), ["a", "c", "b", "d"]);
    }

    #[test]
    fn key_step_clamps_at_top() {
        let deck = deck_of(&["a", "b"]);
        let mut c = ReorderController::new(1.0);
        c.key_pick_up("b", &deck);
        c.key_step(-5);
        assert_eq!(c.over_id(), Some("a"));
    }

    #[test]
    fn key_drop_without_gesture() {
        let mut deck = deck_of(&["a"]);
        let mut c = ReorderController::new(1.0);
        assert_eq!(c.key_drop(&mut deck).unwrap(), DropOutcome::NoGesture);
        c.pointer_down("a", Point::new(0.0, 0.0), &deck);
        assert_eq!(c.key_drop(&mut deck).unwrap(), DropOutcome::NoGesture);
        assert!(!c.is_idle(), "a pointer press survives a stray key drop");
    }
}
