//! Deck store: the single source of truth for the ordered slides of one
//! generation session.
//!
//! Invariants held by every operation:
//! - slide ids are unique; ingesting a known id is a no-op, never an update
//! - `reorder` is a permutation; membership never changes through it
//! - `edit_content` touches only the content of one slide

use std::collections::HashSet;

use tracing::error;

use crate::error::{CoreResult, RecallError};
use crate::slide::Slide;
use crate::telemetry::{KEY_DECK_GENERATION, KEY_SLIDE_ID};

/// Lifecycle of the deck as the render surface should present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckStatus {
    /// Nothing submitted yet.
    Empty,
    /// Events are still being folded in.
    Streaming,
    /// The stream ended normally with at least one slide.
    Complete,
    /// The stream ended normally without a single valid slide.
    NothingGenerated,
    /// The stream broke after some slides arrived; they are kept.
    Incomplete,
    /// The request failed before any slide arrived.
    Failed,
    /// Consumption was abandoned by a new submission or disposal.
    Cancelled,
}

impl DeckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::NothingGenerated => "nothing_generated",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, Self::Empty | Self::Streaming)
    }
}

/// Saved slide order and contents, used to roll back an unconfirmed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckSnapshot {
    generation: u64,
    slides: Vec<Slide>,
}

#[derive(Debug)]
pub struct Deck {
    slides: Vec<Slide>,
    ids: HashSet<String>,
    generation: u64,
    status: DeckStatus,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            ids: HashSet::new(),
            generation: 0,
            status: DeckStatus::Empty,
        }
    }

    /// Clear all slides. Bumps the generation so drags and pending confirmations
    /// started against the old contents can tell they are stale.
    pub fn reset(&mut self) {
        self.slides.clear();
        self.ids.clear();
        self.generation += 1;
        self.status = DeckStatus::Empty;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> DeckStatus {
        self.status
    }

    pub fn set_status(&mut self, status: DeckStatus) {
        self.status = status;
    }

    /// Append a slide unless its id is already present.
    /// Returns whether an insertion happened (the surface animates only then).
    pub fn append(&mut self, slide: Slide) -> bool {
        if self.ids.contains(slide.id()) {
            return false;
        }
        self.ids.insert(slide.id().to_string());
        self.slides.push(slide);
        true
    }

    /// Move the slide at `from` to `to`, shifting the slides in between by one.
    pub fn reorder(&mut self, from: usize, to: usize) -> CoreResult<()> {
        let len = self.slides.len();
        let bad = if from >= len {
            Some(RecallError::IndexOutOfBounds { index: from, len })
        } else if to >= len {
            Some(RecallError::IndexOutOfBounds { index: to, len })
        } else if from == to {
            Some(RecallError::SameIndex { index: from })
        } else {
            None
        };
        if let Some(err) = bad {
            error!({ KEY_DECK_GENERATION } = self.generation, %err, "invalid reorder");
            return Err(err);
        }
        let slide = self.slides.remove(from);
        self.slides.insert(to, slide);
        Ok(())
    }

    /// Replace one slide's content, returning the previous content.
    pub fn edit_content(&mut self, id: &str, content: impl Into<String>) -> CoreResult<String> {
        match self.slides.iter_mut().find(|s| s.id() == id) {
            Some(slide) => Ok(slide.replace_content(content.into())),
            None => {
                error!({ KEY_DECK_GENERATION } = self.generation, { KEY_SLIDE_ID } = id, "edit of unknown slide");
                Err(RecallError::NotFound { id: id.to_string() })
            }
        }
    }

    /// Live ordered view for rendering.
    pub fn current_order(&self) -> &[Slide] {
        &self.slides
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.slides.iter().map(Slide::id)
    }

    pub fn get(&self, id: &str) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id() == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn snapshot(&self) -> DeckSnapshot {
        DeckSnapshot {
            generation: self.generation,
            slides: self.slides.clone(),
        }
    }

    /// Restore a snapshot taken in the current generation. Returns false (and does
    /// nothing) if the deck was reset since.
    pub fn restore(&mut self, snapshot: DeckSnapshot) -> bool {
        if snapshot.generation != self.generation {
            return false;
        }
        self.ids = snapshot.slides.iter().map(|s| s.id().to_string()).collect();
        self.slides = snapshot.slides;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(id: &str) -> Slide {
        Slide::from_json(&format!(r#"{{"id":"{id}","type":"section","heading":"H","content":"c-{id}"}}"#))
            .unwrap()
    }

    fn deck_of(ids: &[&str]) -> Deck {
        let mut d = Deck::new();
        for id in ids {
            assert!(d.append(slide(id)));
        }
        d
    }

    fn order(d: &Deck) -> Vec<&str> {
        d.ids().collect()
    }

    #[test]
    fn duplicate_ids_are_ignored_in_first_occurrence_order() {
        let mut d = Deck::new();
        assert!(d.append(slide("A")));
        assert!(d.append(slide("B")));
        assert!(!d.append(slide("A")));
        assert_eq!(order(&d), ["A", "B"]);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn duplicate_is_not_an_update() {
        let mut d = deck_of(&["A"]);
        let newer = Slide::from_json(r#"{"id":"A","type":"title","content":"newer"}"#).unwrap();
        assert!(!d.append(newer));
        assert_eq!(d.get("A").unwrap().content(), "c-A");
    }

    #[test]
    fn reorder_moves_and_shifts() {
        let mut d = deck_of(&["S0", "S1", "S2", "S3"]);
        d.reorder(0, 2).unwrap();
        assert_eq!(order(&d), ["S1", "S2", "S0", "S3"]);
        d.reorder(3, 0).unwrap();
        assert_eq!(order(&d), ["S3", "S1", "S2", "S0"]);
    }

    #[test]
    fn reorder_round_trip_restores_order() {
        let ids = ["a", "b", "c", "d", "e"];
        for i in 0..ids.len() {
            for j in 0..ids.len() {
                if i == j {
                    continue;
                }
                let mut d = deck_of(&ids);
                d.reorder(i, j).unwrap();
                d.reorder(j, i).unwrap();
                assert_eq!(order(&d), ids, "round trip {i}->{j}");
            }
        }
    }

    #[test]
    fn reorder_rejects_bad_indices_without_mutation() {
        let mut d = deck_of(&["a", "b"]);
        assert!(matches!(d.reorder(0, 2), Err(RecallError::IndexOutOfBounds { index: 2, len: 2 })));
        assert!(matches!(d.reorder(5, 0), Err(RecallError::IndexOutOfBounds { index: 5, len: 2 })));
        assert!(matches!(d.reorder(1, 1), Err(RecallError::SameIndex { index: 1 })));
        assert_eq!(order(&d), ["a", "b"]);
    }

    #[test]
    fn edit_content_frame_condition() {
        let mut d = deck_of(&["a", "b", "c"]);
        let before: Vec<Slide> = d.current_order().to_vec();
        let prev = d.edit_content("b", "fresh").unwrap();
        assert_eq!(prev, "c-b");
        let after = d.current_order();
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(after) {
            assert_eq!(old.id(), new.id());
            assert_eq!(old.variant(), new.variant());
            assert_eq!(old.heading(), new.heading());
            if new.id() == "b" {
                assert_eq!(new.content(), "fresh");
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn edit_unknown_id_is_not_found_and_deck_unchanged() {
        let mut d = deck_of(&["a", "b"]);
        let before = d.snapshot();
        match d.edit_content("zzz", "x") {
            Err(RecallError::NotFound { id }) => assert_eq!(id, "zzz"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(d.snapshot(), before);
    }

    #[test]
    fn reset_clears_and_bumps_generation() {
        let mut d = deck_of(&["a"]);
        d.set_status(DeckStatus::Complete);
        let g = d.generation();
        d.reset();
        assert!(d.is_empty());
        assert_eq!(d.generation(), g + 1);
        assert_eq!(d.status(), DeckStatus::Empty);
        assert!(d.append(slide("a")), "ids are forgotten on reset");
    }

    #[test]
    fn snapshot_restore_is_generation_scoped() {
        let mut d = deck_of(&["a", "b"]);
        let snap = d.snapshot();
        d.reorder(0, 1).unwrap();
        d.edit_content("a", "changed").unwrap();
        assert!(d.restore(snap.clone()));
        assert_eq!(order(&d), ["a", "b"]);
        assert_eq!(d.get("a").unwrap().content(), "c-a");

        d.reset();
        assert!(!d.restore(snap));
        assert!(d.is_empty());
    }
}
