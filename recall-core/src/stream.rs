//! Streaming primitives for slide generation.
//!
//! Contract:
//! - A generation stream yields 0..n `Slide` and `Malformed` events in arrival order.
//! - `Malformed` is a diagnostic only; the stream keeps going after it.
//! - The stream ends either by returning `None` (body ended), with one `Done`
//!   (explicit end sentinel), or with one `Aborted` (transport failure or idle timeout).
//!   Nothing follows `Done` or `Aborted`.
//!
//! `StreamEvent` does not derive `Clone` / `PartialEq` because `Aborted` carries a
//! `RecallError`.

use crate::error::RecallError;
use crate::slide::Slide;

/// One decoded unit of a generation response.
#[non_exhaustive]
#[derive(Debug)]
pub enum StreamEvent {
    /// A validated slide to integrate into the deck.
    Slide(Slide),
    /// A data line that could not become a slide. Always a `RecallError::Decode`.
    Malformed(RecallError),
    /// The service signalled the end of the deck.
    Done,
    /// The body failed or went silent mid-stream; whatever was ingested stays.
    Aborted(RecallError),
}

impl StreamEvent {
    /// Returns true if nothing may follow this event (`Done` or `Aborted`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted(_))
    }

    pub fn as_slide(&self) -> Option<&Slide> {
        match self {
            Self::Slide(s) => Some(s),
            _ => None,
        }
    }
}

/// Boxed stream of generation events, consumed once per request.
pub type BoxStreamEv = futures::stream::BoxStream<'static, StreamEvent>;
