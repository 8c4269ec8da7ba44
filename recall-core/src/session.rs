//! One generation session.
//!
//! A `Session` is built explicitly by its owner and owns exactly one [`Deck`] and
//! one [`ReorderController`]. It folds generation events into the deck, applies
//! user edits and reorders optimistically, and rolls them back when the service
//! refuses them.
//!
//! Cancellation: every submission consumes under a child of the session's root
//! token. A new submission cancels the previous child; `dispose` (or drop) cancels
//! the root, after which nothing mutates the deck again.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, info_span, warn};
use tracing_futures::Instrument;

use crate::config::ReorderCfg;
use crate::deck::{Deck, DeckSnapshot, DeckStatus};
use crate::error::{CoreResult, RecallError};
use crate::model::GenerateRequest;
use crate::normalizer::{normalize_content, normalize_context_id, normalize_prompt};
use crate::reorder::{DropOutcome, Point, ReorderController};
use crate::service::PresentationService;
use crate::slide::Slide;
use crate::stream::{BoxStreamEv, StreamEvent};
use crate::telemetry::{
    emit_ingest, IngestTrace, KEY_DECK_GENERATION, KEY_DECK_STATUS, KEY_DECODE_REASON,
    KEY_ERROR_KIND, KEY_INGEST_DUPLICATES, KEY_INGEST_INSERTED, KEY_INGEST_MALFORMED,
    KEY_LATENCY_MS, KEY_PRESENTATION_ID, KEY_SLIDE_ID,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Generation,
    Edit,
    Reorder,
}

/// A failure the surface should show until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Counts for one finished ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub status: DeckStatus,
}

pub struct Session {
    service: Arc<dyn PresentationService>,
    deck: Deck,
    reorder: ReorderController,
    presentation_id: Option<String>,
    root: CancellationToken,
    current: CancellationToken,
    notice: Option<Notice>,
    on_insert: Option<InsertHook>,
}

/// Called with the 1-based position and the slide each time one is inserted.
pub type InsertHook = Box<dyn FnMut(usize, &Slide) + Send>;

impl Session {
    pub fn new(service: Arc<dyn PresentationService>, reorder: &ReorderCfg, presentation_id: Option<&str>) -> Self {
        let root = CancellationToken::new();
        let current = root.child_token();
        Self {
            service,
            deck: Deck::new(),
            reorder: ReorderController::new(reorder.activation_distance),
            presentation_id: normalize_context_id(presentation_id),
            root,
            current,
            notice: None,
            on_insert: None,
        }
    }

    /// Let the surface paint slides as they arrive.
    pub fn on_insert(&mut self, hook: impl FnMut(usize, &Slide) + Send + 'static) {
        self.on_insert = Some(Box::new(hook));
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn reorder(&self) -> &ReorderController {
        &self.reorder
    }

    /// Order to paint right now, including live drag feedback.
    pub fn visual_order(&self) -> Vec<String> {
        self.reorder.visual_order(&self.deck)
    }

    pub fn presentation_id(&self) -> Option<&str> {
        self.presentation_id.as_deref()
    }

    /// Bind the session to a saved presentation so reorders are persisted.
    pub fn bind_presentation(&mut self, id: Option<&str>) {
        self.presentation_id = normalize_context_id(id);
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Token that disposes the whole session when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn dispose(&mut self) {
        self.root.cancel();
        self.reorder.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Submit a prompt: reset the deck, request a generation and fold it in.
    ///
    /// Blank prompts are rejected before anything changes. A request that fails
    /// before streaming leaves the deck `Failed` and returns the error; failures
    /// mid-stream are reported through the returned status instead.
    pub async fn submit(&mut self, prompt: &str, repository_id: Option<&str>) -> CoreResult<IngestReport> {
        if self.is_disposed() {
            return Err(RecallError::Cancelled);
        }
        let message = normalize_prompt(prompt)?;

        self.current.cancel();
        self.current = self.root.child_token();
        self.reorder.cancel();
        self.deck.reset();
        self.deck.set_status(DeckStatus::Streaming);
        self.notice = None;

        let started = Instant::now();
        let req = GenerateRequest {
            message,
            repository_id: normalize_context_id(repository_id),
        };
        let events = match until_cancelled(&self.current, self.service.generate(req)).await {
            Ok(events) => events,
            Err(RecallError::Cancelled) => {
                self.deck.set_status(DeckStatus::Cancelled);
                self.trace(IngestReport::empty(DeckStatus::Cancelled), started, None);
                return Err(RecallError::Cancelled);
            }
            Err(err) => {
                warn!({ KEY_DECK_GENERATION } = self.deck.generation(), { KEY_ERROR_KIND } = err.kind(), %err, "generation request failed");
                self.deck.set_status(DeckStatus::Failed);
                self.set_notice(NoticeKind::Generation, format!("generation failed: {err}"));
                self.trace(IngestReport::empty(DeckStatus::Failed), started, Some(err.kind()));
                return Err(err);
            }
        };
        Ok(self.fold(events, started).await)
    }

    /// Fold an already opened event stream into the current deck generation.
    pub async fn ingest(&mut self, events: BoxStreamEv) -> IngestReport {
        if self.is_disposed() {
            return IngestReport::empty(DeckStatus::Cancelled);
        }
        self.deck.set_status(DeckStatus::Streaming);
        self.fold(events, Instant::now()).await
    }

    async fn fold(&mut self, events: BoxStreamEv, started: Instant) -> IngestReport {
        let span = info_span!(
            "ingest",
            generation = self.deck.generation(),
            inserted = field::Empty,
            duplicates = field::Empty,
            malformed = field::Empty,
            status = field::Empty,
        );
        let (report, error_kind) = self.consume(events).instrument(span.clone()).await;
        span.record("inserted", report.inserted as u64);
        span.record("duplicates", report.duplicates as u64);
        span.record("malformed", report.malformed as u64);
        span.record("status", report.status.as_str());
        info!(
            { KEY_DECK_GENERATION } = self.deck.generation(),
            { KEY_DECK_STATUS } = report.status.as_str(),
            { KEY_INGEST_INSERTED } = report.inserted,
            { KEY_INGEST_DUPLICATES } = report.duplicates,
            { KEY_INGEST_MALFORMED } = report.malformed,
            { KEY_LATENCY_MS } = started.elapsed().as_millis() as u64,
            "ingestion finished"
        );
        self.trace(report, started, error_kind);
        report
    }

    async fn consume(&mut self, mut events: BoxStreamEv) -> (IngestReport, Option<&'static str>) {
        let token = self.current.clone();
        let mut report = IngestReport::empty(DeckStatus::Streaming);
        let mut failure: Option<RecallError> = None;
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = events.next() => next,
            };
            match next {
                None | Some(StreamEvent::Done) => break,
                Some(StreamEvent::Slide(slide)) => {
                    let id = slide.id().to_string();
                    if self.deck.append(slide) {
                        report.inserted += 1;
                        debug!({ KEY_SLIDE_ID } = %id, "slide inserted");
                        if let (Some(hook), Some(last)) = (self.on_insert.as_mut(), self.deck.current_order().last()) {
                            hook(self.deck.len(), last);
                        }
                    } else {
                        report.duplicates += 1;
                        debug!({ KEY_SLIDE_ID } = %id, "duplicate slide ignored");
                    }
                }
                Some(StreamEvent::Malformed(err)) => {
                    report.malformed += 1;
                    debug!({ KEY_DECODE_REASON } = %err, "skipping malformed event");
                }
                Some(StreamEvent::Aborted(err)) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let status = if cancelled {
            DeckStatus::Cancelled
        } else if let Some(err) = &failure {
            warn!({ KEY_ERROR_KIND } = err.kind(), %err, slides = self.deck.len(), "generation stream aborted");
            if self.deck.is_empty() {
                self.set_notice(NoticeKind::Generation, format!("generation failed: {err}"));
                DeckStatus::Failed
            } else {
                self.set_notice(NoticeKind::Generation, format!("deck may be incomplete: {err}"));
                DeckStatus::Incomplete
            }
        } else if self.deck.is_empty() {
            DeckStatus::NothingGenerated
        } else {
            DeckStatus::Complete
        };
        self.deck.set_status(status);
        report.status = status;
        (report, failure.as_ref().map(RecallError::kind))
    }

    /// Replace one slide's content, then persist it. Restores the previous content
    /// if the service refuses the update.
    pub async fn edit_slide(&mut self, id: &str, content: &str) -> CoreResult<()> {
        if self.is_disposed() {
            return Err(RecallError::Cancelled);
        }
        let content = normalize_content(content);
        if content.is_empty() && self.deck.get(id).is_some_and(|s| s.variant().requires_content()) {
            return Err(RecallError::Validation(format!("slide {id} cannot be empty")));
        }
        let previous = self.deck.edit_content(id, content.clone())?;

        match until_cancelled(&self.root, self.service.update_slide(id, &content)).await {
            Ok(()) => Ok(()),
            // Disposed while waiting: leave the deck alone.
            Err(RecallError::Cancelled) => Err(RecallError::Cancelled),
            Err(err) => {
                warn!({ KEY_SLIDE_ID } = id, { KEY_ERROR_KIND } = err.kind(), %err, "slide update rejected, rolling back");
                self.deck.edit_content(id, previous)?;
                self.set_notice(NoticeKind::Edit, format!("could not save slide {id}: {err}"));
                Err(err)
            }
        }
    }

    pub fn pointer_down(&mut self, id: &str, at: Point) -> bool {
        !self.is_disposed() && self.reorder.pointer_down(id, at, &self.deck)
    }

    pub fn pointer_move(&mut self, at: Point, over: Option<&str>) -> bool {
        self.reorder.pointer_move(at, over, &self.deck)
    }

    pub async fn pointer_up(&mut self, over: Option<&str>) -> CoreResult<DropOutcome> {
        let before = self.deck.snapshot();
        let outcome = self.reorder.pointer_up(over, &mut self.deck)?;
        self.confirm(before, outcome).await
    }

    pub fn cancel_gesture(&mut self) -> DropOutcome {
        self.reorder.cancel()
    }

    pub fn key_pick_up(&mut self, id: &str) -> bool {
        !self.is_disposed() && self.reorder.key_pick_up(id, &self.deck)
    }

    pub fn key_step(&mut self, step: isize) -> bool {
        self.reorder.key_step(step)
    }

    pub async fn key_drop(&mut self) -> CoreResult<DropOutcome> {
        let before = self.deck.snapshot();
        let outcome = self.reorder.key_drop(&mut self.deck)?;
        self.confirm(before, outcome).await
    }

    /// Move the slide `id` by `steps` positions the way a keyboard user would.
    pub async fn move_slide(&mut self, id: &str, steps: isize) -> CoreResult<DropOutcome> {
        if !self.key_pick_up(id) {
            return Err(RecallError::NotFound { id: id.to_string() });
        }
        self.key_step(steps);
        self.key_drop().await
    }

    async fn confirm(&mut self, before: DeckSnapshot, outcome: DropOutcome) -> CoreResult<DropOutcome> {
        let DropOutcome::Reordered { order, .. } = &outcome else {
            return Ok(outcome);
        };
        let presentation_id = self.presentation_id.clone();
        let confirmed = until_cancelled(&self.root, self.service.confirm_order(presentation_id.as_deref(), order)).await;
        if let Err(err) = confirmed {
            if matches!(err, RecallError::Cancelled) {
                return Err(err);
            }
            warn!(
                { KEY_PRESENTATION_ID } = presentation_id.as_deref().unwrap_or(""),
                { KEY_ERROR_KIND } = err.kind(),
                %err,
                "reorder rejected, restoring previous order"
            );
            self.deck.restore(before);
            self.set_notice(NoticeKind::Reorder, format!("could not save slide order: {err}"));
            return Err(err);
        }
        Ok(outcome)
    }

    fn set_notice(&mut self, kind: NoticeKind, message: String) {
        self.notice = Some(Notice { kind, message });
    }

    fn trace(&self, report: IngestReport, started: Instant, error_kind: Option<&str>) {
        emit_ingest(
            IngestTrace::new(self.deck.generation())
                .presentation_id_opt(self.presentation_id.as_deref())
                .counts(report.inserted, report.duplicates, report.malformed)
                .status(report.status.as_str())
                .latency_ms(started.elapsed().as_millis() as u64)
                .error_kind_opt(error_kind),
        );
    }
}

async fn until_cancelled<T>(
    token: &CancellationToken,
    fut: impl std::future::Future<Output = CoreResult<T>>,
) -> CoreResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RecallError::Cancelled),
        res = fut => res,
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

impl IngestReport {
    fn empty(status: DeckStatus) -> Self {
        Self {
            inserted: 0,
            duplicates: 0,
            malformed: 0,
            status,
        }
    }
}
