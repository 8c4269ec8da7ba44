use async_trait::async_trait;
use futures::StreamExt;

use crate::decoder::decode_document;
use crate::error::CoreResult;
use crate::model::GenerateRequest;
use crate::stream::BoxStreamEv;

/// The remote side of a session: generation plus persistence of edits and order.
#[async_trait]
pub trait PresentationService: Send + Sync {
    fn name(&self) -> &str;

    /// Start generating a deck. The returned stream is consumed exactly once.
    async fn generate(&self, req: GenerateRequest) -> CoreResult<BoxStreamEv>;

    /// Persist new content for one slide.
    async fn update_slide(&self, slide_id: &str, content: &str) -> CoreResult<()>;

    /// Persist the final slide order. Best-effort: services without a place to
    /// store order accept it as a no-op.
    async fn confirm_order(&self, _presentation_id: Option<&str>, _order: &[String]) -> CoreResult<()> {
        Ok(())
    }
}

/// Replays a captured generation body and accepts every edit.
/// Useful offline and in tests.
pub struct ReplayService {
    body: String,
    prefix: String,
}

impl ReplayService {
    pub fn new(body: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl PresentationService for ReplayService {
    fn name(&self) -> &str {
        "replay"
    }

    async fn generate(&self, _req: GenerateRequest) -> CoreResult<BoxStreamEv> {
        let events = decode_document(&self.prefix, &self.body);
        Ok(futures::stream::iter(events).boxed())
    }

    async fn update_slide(&self, _slide_id: &str, _content: &str) -> CoreResult<()> {
        Ok(())
    }
}
