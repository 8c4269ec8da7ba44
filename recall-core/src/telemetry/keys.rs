/// Span/log field names used across the pipeline.
/// Keep these stable; log consumers filter on them.
pub const KEY_DECK_GENERATION: &str = "deck.generation";
pub const KEY_DECK_STATUS: &str = "deck.status";
pub const KEY_SLIDE_ID: &str = "slide.id";
pub const KEY_PRESENTATION_ID: &str = "presentation.id";
pub const KEY_REQUEST_ID: &str = "req.id";

pub const KEY_DECODE_LINE: &str = "decode.line";
pub const KEY_DECODE_REASON: &str = "decode.reason";

pub const KEY_INGEST_INSERTED: &str = "ingest.inserted";
pub const KEY_INGEST_DUPLICATES: &str = "ingest.duplicates";
pub const KEY_INGEST_MALFORMED: &str = "ingest.malformed";
pub const KEY_LATENCY_MS: &str = "latency.ms";

/// Error-related (if applicable)
pub const KEY_ERROR_KIND: &str = "error.kind";
