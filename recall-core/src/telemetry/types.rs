use serde::{Deserialize, Serialize};

/// Summary of one finished ingestion, handed to the installed sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IngestTrace {
    /// Deck generation the events were folded into.
    pub generation: u64,

    /// Presentation the session is bound to, if saved.
    pub presentation_id: Option<String>,

    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,

    /// Final deck status, lowercase (e.g. "complete", "incomplete").
    pub status: String,

    /// Wall time from submission to the last event.
    pub latency_ms: Option<u64>,

    /// Set when the stream ended on an error.
    pub error_kind: Option<String>,
}

impl IngestTrace {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    pub fn presentation_id_opt(mut self, id: Option<&str>) -> Self {
        self.presentation_id = id.map(|s| s.to_string());
        self
    }

    pub fn counts(mut self, inserted: usize, duplicates: usize, malformed: usize) -> Self {
        self.inserted = inserted;
        self.duplicates = duplicates;
        self.malformed = malformed;
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    pub fn error_kind_opt(mut self, kind: Option<&str>) -> Self {
        self.error_kind = kind.map(|s| s.to_string());
        self
    }
}
