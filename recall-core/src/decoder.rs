//! Line-oriented decoding of a generation response into [`StreamEvent`]s.
//!
//! Only lines that start with the data prefix carry payload; everything else
//! (blank separators, `event:` / `id:` fields, `:` comments) is framing noise and
//! is skipped without a diagnostic. A data line whose payload fails to decode or
//! validate becomes a `Malformed` event and decoding continues with the next line.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::RecallError;
use crate::http_client::SseStream;
use crate::slide::{RawSlide, Slide, SlideRejection};
use crate::stream::{BoxStreamEv, StreamEvent};
use crate::telemetry::{KEY_DECODE_LINE, KEY_DECODE_REASON};

/// Default data-line prefix of the event-stream framing.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends a stream early and normally.
pub const DONE_SENTINEL: &str = "[DONE]";

fn malformed(line: usize, rejection: SlideRejection) -> StreamEvent {
    let reason = rejection.to_string();
    warn!({ KEY_DECODE_LINE } = line, { KEY_DECODE_REASON } = %reason, "dropping malformed slide");
    StreamEvent::Malformed(RecallError::Decode { line, reason })
}

/// Decode a single line. Returns `None` for framing noise.
///
/// `line_no` is 1-based and only used for diagnostics.
pub fn decode_line(prefix: &str, line_no: usize, line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(prefix)?.trim();
    if payload == DONE_SENTINEL {
        debug!(line = line_no, "end sentinel");
        return Some(StreamEvent::Done);
    }
    Some(match Slide::from_json(payload) {
        Ok(slide) => StreamEvent::Slide(slide),
        Err(rejection) => malformed(line_no, rejection),
    })
}

/// Lazy decoder over lines that are already split.
///
/// Finite and not restartable: it stops at the end of the input or right after
/// a terminal event.
pub struct SlideDecoder<I> {
    lines: I,
    prefix: String,
    line_no: usize,
    finished: bool,
}

impl<I> SlideDecoder<I> {
    pub fn new(lines: I, prefix: impl Into<String>) -> Self {
        Self {
            lines,
            prefix: prefix.into(),
            line_no: 0,
            finished: false,
        }
    }
}

impl<I, S> Iterator for SlideDecoder<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        while !self.finished {
            let line = self.lines.next()?;
            self.line_no += 1;
            if let Some(ev) = decode_line(&self.prefix, self.line_no, line.as_ref()) {
                self.finished = ev.is_terminal();
                return Some(ev);
            }
        }
        None
    }
}

/// Decode a whole text body that uses the event-stream framing.
pub fn decode_text<'a>(prefix: &str, body: &'a str) -> SlideDecoder<std::str::Lines<'a>> {
    SlideDecoder::new(body.lines(), prefix)
}

/// Decode a single-shot JSON response.
///
/// Accepts an array of slide records, an object with a `slides` array, or a single
/// slide object (a stream of length one). Each record is validated on its own so one
/// bad record does not hide the others. A body that is not JSON at all is retried
/// as event-stream text.
pub fn decode_document(prefix: &str, body: &str) -> Vec<StreamEvent> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return decode_text(prefix, body).collect(),
    };
    let records = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("slides") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return vec![malformed(1, SlideRejection::Json("`slides` is not an array".into()))];
            }
            None => vec![serde_json::Value::Object(map)],
        },
        _ => return vec![malformed(1, SlideRejection::Json("expected an object or array".into()))],
    };
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let decoded = serde_json::from_value::<RawSlide>(record)
                .map_err(|e| SlideRejection::Json(e.to_string()))
                .and_then(Slide::try_from);
            match decoded {
                Ok(slide) => StreamEvent::Slide(slide),
                Err(rejection) => malformed(i + 1, rejection),
            }
        })
        .collect()
}

struct SseDecodeState {
    lines: SseStream,
    prefix: String,
    line_no: usize,
    finished: bool,
}

/// Decode a live line stream into events.
///
/// A line-level error (transport failure, or the idle limit the line stream enforces
/// between body chunks) ends the stream with a single `Aborted` event instead of an
/// error, so callers keep what was already decoded.
pub fn decode_sse(lines: SseStream, prefix: impl Into<String>) -> BoxStreamEv {
    let state = SseDecodeState {
        lines,
        prefix: prefix.into(),
        line_no: 0,
        finished: false,
    };
    futures::stream::unfold(state, |mut st| async move {
        while !st.finished {
            match st.lines.next().await {
                None => return None,
                Some(Err(err)) => {
                    st.finished = true;
                    let err = match err {
                        RecallError::StreamAborted { .. } => err,
                        other => RecallError::StreamAborted { reason: other.to_string() },
                    };
                    return Some((StreamEvent::Aborted(err), st));
                }
                Some(Ok(sse)) => {
                    st.line_no += 1;
                    if let Some(ev) = decode_line(&st.prefix, st.line_no, &sse.line) {
                        st.finished = ev.is_terminal();
                        return Some((ev, st));
                    }
                }
            }
        }
        None
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreResult;
    use crate::http_client::SseLine;

    fn ids(events: &[StreamEvent]) -> Vec<&str> {
        events.iter().filter_map(|e| e.as_slide()).map(|s| s.id()).collect()
    }

    fn line_stream(items: Vec<CoreResult<&'static str>>) -> SseStream {
        Box::pin(futures::stream::iter(
            items.into_iter().map(|r| r.map(|l| SseLine { line: l.to_string() })),
        ))
    }

    #[test]
    fn noise_lines_are_skipped_silently() {
        let body = "\
: keep-alive
event: slide
id: 12

data: {\"id\":\"a\",\"type\":\"title\",\"content\":\"A\"}
retry: 1000
";
        let events: Vec<_> = decode_text(DATA_PREFIX, body).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(ids(&events), ["a"]);
    }

    #[test]
    fn malformed_line_does_not_stop_decoding() {
        let body = "\
data: {\"id\":\"a\",\"type\":\"title\",\"content\":\"A\"}
data: {\"id\":\"b\",\"type\":\"title\"
data: {\"id\":\"c\",\"type\":\"summary\",\"content\":\"C\"}
";
        let events: Vec<_> = decode_text(DATA_PREFIX, body).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(ids(&events), ["a", "c"]);
        match &events[1] {
            StreamEvent::Malformed(RecallError::Decode { line, .. }) => assert_eq!(*line, 2),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn done_sentinel_ends_the_sequence() {
        let body = "data: {\"id\":\"a\",\"type\":\"title\",\"content\":\"A\"}\ndata: [DONE]\ndata: {\"id\":\"b\",\"type\":\"title\",\"content\":\"B\"}\n";
        let events: Vec<_> = decode_text(DATA_PREFIX, body).collect();
        assert_eq!(ids(&events), ["a"]);
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
    }

    #[test]
    fn custom_prefix() {
        let body = "slide>{\"id\":\"x\",\"type\":\"summary\",\"content\":\"S\"}\ndata: {\"id\":\"y\",\"type\":\"summary\",\"content\":\"S\"}";
        let events: Vec<_> = decode_text("slide>", body).collect();
        assert_eq!(ids(&events), ["x"]);
    }

    #[test]
    fn document_array_and_wrapped_forms() {
        let arr = r#"[{"id":"a","type":"title","content":"A"},{"id":"b","type":"bogus","content":"B"}]"#;
        let events = decode_document(DATA_PREFIX, arr);
        assert_eq!(events.len(), 2);
        assert_eq!(ids(&events), ["a"]);

        let wrapped = r#"{"slides":[{"id":"a","type":"title","content":"A"}]}"#;
        assert_eq!(ids(&decode_document(DATA_PREFIX, wrapped)), ["a"]);

        let single = r#"{"id":"only","type":"summary","content":"S"}"#;
        assert_eq!(ids(&decode_document(DATA_PREFIX, single)), ["only"]);
    }

    #[test]
    fn document_falls_back_to_event_stream_text() {
        let body = "data: {\"id\":\"a\",\"type\":\"title\",\"content\":\"A\"}\n\n";
        assert_eq!(ids(&decode_document(DATA_PREFIX, body)), ["a"]);
    }

    #[tokio::test]
    async fn sse_transport_error_becomes_aborted() {
        let lines = line_stream(vec![
            Ok("data: {\"id\":\"a\",\"type\":\"title\",\"content\":\"A\"}"),
            Ok(""),
            Err(RecallError::ServiceUnavailable { reason: "reset".into() }),
            Ok("data: {\"id\":\"b\",\"type\":\"title\",\"content\":\"B\"}"),
        ]);
        let events: Vec<_> = decode_sse(lines, DATA_PREFIX).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(ids(&events), ["a"]);
        match &events[1] {
            StreamEvent::Aborted(RecallError::StreamAborted { reason }) => {
                assert!(reason.contains("reset"))
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sse_idle_abort_keeps_its_reason() {
        let lines = line_stream(vec![
            Ok("data: {\"id\":\"a\",\"type\":\"title\",\"content\":\"A\"}"),
            Err(RecallError::StreamAborted { reason: "no data for 500 ms".into() }),
        ]);
        let events: Vec<_> = decode_sse(lines, DATA_PREFIX).collect().await;
        assert_eq!(ids(&events), ["a"]);
        match events.last() {
            Some(StreamEvent::Aborted(RecallError::StreamAborted { reason })) => {
                assert_eq!(reason, "no data for 500 ms")
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
    }
}
