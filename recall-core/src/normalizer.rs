use unicode_normalization::UnicodeNormalization;

use crate::error::{CoreResult, RecallError};

/// Unicode NFC normalization + BOM strip + CRLF -> LF + trim.
pub fn clean_text(s: &str) -> String {
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// Clean a prompt; blank prompts are not submitted.
pub fn normalize_prompt(prompt: &str) -> CoreResult<String> {
    let t = clean_text(prompt);
    if t.is_empty() {
        return Err(RecallError::Validation("prompt is empty".into()));
    }
    Ok(t)
}

/// Clean edited slide content. Whether the result may be empty depends on the slide
/// variant; `Session::edit_slide` checks that.
pub fn normalize_content(content: &str) -> String {
    clean_text(content)
}

/// Optional context ids (repository, presentation) treat blank as absent.
pub fn normalize_context_id(id: Option<&str>) -> Option<String> {
    id.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
