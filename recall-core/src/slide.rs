//! Slide model: the closed set of slide variants and the validation that turns a
//! raw wire record into a [`Slide`].
//!
//! A `Slide` can only be built through [`Slide::try_from`] (or [`Slide::from_json`]),
//! so every slide held by a deck has a non-empty id, a known variant, and the
//! fields that variant requires. `id` and `variant` are immutable after construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Language hint for code slides when the service does not send one.
pub const DEFAULT_CODE_LANGUAGE: &str = "javascript";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SlideVariant {
    Title,
    Section,
    Code,
    Image,
    Summary,
}

impl SlideVariant {
    pub const ALL: [SlideVariant; 5] = [
        SlideVariant::Title,
        SlideVariant::Section,
        SlideVariant::Code,
        SlideVariant::Image,
        SlideVariant::Summary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Section => "section",
            Self::Code => "code",
            Self::Image => "image",
            Self::Summary => "summary",
        }
    }

    /// Image slides are the only variant allowed to arrive without `content`.
    pub fn requires_content(self) -> bool {
        !matches!(self, Self::Image)
    }

    fn carries_heading(self) -> bool {
        matches!(self, Self::Title | Self::Section)
    }
}

impl fmt::Display for SlideVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlideVariant {
    type Err = SlideRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlideVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| SlideRejection::UnknownVariant(s.to_string()))
    }
}

/// Why a raw record could not become a slide.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlideRejection {
    #[error("invalid json: {0}")]
    Json(String),
    #[error("missing id")]
    MissingId,
    #[error("id must be a non-empty string or a number")]
    InvalidId,
    #[error("missing variant")]
    MissingVariant,
    #[error("unknown variant '{0}'")]
    UnknownVariant(String),
    #[error("{0} slide requires content")]
    MissingContent(SlideVariant),
}

/// Slide record exactly as the presentation service emits it.
///
/// The service labels the variant `type`; `variant` is accepted too.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RawSlide {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, alias = "type")]
    pub variant: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub bullets: Option<Vec<String>>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub subtext: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// One validated slide.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Slide {
    id: String,
    variant: SlideVariant,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bullets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
}

impl Slide {
    /// Decode and validate one JSON slide record.
    pub fn from_json(payload: &str) -> Result<Self, SlideRejection> {
        let raw: RawSlide =
            serde_json::from_str(payload).map_err(|e| SlideRejection::Json(e.to_string()))?;
        Slide::try_from(raw)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn variant(&self) -> SlideVariant {
        self.variant
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn bullets(&self) -> &[String] {
        &self.bullets
    }

    pub fn heading(&self) -> Option<&str> {
        self.heading.as_deref()
    }

    pub fn subtext(&self) -> Option<&str> {
        self.subtext.as_deref()
    }

    /// Only code slides carry a language; it defaults to [`DEFAULT_CODE_LANGUAGE`].
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Replace the content, returning the previous value. Nothing else changes.
    pub(crate) fn replace_content(&mut self, content: String) -> String {
        std::mem::replace(&mut self.content, content)
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn parse_id(id: Option<serde_json::Value>) -> Result<String, SlideRejection> {
    match id {
        None | Some(serde_json::Value::Null) => Err(SlideRejection::MissingId),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(SlideRejection::InvalidId),
    }
}

impl TryFrom<RawSlide> for Slide {
    type Error = SlideRejection;

    fn try_from(raw: RawSlide) -> Result<Self, Self::Error> {
        let id = parse_id(raw.id)?;
        let variant: SlideVariant = raw
            .variant
            .as_deref()
            .ok_or(SlideRejection::MissingVariant)?
            .parse()?;

        let content = match raw.content {
            Some(c) if !c.trim().is_empty() => c,
            _ if variant.requires_content() => {
                return Err(SlideRejection::MissingContent(variant));
            }
            _ => String::new(),
        };

        let (heading, subtext) = if variant.carries_heading() {
            (non_empty(raw.heading), non_empty(raw.subtext))
        } else {
            (None, None)
        };
        let language = match variant {
            SlideVariant::Code => Some(
                non_empty(raw.language).unwrap_or_else(|| DEFAULT_CODE_LANGUAGE.to_string()),
            ),
            _ => None,
        };
        let (url, caption) = match variant {
            SlideVariant::Image => (non_empty(raw.url), non_empty(raw.caption)),
            _ => (None, None),
        };

        Ok(Slide {
            id,
            variant,
            content,
            bullets: raw.bullets.unwrap_or_default(),
            heading,
            subtext,
            language,
            url,
            caption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_type_as_variant_label() {
        let s = Slide::from_json(r#"{"id":"s1","type":"title","content":"Hello","subtext":"world"}"#)
            .unwrap();
        assert_eq!(s.id(), "s1");
        assert_eq!(s.variant(), SlideVariant::Title);
        assert_eq!(s.content(), "Hello");
        assert_eq!(s.subtext(), Some("world"));
    }

    #[test]
    fn numeric_id_is_stringified() {
        let s = Slide::from_json(r#"{"id":7,"variant":"summary","content":"wrap up"}"#).unwrap();
        assert_eq!(s.id(), "7");
    }

    #[test]
    fn section_keeps_bullets_and_heading() {
        let s = Slide::from_json(
            r#"{"id":"a","variant":"section","heading":"Why","content":"body","bullets":["one","two"]}"#,
        )
        .unwrap();
        assert_eq!(s.heading(), Some("Why"));
        assert_eq!(s.bullets(), ["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn code_defaults_language() {
        let s = Slide::from_json(r#"{"id":"c","variant":"code","content":"fn main() {}"}"#).unwrap();
        assert_eq!(s.language(), Some(DEFAULT_CODE_LANGUAGE));
        let s = Slide::from_json(r#"{"id":"c","variant":"code","content":"x","language":"rust"}"#)
            .unwrap();
        assert_eq!(s.language(), Some("rust"));
    }

    #[test]
    fn image_may_omit_content() {
        let s = Slide::from_json(r#"{"id":"i","variant":"image","url":"http://x/y.png","caption":"A chart"}"#)
            .unwrap();
        assert_eq!(s.content(), "");
        assert_eq!(s.url(), Some("http://x/y.png"));
        assert_eq!(s.caption(), Some("A chart"));
    }

    #[test]
    fn heading_dropped_outside_title_and_section() {
        let s = Slide::from_json(r#"{"id":"z","variant":"summary","content":"c","heading":"H"}"#)
            .unwrap();
        assert_eq!(s.heading(), None);
    }

    #[test]
    fn rejections() {
        assert_eq!(
            Slide::from_json(r#"{"variant":"title","content":"x"}"#),
            Err(SlideRejection::MissingId)
        );
        assert_eq!(
            Slide::from_json(r#"{"id":"  ","variant":"title","content":"x"}"#),
            Err(SlideRejection::InvalidId)
        );
        assert_eq!(
            Slide::from_json(r#"{"id":"a","content":"x"}"#),
            Err(SlideRejection::MissingVariant)
        );
        assert_eq!(
            Slide::from_json(r#"{"id":"a","variant":"chart","content":"x"}"#),
            Err(SlideRejection::UnknownVariant("chart".into()))
        );
        assert_eq!(
            Slide::from_json(r#"{"id":"a","variant":"section"}"#),
            Err(SlideRejection::MissingContent(SlideVariant::Section))
        );
        assert!(matches!(Slide::from_json("{not json"), Err(SlideRejection::Json(_))));
    }

    #[test]
    fn replace_content_keeps_identity() {
        let mut s = Slide::from_json(r#"{"id":"a","variant":"title","content":"old"}"#).unwrap();
        let prev = s.replace_content("new".into());
        assert_eq!(prev, "old");
        assert_eq!(s.id(), "a");
        assert_eq!(s.variant(), SlideVariant::Title);
        assert_eq!(s.content(), "new");
    }
}
