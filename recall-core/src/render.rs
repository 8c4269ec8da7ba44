//! Plain-text render surface.

use std::fmt::Write as _;

use crate::deck::{Deck, DeckStatus};
use crate::slide::{Slide, SlideVariant};

pub fn render_slide(slide: &Slide) -> String {
    let mut out = String::new();
    match slide.variant() {
        SlideVariant::Title => {
            let _ = writeln!(out, "# {}", slide.heading().unwrap_or(slide.content()));
            if let Some(sub) = slide.subtext() {
                let _ = writeln!(out, "  {sub}");
            }
            if slide.heading().is_some() && !slide.content().is_empty() {
                let _ = writeln!(out, "{}", slide.content());
            }
        }
        SlideVariant::Section => {
            if let Some(h) = slide.heading() {
                let _ = writeln!(out, "## {h}");
            }
            if let Some(sub) = slide.subtext() {
                let _ = writeln!(out, "  {sub}");
            }
            let _ = writeln!(out, "{}", slide.content());
            push_bullets(&mut out, slide.bullets());
        }
        SlideVariant::Code => {
            let _ = writeln!(out, "```{}", slide.language().unwrap_or_default());
            let _ = writeln!(out, "{}", slide.content());
            let _ = writeln!(out, "```");
        }
        SlideVariant::Image => {
            let _ = writeln!(out, "[image] {}", slide.url().unwrap_or("(no url)"));
            if let Some(caption) = slide.caption() {
                let _ = writeln!(out, "  {caption}");
            }
        }
        SlideVariant::Summary => {
            let _ = writeln!(out, "## Summary");
            let _ = writeln!(out, "{}", slide.content());
            push_bullets(&mut out, slide.bullets());
        }
    }
    out
}

fn push_bullets(out: &mut String, bullets: &[String]) {
    for b in bullets {
        let _ = writeln!(out, "  - {b}");
    }
}

/// Short label for the deck footer. `None` while there is nothing worth saying.
pub fn status_line(status: DeckStatus) -> Option<&'static str> {
    match status {
        DeckStatus::Empty | DeckStatus::Complete => None,
        DeckStatus::Streaming => Some("generating..."),
        DeckStatus::NothingGenerated => Some("nothing generated"),
        DeckStatus::Incomplete => Some("incomplete: the stream ended early"),
        DeckStatus::Failed => Some("generation failed"),
        DeckStatus::Cancelled => Some("cancelled"),
    }
}

/// Every slide in deck order, numbered, then the status footer.
pub fn render_deck(deck: &Deck) -> String {
    let mut out = String::new();
    for (i, slide) in deck.current_order().iter().enumerate() {
        let _ = writeln!(out, "--- {} [{}] {}", i + 1, slide.variant(), slide.id());
        out.push_str(&render_slide(slide));
    }
    if let Some(line) = status_line(deck.status()) {
        let _ = writeln!(out, "({line})");
    }
    out
}
