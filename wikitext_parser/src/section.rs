//! Heading-delimited sections.
//!
//! Headings come from two sources: `<h1>`–`<h6>` elements found by the
//! tag scanner and `==heading==` lines matched by regex. The merged list
//! is cut into sections where each section runs until the next heading of
//! equal or lower level.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tag::Tag;
use crate::textutil;
use crate::ParserConfig;

/// One heading-delimited region of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Cleaned heading text, `"top"` for the implicit leading section.
    pub title: String,
    /// Verbatim heading markup, empty for the top section.
    pub heading: String,
    pub level: u8,
    /// Position in the returned list, 0 for the top section.
    pub index: usize,
    pub start: usize,
    pub end: usize,
    /// Source slice between the heading and the section's end.
    pub content: String,
}

// A heading line: equals runs on both ends, nothing after the closing run
// but whitespace and comments.
static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(={1,6})(.+?)(={1,6})((?:[ \t\r]|<!--.*?-->)*)$").unwrap()
});

struct Heading {
    start: usize,
    heading_end: usize,
    level: u8,
    title: String,
    text: String,
}

/// Splits `source` into sections. The implicit top section is always
/// first and runs to the first heading of any level.
pub fn parse_sections(source: &str, tags: &[Tag], config: &ParserConfig) -> Vec<Section> {
    let exclusions: Vec<(usize, usize)> = tags
        .iter()
        .filter(|t| config.is_transclusion_preventing(&t.name))
        .map(|t| (t.start, t.end))
        .collect();
    let excluded =
        |start: usize, end: usize| exclusions.iter().any(|&(s, e)| s <= start && end <= e);

    let mut headings: Vec<Heading> = Vec::new();
    for tag in tags {
        let level = match tag.name.as_str() {
            "h1" => 1,
            "h2" => 2,
            "h3" => 3,
            "h4" => 4,
            "h5" => 5,
            "h6" => 6,
            _ => continue,
        };
        if tag.self_closed || tag.unclosed || excluded(tag.start, tag.end) {
            continue;
        }
        headings.push(Heading {
            start: tag.start,
            heading_end: tag.end,
            level,
            title: clean_title(&tag.inner_text),
            text: tag.text.clone(),
        });
    }
    for captures in HEADING.captures_iter(source) {
        let whole = captures.get(0).expect("regex match");
        if excluded(whole.start(), whole.end()) {
            continue;
        }
        let left = captures.get(1).expect("left group").as_str().len();
        let right = captures.get(3).expect("right group").as_str().len();
        let level = left.min(right);
        // Asymmetric runs keep their extra equals signs as title text.
        let mut title = String::new();
        for _ in level..left {
            title.push('=');
        }
        title.push_str(captures.get(2).expect("title group").as_str());
        for _ in level..right {
            title.push('=');
        }
        headings.push(Heading {
            start: whole.start(),
            heading_end: whole.end(),
            level: level as u8,
            title: clean_title(&title),
            text: whole.as_str().to_string(),
        });
    }
    // Tag headings were pushed first, so on a start-offset tie the stable
    // sort keeps the tag variant and the duplicate line match is dropped.
    headings.sort_by_key(|h| h.start);
    headings.dedup_by(|b, a| a.start == b.start);

    let mut sections = Vec::with_capacity(headings.len() + 1);
    let top_end = headings.first().map_or(source.len(), |h| h.start);
    sections.push(Section {
        title: "top".to_string(),
        heading: String::new(),
        level: 1,
        index: 0,
        start: 0,
        end: top_end,
        content: source[..top_end].to_string(),
    });
    for (at, heading) in headings.iter().enumerate() {
        let end = headings[at + 1..]
            .iter()
            .find(|next| next.level <= heading.level)
            .map_or(source.len(), |next| next.start);
        sections.push(Section {
            title: heading.title.clone(),
            heading: heading.text.clone(),
            level: heading.level,
            index: at + 1,
            start: heading.start,
            end,
            content: source[heading.heading_end..end].to_string(),
        });
    }
    sections
}

fn clean_title(title: &str) -> String {
    textutil::strip_comments(title).trim().to_string()
}
