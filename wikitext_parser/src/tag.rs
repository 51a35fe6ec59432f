//! Scanner for HTML-like tags and `<!-- -->` comments.
//!
//! The scanner walks the text once, keeping a stack of currently open
//! tags. Malformed markup never fails the scan: an element whose end tag
//! is missing is reported with `unclosed` set and its span cut off at the
//! point where the surrounding markup forced it shut.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::textutil;

/// Synthetic tag name under which `<!-- -->` comments are reported.
pub const COMMENT_TAG_NAME: &str = "comment";

/// One HTML-like element or comment found in the source text.
///
/// `start..end` is a half-open byte range into the source; `text` is the
/// verbatim slice at that range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Lowercased tag name, or `"comment"`.
    pub name: String,
    pub text: String,
    pub inner_text: String,
    pub self_closed: bool,
    /// True when no matching end tag exists before the end of input or
    /// before an enclosing element was closed over this one.
    pub unclosed: bool,
    pub start: usize,
    pub end: usize,
    /// Number of open tags this one was nested inside, 0 for top level.
    pub nest_level: usize,
}

static OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([a-zA-Z][a-zA-Z0-9]*)((?:\s[^>]*?)?)(/?)>").unwrap());
static CLOSE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</([a-zA-Z][a-zA-Z0-9]*)(?:\s[^>]*?)?>").unwrap());

struct OpenEntry<'a> {
    name: &'a str,
    is_comment: bool,
    start: usize,
    inner_start: usize,
}

impl<'a> OpenEntry<'a> {
    fn into_unclosed(self, source: &str, end: usize, nest_level: usize) -> Tag {
        Tag {
            name: if self.is_comment {
                COMMENT_TAG_NAME.to_string()
            } else {
                self.name.to_ascii_lowercase()
            },
            text: source[self.start..end].to_string(),
            inner_text: source[self.inner_start..end].to_string(),
            self_closed: false,
            unclosed: true,
            start: self.start,
            end,
            nest_level,
        }
    }
}

/// Scans `source` and returns every tag and comment, ordered by start
/// offset with enclosing tags before the tags they contain.
pub fn parse_tags(source: &str) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    let mut parsing: Vec<OpenEntry> = Vec::new();
    let mut i = 0;
    let len = source.len();
    while i < len {
        let rest = &source[i..];
        // Inside a comment nothing opens or closes except the comment
        // itself.
        if parsing.last().map_or(false, |e| e.is_comment) {
            if rest.starts_with("-->") {
                let entry = parsing.pop().expect("checked non-empty");
                let end = i + 3;
                tags.push(Tag {
                    name: COMMENT_TAG_NAME.to_string(),
                    text: source[entry.start..end].to_string(),
                    inner_text: source[entry.inner_start..i].to_string(),
                    self_closed: false,
                    unclosed: false,
                    start: entry.start,
                    end,
                    nest_level: parsing.len(),
                });
                i = end;
            } else {
                i += next_char_width(rest);
            }
            continue;
        }
        if rest.starts_with("<!--") {
            parsing.push(OpenEntry {
                name: COMMENT_TAG_NAME,
                is_comment: true,
                start: i,
                inner_start: i + 4,
            });
            i += 4;
            continue;
        }
        if let Some(captures) = CLOSE_TAG.captures(rest) {
            let whole = captures.get(0).expect("regex match");
            let close_name = captures.get(1).expect("name group").as_str();
            let matched = parsing
                .iter()
                .rposition(|e| !e.is_comment && textutil::eq_ignore_case(e.name, close_name));
            if let Some(at) = matched {
                // Everything opened above the matching tag never got an
                // end tag of its own; report it closed at this boundary.
                while parsing.len() > at + 1 {
                    let entry = parsing.pop().expect("len checked");
                    let nest_level = parsing.len();
                    tags.push(entry.into_unclosed(source, i, nest_level));
                }
                let entry = parsing.pop().expect("len checked");
                let end = i + whole.end();
                tags.push(Tag {
                    name: entry.name.to_ascii_lowercase(),
                    text: source[entry.start..end].to_string(),
                    inner_text: source[entry.inner_start..i].to_string(),
                    self_closed: false,
                    unclosed: false,
                    start: entry.start,
                    end,
                    nest_level: parsing.len(),
                });
                i = end;
            } else {
                // Stray end tag with nothing open to match it: plain text.
                i += whole.end();
            }
            continue;
        }
        if let Some(captures) = OPEN_TAG.captures(rest) {
            let whole = captures.get(0).expect("regex match");
            let name = captures.get(1).expect("name group").as_str();
            let self_closed = !captures.get(3).expect("slash group").as_str().is_empty();
            let end = i + whole.end();
            if self_closed {
                tags.push(Tag {
                    name: name.to_ascii_lowercase(),
                    text: whole.as_str().to_string(),
                    inner_text: String::new(),
                    self_closed: true,
                    unclosed: false,
                    start: i,
                    end,
                    nest_level: parsing.len(),
                });
            } else {
                parsing.push(OpenEntry {
                    name,
                    is_comment: false,
                    start: i,
                    inner_start: end,
                });
            }
            i = end;
            continue;
        }
        i += next_char_width(rest);
    }
    while let Some(entry) = parsing.pop() {
        let nest_level = parsing.len();
        tags.push(entry.into_unclosed(source, len, nest_level));
    }
    tags.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    tags
}

pub(crate) fn next_char_width(rest: &str) -> usize {
    rest.chars().next().map_or(1, char::len_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_element() {
        let tags = parse_tags("<div>text</div>");
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.name, "div");
        assert_eq!(tag.text, "<div>text</div>");
        assert_eq!(tag.inner_text, "text");
        assert!(!tag.self_closed);
        assert!(!tag.unclosed);
        assert_eq!((tag.start, tag.end), (0, 15));
        assert_eq!(tag.nest_level, 0);
    }

    #[test]
    fn round_trip_spans() {
        let source = "a<div>あ<span>い</span></div><br/><!-- コメント -->";
        let tags = parse_tags(source);
        // Four constructs open in this text and each shows up exactly
        // once.
        assert_eq!(tags.len(), 4);
        for tag in tags {
            assert_eq!(&source[tag.start..tag.end], tag.text);
        }
    }

    #[test]
    fn unclosed_at_closing_boundary() {
        // div and del never close; the end tag for span shuts them.
        let source = "<span>a<div><del>b</span><span>c";
        let tags = parse_tags(source);
        assert_eq!(tags.len(), 4);

        assert_eq!(tags[0].name, "span");
        assert!(!tags[0].unclosed);
        assert_eq!((tags[0].start, tags[0].end), (0, 25));

        assert_eq!(tags[1].name, "div");
        assert!(tags[1].unclosed);
        assert_eq!((tags[1].start, tags[1].end), (7, 18));
        assert_eq!(tags[1].nest_level, 1);

        assert_eq!(tags[2].name, "del");
        assert!(tags[2].unclosed);
        assert_eq!((tags[2].start, tags[2].end), (12, 18));
        assert_eq!(tags[2].nest_level, 2);

        assert_eq!(tags[3].name, "span");
        assert!(tags[3].unclosed);
        assert_eq!((tags[3].start, tags[3].end), (25, source.len()));
        assert_eq!(tags[3].nest_level, 0);
    }

    #[test]
    fn self_closing() {
        let tags = parse_tags("a<br/>b<ref name=\"x\"/>");
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.self_closed && !t.unclosed));
        assert_eq!(tags[0].name, "br");
        assert_eq!(tags[1].name, "ref");
        assert_eq!(tags[1].text, "<ref name=\"x\"/>");
    }

    #[test]
    fn comments() {
        let tags = parse_tags("a<!-- <div>not a tag</div> -->b");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "comment");
        assert_eq!(tags[0].inner_text, " <div>not a tag</div> ");
        assert!(!tags[0].unclosed);

        let tags = parse_tags("a<!-- runs off the end");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "comment");
        assert!(tags[0].unclosed);
        assert_eq!(tags[0].end, 22);
    }

    #[test]
    fn case_insensitive_closing() {
        let tags = parse_tags("<DIV>x</div>");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "div");
        assert!(!tags[0].unclosed);
    }

    #[test]
    fn stray_end_tag_is_text() {
        let source = "<div>a</span>b</div>";
        let tags = parse_tags(source);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "div");
        assert!(!tags[0].unclosed);
        assert_eq!(tags[0].inner_text, "a</span>b");
    }

    #[test]
    fn outer_sorts_before_inner() {
        let tags = parse_tags("<div><span>x</span></div>");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "div");
        assert_eq!(tags[0].nest_level, 0);
        assert_eq!(tags[1].name, "span");
        assert_eq!(tags[1].nest_level, 1);
    }

    #[test]
    fn unclosed_flush_at_end_of_input() {
        let tags = parse_tags("<div><span>x");
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.unclosed));
        assert_eq!(tags[0].name, "div");
        assert_eq!(tags[0].end, 12);
        assert_eq!(tags[1].name, "span");
        assert_eq!(tags[1].end, 12);
        assert_eq!(tags[1].nest_level, 1);
    }
}
