//! Wikitext analysis for MediaWiki maintenance tooling.
//!
//! Raw markup goes in, addressable entities come out: HTML-like tags and
//! comments, `{{{parameter}}}` placeholders, `{{template}}` transclusions
//! with a full argument registry, and heading-delimited sections. Every
//! entity carries its byte span in the source so edits round-trip
//! losslessly, and templates can splice themselves back into a buffer
//! with the span re-verified first.
//!
//! [`Wikitext`] owns one page's text and caches each parse pass until the
//! text is mutated. The parse functions in the submodules are pure and
//! can be used directly when no caching is wanted.

pub mod parameter;
pub mod section;
pub mod tag;
pub mod template;
pub mod textutil;

use std::fmt;

pub use crate::parameter::{parse_parameters, Parameter};
pub use crate::section::{parse_sections, Section};
pub use crate::tag::{parse_tags, Tag, COMMENT_TAG_NAME};
pub use crate::template::{
    parse_templates, GetArgOptions, NameStyle, Origin, ParseTemplatesConfig, RenderOptions,
    ReplaceOptions, Template, TemplateArgument, TemplateError,
};

/// Tag names whose content is never parsed as wiki markup unless
/// reconfigured.
pub const DEFAULT_TRANSCLUSION_PREVENTING_TAGS: &[&str] =
    &["comment", "nowiki", "pre", "syntaxhighlight", "source", "math"];

/// Parser-wide configuration, currently the transclusion-preventing tag
/// set. Built by layering include and exclude lists over the default set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    transclusion_preventing: Vec<String>,
}

impl ParserConfig {
    pub fn new() -> Self {
        ParserConfig {
            transclusion_preventing: DEFAULT_TRANSCLUSION_PREVENTING_TAGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Adds `include` to and removes `exclude` from the
    /// transclusion-preventing tag set.
    pub fn adjust_tags(mut self, include: &[&str], exclude: &[&str]) -> Self {
        for name in include {
            let name = name.to_ascii_lowercase();
            if !self.transclusion_preventing.contains(&name) {
                self.transclusion_preventing.push(name);
            }
        }
        for name in exclude {
            let name = name.to_ascii_lowercase();
            self.transclusion_preventing.retain(|t| *t != name);
        }
        self
    }

    pub fn is_transclusion_preventing(&self, name: &str) -> bool {
        self.transclusion_preventing.iter().any(|t| t == name)
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig::new()
    }
}

/// Error for text splices that do not line up with the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceError {
    OutOfRange { start: usize, end: usize, len: usize },
    NotCharBoundary { index: usize },
}

impl fmt::Display for SpliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpliceError::OutOfRange { start, end, len } => {
                write!(f, "range {}..{} is outside the text of length {}", start, end, len)
            }
            SpliceError::NotCharBoundary { index } => {
                write!(f, "byte {} is not on a character boundary", index)
            }
        }
    }
}

impl std::error::Error for SpliceError {}

/// One page's wikitext plus cached parse results.
///
/// Accessors parse on first use and return owned snapshots, so nothing a
/// caller does to a returned entity can corrupt the cached state. Any
/// mutation drops the caches; the next accessor re-parses the new text.
#[derive(Debug)]
pub struct Wikitext {
    text: String,
    config: ParserConfig,
    tags: Option<Vec<Tag>>,
    parameters: Option<Vec<Parameter>>,
    sections: Option<Vec<Section>>,
}

impl Wikitext {
    pub fn new(text: impl Into<String>) -> Self {
        Wikitext::with_config(text, ParserConfig::default())
    }

    pub fn with_config(text: impl Into<String>, config: ParserConfig) -> Self {
        Wikitext {
            text: text.into(),
            config,
            tags: None,
            parameters: None,
            sections: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    fn ensure_tags(&mut self) -> &[Tag] {
        if self.tags.is_none() {
            let parsed = tag::parse_tags(&self.text);
            self.tags = Some(parsed);
        }
        self.tags.as_deref().unwrap_or(&[])
    }

    fn ensure_parameters(&mut self) -> &[Parameter] {
        if self.parameters.is_none() {
            self.ensure_tags();
            let tags = self.tags.as_deref().unwrap_or(&[]);
            let parsed = parameter::parse_parameters(&self.text, tags, &self.config, true);
            self.parameters = Some(parsed);
        }
        self.parameters.as_deref().unwrap_or(&[])
    }

    fn ensure_sections(&mut self) -> &[Section] {
        if self.sections.is_none() {
            self.ensure_tags();
            let tags = self.tags.as_deref().unwrap_or(&[]);
            let parsed = section::parse_sections(&self.text, tags, &self.config);
            self.sections = Some(parsed);
        }
        self.sections.as_deref().unwrap_or(&[])
    }

    /// All tags and comments, ordered by start offset.
    pub fn parse_tags(&mut self) -> Vec<Tag> {
        self.ensure_tags().to_vec()
    }

    /// Tags passing `condition`.
    pub fn tags_where(&mut self, condition: impl Fn(&Tag) -> bool) -> Vec<Tag> {
        self.ensure_tags().iter().filter(|t| condition(*t)).cloned().collect()
    }

    /// Parameter placeholders; nested placeholders are included only with
    /// `recursive`.
    pub fn parse_parameters(&mut self, recursive: bool) -> Vec<Parameter> {
        self.ensure_parameters()
            .iter()
            .filter(|p| recursive || p.nest_level == 0)
            .cloned()
            .collect()
    }

    /// Parameter placeholders passing `condition`.
    pub fn parameters_where(&mut self, condition: impl Fn(&Parameter) -> bool) -> Vec<Parameter> {
        self.ensure_parameters().iter().filter(|p| condition(*p)).cloned().collect()
    }

    /// Document sections, top section first.
    pub fn parse_sections(&mut self) -> Vec<Section> {
        self.ensure_sections().to_vec()
    }

    /// Template transclusions under `options`. Not cached: the result
    /// depends on the supplied predicates.
    pub fn parse_templates(&mut self, options: &ParseTemplatesConfig<'_>) -> Vec<Template> {
        self.ensure_parameters();
        let tags = self.tags.as_deref().unwrap_or(&[]);
        let parameters = self.parameters.as_deref().unwrap_or(&[]);
        template::parse_templates(&self.text, tags, parameters, &self.config, options)
    }

    /// Replaces the byte range `start..end` with `replacement` and drops
    /// every cached parse.
    pub fn replace_range(
        &mut self,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> Result<(), SpliceError> {
        if start > end || end > self.text.len() {
            return Err(SpliceError::OutOfRange { start, end, len: self.text.len() });
        }
        if !self.text.is_char_boundary(start) {
            return Err(SpliceError::NotCharBoundary { index: start });
        }
        if !self.text.is_char_boundary(end) {
            return Err(SpliceError::NotCharBoundary { index: end });
        }
        self.text.replace_range(start..end, replacement);
        self.invalidate();
        Ok(())
    }

    /// Swaps in a whole new text, dropping every cached parse.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.invalidate();
    }

    /// Appends an end tag for every unclosed tag, innermost first where
    /// several were forced shut at the same spot, and returns the new
    /// text.
    pub fn close_unclosed_tags(&mut self) -> &str {
        self.ensure_tags();
        let tags = self.tags.as_deref().unwrap_or(&[]);
        let mut insertions: Vec<(usize, String)> = tags
            .iter()
            .rev()
            .filter(|t| t.unclosed)
            .map(|t| {
                let closer = if t.name == COMMENT_TAG_NAME {
                    "-->".to_string()
                } else {
                    format!("</{}>", t.name)
                };
                (t.end, closer)
            })
            .collect();
        insertions.sort_by_key(|&(at, _)| at);
        let mut text = std::mem::take(&mut self.text);
        for (at, closer) in insertions.into_iter().rev() {
            text.insert_str(at, &closer);
        }
        self.text = text;
        self.invalidate();
        &self.text
    }

    fn invalidate(&mut self) {
        self.tags = None;
        self.parameters = None;
        self.sections = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_refresh_after_mutation() {
        let mut doc = Wikitext::new("== A ==\n{{T|1=x}}");
        assert_eq!(doc.parse_sections().len(), 2);
        let templates = doc.parse_templates(&ParseTemplatesConfig::default());
        assert_eq!(templates[0].name(), "T");

        doc.replace_range(3, 4, "B").expect("valid splice");
        assert_eq!(doc.text(), "== B ==\n{{T|1=x}}");
        let sections = doc.parse_sections();
        assert_eq!(sections[1].title, "B");
    }

    #[test]
    fn close_unclosed_tags_rewrite() {
        let mut doc = Wikitext::new("<span>a<div><del>b</span><span>c");
        assert_eq!(
            doc.close_unclosed_tags(),
            "<span>a<div><del>b</del></div></span><span>c</span>"
        );
        // The rewritten text parses with nothing left unclosed.
        assert!(doc.parse_tags().iter().all(|t| !t.unclosed));
    }

    #[test]
    fn close_unclosed_comment() {
        let mut doc = Wikitext::new("a<!-- note");
        assert_eq!(doc.close_unclosed_tags(), "a<!-- note-->");
    }

    #[test]
    fn splice_errors() {
        let mut doc = Wikitext::new("あいう");
        assert_eq!(
            doc.replace_range(1, 3, "x"),
            Err(SpliceError::NotCharBoundary { index: 1 })
        );
        assert_eq!(
            doc.replace_range(0, 100, "x"),
            Err(SpliceError::OutOfRange { start: 0, end: 100, len: 9 })
        );
        doc.replace_range(0, 3, "x").expect("valid splice");
        assert_eq!(doc.text(), "xいう");
    }

    #[test]
    fn tags_where_filters() {
        let mut doc = Wikitext::new("<div>a</div><span>b");
        let unclosed = doc.tags_where(|t| t.unclosed);
        assert_eq!(unclosed.len(), 1);
        assert_eq!(unclosed[0].name, "span");
    }

    #[test]
    fn parameters_recursive_toggle() {
        let mut doc = Wikitext::new("{{{1|{{{page|x}}}}}}");
        assert_eq!(doc.parse_parameters(true).len(), 2);
        assert_eq!(doc.parse_parameters(false).len(), 1);
    }

    #[test]
    fn adjusted_config_changes_guarding() {
        let config = ParserConfig::new().adjust_tags(&["ref"], &["pre"]);
        assert!(config.is_transclusion_preventing("ref"));
        assert!(!config.is_transclusion_preventing("pre"));
        assert!(config.is_transclusion_preventing("nowiki"));

        let mut doc = Wikitext::with_config("<ref>{{Fake}}</ref>{{Real}}", config);
        let templates = doc.parse_templates(&ParseTemplatesConfig::default());
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "Real");
    }

    #[test]
    fn snapshots_do_not_alias_cache() {
        let mut doc = Wikitext::new("<div>a</div>");
        let mut tags = doc.parse_tags();
        tags[0].name = "mangled".to_string();
        assert_eq!(doc.parse_tags()[0].name, "div");
    }
}
