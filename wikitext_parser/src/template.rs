//! Template transclusions: the `{{name|...}}` entity, its argument
//! registry, rendering back to wikitext, and the scanner that finds
//! transclusions in source text.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use mediawiki_namespaces::Namespace;

use crate::parameter::Parameter;
use crate::tag::{next_char_width, Tag};
use crate::textutil;
use crate::ParserConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The raw first-slot text does not contain the cleaned name, which
    /// happens when a comment splits the name in two.
    NameMismatch { name: String, full_name: String },
    EmptyName,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::NameMismatch { name, full_name } => write!(
                f,
                "template name {:?} is not contained in {:?}",
                name, full_name
            ),
            TemplateError::EmptyName => write!(f, "template name is empty"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// One argument slot of a template.
///
/// `name` and `value` are cleaned (comments removed, outer whitespace
/// trimmed); the `uf_` fields preserve the slot as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateArgument {
    pub name: String,
    pub value: String,
    /// `|name=value` form with cleaned parts, `|value` when unnamed.
    pub text: String,
    pub uf_name: String,
    pub uf_value: String,
    pub uf_text: String,
    pub unnamed: bool,
}

impl TemplateArgument {
    fn named(uf_name: &str, uf_value: &str) -> Self {
        let name = clean(uf_name);
        let value = clean(uf_value);
        TemplateArgument {
            text: format!("|{}={}", name, value),
            uf_text: format!("|{}={}", uf_name, uf_value),
            name,
            value,
            uf_name: uf_name.to_string(),
            uf_value: uf_value.to_string(),
            unnamed: false,
        }
    }

    fn unnamed(number: usize, uf_value: &str) -> Self {
        let value = clean(uf_value);
        TemplateArgument {
            text: format!("|{}", value),
            uf_text: format!("|{}", uf_value),
            name: number.to_string(),
            value,
            uf_name: String::new(),
            uf_value: uf_value.to_string(),
            unnamed: true,
        }
    }
}

fn clean(s: &str) -> String {
    textutil::strip_comments(s).trim().to_string()
}

/// Where a template came from. Only parser-produced templates carry
/// source offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Parsed {
        /// Verbatim `{{...}}` slice the template was read from.
        text: String,
        start: usize,
        end: usize,
        nest_level: usize,
    },
    Synthetic,
}

/// Name variant to emit when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// The raw first-slot text, decoration included.
    Full,
    /// The namespace- and case-normalized target.
    Clean,
    /// The raw first-slot text with the name part normalized in place.
    FullClean,
}

pub struct RenderOptions<'a> {
    pub name_style: NameStyle,
    pub subst: bool,
    /// Emit the raw-whitespace argument text instead of the cleaned form.
    pub unformatted: bool,
    /// Applied to a copy of the argument list; stored order is untouched.
    pub sort: Option<&'a dyn Fn(&TemplateArgument, &TemplateArgument) -> Ordering>,
    /// Line break after the name and after every argument.
    pub linebreaks: bool,
    /// Per-argument line break decision; overrides nothing, adds breaks.
    pub linebreak_if: Option<&'a dyn Fn(&TemplateArgument) -> bool>,
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        RenderOptions {
            name_style: NameStyle::Full,
            subst: false,
            unformatted: false,
            sort: None,
            linebreaks: false,
            linebreak_if: None,
        }
    }
}

pub struct ReplaceOptions<'a> {
    /// Replacement text; rendered from the template when absent.
    pub with: Option<&'a str>,
    pub render: RenderOptions<'a>,
    /// Verify the saved span still holds the original text and refuse the
    /// edit otherwise, instead of replacing the first textual occurrence.
    pub use_index: bool,
}

impl Default for ReplaceOptions<'_> {
    fn default() -> Self {
        ReplaceOptions {
            with: None,
            render: RenderOptions::default(),
            use_index: true,
        }
    }
}

/// Options for argument lookup.
#[derive(Default)]
pub struct GetArgOptions<'a> {
    /// Return the first match instead of the most recently registered.
    pub find_first: bool,
    pub condition: Option<&'a dyn Fn(&TemplateArgument) -> bool>,
}

/// One `{{...}}` transclusion, parsed from text or built directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    name: String,
    full_name: String,
    args: Vec<TemplateArgument>,
    overridden_args: Vec<TemplateArgument>,
    /// Groups of argument names that address the same logical slot, e.g.
    /// `["1", "user"]`.
    hierarchy: Vec<Vec<String>>,
    origin: Origin,
}

impl Template {
    /// Builds a synthetic template. The name doubles as the full name.
    pub fn new(name: &str) -> Result<Template, TemplateError> {
        Template::with_full_name(name, name)
    }

    /// Builds a synthetic template whose first slot carries decoration
    /// (whitespace, comments) around the name.
    pub fn with_full_name(name: &str, full_name: &str) -> Result<Template, TemplateError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if !full_name.contains(trimmed) {
            return Err(TemplateError::NameMismatch {
                name: trimmed.to_string(),
                full_name: full_name.to_string(),
            });
        }
        Ok(Template {
            name: trimmed.to_string(),
            full_name: full_name.to_string(),
            args: Vec::new(),
            overridden_args: Vec::new(),
            hierarchy: Vec::new(),
            origin: Origin::Synthetic,
        })
    }

    fn from_parse(full_name: &str, origin: Origin) -> Result<Template, TemplateError> {
        let stripped = textutil::strip_comments(full_name);
        let name = stripped.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if !full_name.contains(name) {
            return Err(TemplateError::NameMismatch {
                name: name.to_string(),
                full_name: full_name.to_string(),
            });
        }
        Ok(Template {
            name: name.to_string(),
            full_name: full_name.to_string(),
            args: Vec::new(),
            overridden_args: Vec::new(),
            hierarchy: Vec::new(),
            origin,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The verbatim source slice for parsed templates.
    pub fn original_text(&self) -> Option<&str> {
        match &self.origin {
            Origin::Parsed { text, .. } => Some(text),
            Origin::Synthetic => None,
        }
    }

    /// Byte span in the source the template was parsed from.
    pub fn span(&self) -> Option<(usize, usize)> {
        match &self.origin {
            Origin::Parsed { start, end, .. } => Some((*start, *end)),
            Origin::Synthetic => None,
        }
    }

    pub fn nest_level(&self) -> Option<usize> {
        match &self.origin {
            Origin::Parsed { nest_level, .. } => Some(*nest_level),
            Origin::Synthetic => None,
        }
    }

    pub fn args(&self) -> &[TemplateArgument] {
        &self.args
    }

    /// Arguments displaced by duplicate-name `add_arg` calls, oldest
    /// first.
    pub fn overridden_args(&self) -> &[TemplateArgument] {
        &self.overridden_args
    }

    /// Declares groups of names that address the same logical argument.
    pub fn set_hierarchy(&mut self, hierarchy: Vec<Vec<String>>) {
        self.hierarchy = hierarchy;
    }

    /// Replaces the template target, keeping whatever decoration the full
    /// name carries around it.
    pub fn set_name(&mut self, name: &str) -> Result<(), TemplateError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        self.full_name = match self.full_name.find(self.name.as_str()) {
            Some(at) => {
                let mut full = self.full_name.clone();
                full.replace_range(at..at + self.name.len(), trimmed);
                full
            }
            None => trimmed.to_string(),
        };
        self.name = trimmed.to_string();
        Ok(())
    }

    /// Namespace- and case-normalized target, e.g. `Template:Foo` for
    /// `foo` and `Foo` for `:foo`.
    pub fn clean_name(&self) -> String {
        self.resolve_name(false)
    }

    /// The full name with the name part replaced by its normalized form.
    pub fn full_clean_name(&self) -> String {
        self.resolve_name(true)
    }

    fn resolve_name(&self, full: bool) -> String {
        let stripped = textutil::strip_comments(&self.name);
        let normalized = textutil::collapse_title_whitespace(&stripped);
        let clean = if let Some(rest) = normalized.strip_prefix(':') {
            // A leading colon transcludes from the main namespace.
            textutil::ucfirst(rest.trim_start())
        } else if let Some((prefix, page)) = normalized.split_once(':') {
            match Namespace::resolve_alias(prefix) {
                Some(namespace) => format!(
                    "{}{}",
                    namespace.canonical_prefix(),
                    textutil::ucfirst(page.trim_start())
                ),
                None => format!(
                    "{}{}",
                    Namespace::Template.canonical_prefix(),
                    textutil::ucfirst(&normalized)
                ),
            }
        } else {
            format!(
                "{}{}",
                Namespace::Template.canonical_prefix(),
                textutil::ucfirst(&normalized)
            )
        };
        if !full {
            return clean;
        }
        match self.full_name.find(self.name.as_str()) {
            Some(at) => {
                let mut out = self.full_name.clone();
                out.replace_range(at..at + self.name.len(), &clean);
                out
            }
            None => clean,
        }
    }

    /// Registers an argument. A duplicate name displaces the old argument
    /// into the overridden log and appends the new one at the end.
    pub fn add_arg(&mut self, name: &str, value: &str) {
        self.register_arg(name, value, true);
    }

    pub fn add_args<'a, I>(&mut self, args: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in args {
            self.add_arg(name, value);
        }
    }

    /// Registers an argument, silently replacing a duplicate in place. No
    /// overridden-log entry, no reordering.
    pub fn set_arg(&mut self, name: &str, value: &str) {
        self.register_arg(name, value, false);
    }

    pub fn set_args<'a, I>(&mut self, args: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in args {
            self.set_arg(name, value);
        }
    }

    fn register_arg(&mut self, uf_name: &str, uf_value: &str, log_override: bool) {
        let cleaned_name = clean(uf_name);
        let arg = if cleaned_name.is_empty() {
            TemplateArgument::unnamed(self.lowest_unused_number(), uf_value)
        } else {
            TemplateArgument::named(uf_name, uf_value)
        };
        let existing = self
            .args
            .iter()
            .position(|a| a.name == arg.name || self.same_slot(&a.name, &arg.name));
        match existing {
            Some(at) if log_override => {
                let old = self.args.remove(at);
                self.overridden_args.push(old);
                self.args.push(arg);
            }
            Some(at) => self.args[at] = arg,
            None => self.args.push(arg),
        }
    }

    fn same_slot(&self, a: &str, b: &str) -> bool {
        self.hierarchy
            .iter()
            .any(|group| group.iter().any(|n| n == a) && group.iter().any(|n| n == b))
    }

    fn lowest_unused_number(&self) -> usize {
        let mut n = 1;
        while self.args.iter().any(|a| a.name == n.to_string()) {
            n += 1;
        }
        n
    }

    /// Returns a copy of the most recently registered argument with this
    /// exact name.
    pub fn get_arg(&self, name: &str) -> Option<TemplateArgument> {
        self.args.iter().rev().find(|a| a.name == name).cloned()
    }

    /// Returns a copy of an argument whose name matches `pattern`, last
    /// match first unless `find_first` is set.
    pub fn get_arg_matching(
        &self,
        pattern: &Regex,
        options: &GetArgOptions<'_>,
    ) -> Option<TemplateArgument> {
        let accept = |a: &&TemplateArgument| {
            pattern.is_match(&a.name) && options.condition.map_or(true, |c| c(*a))
        };
        if options.find_first {
            self.args.iter().find(accept).cloned()
        } else {
            self.args.iter().rev().find(accept).cloned()
        }
    }

    /// Removes the argument with this exact name, returning it.
    pub fn delete_arg(&mut self, name: &str) -> Option<TemplateArgument> {
        self.args
            .iter()
            .position(|a| a.name == name)
            .map(|at| self.args.remove(at))
    }

    pub fn delete_args<'a, I>(&mut self, names: I) -> Vec<TemplateArgument>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().filter_map(|n| self.delete_arg(n)).collect()
    }

    /// Serializes back to `{{Name|args}}` text.
    pub fn render(&self, options: &RenderOptions<'_>) -> String {
        let name = match options.name_style {
            NameStyle::Full => self.full_name.clone(),
            NameStyle::Clean => self.clean_name(),
            NameStyle::FullClean => self.full_clean_name(),
        };
        let mut out = String::from("{{");
        if options.subst {
            out.push_str("subst:");
        }
        out.push_str(&name);
        if options.linebreaks {
            out.push('\n');
        }
        let mut args: Vec<&TemplateArgument> = self.args.iter().collect();
        if let Some(cmp) = options.sort {
            args.sort_by(|a, b| cmp(*a, *b));
        }
        for arg in args {
            out.push_str(if options.unformatted { &arg.uf_text } else { &arg.text });
            if options.linebreaks || options.linebreak_if.map_or(false, |f| f(arg)) {
                out.push('\n');
            }
        }
        out.push_str("}}");
        out
    }

    /// Splices this template's replacement into `text`.
    ///
    /// With `use_index`, the edit happens only if the saved span still
    /// holds the original text; otherwise `text` comes back unchanged.
    /// Without it, the first textual occurrence of the original text is
    /// replaced. Synthetic templates have nothing to replace and come back
    /// unchanged.
    pub fn replace_in(&self, text: &str, options: &ReplaceOptions<'_>) -> String {
        let (original, start, end) = match &self.origin {
            Origin::Parsed { text, start, end, .. } => (text.as_str(), *start, *end),
            Origin::Synthetic => return text.to_string(),
        };
        let replacement = match options.with {
            Some(with) => with.to_string(),
            None => self.render(&options.render),
        };
        if !options.use_index {
            return text.replacen(original, &replacement, 1);
        }
        if text.get(start..end) != Some(original) {
            return text.to_string();
        }
        let mut tail_start = end;
        if replacement.is_empty()
            && text[..start].ends_with('\n')
            && text[tail_start..].starts_with('\n')
        {
            // The removal would leave the line's two newlines back to
            // back; consume one so no blank line remains.
            tail_start += 1;
        }
        let mut out = String::with_capacity(text.len() + replacement.len());
        out.push_str(&text[..start]);
        out.push_str(&replacement);
        out.push_str(&text[tail_start..]);
        out
    }
}

/// Filters and recursion control for [`parse_templates`]. Every predicate
/// defaults to accepting.
#[derive(Default)]
pub struct ParseTemplatesConfig<'a> {
    /// Receives the candidate's clean name.
    pub name_predicate: Option<Box<dyn Fn(&str) -> bool + 'a>>,
    pub template_predicate: Option<Box<dyn Fn(&Template) -> bool + 'a>>,
    /// Decides whether templates nested inside this one are searched.
    pub recursive_predicate: Option<Box<dyn Fn(&Template) -> bool + 'a>>,
}

static WIKILINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\[[^\[\]]*\]\]").unwrap());

/// Scans `source` for template transclusions.
///
/// `tags` and `parameters` must come from the same source text; their
/// spans are consumed atomically so braces and pipes inside them never
/// count toward template structure. Templates are returned in discovery
/// order, each parent before its nested children; sort by start offset
/// for positional order.
pub fn parse_templates(
    source: &str,
    tags: &[Tag],
    parameters: &[Parameter],
    config: &ParserConfig,
    options: &ParseTemplatesConfig<'_>,
) -> Vec<Template> {
    let skips = skip_spans(tags, parameters, config);
    parse_templates_in(source, 0..source.len(), &skips, options, 0)
}

// Opaque spans the scanner jumps over: transclusion-preventing tags and
// top-level parameter placeholders, outermost span winning on overlap.
fn skip_spans(tags: &[Tag], parameters: &[Parameter], config: &ParserConfig) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = tags
        .iter()
        .filter(|t| config.is_transclusion_preventing(&t.name))
        .map(|t| (t.start, t.end))
        .chain(parameters.iter().map(|p| (p.start, p.end)))
        .collect();
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in spans {
        if merged.last().map_or(true, |&(_, prev_end)| start >= prev_end) {
            merged.push((start, end));
        }
    }
    merged
}

#[derive(Default)]
struct ArgBuffer {
    /// Raw slot text.
    text: String,
    /// Raw name part, present once an `=` split the slot.
    name: Option<String>,
    /// Raw value part; mirrors `text` while the slot is unnamed.
    value: String,
}

enum Fragment {
    /// Plain scanned character; eligible to split name from value.
    Text,
    /// A consumed span (tag, parameter, wikilink, nested braces) whose
    /// content never names an argument.
    NonName,
}

fn process_fragment(args: &mut Vec<ArgBuffer>, fragment: &str, kind: Fragment) {
    if args.is_empty() {
        args.push(ArgBuffer::default());
    }
    let arg = args.last_mut().expect("pushed above");
    arg.text.push_str(fragment);
    match kind {
        Fragment::Text if arg.name.is_none() => {
            if let Some(eq) = fragment.find('=') {
                let name = format!("{}{}", arg.value, &fragment[..eq]);
                arg.name = Some(name);
                arg.value = fragment[eq + 1..].to_string();
            } else {
                arg.value.push_str(fragment);
            }
        }
        _ => arg.value.push_str(fragment),
    }
}

fn parse_templates_in(
    source: &str,
    window: Range<usize>,
    skips: &[(usize, usize)],
    options: &ParseTemplatesConfig<'_>,
    nest_level: usize,
) -> Vec<Template> {
    let mut templates = Vec::new();
    let mut args: Vec<ArgBuffer> = Vec::new();
    let mut num_unclosed = 0usize;
    let mut start_index = 0usize;
    let mut has_nested = false;
    let mut i = window.start;
    while i < window.end {
        if let Some(&(_, span_end)) = skips.iter().find(|&&(s, _)| s == i) {
            let end = span_end.min(window.end);
            if num_unclosed > 0 {
                process_fragment(&mut args, &source[i..end], Fragment::NonName);
            }
            i = end;
            continue;
        }
        let rest = &source[i..window.end];
        if num_unclosed == 0 {
            if rest.starts_with("{{") {
                start_index = i;
                args.clear();
                args.push(ArgBuffer::default());
                has_nested = false;
                num_unclosed += 2;
                i += 2;
            } else if let Some(link) = WIKILINK.find(rest) {
                i += link.end();
            } else {
                i += next_char_width(rest);
            }
        } else if num_unclosed == 2 {
            if rest.starts_with("{{") {
                has_nested = true;
                num_unclosed += 2;
                process_fragment(&mut args, "{{", Fragment::NonName);
                i += 2;
            } else if rest.starts_with("}}") {
                let end = i + 2;
                finalize_candidate(
                    source,
                    start_index,
                    end,
                    &args,
                    has_nested,
                    skips,
                    options,
                    nest_level,
                    &mut templates,
                );
                num_unclosed -= 2;
                i = end;
            } else if let Some(link) = WIKILINK.find(rest) {
                process_fragment(&mut args, link.as_str(), Fragment::NonName);
                i += link.end();
            } else if rest.starts_with('|') {
                args.push(ArgBuffer::default());
                i += 1;
            } else {
                let width = next_char_width(rest);
                process_fragment(&mut args, &rest[..width], Fragment::Text);
                i += width;
            }
        } else {
            // Nested raw braces: only rebalance the depth, everything is
            // raw text of the current outer slot.
            if rest.starts_with("{{") {
                num_unclosed += 2;
                process_fragment(&mut args, "{{", Fragment::NonName);
                i += 2;
            } else if rest.starts_with("}}") {
                num_unclosed -= 2;
                process_fragment(&mut args, "}}", Fragment::NonName);
                i += 2;
            } else {
                let width = next_char_width(rest);
                process_fragment(&mut args, &rest[..width], Fragment::NonName);
                i += width;
            }
        }
    }
    templates
}

fn finalize_candidate(
    source: &str,
    start: usize,
    end: usize,
    args: &[ArgBuffer],
    has_nested: bool,
    skips: &[(usize, usize)],
    options: &ParseTemplatesConfig<'_>,
    nest_level: usize,
    out: &mut Vec<Template>,
) {
    let inner = start + 2..end - 2;
    let full_name = args.first().map(|a| a.text.as_str()).unwrap_or("");
    let origin = Origin::Parsed {
        text: source[start..end].to_string(),
        start,
        end,
        nest_level,
    };
    let mut template = match Template::from_parse(full_name, origin) {
        Ok(template) => template,
        Err(e) => {
            debug!("omitting template candidate at byte {}: {}", start, e);
            if has_nested {
                out.extend(parse_templates_in(source, inner, skips, options, nest_level + 1));
            }
            return;
        }
    };
    for arg in &args[1..] {
        match &arg.name {
            Some(name) => template.register_arg(name, &arg.value, true),
            None => template.register_arg("", &arg.text, true),
        }
    }
    let keep = options
        .name_predicate
        .as_ref()
        .map_or(true, |p| p(&template.clean_name()))
        && options
            .template_predicate
            .as_ref()
            .map_or(true, |p| p(&template));
    let recurse = has_nested
        && options
            .recursive_predicate
            .as_ref()
            .map_or(true, |p| p(&template));
    if keep {
        out.push(template);
    }
    if recurse {
        out.extend(parse_templates_in(source, inner, skips, options, nest_level + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::parse_parameters;
    use crate::tag::parse_tags;

    fn parse(source: &str) -> Vec<Template> {
        parse_with(source, &ParseTemplatesConfig::default())
    }

    fn parse_with(source: &str, options: &ParseTemplatesConfig<'_>) -> Vec<Template> {
        let config = ParserConfig::default();
        let tags = parse_tags(source);
        let parameters = parse_parameters(source, &tags, &config, true);
        parse_templates(source, &tags, &parameters, &config, options)
    }

    #[test]
    fn simple_template() {
        let source = "before {{Foo|a|b=c}} after";
        let templates = parse(source);
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        assert_eq!(t.name(), "Foo");
        assert_eq!(t.original_text(), Some("{{Foo|a|b=c}}"));
        assert_eq!(t.span(), Some((7, 20)));
        assert_eq!(t.args().len(), 2);
        assert_eq!(t.args()[0].name, "1");
        assert_eq!(t.args()[0].value, "a");
        assert!(t.args()[0].unnamed);
        assert_eq!(t.args()[1].name, "b");
        assert_eq!(t.args()[1].value, "c");
        assert!(!t.args()[1].unnamed);
    }

    #[test]
    fn substring_invariant() {
        let source = "x{{A}}y{{B|1=ん}}z";
        for t in parse(source) {
            let (start, end) = t.span().expect("parsed template");
            let text = t.original_text().expect("parsed template");
            assert_eq!(&source[start..end], text);
            assert!(text.starts_with("{{") && text.ends_with("}}"));
        }
    }

    #[test]
    fn nested_recursion() {
        let source = "{{Outer|{{Inner|x}}}}";
        let templates = parse(source);
        assert_eq!(templates.len(), 2);

        let outer = &templates[0];
        assert_eq!(outer.name(), "Outer");
        assert_eq!(outer.args().len(), 1);
        assert_eq!(outer.args()[0].value, "{{Inner|x}}");
        assert_eq!(outer.nest_level(), Some(0));

        let inner = &templates[1];
        assert_eq!(inner.name(), "Inner");
        assert_eq!(inner.span(), Some((8, 19)));
        assert_eq!(inner.nest_level(), Some(1));
        assert_eq!(inner.args().len(), 1);
        assert_eq!(inner.args()[0].value, "x");
    }

    #[test]
    fn tag_guarded_parsing() {
        let source = "<nowiki>{{Fake}}</nowiki>{{Real}}";
        let templates = parse(source);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "Real");
    }

    #[test]
    fn parameter_spans_are_opaque() {
        // The parameter default contains what looks like a template; the
        // whole placeholder is consumed as one fragment.
        let source = "{{Box|text={{{1|{{PAGENAME}}}}}}}";
        let templates = parse(source);
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        assert_eq!(t.name(), "Box");
        assert_eq!(t.get_arg("text").expect("text arg").value, "{{{1|{{PAGENAME}}}}}");
    }

    #[test]
    fn pipe_inside_wikilink_does_not_split() {
        let source = "{{Foo|link=[[Page|label]]}}";
        let templates = parse(source);
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        assert_eq!(t.args().len(), 1);
        assert_eq!(t.get_arg("link").expect("link arg").value, "[[Page|label]]");
    }

    #[test]
    fn equals_inside_wikilink_does_not_name() {
        let source = "{{Foo|[[a=b]] x}}";
        let templates = parse(source);
        let t = &templates[0];
        assert_eq!(t.args().len(), 1);
        assert!(t.args()[0].unnamed);
        assert_eq!(t.args()[0].name, "1");
        assert_eq!(t.args()[0].value, "[[a=b]] x");
    }

    #[test]
    fn duplicate_named_argument_overrides_at_parse_time() {
        let source = "{{A|1=x|1=y}}";
        let templates = parse(source);
        let t = &templates[0];
        assert_eq!(t.args().len(), 1);
        assert_eq!(t.get_arg("1").expect("arg 1").value, "y");
        assert_eq!(t.overridden_args().len(), 1);
        assert_eq!(t.overridden_args()[0].value, "x");
        assert_eq!(t.render(&RenderOptions::default()), "{{A|1=y}}");
    }

    #[test]
    fn add_logs_override_set_does_not() {
        let mut t = Template::new("T").expect("valid name");
        t.add_arg("a", "1");
        t.add_arg("a", "2");
        assert_eq!(t.get_arg("a").expect("arg a").value, "2");
        assert_eq!(t.overridden_args().len(), 1);
        assert_eq!(t.overridden_args()[0].value, "1");

        let mut t = Template::new("T").expect("valid name");
        t.add_arg("a", "1");
        t.set_arg("a", "2");
        assert_eq!(t.get_arg("a").expect("arg a").value, "2");
        assert!(t.overridden_args().is_empty());
    }

    #[test]
    fn set_replaces_in_place() {
        let mut t = Template::new("T").expect("valid name");
        t.add_arg("a", "1");
        t.add_arg("b", "2");
        t.set_arg("a", "3");
        assert_eq!(t.args()[0].name, "a");
        assert_eq!(t.args()[0].value, "3");
        assert_eq!(t.args()[1].name, "b");
    }

    #[test]
    fn add_reorders_to_end() {
        let mut t = Template::new("T").expect("valid name");
        t.add_arg("a", "1");
        t.add_arg("b", "2");
        t.add_arg("a", "3");
        assert_eq!(t.args()[0].name, "b");
        assert_eq!(t.args()[1].name, "a");
    }

    #[test]
    fn unnamed_auto_numbering() {
        let mut t = Template::new("T").expect("valid name");
        t.add_arg("", "x");
        t.add_arg("", "y");
        assert_eq!(t.args()[0].name, "1");
        assert_eq!(t.args()[1].name, "2");

        let removed = t.delete_arg("1").expect("arg 1 present");
        assert_eq!(removed.value, "x");
        t.add_arg("", "z");
        assert_eq!(t.get_arg("1").expect("reused slot").value, "z");
    }

    #[test]
    fn bulk_argument_helpers() {
        let mut t = Template::new("T").expect("valid name");
        t.add_args(vec![("a", "1"), ("b", "2"), ("c", "3")]);
        assert_eq!(t.args().len(), 3);
        t.set_args(vec![("a", "9"), ("d", "4")]);
        assert_eq!(t.args().len(), 4);
        assert_eq!(t.get_arg("a").expect("arg a").value, "9");
        assert!(t.overridden_args().is_empty());

        let removed = t.delete_args(vec!["a", "c", "missing"]);
        assert_eq!(removed.len(), 2);
        assert_eq!(t.args().len(), 2);
        assert!(t.get_arg("a").is_none());
    }

    #[test]
    fn unformatted_render_preserves_whitespace() {
        let source = "{{T| a = b }}";
        let templates = parse(source);
        let t = &templates[0];
        assert_eq!(t.get_arg("a").expect("arg a").value, "b");
        assert_eq!(t.render(&RenderOptions::default()), "{{T|a=b}}");
        assert_eq!(
            t.render(&RenderOptions { unformatted: true, ..Default::default() }),
            source
        );
    }

    #[test]
    fn hierarchy_joins_aliased_slots() {
        let mut t = Template::new("UserReport").expect("valid name");
        t.set_hierarchy(vec![vec!["1".to_string(), "user".to_string()]]);
        t.add_arg("", "Alice");
        t.add_arg("user", "Bob");
        assert_eq!(t.args().len(), 1);
        assert_eq!(t.get_arg("user").expect("user arg").value, "Bob");
        assert_eq!(t.overridden_args().len(), 1);
        assert_eq!(t.overridden_args()[0].value, "Alice");
    }

    #[test]
    fn get_arg_matching_options() {
        let mut t = Template::new("T").expect("valid name");
        t.add_arg("user1", "a");
        t.add_arg("user2", "b");
        let pattern = Regex::new(r"^user\d+$").expect("valid pattern");

        let last = t.get_arg_matching(&pattern, &GetArgOptions::default());
        assert_eq!(last.expect("match").value, "b");

        let first = t.get_arg_matching(
            &pattern,
            &GetArgOptions { find_first: true, condition: None },
        );
        assert_eq!(first.expect("match").value, "a");

        let conditional = t.get_arg_matching(
            &pattern,
            &GetArgOptions { find_first: false, condition: Some(&|a| a.value == "a") },
        );
        assert_eq!(conditional.expect("match").name, "user1");
    }

    #[test]
    fn clean_name_resolution() {
        assert_eq!(Template::new("foo").expect("valid").clean_name(), "Template:Foo");
        assert_eq!(Template::new(":foo").expect("valid").clean_name(), "Foo");
        assert_eq!(Template::new("user:foo").expect("valid").clean_name(), "User:Foo");
        assert_eq!(
            Template::new("template:foo_bar").expect("valid").clean_name(),
            "Template:Foo bar"
        );
        assert_eq!(
            Template::new("テンプレート").expect("valid").clean_name(),
            "Template:テンプレート"
        );
    }

    #[test]
    fn full_clean_name_keeps_decoration() {
        let source = "{{ <!--sic--> foo |x}}";
        let templates = parse(source);
        let t = &templates[0];
        assert_eq!(t.name(), "foo");
        assert_eq!(t.full_name(), " <!--sic--> foo ");
        assert_eq!(t.clean_name(), "Template:Foo");
        assert_eq!(t.full_clean_name(), " <!--sic--> Template:Foo ");
    }

    #[test]
    fn name_mismatch_candidate_is_omitted() {
        // The comment splits the name; the cleaned name is not a substring
        // of the raw slot, so the candidate fails construction.
        let source = "{{Tem<!--x-->plate}} {{Good}}";
        let templates = parse(source);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "Good");
    }

    #[test]
    fn render_options() {
        let source = "{{foo|b=2|a=1}}";
        let templates = parse(source);
        let t = &templates[0];
        assert_eq!(t.render(&RenderOptions::default()), "{{foo|b=2|a=1}}");
        assert_eq!(
            t.render(&RenderOptions { name_style: NameStyle::Clean, ..Default::default() }),
            "{{Template:Foo|b=2|a=1}}"
        );
        assert_eq!(
            t.render(&RenderOptions {
                name_style: NameStyle::Clean,
                subst: true,
                ..Default::default()
            }),
            "{{subst:Template:Foo|b=2|a=1}}"
        );
        let sorted = t.render(&RenderOptions {
            sort: Some(&|a, b| a.name.cmp(&b.name)),
            ..Default::default()
        });
        assert_eq!(sorted, "{{foo|a=1|b=2}}");
        // The stored order is untouched by the sorted render.
        assert_eq!(t.args()[0].name, "b");

        let broken = t.render(&RenderOptions { linebreaks: true, ..Default::default() });
        assert_eq!(broken, "{{foo\n|b=2\n|a=1\n}}");
    }

    #[test]
    fn replace_in_by_index() {
        let source = "a {{T|1=x}} b";
        let templates = parse(source);
        let mut t = templates.into_iter().next().expect("one template");
        t.set_arg("1", "y");
        let replaced = t.replace_in(source, &ReplaceOptions::default());
        assert_eq!(replaced, "a {{T|1=y}} b");
    }

    #[test]
    fn replace_in_refuses_stale_offsets() {
        let source = "a {{T|1=x}} b";
        let templates = parse(source);
        let t = &templates[0];
        // An earlier edit shifted everything; the saved span no longer
        // holds the template.
        let shifted = format!("longer prefix {}", source);
        let replaced = t.replace_in(&shifted, &ReplaceOptions::default());
        assert_eq!(replaced, shifted);
    }

    #[test]
    fn replace_in_first_occurrence_without_index() {
        let source = "{{T}} and {{T}}";
        let templates = parse(source);
        let t = &templates[1];
        let options = ReplaceOptions {
            with: Some("{{U}}"),
            use_index: false,
            ..Default::default()
        };
        // Naive mode replaces the first textual occurrence even though
        // this entity was parsed from the second.
        assert_eq!(t.replace_in(source, &options), "{{U}} and {{T}}");
    }

    #[test]
    fn empty_replacement_trims_blank_line() {
        let source = "before\n{{T}}\nafter";
        let templates = parse(source);
        let t = &templates[0];
        let options = ReplaceOptions { with: Some(""), ..Default::default() };
        assert_eq!(t.replace_in(source, &options), "before\nafter");
    }

    #[test]
    fn name_predicate_filters_but_children_survive() {
        let source = "{{Skip|{{Keep}}}}";
        let options = ParseTemplatesConfig {
            name_predicate: Some(Box::new(|clean: &str| clean != "Template:Skip")),
            ..Default::default()
        };
        let templates = parse_with(source, &options);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "Keep");
    }

    #[test]
    fn recursive_predicate_stops_descent() {
        let source = "{{Outer|{{Inner}}}}";
        let options = ParseTemplatesConfig {
            recursive_predicate: Some(Box::new(|t: &Template| t.name() != "Outer")),
            ..Default::default()
        };
        let templates = parse_with(source, &options);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "Outer");
    }

    #[test]
    fn unterminated_template_is_dropped() {
        assert!(parse("{{Foo|bar").is_empty());
    }

    #[test]
    fn multibyte_text_offsets() {
        let source = "前{{テスト|値=あ}}後";
        let templates = parse(source);
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        let (start, end) = t.span().expect("parsed");
        assert_eq!(&source[start..end], t.original_text().expect("parsed"));
        assert_eq!(t.get_arg("値").expect("値 arg").value, "あ");
    }
}
