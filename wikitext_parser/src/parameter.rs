//! Scanner for `{{{parameter}}}` placeholders.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tag::Tag;
use crate::textutil;
use crate::ParserConfig;

/// One `{{{...}}}` placeholder. `start..end` is a byte range into the
/// source and `text` the verbatim slice at that range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Depth of containment within other parameters, 0 for top level.
    pub nest_level: usize,
}

// The shortest-match form. Nested defaults make the trailing brace run
// longer than three; see the repair loop below.
static PARAMETER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\{[^{][^}]*\}\}\}").unwrap());

/// Scans `source` for parameter placeholders.
///
/// Candidates that fall entirely inside a transclusion-preventing tag are
/// not parameters. With `recursive` set, placeholders nested in another
/// placeholder's default value are also returned, at increasing
/// `nest_level`; otherwise only top-level entries are kept.
pub fn parse_parameters(
    source: &str,
    tags: &[Tag],
    config: &ParserConfig,
    recursive: bool,
) -> Vec<Parameter> {
    let exclusions: Vec<(usize, usize)> = tags
        .iter()
        .filter(|t| config.is_transclusion_preventing(&t.name))
        .map(|t| (t.start, t.end))
        .collect();
    let mut parameters: Vec<Parameter> = Vec::new();
    let mut pos = 0;
    while let Some(found) = PARAMETER.find_at(source, pos) {
        let start = found.start();
        let mut end = found.end();
        let left = found.as_str().matches('{').count();
        let mut right = found.as_str().matches('}').count();
        // A match that undercounts closing braces is widened over the
        // brace run that follows it until the counts agree.
        while left > right && source[end..].starts_with('}') {
            end += 1;
            right += 1;
        }
        if left > right {
            warn!(
                "dropping unbalanced parameter candidate {:?} at byte {}",
                textutil::truncate_chars(found.as_str(), 40),
                start
            );
            pos = end;
            continue;
        }
        if exclusions.iter().any(|&(s, e)| s <= start && end <= e) {
            pos = end;
            continue;
        }
        let nest_level = parameters
            .iter()
            .filter(|p| p.start < start && end <= p.end)
            .count();
        parameters.push(Parameter {
            text: source[start..end].to_string(),
            start,
            end,
            nest_level,
        });
        // Step inside the match so placeholders in the default value are
        // found too.
        pos = start + 3;
    }
    if !recursive {
        parameters.retain(|p| p.nest_level == 0);
    }
    parameters
}
