//! Small string helpers shared by the parsers. Offsets throughout this
//! crate are byte offsets into UTF-8 text, so every helper here must stay
//! safe on multi-byte characters.

use std::borrow::Cow;
use unicase::UniCase;

/// Uppercases the first character the way MediaWiki capitalizes page
/// titles. Characters without an uppercase mapping (including all of the
/// Japanese scripts) pass through unchanged.
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(s.len());
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Removes `<!-- -->` spans. An unterminated comment swallows the rest of
/// the string, matching how MediaWiki renders one.
pub fn strip_comments(s: &str) -> Cow<'_, str> {
    if !s.contains("<!--") {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find("<!--") {
        out.push_str(&rest[..open]);
        match rest[open + 4..].find("-->") {
            Some(close) => rest = &rest[open + 4 + close + 3..],
            None => return Cow::Owned(out),
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Returns a prefix of at most `max_chars` characters, cut on a character
/// boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    UniCase::new(a) == UniCase::new(b)
}

/// Trims a title fragment and collapses interior whitespace and underscore
/// runs to single spaces, the normalization MediaWiki applies to titles.
pub fn collapse_title_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.trim_matches(|c: char| c.is_whitespace() || c == '_').chars() {
        if c.is_whitespace() || c == '_' {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ucfirst() {
        assert_eq!(ucfirst("foo bar"), "Foo bar");
        assert_eq!(ucfirst("Foo"), "Foo");
        assert_eq!(ucfirst("éclair"), "Éclair");
        assert_eq!(ucfirst("テンプレート"), "テンプレート");
        assert_eq!(ucfirst(""), "");
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("plain"), "plain");
        assert_eq!(strip_comments("a<!-- x -->b"), "ab");
        assert_eq!(strip_comments("a<!-- x -->b<!-- y -->c"), "abc");
        assert_eq!(strip_comments("a<!-- unterminated"), "a");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("あいうえお", 2), "あい");
    }

    #[test]
    fn test_collapse_title_whitespace() {
        assert_eq!(collapse_title_whitespace("  Foo   bar "), "Foo bar");
        assert_eq!(collapse_title_whitespace("Foo_bar"), "Foo bar");
        assert_eq!(collapse_title_whitespace("_ Foo _"), "Foo");
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("NoWiki", "nowiki"));
        assert!(!eq_ignore_case("div", "span"));
    }
}
