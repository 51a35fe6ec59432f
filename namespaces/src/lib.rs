use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::str::FromStr;

/// The core MediaWiki namespaces plus the Scribunto module namespaces.
/// Negative virtual namespaces (Media, Special) cannot hold pages and are
/// not represented.
#[derive(Copy, Clone, Eq, Debug, Hash, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Namespace {
    Main          =   0,
    Talk          =   1,
    User          =   2,
    UserTalk      =   3,
    Project       =   4,
    ProjectTalk   =   5,
    File          =   6,
    FileTalk      =   7,
    MediaWiki     =   8,
    MediaWikiTalk =   9,
    Template      =  10,
    TemplateTalk  =  11,
    Help          =  12,
    HelpTalk      =  13,
    Category      =  14,
    CategoryTalk  =  15,
    Module        = 828,
    ModuleTalk    = 829,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Main          => "",
            Namespace::Talk          => "Talk",
            Namespace::User          => "User",
            Namespace::UserTalk      => "User talk",
            Namespace::Project       => "Project",
            Namespace::ProjectTalk   => "Project talk",
            Namespace::File          => "File",
            Namespace::FileTalk      => "File talk",
            Namespace::MediaWiki     => "MediaWiki",
            Namespace::MediaWikiTalk => "MediaWiki talk",
            Namespace::Template      => "Template",
            Namespace::TemplateTalk  => "Template talk",
            Namespace::Help          => "Help",
            Namespace::HelpTalk      => "Help talk",
            Namespace::Category      => "Category",
            Namespace::CategoryTalk  => "Category talk",
            Namespace::Module        => "Module",
            Namespace::ModuleTalk    => "Module talk",
        }
    }

    /// Canonical title prefix, `"Template:"` style. Empty for the main
    /// namespace, whose titles carry no prefix.
    pub fn canonical_prefix(&self) -> String {
        match self {
            Namespace::Main => String::new(),
            other => {
                let mut prefix = other.as_str().to_string();
                prefix.push(':');
                prefix
            }
        }
    }

    /// Resolves a namespace name or alias as it appears in a page title,
    /// ignoring case and treating underscores as spaces.
    pub fn resolve_alias(alias: &str) -> Option<Namespace> {
        let normalized = normalize_name(alias);
        let namespace = match normalized.as_str() {
            "" | "main" => Namespace::Main,
            "talk" => Namespace::Talk,
            "user" => Namespace::User,
            "user talk" => Namespace::UserTalk,
            "project" | "wikipedia" | "wp" => Namespace::Project,
            "project talk" | "wikipedia talk" | "wt" => Namespace::ProjectTalk,
            "file" | "image" => Namespace::File,
            "file talk" | "image talk" => Namespace::FileTalk,
            "mediawiki" => Namespace::MediaWiki,
            "mediawiki talk" => Namespace::MediaWikiTalk,
            "template" => Namespace::Template,
            "template talk" => Namespace::TemplateTalk,
            "help" => Namespace::Help,
            "help talk" => Namespace::HelpTalk,
            "category" => Namespace::Category,
            "category talk" => Namespace::CategoryTalk,
            "module" => Namespace::Module,
            "module talk" => Namespace::ModuleTalk,
            _ => return None,
        };
        Some(namespace)
    }
}

// Lowercases and maps whitespace and underscore runs to single spaces.
// In titles, underscores count as whitespace.
fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.trim_matches(|c: char| c.is_whitespace() || c == '_').chars() {
        if c.is_whitespace() || c == '_' {
            pending_space = true;
        } else {
            if pending_space {
                normalized.push(' ');
                pending_space = false;
            }
            normalized.extend(c.to_lowercase());
        }
    }
    normalized
}

impl FromStr for Namespace {
    type Err = &'static str;

    fn from_str(namespace_name: &str) -> Result<Self, Self::Err> {
        Namespace::resolve_alias(namespace_name).ok_or("invalid namespace name")
    }
}

#[cfg(test)]
mod tests {
    use super::Namespace;
    use std::convert::TryFrom;
    use std::str::FromStr;

    #[test]
    fn namespace_from_str() {
        assert_eq!(Namespace::from_str("template talk"), Ok(Namespace::TemplateTalk));
        assert_eq!(Namespace::from_str("Template talk"), Ok(Namespace::TemplateTalk));
        assert_eq!(Namespace::from_str("Template_talk"), Ok(Namespace::TemplateTalk));
        assert_eq!(Namespace::from_str("image"), Ok(Namespace::File));
        assert_eq!(Namespace::from_str("nonsense"), Err("invalid namespace name"));
    }

    #[test]
    fn namespace_prefix() {
        assert_eq!(Namespace::Main.canonical_prefix(), "");
        assert_eq!(Namespace::Template.canonical_prefix(), "Template:");
        assert_eq!(Namespace::UserTalk.canonical_prefix(), "User talk:");
    }

    #[test]
    fn namespace_numbers() {
        assert_eq!(Namespace::try_from(10), Ok(Namespace::Template));
        assert_eq!(Namespace::try_from(829), Ok(Namespace::ModuleTalk));
        assert!(Namespace::try_from(1000).is_err());

        assert_eq!(u32::from(Namespace::Template), 10);
        assert_eq!(u32::from(Namespace::Module), 828);
    }

    #[test]
    fn alias_normalization() {
        assert_eq!(Namespace::resolve_alias("  User_talk "), Some(Namespace::UserTalk));
        assert_eq!(Namespace::resolve_alias("WP"), Some(Namespace::Project));
        assert_eq!(Namespace::resolve_alias(""), Some(Namespace::Main));
    }
}
