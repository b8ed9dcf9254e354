use std::fmt;

use super::size::{SizeClassifier, SizeTier};
use crate::github::{AuthorAssociation, LabelSpec};

/// Prefix of every scope label.
pub const SCOPE_PREFIX: &str = "category/";

const SCOPE_COLOR: &str = "bfd4f2";
const BREAKING_CHANGE: &str = "BreakingChange";
const COMMUNITY: &str = "Community";

/// Which catalog a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelCategory {
    Type,
    Scope,
    Size,
    Breaking,
    Community,
}

impl fmt::Display for LabelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Type => "type",
            Self::Scope => "scope",
            Self::Size => "size",
            Self::Breaking => "breaking",
            Self::Community => "community",
        };
        f.write_str(name)
    }
}

/// A label the bot may want attached, with the definition used to create it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTarget {
    pub category: LabelCategory,
    pub name: String,
    pub color: String,
}

impl LabelTarget {
    fn new(category: LabelCategory, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            color: color.into(),
        }
    }

    /// Definition sent when the label has to be created.
    #[must_use]
    pub fn spec(&self) -> LabelSpec {
        LabelSpec {
            name: self.name.clone(),
            color: self.color.clone(),
            description: None,
        }
    }
}

/// One entry of the commit-type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub color: &'static str,
}

/// Immutable label catalogs, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    types: Vec<TypeEntry>,
    sizes: SizeClassifier,
    community_associations: Vec<AuthorAssociation>,
}

impl Taxonomy {
    #[must_use]
    pub fn standard() -> Self {
        let types = [
            ("feat", "Feature", "a2eeef"),
            ("fix", "Fix", "d73a4a"),
            ("refactor", "Refactor", "1d76db"),
            ("docs", "Docs", "0075ca"),
            ("chore", "Chore", "fef2c0"),
            ("style", "Style", "c5def5"),
            ("perf", "Perf", "5319e7"),
            ("test", "Test", "0e8a16"),
            ("ci", "CI", "ededed"),
        ]
        .into_iter()
        .map(|(code, name, color)| TypeEntry { code, name, color })
        .collect();

        Self {
            types,
            sizes: SizeClassifier::standard(),
            community_associations: vec![AuthorAssociation::None, AuthorAssociation::Contributor],
        }
    }

    /// Label for a commit type code, `None` for codes outside the catalog.
    #[must_use]
    pub fn type_label(&self, code: &str) -> Option<LabelTarget> {
        self.types
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| LabelTarget::new(LabelCategory::Type, entry.name, entry.color))
    }

    /// `category/<scope>`; a caller-supplied `category/` prefix is not doubled.
    #[must_use]
    pub fn scope_label(&self, scope: &str) -> LabelTarget {
        let scope = scope.strip_prefix(SCOPE_PREFIX).unwrap_or(scope);
        LabelTarget::new(
            LabelCategory::Scope,
            format!("{SCOPE_PREFIX}{scope}"),
            SCOPE_COLOR,
        )
    }

    #[must_use]
    pub fn size_label(&self, tier: SizeTier) -> LabelTarget {
        LabelTarget::new(
            LabelCategory::Size,
            format!("size/{}", tier.as_str()),
            self.sizes.color(tier),
        )
    }

    #[must_use]
    pub fn breaking_change(&self) -> LabelTarget {
        LabelTarget::new(LabelCategory::Breaking, BREAKING_CHANGE, "ff0000")
    }

    #[must_use]
    pub fn community(&self) -> LabelTarget {
        LabelTarget::new(LabelCategory::Community, COMMUNITY, "fbca04")
    }

    /// Whether an author with this association gets the community label.
    #[must_use]
    pub fn is_community_association(&self, association: &AuthorAssociation) -> bool {
        self.community_associations.contains(association)
    }

    #[must_use]
    pub fn sizes(&self) -> &SizeClassifier {
        &self.sizes
    }

    /// Catalog a live label name belongs to, `None` for labels we never set.
    #[must_use]
    pub fn category_of(&self, name: &str) -> Option<LabelCategory> {
        if name.starts_with(SCOPE_PREFIX) {
            return Some(LabelCategory::Scope);
        }
        self.fixed_labels()
            .find(|label| label.name == name)
            .map(|label| label.category)
    }

    /// Every fixed label the catalogs can produce (scope labels excluded).
    pub fn fixed_labels(&self) -> impl Iterator<Item = LabelTarget> + '_ {
        self.types
            .iter()
            .map(|entry| LabelTarget::new(LabelCategory::Type, entry.name, entry.color))
            .chain(SizeTier::ALL.into_iter().map(|tier| self.size_label(tier)))
            .chain([self.breaking_change(), self.community()])
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}
