//! Attribute name matcher for ignored subtrees.

use globset::{
    Glob,
    GlobSet,
    GlobSetBuilder,
};

use super::TranslateModeSettings;

#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Invalid ignore attribute pattern '{pattern}': {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to build glob set: {0}")]
    GlobSetBuild(#[from] globset::Error),
}

/// Matches attribute names against `ignoreAttributes`.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    /// Compiled patterns.
    ignore_set: GlobSet,
}

impl IgnoreMatcher {
    pub fn new(settings: &TranslateModeSettings) -> Result<Self, MatcherError> {
        Self::from_patterns(&settings.ignore_attributes)
    }

    pub fn from_patterns(patterns: &[String]) -> Result<Self, MatcherError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| MatcherError::InvalidIgnorePattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        Ok(Self { ignore_set: builder.build()? })
    }

    /// Returns true if `attribute` opts its element out of scanning.
    #[must_use]
    pub fn is_ignored(&self, attribute: &str) -> bool {
        self.ignore_set.is_match(attribute)
    }

    /// Returns true if any of `attributes` opts its element out of scanning.
    pub fn any_ignored<'a>(&self, mut attributes: impl Iterator<Item = &'a str>) -> bool {
        !self.ignore_set.is_empty() && attributes.any(|name| self.is_ignored(name))
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self { ignore_set: GlobSet::empty() }
    }
}
