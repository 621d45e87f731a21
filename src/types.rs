//! Core types used throughout the project.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::tree::NodeId;

/// One decoded translation marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Translation context (module name).
    pub context: String,
    /// Whether a translation exists for the active language.
    pub translated: bool,
    /// Source term, the unique key of a translation unit.
    pub source: String,
    /// Rendered text, substitutions applied.
    pub translation: String,
}

impl MarkerRecord {
    #[must_use]
    pub fn new(
        context: impl Into<String>,
        translated: bool,
        source: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            translated,
            source: source.into(),
            translation: translation.into(),
        }
    }
}

/// Node properties whose string value may carry markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    /// Rendered text of a node.
    TextContent,
    /// Current value of a form control.
    Value,
}

impl Property {
    /// Every translatable property, in scan order.
    pub const ALL: [Self; 2] = [Self::TextContent, Self::Value];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextContent => "textContent",
            Self::Value => "value",
        }
    }
}

/// Where on an element a term is displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Property(Property),
    Attribute(String),
}

impl Position {
    /// Name used for labels and serialisation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Property(property) => property.as_str(),
            Self::Attribute(name) => name,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Property> for Position {
    fn from(property: Property) -> Self {
        Self::Property(property)
    }
}

/// An element showing a term, and where on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub node: NodeId,
    pub position: Position,
}

impl Target {
    #[must_use]
    pub fn new(node: NodeId, position: impl Into<Position>) -> Self {
        Self { node, position: position.into() }
    }
}

/// Aggregated view of one source term across the displayed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedTranslation {
    pub context: String,
    pub translated: bool,
    pub source: String,
    pub translation: String,
    /// Link to the term on the translation platform.
    pub link: String,
    /// Insertion ordered, without duplicates.
    pub targets: Vec<Target>,
}

impl TargetedTranslation {
    /// Creates an entry without targets from the first record seen for a term.
    #[must_use]
    pub fn from_record(record: &MarkerRecord, link: String) -> Self {
        Self {
            context: record.context.clone(),
            translated: record.translated,
            source: record.source.clone(),
            translation: record.translation.clone(),
            link,
            targets: Vec::new(),
        }
    }

    /// Appends `target` unless the exact pair is already present.
    pub fn add_target(&mut self, target: Target) -> bool {
        if self.targets.contains(&target) {
            return false;
        }
        self.targets.push(target);
        true
    }

    /// Keeps only the targets whose element satisfies `is_live`.
    pub fn retain_targets(&mut self, mut is_live: impl FnMut(NodeId) -> bool) {
        self.targets.retain(|target| is_live(target.node));
    }
}

/// Translations keyed by source term, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationSet {
    /// Entries in display order.
    entries: Vec<TargetedTranslation>,
    /// Source term -> position in `entries`.
    index: HashMap<String, usize>,
}

impl TranslationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.index.contains_key(source)
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<&TargetedTranslation> {
        self.index.get(source).and_then(|&i| self.entries.get(i))
    }

    pub fn get_mut(&mut self, source: &str) -> Option<&mut TargetedTranslation> {
        self.index.get(source).and_then(|&i| self.entries.get_mut(i))
    }

    /// Returns the entry for `record.source`, creating it with `link` if absent.
    ///
    /// `link` is only called when the term is new.
    pub fn entry_or_insert_with(
        &mut self,
        record: &MarkerRecord,
        link: impl FnOnce() -> String,
    ) -> &mut TargetedTranslation {
        let i = match self.index.get(&record.source) {
            Some(&i) => i,
            None => {
                self.push_new(TargetedTranslation::from_record(record, link()));
                self.entries.len() - 1
            }
        };
        // `i` always indexes a live entry.
        #[allow(clippy::indexing_slicing)]
        &mut self.entries[i]
    }

    /// Inserts `translation`, replacing an entry with the same source in place.
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, translation: TargetedTranslation) -> Option<TargetedTranslation> {
        if let Some(existing) = self.get_mut(&translation.source) {
            return Some(std::mem::replace(existing, translation));
        }
        self.push_new(translation);
        None
    }

    /// Removes the entry for `source`, keeping the order of the others.
    pub fn remove(&mut self, source: &str) -> Option<TargetedTranslation> {
        let i = self.index.remove(source)?;
        if i >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(i);
        self.reindex_from(i);
        Some(removed)
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut TargetedTranslation) -> bool) {
        self.entries.retain_mut(|entry| keep(entry));
        self.index.clear();
        self.reindex_from(0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TargetedTranslation> {
        self.entries.iter()
    }

    /// Source terms in display order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.source.as_str())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[TargetedTranslation] {
        &self.entries
    }

    /// Splits entries by translated flag, keeping relative order.
    #[must_use]
    pub fn categories(&self) -> TranslationCategories<'_> {
        let (translated, untranslated) = self.entries.iter().partition(|entry| entry.translated);
        TranslationCategories { translated, untranslated }
    }

    /// Appends an entry whose source is not indexed yet.
    fn push_new(&mut self, translation: TargetedTranslation) {
        self.index.insert(translation.source.clone(), self.entries.len());
        self.entries.push(translation);
    }

    /// Rebuilds index entries for `entries[start..]`.
    fn reindex_from(&mut self, start: usize) {
        for (i, entry) in self.entries.iter().enumerate().skip(start) {
            self.index.insert(entry.source.clone(), i);
        }
    }
}

impl<'a> IntoIterator for &'a TranslationSet {
    type Item = &'a TargetedTranslation;
    type IntoIter = std::slice::Iter<'a, TargetedTranslation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for TranslationSet {
    type Item = TargetedTranslation;
    type IntoIter = std::vec::IntoIter<TargetedTranslation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<TargetedTranslation> for TranslationSet {
    fn from_iter<I: IntoIterator<Item = TargetedTranslation>>(iter: I) -> Self {
        let mut set = Self::new();
        for translation in iter {
            set.insert(translation);
        }
        set
    }
}

impl Serialize for TranslationSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Translated and untranslated entries of a [`TranslationSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationCategories<'a> {
    pub translated: Vec<&'a TargetedTranslation>,
    pub untranslated: Vec<&'a TargetedTranslation>,
}

/// What happens to terms that are no longer displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Drop terms once none of their elements is attached anymore.
    #[default]
    Discard,
    /// Keep every term ever seen.
    Keep,
}

impl RetentionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discard => "discard",
            Self::Keep => "keep",
        }
    }

    /// The other mode.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Discard => Self::Keep,
            Self::Keep => Self::Discard,
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown retention mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown retention mode '{0}', expected \"discard\" or \"keep\"")]
pub struct ParseRetentionModeError(pub String);

impl FromStr for RetentionMode {
    type Err = ParseRetentionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discard" => Ok(Self::Discard),
            "keep" => Ok(Self::Keep),
            other => Err(ParseRetentionModeError(other.to_string())),
        }
    }
}
