use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::hash::{
    HashError,
    KEY_LENGTH,
    SipKey,
    WEBLATE_SIPHASH_KEY,
};
use crate::marker::{
    MarkerCodec,
    SourceEscaping,
};
use crate::types::{
    Position,
    RetentionMode,
};

/// File name looked up by [`super::ConfigManager::load_settings`].
pub const SETTINGS_FILE_NAME: &str = ".translate-mode.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "ignoreAttributes[0]")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// One numbered line per error.
fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateModeSettings {
    /// Key of the term fingerprint. Must be exactly 16 bytes.
    pub hash_key: String,

    /// Prefix of the outbound translation links.
    pub translate_url: String,

    /// Locale codes whose Weblate language code differs.
    pub lang_mapping: BTreeMap<String, String>,

    /// Locale in which UI strings are their own source.
    ///
    /// Highlighting is pointless there, so targets are not tracked.
    pub source_locale: String,

    /// Glob patterns over attribute names.
    ///
    /// An element carrying a matching attribute is skipped along with its subtree.
    pub ignore_attributes: Vec<String>,

    pub attribute_labels: BTreeMap<String, String>,
    pub property_labels: BTreeMap<String, String>,

    pub source_escaping: SourceEscaping,

    /// Retention mode when a session starts.
    pub default_mode: RetentionMode,
}

impl TranslateModeSettings {
    /// # Errors
    /// - Hash key is not 16 bytes long
    /// - Required field is empty
    /// - Invalid glob pattern
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.hash_key.len() != KEY_LENGTH {
            errors.push(ValidationError::new(
                "hashKey",
                format!(
                    "The key must be exactly {KEY_LENGTH} bytes long, got {}",
                    self.hash_key.len()
                ),
            ));
        }

        if self.translate_url.is_empty() {
            errors.push(ValidationError::new(
                "translateUrl",
                "The URL cannot be empty. Example: \"https://translate.odoo.com/translate/odoo-\"",
            ));
        }

        if self.source_locale.is_empty() {
            errors.push(ValidationError::new(
                "sourceLocale",
                "The locale cannot be empty. Example: \"en_US\"",
            ));
        }

        for (locale, lang) in &self.lang_mapping {
            if locale.is_empty() || lang.is_empty() {
                errors.push(ValidationError::new(
                    format!("langMapping.{locale}"),
                    "Both the locale and the Weblate language must be non-empty",
                ));
            }
        }

        for (index, pattern) in self.ignore_attributes.iter().enumerate() {
            if let Err(e) = globset::Glob::new(pattern) {
                errors.push(ValidationError::new(
                    format!("ignoreAttributes[{index}]"),
                    format!("Invalid glob pattern '{pattern}': {e}"),
                ));
            }
        }

        if let SourceEscaping::Doubled(c) = self.source_escaping
            && c == '}'
        {
            errors.push(ValidationError::new(
                "sourceEscaping.doubled",
                "'}' terminates the source segment and cannot be used as escape character",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Fingerprint key built from [`Self::hash_key`].
    ///
    /// # Errors
    /// - Hash key is not 16 bytes long
    pub fn sip_key(&self) -> Result<SipKey, HashError> {
        SipKey::new(self.hash_key.as_bytes())
    }

    #[must_use]
    pub const fn codec(&self) -> MarkerCodec {
        MarkerCodec::new(self.source_escaping)
    }

    /// Whether targets are tracked for `locale`.
    #[must_use]
    pub fn highlights_enabled(&self, locale: &str) -> bool {
        locale != self.source_locale
    }

    /// Human label of a position, or the position itself when none is configured.
    #[must_use]
    pub fn label<'a>(&'a self, position: &'a Position) -> &'a str {
        let labels = match position {
            Position::Property(_) => &self.property_labels,
            Position::Attribute(_) => &self.attribute_labels,
        };
        labels.get(position.as_str()).map_or_else(|| position.as_str(), String::as_str)
    }
}

/// Owned `BTreeMap` from string pairs.
fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

impl Default for TranslateModeSettings {
    fn default() -> Self {
        Self {
            hash_key: WEBLATE_SIPHASH_KEY.to_string(),
            translate_url: "https://translate.odoo.com/translate/odoo-".to_string(),
            lang_mapping: string_map(&[
                ("ku", "ckb"),
                ("sr@latin", "sr_Latn"),
                ("nb", "nb_NO"),
                ("tl", "fil"),
            ]),
            source_locale: "en_US".to_string(),
            ignore_attributes: vec!["data-translation-highlight".to_string()],
            attribute_labels: string_map(&[
                ("aria-label", "Aria label"),
                ("aria-placeholder", "Aria placeholder"),
                ("aria-roledescription", "Aria role description"),
                ("aria-valuetext", "Aria value text"),
                ("data-tooltip-info", "Tooltip info data"),
                ("data-tooltip", "Tooltip data"),
                ("o-we-hint-text", "Web editor text hint"),
                ("alt", "Alternate text"),
                ("label", "Label"),
                ("name", "Name"),
                ("placeholder", "Placeholder"),
                ("searchabletext", "Searchable text"),
                ("title", "Title"),
            ]),
            property_labels: string_map(&[("textContent", "Text"), ("value", "Value")]),
            source_escaping: SourceEscaping::None,
            default_mode: RetentionMode::Discard,
        }
    }
}
