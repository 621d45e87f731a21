//! Data model of the translations side panel.
//!
//! Rendering is left to the host. This module decides what the panel lists (filtering,
//! categories, hidden entries, target labels) and drives the two actions that leave the
//! overlay: toggling the retention mode and switching the user's language.

use std::collections::HashSet;
use std::future::Future;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::config::TranslateModeSettings;
use crate::session::{
    SessionError,
    TranslateSession,
};
use crate::tree::{
    NodeId,
    Tree,
};
use crate::types::{
    RetentionMode,
    TargetedTranslation,
    TranslationSet,
};

/// Body class set while the panel is open.
pub const BODY_CLASS: &str = "o-body-with-translate-side-panel";

/// Prefix of the placeholder source of terms whose source text was lost.
const MISSING_SOURCE_PREFIX: &str = "MISSING_SOURCE_";

/// Whether the source of `translation` is empty or a `MISSING_SOURCE_<8 digits>`
/// placeholder.
#[must_use]
pub fn is_missing_source(translation: &TargetedTranslation) -> bool {
    let source = translation.source.as_str();
    if source.is_empty() {
        return true;
    }
    source
        .strip_prefix(MISSING_SOURCE_PREFIX)
        .is_some_and(|digits| digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Lowercased and trimmed form of a filter as typed by the user.
#[must_use]
pub fn normalize_filter(filter: &str) -> String {
    filter.trim().to_lowercase()
}

/// Whether `translation` is listed under the normalized `filter`.
///
/// The source is searched unless it is missing, the translation only when the term is
/// translated.
#[must_use]
pub fn matches_filter(filter: &str, translation: &TargetedTranslation) -> bool {
    if filter.is_empty() {
        return true;
    }
    if !is_missing_source(translation) && translation.source.to_lowercase().contains(filter) {
        return true;
    }
    translation.translated && translation.translation.to_lowercase().contains(filter)
}

/// Labels of the positions `translation` is displayed at, joined by ` / `.
///
/// Each label appears once, in target order.
#[must_use]
pub fn format_targets(settings: &TranslateModeSettings, translation: &TargetedTranslation) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for target in &translation.targets {
        let label = settings.label(&target.position);
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels.join(" / ")
}

/// Whether `node` is attached and has a non-empty layout box.
#[must_use]
pub fn is_laid_out(tree: &Tree, node: NodeId) -> bool {
    tree.is_connected(node)
        && tree.element(node).and_then(|el| el.bounds()).is_some_and(|rect| !rect.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryId {
    Untranslated,
    Translated,
}

impl CategoryId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Untranslated => "untranslated",
            Self::Translated => "translated",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Untranslated => "Untranslated",
            Self::Translated => "Translated",
        }
    }
}

/// A non-empty group of listed translations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelCategory<'a> {
    pub id: CategoryId,
    pub translations: Vec<&'a TargetedTranslation>,
}

/// State of the side panel between two renders.
#[derive(Debug, Clone)]
pub struct SidePanel {
    /// Filter as typed.
    filter: String,
    /// Mirrors the session mode.
    mode: RetentionMode,
    /// Sources of the listed translations with no visible target, as of the last
    /// [`Self::categories`] call.
    hidden: HashSet<String>,
    /// Language selection.
    languages: LanguagePicker,
}

impl SidePanel {
    #[must_use]
    pub fn new(mode: RetentionMode, current_lang: impl Into<String>) -> Self {
        Self {
            filter: String::new(),
            mode,
            hidden: HashSet::new(),
            languages: LanguagePicker::new(current_lang),
        }
    }

    /// Opens the panel over `session`.
    ///
    /// # Errors
    /// - The session has not been started or its document has no body
    pub fn open(session: &mut TranslateSession, current_lang: impl Into<String>) -> Result<Self, SessionError> {
        session.set_body_class(BODY_CLASS, true)?;
        Ok(Self::new(session.mode(), current_lang))
    }

    /// Removes the body class set by [`Self::open`].
    ///
    /// # Errors
    /// - The session has not been started or its document has no body
    pub fn close(self, session: &mut TranslateSession) -> Result<(), SessionError> {
        session.set_body_class(BODY_CLASS, false)?;
        Ok(())
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Listed translations, untranslated first. Empty categories are left out.
    ///
    /// Recomputes the hidden set with `is_visible`.
    pub fn categories<'a>(
        &mut self,
        translations: &'a TranslationSet,
        is_visible: impl Fn(NodeId) -> bool,
    ) -> Vec<PanelCategory<'a>> {
        let filter = normalize_filter(&self.filter);
        self.hidden.clear();
        let mut untranslated = Vec::new();
        let mut translated = Vec::new();
        for translation in translations.iter().filter(|t| matches_filter(&filter, t)) {
            if !translation.targets.iter().any(|target| is_visible(target.node)) {
                self.hidden.insert(translation.source.clone());
            }
            if translation.translated {
                translated.push(translation);
            } else {
                untranslated.push(translation);
            }
        }

        [(CategoryId::Untranslated, untranslated), (CategoryId::Translated, translated)]
            .into_iter()
            .filter(|(_, translations)| !translations.is_empty())
            .map(|(id, translations)| PanelCategory { id, translations })
            .collect()
    }

    /// Whether the listed term `source` had no visible target at the last render.
    #[must_use]
    pub fn is_hidden(&self, source: &str) -> bool {
        self.hidden.contains(source)
    }

    #[must_use]
    pub const fn mode(&self) -> RetentionMode {
        self.mode
    }

    /// Flips the retention mode and forwards it to `session`.
    pub fn switch_mode(&mut self, session: &mut TranslateSession) -> RetentionMode {
        self.mode = self.mode.toggled();
        session.set_mode(self.mode);
        self.mode
    }

    /// A click on a card points at the term, adding to the current pointers with Ctrl.
    pub fn on_card_click(
        session: &mut TranslateSession,
        translation: &TargetedTranslation,
        ctrl_key: bool,
    ) -> usize {
        tracing::debug!(source = %translation.source, context = %translation.context, "Card clicked");
        session.highlight_translation(&translation.source, ctrl_key)
    }

    #[must_use]
    pub const fn languages(&self) -> &LanguagePicker {
        &self.languages
    }

    pub const fn languages_mut(&mut self) -> &mut LanguagePicker {
        &mut self.languages
    }
}

/// A language installed on the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageRecord {
    pub id: i64,
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub flag_image_url: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Language request failed: {0}")]
    Request(String),

    #[error("Unknown language '{0}'")]
    UnknownLanguage(String),
}

/// Server side of the language picker.
pub trait LanguageBackend {
    /// Installed languages.
    fn fetch_languages(&self) -> impl Future<Output = Result<Vec<LanguageRecord>, BackendError>> + Send;

    /// Stores `code` as the current user's language.
    fn write_user_language(&self, code: &str) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Flag image path of a country code.
#[must_use]
pub fn flag_url(country: &str) -> String {
    format!("/base/static/img/country_flags/{country}.png")
}

/// Language currently in use and the one picked in the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePicker {
    /// Language of the running session.
    current: String,
    /// Language picked in the panel.
    selected: String,
    /// A placeholder until [`Self::load`] completes.
    languages: Vec<LanguageRecord>,
    /// `(image, name)` of the current language.
    current_flag: (String, String),
}

impl LanguagePicker {
    /// Language the source terms are written in.
    pub const DEFAULT_LANG: &'static str = "en_US";

    #[must_use]
    pub fn new(current: impl Into<String>) -> Self {
        let current = current.into();
        Self {
            selected: current.clone(),
            languages: vec![LanguageRecord {
                id: -1,
                code: current.clone(),
                display_name: "loading...".to_string(),
                flag_image_url: String::new(),
            }],
            current_flag: (String::new(), current.clone()),
            current,
        }
    }

    /// `(image, name)` of [`Self::DEFAULT_LANG`].
    #[must_use]
    pub fn default_flag() -> (String, String) {
        (flag_url("us"), "English (US)".to_string())
    }

    /// Fetches the installed languages and applies them.
    ///
    /// # Errors
    /// - The backend request fails
    pub async fn load(&mut self, backend: &impl LanguageBackend) -> Result<(), BackendError> {
        let records = backend.fetch_languages().await?;
        tracing::debug!(count = records.len(), "Fetched languages");
        self.apply_languages(records);
        Ok(())
    }

    /// Replaces the listed languages and refreshes the current flag.
    pub fn apply_languages(&mut self, records: Vec<LanguageRecord>) {
        if let Some(current) = records.iter().find(|record| record.code == self.current) {
            self.current_flag = (current.flag_image_url.clone(), current.display_name.clone());
        }
        self.languages = records;
    }

    /// Picks `code`. Returns `false`, leaving the selection unchanged, if it is not
    /// listed.
    pub fn select(&mut self, code: &str) -> bool {
        if !self.languages.iter().any(|record| record.code == code) {
            return false;
        }
        code.clone_into(&mut self.selected);
        true
    }

    /// Persists the selection. The host reloads afterwards.
    ///
    /// # Errors
    /// - The selection is not a listed language
    /// - The backend request fails
    pub async fn update_language(&self, backend: &impl LanguageBackend) -> Result<(), BackendError> {
        if !self.languages.iter().any(|record| record.code == self.selected) {
            return Err(BackendError::UnknownLanguage(self.selected.clone()));
        }
        backend.write_user_language(&self.selected).await?;
        tracing::info!(lang = %self.selected, "User language updated");
        Ok(())
    }

    /// Language of the running session.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Language persisted by [`Self::update_language`].
    #[must_use]
    pub fn selected(&self) -> &str {
        &self.selected
    }

    #[must_use]
    pub fn languages(&self) -> &[LanguageRecord] {
        &self.languages
    }

    #[must_use]
    pub const fn current_flag(&self) -> &(String, String) {
        &self.current_flag
    }
}
