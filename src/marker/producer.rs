//! Rendering translated terms, with markers when translate mode is on.

use std::collections::HashMap;

use super::codec::MarkerCodec;

/// Values substituted into a translated template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Substitutions<'a> {
    #[default]
    None,
    /// Replaces each `%s` in order.
    Positional(&'a [&'a str]),
    /// Replaces each `%(name)s`.
    Named(&'a [(&'a str, &'a str)]),
}

/// Applies `substitutions` to `template`.
///
/// Placeholders without a value are left untouched.
#[must_use]
pub fn sprintf(template: &str, substitutions: Substitutions<'_>) -> String {
    match substitutions {
        Substitutions::None => template.to_string(),
        Substitutions::Positional(values) => {
            let mut values = values.iter();
            let mut out = String::with_capacity(template.len());
            let mut rest = template;
            while let Some(at) = rest.find("%s") {
                let (head, tail) = rest.split_at(at);
                out.push_str(head);
                match values.next() {
                    Some(value) => out.push_str(value),
                    None => out.push_str("%s"),
                }
                rest = tail.get(2..).unwrap_or_default();
            }
            out.push_str(rest);
            out
        }
        Substitutions::Named(values) => {
            let mut out = String::with_capacity(template.len());
            let mut rest = template;
            while let Some(at) = rest.find("%(") {
                let (head, tail) = rest.split_at(at);
                out.push_str(head);
                let name_and_rest = tail.get(2..).unwrap_or_default();
                let Some(end) = name_and_rest.find(")s") else {
                    rest = tail;
                    break;
                };
                let (name, after) = name_and_rest.split_at(end);
                match values.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("%(");
                        out.push_str(name);
                        out.push_str(")s");
                    }
                }
                rest = after.get(2..).unwrap_or_default();
            }
            out.push_str(rest);
            out
        }
    }
}

/// Whether the comma separated debug flags enable translate mode.
#[must_use]
pub fn is_translate_mode_enabled(debug: &str) -> bool {
    debug.contains("translate")
}

/// Loaded translations: per context first, then global.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermCatalog {
    /// Context -> source -> translation.
    contextual: HashMap<String, HashMap<String, String>>,
    /// Source -> translation, any context.
    global: HashMap<String, String>,
}

impl TermCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        context: impl Into<String>,
        source: impl Into<String>,
        translation: impl Into<String>,
    ) {
        self.contextual.entry(context.into()).or_default().insert(source.into(), translation.into());
    }

    pub fn insert_global(&mut self, source: impl Into<String>, translation: impl Into<String>) {
        self.global.insert(source.into(), translation.into());
    }

    /// Translation of `source`, preferring the one registered for `context`.
    #[must_use]
    pub fn lookup(&self, context: Option<&str>, source: &str) -> Option<&str> {
        context
            .and_then(|ctx| self.contextual.get(ctx))
            .and_then(|terms| terms.get(source))
            .or_else(|| self.global.get(source))
            .map(String::as_str)
    }
}

/// Renders terms for display.
#[derive(Debug, Clone, Copy)]
pub struct MarkerProducer<'a> {
    /// Known translations.
    catalog: &'a TermCatalog,
    /// Marker encoder.
    codec: MarkerCodec,
    /// Whether translate mode is on.
    enabled: bool,
}

impl<'a> MarkerProducer<'a> {
    #[must_use]
    pub const fn new(catalog: &'a TermCatalog, codec: MarkerCodec, enabled: bool) -> Self {
        Self { catalog, codec, enabled }
    }

    /// Translates `source`, falling back to the source itself.
    ///
    /// In translate mode the result is wrapped in a marker, unless `context` is `None`:
    /// strings rendered without context are never picked up by the scanner.
    #[must_use]
    pub fn translate(
        &self,
        source: &str,
        context: Option<&str>,
        substitutions: Substitutions<'_>,
    ) -> String {
        let found = self.catalog.lookup(context, source);
        let translation = sprintf(found.unwrap_or(source), substitutions);
        match context {
            Some(context) if self.enabled => {
                self.codec.encode(context, found.is_some(), source, &translation)
            }
            _ => translation,
        }
    }
}
