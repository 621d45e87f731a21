//! Outbound links to the translation platform.
//!
//! Every term gets one link, computed the first time its source is seen. The
//! default builder targets Weblate:
//!
//! ```text
//! {translateUrl}{version}/{context}/{lang}/?checksum={fingerprint}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::config::TranslateModeSettings;
use crate::hash::FingerprintCache;

/// Everything a link may be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRequest<'a> {
    pub source: &'a str,
    pub context: &'a str,
    /// SipHash fingerprint of `source`.
    pub fingerprint: &'a str,
    /// Active locale code, e.g. `fr_BE`.
    pub locale: &'a str,
    /// Version segment, see [`version_segment`].
    pub version: &'a str,
}

/// Builds the reference URL of a term.
pub trait LinkBuilder: fmt::Debug {
    fn build(&self, request: &LinkRequest<'_>) -> String;
}

/// Links into the Weblate instance of the translation platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeblateLinks {
    /// URL prefix, followed directly by the version.
    translate_url: String,
    /// Locale -> Weblate language overrides.
    lang_mapping: BTreeMap<String, String>,
}

impl WeblateLinks {
    #[must_use]
    pub const fn new(translate_url: String, lang_mapping: BTreeMap<String, String>) -> Self {
        Self { translate_url, lang_mapping }
    }

    #[must_use]
    pub fn from_settings(settings: &TranslateModeSettings) -> Self {
        Self::new(settings.translate_url.clone(), settings.lang_mapping.clone())
    }

    /// Weblate language code of `locale`.
    ///
    /// `en_US` is the source language `en`. A numeric region (`es_419`) is dropped.
    /// Otherwise the mapping applies, falling back to the locale itself.
    #[must_use]
    pub fn language<'a>(&'a self, locale: &'a str) -> &'a str {
        if locale == "en_US" {
            return "en";
        }
        let mut parts = locale.split('_');
        let lang = parts.next().unwrap_or(locale);
        let numeric_region = parts
            .next()
            .is_some_and(|region| !region.is_empty() && region.bytes().all(|b| b.is_ascii_digit()));
        if numeric_region {
            return lang;
        }
        self.lang_mapping.get(locale).map_or(locale, String::as_str)
    }
}

impl LinkBuilder for WeblateLinks {
    fn build(&self, request: &LinkRequest<'_>) -> String {
        format!(
            "{}{}/{}/{}/?checksum={}",
            self.translate_url,
            request.version,
            request.context,
            self.language(request.locale),
            request.fingerprint
        )
    }
}

/// Version segment of links, from the server version info.
///
/// `["17.0"]` gives `17.0`. When a second component is present the server runs a
/// SaaS build: `["saas~17.2", "1"]` gives `s17.2-1`.
#[must_use]
pub fn version_segment<S: AsRef<str>>(version_info: &[S]) -> String {
    let Some(first) = version_info.first().map(AsRef::as_ref) else {
        return String::new();
    };
    match version_info.get(1).map(AsRef::as_ref) {
        Some(minor) if !minor.is_empty() => {
            let major = first.rsplit(['~', '-']).next().unwrap_or(first);
            format!("s{major}-{minor}")
        }
        _ => first.to_string(),
    }
}

/// Computes term links for one session.
///
/// Owns the fingerprint cache, so a source term is hashed at most once.
#[derive(Debug)]
pub struct LinkResolver {
    /// Fingerprints computed so far.
    fingerprints: FingerprintCache,
    /// URL format.
    builder: Box<dyn LinkBuilder>,
    /// Active locale.
    locale: String,
    /// Version segment.
    version: String,
}

impl LinkResolver {
    #[must_use]
    pub fn new(
        fingerprints: FingerprintCache,
        builder: Box<dyn LinkBuilder>,
        locale: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self { fingerprints, builder, locale: locale.into(), version: version.into() }
    }

    /// Link of the term `source` displayed under `context`.
    pub fn link(&mut self, source: &str, context: &str) -> String {
        let fingerprint = self.fingerprints.fingerprint(source);
        self.builder.build(&LinkRequest {
            source,
            context,
            fingerprint,
            locale: &self.locale,
            version: &self.version,
        })
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    #[must_use]
    pub const fn fingerprints(&self) -> &FingerprintCache {
        &self.fingerprints
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn weblate() -> WeblateLinks {
        WeblateLinks::from_settings(&TranslateModeSettings::default())
    }

    #[rstest]
    #[case::source_language("en_US", "en")]
    #[case::plain("fr_BE", "fr_BE")]
    #[case::numeric_region("es_419", "es")]
    #[case::mapped_script("sr@latin", "sr_Latn")]
    #[case::mapped_bare("nb", "nb_NO")]
    #[case::unmapped_bare("fr", "fr")]
    fn language_codes(#[case] locale: &str, #[case] expected: &str) {
        assert_that!(weblate().language(locale), eq(expected));
    }

    #[rstest]
    #[case::stable(&["17.0"], "17.0")]
    #[case::saas(&["saas~17.2", "1"], "s17.2-1")]
    #[case::dashed(&["master-18", "3"], "s18-3")]
    #[case::empty_minor(&["17.0", ""], "17.0")]
    #[case::none(&[], "")]
    fn version_segments(#[case] info: &[&str], #[case] expected: &str) {
        assert_that!(version_segment(info), eq(expected));
    }

    #[googletest::test]
    fn weblate_link_format() {
        let link = weblate().build(&LinkRequest {
            source: "Hello",
            context: "web",
            fingerprint: "5b00ad70f6732ba7",
            locale: "fr_BE",
            version: "17.0",
        });

        assert_that!(
            link,
            eq("https://translate.odoo.com/translate/odoo-17.0/web/fr_BE/?checksum=5b00ad70f6732ba7")
        );
    }

    #[googletest::test]
    fn resolver_hashes_each_source_once() {
        let mut resolver = LinkResolver::new(
            FingerprintCache::default(),
            Box::new(weblate()),
            "nb",
            version_segment(&["17.0"]),
        );

        let first = resolver.link("Hello", "web");
        let second = resolver.link("Hello", "mail");
        resolver.link("World", "web");

        expect_that!(first, ends_with("/web/nb_NO/?checksum=5b00ad70f6732ba7"));
        expect_that!(second, ends_with("/mail/nb_NO/?checksum=5b00ad70f6732ba7"));
        expect_that!(resolver.fingerprints().len(), eq(2));
    }
}
