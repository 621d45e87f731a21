//! Embedded translation markers.
//!
//! A translated string rendered in translate mode carries its own metadata:
//!
//! ```text
//! _(CONTEXT,FLAG{SOURCE}[TRANSLATION])
//! ```
//!
//! `FLAG` is `1` when a translation exists for the active language. `TRANSLATION` is
//! the displayed text and may itself contain markers, e.g. when a translated value is
//! substituted into another translated string.

/// Decoding and encoding
mod codec;
/// Rendering terms for display
mod producer;

pub use codec::{
    Decoded,
    MarkerCodec,
    SourceEscaping,
    decode,
    encode,
};
pub use producer::{
    MarkerProducer,
    Substitutions,
    TermCatalog,
    is_translate_mode_enabled,
    sprintf,
};
