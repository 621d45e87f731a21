//! Settings of the translate mode session.
/// Settings file loader
mod loader;
/// Settings manager
mod manager;
/// Ignore-attribute matcher
mod matcher;
/// Settings types and validation
mod types;

pub use manager::ConfigManager;
pub use matcher::{
    IgnoreMatcher,
    MatcherError,
};
pub use types::{
    ConfigError,
    SETTINGS_FILE_NAME,
    TranslateModeSettings,
    ValidationError,
};
