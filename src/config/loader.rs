//! 設定ファイルの読み込み関数

use std::path::Path;

use super::{
    ConfigError,
    SETTINGS_FILE_NAME,
    TranslateModeSettings,
};

/// ディレクトリから設定を読み込む
///
/// `.translate-mode.json` ファイルを探して読み込む
///
/// # Arguments
/// * `dir` - 設定ファイルを置くディレクトリ
///
/// # Returns
/// - `Ok(Some(settings))`: 設定ファイルが見つかり、読み込みに成功
/// - `Ok(None)`: 設定ファイルが見つからない
///
/// # Errors
/// - ファイル読み込みエラー
/// - JSON パースエラー
pub(super) fn load_from_dir(dir: &Path) -> Result<Option<TranslateModeSettings>, ConfigError> {
    let config_path = dir.join(SETTINGS_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = ?config_path, "Settings file not found");
        return Ok(None);
    }

    tracing::debug!(path = ?config_path, "Loading settings");

    let content = std::fs::read_to_string(&config_path)?;
    let settings: TranslateModeSettings = serde_json::from_str(&content)?;

    Ok(Some(settings))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use googletest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    fn load_from_dir_with_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SETTINGS_FILE_NAME), r#"{"sourceLocale": "fr_FR"}"#)
            .unwrap();

        let settings = load_from_dir(temp_dir.path()).unwrap();

        assert_that!(settings.map(|s| s.source_locale), some(eq("fr_FR")));
    }

    #[rstest]
    fn load_from_dir_no_config_file() {
        let temp_dir = TempDir::new().unwrap();

        assert_that!(load_from_dir(temp_dir.path()).unwrap(), none());
    }

    #[rstest]
    fn load_from_dir_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SETTINGS_FILE_NAME), "invalid json").unwrap();

        assert_that!(
            load_from_dir(temp_dir.path()),
            err(displays_as(starts_with("Failed to parse configuration")))
        );
    }
}
