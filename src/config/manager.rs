//! 設定管理を行うモジュール

use std::path::PathBuf;

use super::{
    ConfigError,
    TranslateModeSettings,
    loader,
};

/// 検証済みの設定を保持する
#[derive(Default, Debug, Clone)]
pub struct ConfigManager {
    /// 現在の設定
    current_settings: TranslateModeSettings,

    /// 設定を読み込んだディレクトリ
    config_dir: Option<PathBuf>,
}

impl ConfigManager {
    /// デフォルト設定でマネージャーを作成
    #[must_use]
    pub fn new() -> Self {
        Self { current_settings: TranslateModeSettings::default(), config_dir: None }
    }

    /// 設定を読み込む
    ///
    /// ディレクトリまたは設定ファイルがない場合はデフォルト値を使う。
    /// エラー時は現在の設定を変更しない。
    ///
    /// # Arguments
    /// * `config_dir` - 設定ファイルを置くディレクトリ
    ///
    /// # Errors
    /// - ファイル読み込みエラー
    /// - JSON パースエラー
    /// - バリデーションエラー
    pub fn load_settings(&mut self, config_dir: Option<PathBuf>) -> Result<(), ConfigError> {
        tracing::debug!(dir = ?config_dir, "Loading settings");

        let settings = if let Some(dir) = &config_dir {
            loader::load_from_dir(dir)?.map_or_else(
                || {
                    tracing::warn!(dir = ?dir, "No settings file, using defaults");
                    TranslateModeSettings::default()
                },
                |settings| {
                    tracing::debug!(?settings, "Loaded settings file");
                    settings
                },
            )
        } else {
            TranslateModeSettings::default()
        };

        settings.validate().map_err(ConfigError::ValidationErrors)?;

        self.current_settings = settings;
        self.config_dir = config_dir;
        tracing::debug!(settings = ?self.current_settings, "Settings loaded");

        Ok(())
    }

    /// 設定を検証してから置き換える
    ///
    /// # Errors
    /// `new_settings` が無効な場合は [`ConfigError::ValidationErrors`] を返し、
    /// 現在の設定を維持する
    pub fn update_settings(&mut self, new_settings: TranslateModeSettings) -> Result<(), ConfigError> {
        new_settings.validate().map_err(ConfigError::ValidationErrors)?;

        self.current_settings = new_settings;
        tracing::debug!("Settings updated");

        Ok(())
    }

    /// 現在の設定を取得
    #[must_use]
    pub const fn get_settings(&self) -> &TranslateModeSettings {
        &self.current_settings
    }

    /// 設定を読み込んだディレクトリを取得
    #[must_use]
    pub const fn config_dir(&self) -> Option<&PathBuf> {
        self.config_dir.as_ref()
    }
}
