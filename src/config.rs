use crate::gain_plan::DEFAULT_QUIET_GAIN;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub tts: Option<TtsConfig>,
}

/// マージ設定
///
/// # デフォルト値
///
/// - `volume_control`: true (相槌を自動で小さくする)
/// - `quiet_gain`: 0.65
/// - `max_concurrent_fetches`: 8
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeConfig {
    #[serde(default = "default_volume_control")]
    pub volume_control: bool,
    #[serde(default = "default_quiet_gain")]
    pub quiet_gain: f32,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

/// クリップ取得設定
///
/// # デフォルト値
///
/// - `timeout_seconds`: 30 秒
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `clip_dir`: "./public/audio"
/// - `merged_output_dir`: "./public/audio"
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_audio_dir")]
    pub clip_dir: String,
    #[serde(default = "default_audio_dir")]
    pub merged_output_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// OpenAI 音声合成設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsConfig {
    /// OpenAI API Key
    pub api_key: String,
    /// モデル名（通常 "tts-1"）
    #[serde(default = "default_tts_model")]
    pub model: String,
    /// 話者の声を決められない場合に使う声
    #[serde(default = "default_voice")]
    pub default_voice: String,
    #[serde(default = "default_tts_timeout_seconds")]
    pub timeout_seconds: u64,
}

// Default functions
fn default_volume_control() -> bool {
    true
}

fn default_quiet_gain() -> f32 {
    DEFAULT_QUIET_GAIN
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_audio_dir() -> String {
    "./public/audio".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_tts_timeout_seconds() -> u64 {
    60 // 長い行は生成に時間がかかる
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            volume_control: default_volume_control(),
            quiet_gain: default_quiet_gain(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            clip_dir: default_audio_dir(),
            merged_output_dir: default_audio_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースして検証する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込み、パース、検証のいずれかに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use podcast_merge::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        config.validate()?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }

    /// 値の範囲を検証
    pub fn validate(&self) -> Result<()> {
        let gain = self.merge.quiet_gain;
        if !gain.is_finite() || !(0.0..=1.0).contains(&gain) {
            anyhow::bail!("merge.quiet_gain は 0.0〜1.0 の範囲で指定してください: {}", gain);
        }
        if self.merge.max_concurrent_fetches == 0 {
            anyhow::bail!("merge.max_concurrent_fetches は1以上を指定してください");
        }
        if self.fetch.timeout_seconds == 0 {
            anyhow::bail!("fetch.timeout_seconds は1以上を指定してください");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.merge.volume_control);
        assert_eq!(config.merge.quiet_gain, 0.65);
        assert_eq!(config.merge.max_concurrent_fetches, 8);
        assert_eq!(config.fetch.timeout_seconds, 30);
        assert_eq!(config.output.clip_dir, "./public/audio");
        assert!(config.tts.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::write_default(path).unwrap();

        let config = Config::from_file(path).unwrap();
        assert_eq!(config.merge.quiet_gain, 0.65);
        assert_eq!(config.output.log_level, "info");
    }

    #[test]
    fn test_custom_config() {
        let toml_content = r#"
[merge]
volume_control = false
quiet_gain = 0.5
max_concurrent_fetches = 2

[fetch]
timeout_seconds = 5

[output]
clip_dir = "/tmp/clips"
merged_output_dir = "/tmp/merged"
log_level = "debug"

[tts]
api_key = "sk-test"
model = "tts-1-hd"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert!(!config.merge.volume_control);
        assert_eq!(config.merge.quiet_gain, 0.5);
        assert_eq!(config.merge.max_concurrent_fetches, 2);
        assert_eq!(config.fetch.timeout_seconds, 5);
        assert_eq!(config.output.clip_dir, "/tmp/clips");
        assert_eq!(config.output.merged_output_dir, "/tmp/merged");
        assert_eq!(config.output.log_level, "debug");

        let tts = config.tts.unwrap();
        assert_eq!(tts.api_key, "sk-test");
        assert_eq!(tts.model, "tts-1-hd");
        assert_eq!(tts.default_voice, "alloy");
        assert_eq!(tts.timeout_seconds, 60);
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        assert_eq!(config.merge.quiet_gain, 0.65);
    }

    #[test]
    fn test_partial_config() {
        // 一部の設定のみ記述した場合、残りはデフォルト値が使われる
        let toml_content = r#"
[merge]
quiet_gain = 0.3
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.merge.quiet_gain, 0.3);
        assert!(config.merge.volume_control);
        assert_eq!(config.fetch.timeout_seconds, 30);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for toml_content in [
            "[merge]\nquiet_gain = 1.5\n",
            "[merge]\nmax_concurrent_fetches = 0\n",
            "[fetch]\ntimeout_seconds = 0\n",
        ] {
            let mut temp_file = NamedTempFile::new().unwrap();
            temp_file.write_all(toml_content.as_bytes()).unwrap();
            temp_file.flush().unwrap();
            assert!(Config::from_file(temp_file.path()).is_err(), "{}", toml_content);
        }
    }
}
