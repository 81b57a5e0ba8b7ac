use crate::clip_store::{clip_file_names, ClipStore};
use crate::config::TtsConfig;
use crate::types::{Gender, Speaker, Transcript};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// OpenAI の音声合成で使える声
pub const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// 音声合成バックエンドの共通トレイト
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// テキストを音声に変換し、圧縮音声（MP3）のバイト列を返す
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// 話者に使う声を決める
///
/// 話者の `voice` が既知の声ならそのまま、そうでなければ性別から選ぶ。
pub fn voice_for(speaker: &Speaker) -> &'static str {
    if let Some(voice) = OPENAI_VOICES.iter().copied().find(|v| *v == speaker.voice) {
        return voice;
    }
    match speaker.gender {
        Gender::Male => "echo",
        Gender::Female => "nova",
        Gender::Neutral => "alloy",
    }
}

/// OpenAI Speech API リクエスト
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

/// OpenAI Speech API バックエンド
pub struct OpenAiSpeech {
    config: TtsConfig,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub fn new(config: TtsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Speech API HTTPクライアント作成失敗")?;

        Ok(Self { config, client })
    }

    pub fn default_voice(&self) -> &str {
        &self.config.default_voice
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.config.model,
            voice,
            input: text,
        };

        let response = self
            .client
            .post(OPENAI_SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .context("Speech API リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech API エラー: {} - {}", status, error_text);
        }

        let audio = response
            .bytes()
            .await
            .context("Speech API レスポンス読み込み失敗")?;

        log::debug!("Speech API: {} 文字 → {} バイト ({})", text.chars().count(), audio.len(), voice);

        Ok(audio.to_vec())
    }
}

/// 未生成のクリップだけを音声合成して保存
///
/// 既存のクリップは再生成しない。APIのレート制限を避けるため1行ずつ順に処理する。
/// 台本に存在しない話者の行は `fallback_voice` で合成する。
///
/// # Returns
///
/// 新たに生成したクリップ数
pub async fn synthesize_missing(
    synthesizer: &dyn SpeechSynthesizer,
    store: &ClipStore,
    transcript: &Transcript,
    fallback_voice: &str,
) -> Result<usize> {
    let statuses = store.check(&clip_file_names(transcript));
    let mut generated = 0;

    for (line, status) in transcript.dialogue.iter().zip(&statuses) {
        if status.exists {
            log::debug!("生成済み: {}", status.file_name);
            continue;
        }

        let voice = transcript
            .speaker(&line.speaker_id)
            .map(voice_for)
            .unwrap_or(fallback_voice);

        log::info!("音声合成: {} ({})", status.file_name, voice);
        let audio = synthesizer
            .synthesize(&line.text, voice)
            .await
            .with_context(|| format!("行 {} の音声合成に失敗", line.id))?;
        store.save(&status.file_name, &audio)?;
        generated += 1;
    }

    Ok(generated)
}
