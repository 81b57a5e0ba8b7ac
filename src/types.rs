use crate::error::MergeError;
use serde::{Deserialize, Serialize};

/// オーディオフォーマット情報
///
/// 音声データのサンプリングレートとチャンネル数を保持する。
///
/// # Examples
///
/// ```
/// # use podcast_merge::types::AudioFormat;
/// let format = AudioFormat {
///     sample_rate: 24000, // TTS出力の典型値
///     channels: 1,        // モノラル
/// };
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    /// サンプリングレート (Hz)
    ///
    /// 典型的な値: 22050, 24000, 44100, 48000
    pub sample_rate: u32,

    /// チャンネル数
    ///
    /// 1: モノラル, 2: ステレオ
    pub channels: u16,
}

/// マルチチャンネルの音声サンプルバッファ
///
/// チャンネル毎に独立した `f32` サンプル列を保持する（プレーナ形式）。
/// 値は通常 [-1.0, 1.0] だが、ゲイン適用後は一時的に範囲外になりうる。
/// 範囲外の値はエンコード時にクランプされる。
///
/// 生成後は変更されない。マージは既存バッファへの追記ではなく
/// 新しいバッファを生成する。
///
/// # Examples
///
/// ```
/// # use podcast_merge::types::SampleBuffer;
/// let buffer = SampleBuffer::new(24000, vec![vec![0.0; 2400]]).unwrap();
/// assert_eq!(buffer.channel_count(), 1);
/// assert_eq!(buffer.frame_count(), 2400);
/// assert!((buffer.duration_seconds() - 0.1).abs() < 1e-9);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// チャンネル毎のサンプル列からバッファを作成
    ///
    /// # Errors
    ///
    /// - チャンネル数が0、または `u16` に収まらない
    /// - サンプリングレートが0
    /// - チャンネル間でサンプル数が異なる
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, MergeError> {
        if channels.is_empty() || channels.len() > u16::MAX as usize {
            return Err(MergeError::InvalidInput(format!(
                "チャンネル数が不正です: {}",
                channels.len()
            )));
        }
        if sample_rate == 0 {
            return Err(MergeError::InvalidInput(
                "サンプリングレートが0です".to_string(),
            ));
        }

        let frame_count = channels[0].len();
        if let Some((ch, data)) = channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != frame_count)
        {
            return Err(MergeError::InvalidInput(format!(
                "チャンネル {} のサンプル数 {} が チャンネル 0 ({}) と一致しません",
                ch,
                data.len(),
                frame_count
            )));
        }

        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// チャンネルあたりのサンプル数
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels.len() as u16,
        }
    }

    /// 指定チャンネルのサンプル列
    ///
    /// # Panics
    ///
    /// `index >= channel_count()` の場合
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// 再生時間（秒）
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// 話者の性別（声の自動選択に使用）
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

/// 話者
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    /// 音声合成に渡す声の指定（ボイスIDまたは性別）
    pub voice: String,
    pub gender: Gender,
}

/// 台本の1行
///
/// マージ処理では行毎のゲイン決定にのみ使用し、内容は変更しない。
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    pub speaker_id: String,
    pub text: String,
    pub id: String,
}

/// 台本
///
/// Web層が保存するJSONと同じ形式。
///
/// ```json
/// {
///   "id": "sample-conversation",
///   "title": "Sample",
///   "speakers": [{ "id": "host", "name": "Alex", "voice": "echo", "gender": "male" }],
///   "dialogue": [{ "speakerId": "host", "text": "Welcome back!", "id": "1" }]
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transcript {
    pub id: String,
    pub title: String,
    pub speakers: Vec<Speaker>,
    pub dialogue: Vec<DialogueLine>,
}

impl Transcript {
    pub fn speaker(&self, id: &str) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == id)
    }
}

/// マージ後の音声内での1行分の区間
///
/// 再生中の行ハイライト用に出力する。
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LineSegment {
    pub line_id: String,
    pub speaker_id: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub gain: f32,
}
