use crate::clip_source::ClipSource;
use crate::config::MergeConfig;
use crate::decoder::fetch_and_decode_all;
use crate::error::MergeError;
use crate::gain_plan::{check_overrides, GainPlan, VolumeOverrides, DEFAULT_QUIET_GAIN};
use crate::merge::{merge, segment_ranges};
use crate::types::{AudioFormat, DialogueLine, LineSegment};
use crate::wav_writer::{encode_wav, write_wav_file, WAV_CONTENT_TYPE};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// マージ処理の設定
#[derive(Clone, Copy, Debug)]
pub struct MergeSettings {
    /// 小さくする行のゲイン
    pub quiet_gain: f32,
    /// 同時に取得・デコードするクリップ数
    pub max_concurrent_fetches: usize,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            quiet_gain: DEFAULT_QUIET_GAIN,
            max_concurrent_fetches: 8,
        }
    }
}

impl From<&MergeConfig> for MergeSettings {
    fn from(config: &MergeConfig) -> Self {
        Self {
            quiet_gain: config.quiet_gain,
            max_concurrent_fetches: config.max_concurrent_fetches,
        }
    }
}

/// マージ要求
///
/// `clip_locations[i]` が `dialogue[i]` の音声。呼び出し側が
/// 最新のクリップ一覧を解決して渡す。
#[derive(Clone, Debug)]
pub struct MergeRequest {
    pub transcript_id: String,
    pub clip_locations: Vec<String>,
    pub dialogue: Vec<DialogueLine>,
    /// 相槌の自動判定による音量調整を行うか
    pub volume_control: bool,
    pub overrides: VolumeOverrides,
}

/// マージ結果のWAV
///
/// 所有権は呼び出し側に移る。保存・配信は呼び出し側の責任。
#[derive(Clone, Debug, Serialize)]
pub struct MergedAudioResource {
    /// 推奨ファイル名（`{transcriptId}_merged.wav`）
    pub file_name: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub frame_count: usize,
    /// 行毎の区間（台本の順）
    pub segments: Vec<LineSegment>,
}

impl MergedAudioResource {
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.format.sample_rate as f64
    }

    /// 出力ディレクトリに `file_name` で保存
    pub fn write_to_dir<P: AsRef<Path>>(&self, output_dir: P) -> anyhow::Result<PathBuf> {
        write_wav_file(output_dir, &self.file_name, &self.bytes)
    }
}

/// マージ後のファイル名
pub fn merged_file_name(transcript_id: &str) -> String {
    format!("{}_merged.wav", transcript_id)
}

/// 取得 → デコード → 連結 → WAVエンコード のパイプライン
///
/// 呼び出し間で共有する可変状態は持たないため、異なる台本の
/// マージを並行に実行できる。
///
/// # Examples
///
/// ```no_run
/// # use podcast_merge::clip_source::FileClipSource;
/// # use podcast_merge::merger::{AudioMerger, MergeRequest, MergeSettings};
/// # async fn run(request: MergeRequest) -> anyhow::Result<()> {
/// let merger = AudioMerger::new(FileClipSource::new("./public/audio"), MergeSettings::default());
/// let merged = merger.merge(request).await?;
/// merged.write_to_dir("./public/audio")?;
/// # Ok(())
/// # }
/// ```
pub struct AudioMerger<S> {
    source: S,
    settings: MergeSettings,
}

impl<S: ClipSource> AudioMerger<S> {
    pub fn new(source: S, settings: MergeSettings) -> Self {
        Self { source, settings }
    }

    /// 要求に対するゲイン計画を作成
    pub fn plan(&self, request: &MergeRequest) -> GainPlan {
        GainPlan::resolve(
            &request.dialogue,
            request.volume_control,
            &request.overrides,
            self.settings.quiet_gain,
        )
    }

    /// クリップを1つのWAVにマージ
    ///
    /// いずれかのクリップの取得・デコードに失敗した場合はマージ全体を
    /// 中断し、部分的な出力は返さない。
    pub async fn merge(&self, request: MergeRequest) -> Result<MergedAudioResource, MergeError> {
        validate_request(&request)?;

        log::info!(
            "マージ開始: {} ({} クリップ, 音量調整 {})",
            request.transcript_id,
            request.clip_locations.len(),
            if request.volume_control { "有効" } else { "無効" }
        );

        let plan = self.plan(&request);

        let buffers = fetch_and_decode_all(
            &self.source,
            &request.clip_locations,
            self.settings.max_concurrent_fetches,
        )
        .await?;

        let ranges = segment_ranges(&buffers);
        let merged = merge(&buffers, &plan.gains())?;
        drop(buffers);

        let bytes = encode_wav(&merged)?;

        let sample_rate = merged.sample_rate() as f64;
        let segments = request
            .dialogue
            .iter()
            .zip(plan.lines())
            .zip(&ranges)
            .map(|((line, gain), range)| LineSegment {
                line_id: line.id.clone(),
                speaker_id: line.speaker_id.clone(),
                start_seconds: range.start as f64 / sample_rate,
                end_seconds: range.end as f64 / sample_rate,
                gain: gain.gain,
            })
            .collect();

        let resource = MergedAudioResource {
            file_name: merged_file_name(&request.transcript_id),
            content_type: WAV_CONTENT_TYPE,
            bytes,
            format: merged.format(),
            frame_count: merged.frame_count(),
            segments,
        };

        log::info!(
            "マージ完了: {} ({:.2}秒, {} 行を小音量, {} バイト)",
            resource.file_name,
            resource.duration_seconds(),
            plan.quiet_count(),
            resource.bytes.len()
        );

        Ok(resource)
    }
}

/// 取得前に確認できる事前条件
fn validate_request(request: &MergeRequest) -> Result<(), MergeError> {
    if request.clip_locations.is_empty() {
        return Err(MergeError::InvalidInput(
            "マージ対象のクリップがありません".to_string(),
        ));
    }
    if request.clip_locations.len() != request.dialogue.len() {
        return Err(MergeError::InvalidInput(format!(
            "クリップ数 {} が台本の行数 {} と一致しません",
            request.clip_locations.len(),
            request.dialogue.len()
        )));
    }
    check_overrides(&request.dialogue, &request.overrides)
}
