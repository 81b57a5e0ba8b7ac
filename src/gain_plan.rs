use crate::error::MergeError;
use crate::types::DialogueLine;
use crate::volume::should_lower_volume;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 通常音量のゲイン
pub const FULL_GAIN: f32 = 1.0;

/// 小さめに再生する行のゲイン
pub const DEFAULT_QUIET_GAIN: f32 = 0.65;

/// 行毎の音量の手動上書き
///
/// 自動判定より優先される。両方に含まれる行は `forced_loud` が優先。
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VolumeOverrides {
    /// 自動判定に関わらず通常音量にする行ID
    #[serde(default)]
    pub forced_loud: HashSet<String>,
    /// 自動判定に関わらず小さくする行ID
    #[serde(default)]
    pub forced_quiet: HashSet<String>,
}

/// ゲインの決定理由
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GainSource {
    /// 既定（通常音量）
    Default,
    /// 自動判定で小さくした
    Classifier,
    /// 手動で通常音量に固定
    ForcedLoud,
    /// 手動で小さくした
    ForcedQuiet,
}

/// 1行分の決定済みゲイン
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LineGain {
    pub line_id: String,
    pub gain: f32,
    pub source: GainSource,
}

/// マージ1回分のゲイン計画
///
/// 台本の各行にちょうど1つのゲインを割り当てる。マージ呼び出し毎に
/// 一度だけ計算し、マージエンジンには純粋な入力として渡す。
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GainPlan {
    lines: Vec<LineGain>,
}

impl GainPlan {
    /// 台本と上書き設定からゲイン計画を作成
    ///
    /// # Arguments
    ///
    /// * `dialogue` - 台本の行（クリップと同じ順序）
    /// * `volume_control` - 自動判定を使うか。`false` なら上書き以外は全て通常音量
    /// * `overrides` - 手動上書き
    /// * `quiet_gain` - 小さくする行のゲイン
    pub fn resolve(
        dialogue: &[DialogueLine],
        volume_control: bool,
        overrides: &VolumeOverrides,
        quiet_gain: f32,
    ) -> Self {
        let lines = dialogue
            .iter()
            .map(|line| {
                let (gain, source) = if overrides.forced_loud.contains(&line.id) {
                    (FULL_GAIN, GainSource::ForcedLoud)
                } else if overrides.forced_quiet.contains(&line.id) {
                    (quiet_gain, GainSource::ForcedQuiet)
                } else if volume_control && should_lower_volume(&line.text) {
                    (quiet_gain, GainSource::Classifier)
                } else {
                    (FULL_GAIN, GainSource::Default)
                };

                log::debug!("行 {}: ゲイン {} ({:?}) {:?}", line.id, gain, source, line.text);

                LineGain {
                    line_id: line.id.clone(),
                    gain,
                    source,
                }
            })
            .collect();

        Self { lines }
    }

    pub fn lines(&self) -> &[LineGain] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// マージエンジンに渡すゲイン列
    pub fn gains(&self) -> Vec<f32> {
        self.lines.iter().map(|l| l.gain).collect()
    }

    /// 小さくなる行の数
    pub fn quiet_count(&self) -> usize {
        self.lines.iter().filter(|l| l.gain < FULL_GAIN).count()
    }
}

/// 上書き設定に台本に存在しない行IDが含まれていないか確認
pub fn check_overrides(dialogue: &[DialogueLine], overrides: &VolumeOverrides) -> Result<(), MergeError> {
    let known: HashSet<&str> = dialogue.iter().map(|l| l.id.as_str()).collect();
    let unknown: Vec<&str> = overrides
        .forced_loud
        .iter()
        .chain(overrides.forced_quiet.iter())
        .map(String::as_str)
        .filter(|id| !known.contains(id))
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(MergeError::InvalidInput(format!(
            "台本に存在しない行IDが指定されています: {}",
            unknown.join(", ")
        )))
    }
}
