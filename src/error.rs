use thiserror::Error;

/// 音声マージ処理のエラー
///
/// いずれかのクリップで失敗した時点でマージ全体を中断する。
/// 無音での代替などのフォールバックは行わない。
#[derive(Error, Debug)]
pub enum MergeError {
    /// クリップの取得に失敗（ネットワーク / HTTP ステータス / ファイル）
    #[error("クリップ取得失敗 ({location}): {reason}")]
    Fetch { location: String, reason: String },

    /// 取得したバイト列を音声としてデコードできない
    #[error("クリップのデコード失敗 ({location}): {reason}")]
    Decode { location: String, reason: String },

    /// クリップ間でチャンネル数またはサンプリングレートが一致しない
    #[error(
        "フォーマット不一致: クリップ {index} は {found_channels}ch/{found_rate}Hz \
         (期待値 {expected_channels}ch/{expected_rate}Hz)"
    )]
    FormatMismatch {
        index: usize,
        expected_channels: usize,
        expected_rate: u32,
        found_channels: usize,
        found_rate: u32,
    },

    /// WAVコンテナの生成に失敗
    #[error("エンコード失敗: {0}")]
    Encode(String),

    /// 事前条件違反（空のクリップリスト、件数不一致など）
    #[error("不正な入力: {0}")]
    InvalidInput(String),
}

impl MergeError {
    /// パイプライン全体を再実行すれば成功する可能性があるか
    ///
    /// 取得エラーのみ一時的な障害とみなす。デコード不能なデータや
    /// フォーマット不一致は再試行しても解消しない。
    pub fn is_retryable(&self) -> bool {
        matches!(self, MergeError::Fetch { .. })
    }
}
