//! podcast-merge - 台本の行毎の音声クリップを1本のポッドキャスト音声にまとめる
//!
//! 音声合成サービスが行毎に生成した圧縮音声（MP3）を取得・デコードし、
//! 順番に連結して16bit PCMのWAVとして書き出す。短い相槌
//! （"Hmm." や "Yeah!" など）は自動判定して小さめの音量にする。
//!
//! # 主な機能
//!
//! - **音量判定**: 相槌・リアクションを簡易ヒューリスティックで検出
//! - **ゲイン計画**: 自動判定と手動上書きから行毎のゲインを決定
//! - **並行取得・デコード**: HTTP/ローカルファイルから取得し、入力順を保って並行デコード
//! - **連結**: サンプル単位で正確なオフセット管理によるクリップの連結
//! - **WAV出力**: 44バイトの標準ヘッダ + インターリーブ16bit PCM
//! - **クリップ生成**: OpenAI Speech API による未生成クリップの合成
//!
//! # アーキテクチャ
//!
//! ```text
//! [clip URLs/paths] → [ClipSource] → [decoder (×N, 並行)]
//!                                          ↓
//! [DialogueLine] → [volume] → [GainPlan] → [merge] → [wav_writer]
//!                                                        ↓
//!                                              [MergedAudioResource]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use podcast_merge::clip_source::FileClipSource;
//! use podcast_merge::merger::{AudioMerger, MergeRequest, MergeSettings};
//! use podcast_merge::gain_plan::VolumeOverrides;
//! use podcast_merge::types::DialogueLine;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let merger = AudioMerger::new(FileClipSource::new("./public/audio"), MergeSettings::default());
//! let merged = merger
//!     .merge(MergeRequest {
//!         transcript_id: "t1".to_string(),
//!         clip_locations: vec!["t1_host_0.mp3".to_string()],
//!         dialogue: vec![DialogueLine {
//!             speaker_id: "host".to_string(),
//!             text: "Welcome back!".to_string(),
//!             id: "1".to_string(),
//!         }],
//!         volume_control: true,
//!         overrides: VolumeOverrides::default(),
//!     })
//!     .await?;
//! merged.write_to_dir("./public/audio")?;
//! # Ok(())
//! # }
//! ```

pub mod clip_source;
pub mod clip_store;
pub mod config;
pub mod decoder;
pub mod error;
pub mod gain_plan;
pub mod merge;
pub mod merger;
pub mod tts_api;
pub mod types;
pub mod volume;
pub mod wav_writer;
