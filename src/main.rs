use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use podcast_merge::clip_source::AnyClipSource;
use podcast_merge::clip_store::{clip_file_names, ClipStore};
use podcast_merge::config::Config;
use podcast_merge::gain_plan::{GainPlan, VolumeOverrides};
use podcast_merge::merger::{AudioMerger, MergeRequest, MergeSettings};
use podcast_merge::tts_api::{synthesize_missing, OpenAiSpeech};
use podcast_merge::types::Transcript;
use podcast_merge::volume::should_lower_volume;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 台本の行毎の音声クリップを1本のWAVにまとめる
#[derive(Parser, Debug)]
#[command(name = "podcast-merge")]
#[command(version)]
struct Args {
    /// 設定ファイル（存在しなければデフォルト設定）
    #[arg(short, long, default_value = "config.toml", env = "PODCAST_MERGE_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// クリップを連結して `{id}_merged.wav` を出力
    Merge {
        /// 台本JSON
        transcript: PathBuf,
        #[command(flatten)]
        options: MergeOptions,
    },
    /// 未生成のクリップを音声合成してからマージ
    Generate {
        /// 台本JSON
        transcript: PathBuf,
        /// 合成のみ行いマージしない
        #[arg(long)]
        skip_merge: bool,
        #[command(flatten)]
        options: MergeOptions,
    },
    /// 各行の音量判定結果を表示
    Classify {
        /// 台本JSON
        transcript: PathBuf,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// クリップの有無を表示
    Check {
        /// 台本JSON
        transcript: PathBuf,
    },
    /// デフォルト設定ファイルを生成
    GenerateConfig {
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct MergeOptions {
    /// クリップの場所（URLまたはパス、台本の行順）。省略時はクリップディレクトリから解決
    #[arg(long = "clip", value_name = "LOCATION")]
    clips: Vec<String>,
    /// 相槌の自動音量調整を無効にする
    #[arg(long)]
    no_volume_control: bool,
    /// 出力ディレクトリ（省略時は設定の merged_output_dir）
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(clap::Args, Debug)]
struct OverrideArgs {
    /// 通常音量に固定する行ID
    #[arg(long = "loud", value_name = "LINE_ID")]
    loud: Vec<String>,
    /// 小さくする行ID
    #[arg(long = "quiet", value_name = "LINE_ID")]
    quiet: Vec<String>,
}

impl OverrideArgs {
    fn to_overrides(&self) -> VolumeOverrides {
        VolumeOverrides {
            forced_loud: self.loud.iter().cloned().collect(),
            forced_quiet: self.quiet.iter().cloned().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(&args.config)?;

    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or(config.output.log_level.as_str()))
        .format_timestamp(None)
        .filter_module("symphonia", log::LevelFilter::Warn)
        .init();

    if !args.config.exists() {
        log::info!("設定ファイル {:?} がないためデフォルト設定を使用します", args.config);
    }
    log::debug!("設定: {:?}", config);

    match args.command {
        Command::Merge { transcript, options } => {
            let transcript = load_transcript(&transcript)?;
            run_merge(&config, &transcript, &options).await?;
        }
        Command::Generate {
            transcript,
            skip_merge,
            options,
        } => {
            let transcript = load_transcript(&transcript)?;
            let tts_config = config
                .tts
                .clone()
                .ok_or_else(|| anyhow::anyhow!("[tts] 設定が見つかりません"))?;
            let fallback_voice = tts_config.default_voice.clone();
            let synthesizer = OpenAiSpeech::new(tts_config)?;
            let store = ClipStore::new(&config.output.clip_dir);

            let generated =
                synthesize_missing(&synthesizer, &store, &transcript, &fallback_voice).await?;
            log::info!("{} 件のクリップを生成しました", generated);

            if !skip_merge {
                run_merge(&config, &transcript, &options).await?;
            }
        }
        Command::Classify {
            transcript,
            overrides,
        } => {
            let transcript = load_transcript(&transcript)?;
            let plan = GainPlan::resolve(
                &transcript.dialogue,
                true,
                &overrides.to_overrides(),
                config.merge.quiet_gain,
            );
            for (line, gain) in transcript.dialogue.iter().zip(plan.lines()) {
                let record = json!({
                    "id": line.id,
                    "speaker_id": line.speaker_id,
                    "text": line.text,
                    "lower_volume": should_lower_volume(&line.text),
                    "gain": gain.gain,
                    "source": gain.source,
                });
                println!("{}", record);
            }
        }
        Command::Check { transcript } => {
            let transcript = load_transcript(&transcript)?;
            let store = ClipStore::new(&config.output.clip_dir);
            for status in store.check(&clip_file_names(&transcript)) {
                println!("{}", serde_json::to_string(&status)?);
            }
        }
        Command::GenerateConfig { path } => {
            Config::write_default(&path)?;
            println!("設定ファイルを生成しました: {:?}", path);
        }
    }

    Ok(())
}

async fn run_merge(config: &Config, transcript: &Transcript, options: &MergeOptions) -> Result<()> {
    let store = ClipStore::new(&config.output.clip_dir);
    let clip_locations = if options.clips.is_empty() {
        store.locations(transcript)
    } else {
        options.clips.clone()
    };

    let source = AnyClipSource::new(
        &config.output.clip_dir,
        Duration::from_secs(config.fetch.timeout_seconds),
    )?;
    let merger = AudioMerger::new(source, MergeSettings::from(&config.merge));

    let request = MergeRequest {
        transcript_id: transcript.id.clone(),
        clip_locations,
        dialogue: transcript.dialogue.clone(),
        volume_control: config.merge.volume_control && !options.no_volume_control,
        overrides: options.overrides.to_overrides(),
    };

    let merged = merger.merge(request).await.inspect_err(|e| {
        if e.is_retryable() {
            log::warn!("一時的なエラーの可能性があります。再実行してください");
        }
    })?;

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.merged_output_dir));
    let path = merged.write_to_dir(&output_dir)?;

    println!(
        "{}",
        json!({
            "path": path,
            "content_type": merged.content_type,
            "duration_seconds": merged.duration_seconds(),
            "format": merged.format,
            "segments": merged.segments,
        })
    );

    Ok(())
}

fn load_transcript(path: &Path) -> Result<Transcript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("台本ファイルの読み込みに失敗: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("台本のパースに失敗: {:?}", path))
}
