use crate::clip_source::ClipSource;
use crate::error::MergeError;
use crate::types::SampleBuffer;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// 圧縮音声（MP3など）のバイト列をサンプルバッファにデコード
///
/// 最初の音声トラックの全パケットをプレーナ `f32` に変換する。
/// 壊れたパケットは警告を出して読み飛ばす。
///
/// # Arguments
///
/// * `location` - 取得元（拡張子をフォーマット判定のヒントに使う。エラーメッセージにも含める）
/// * `bytes` - 音声データ
///
/// # Errors
///
/// フォーマット判定に失敗した場合、音声トラックがない場合、
/// 1フレームもデコードできなかった場合は `MergeError::Decode`
pub fn decode_clip(location: &str, bytes: Vec<u8>) -> Result<SampleBuffer, MergeError> {
    let decode_error = |reason: String| MergeError::Decode {
        location: location.to_string(),
        reason,
    };

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_of(location) {
        hint.with_extension(&extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(format!("フォーマット判定失敗: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error("音声トラックがありません".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(format!("デコーダ作成失敗: {}", e)))?;

    let mut sink = PlanarSink::default();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(format!("パケット読み込み失敗: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => sink.append(&decoded).map_err(decode_error)?,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("{}: 壊れたパケットを読み飛ばします: {}", location, e);
            }
            Err(e) => return Err(decode_error(format!("デコード失敗: {}", e))),
        }
    }

    let (sample_rate, channels) = sink
        .finish()
        .ok_or_else(|| decode_error("デコードできたフレームがありません".to_string()))?;

    let buffer = SampleBuffer::new(sample_rate, channels)?;
    log::debug!(
        "デコード完了: {} ({}ch, {}Hz, {:.2}秒)",
        location,
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration_seconds()
    );
    Ok(buffer)
}

/// [`decode_clip`] をブロッキングスレッドで実行
pub async fn decode_clip_blocking(location: String, bytes: Vec<u8>) -> Result<SampleBuffer, MergeError> {
    let task_location = location.clone();
    tokio::task::spawn_blocking(move || decode_clip(&task_location, bytes))
        .await
        .map_err(|e| MergeError::Decode {
            location,
            reason: format!("デコードタスク失敗: {}", e),
        })?
}

/// 全クリップを並行に取得・デコード
///
/// 結果は完了順ではなく `locations` の順に並ぶ。失敗は完了順に検出するので、
/// 先頭のクリップが遅くても最初に起きた失敗をすぐに返す。その時点で
/// 未完了の取得は破棄され、部分的な結果は返さない。
pub async fn fetch_and_decode_all<S>(
    source: &S,
    locations: &[String],
    max_concurrency: usize,
) -> Result<Vec<SampleBuffer>, MergeError>
where
    S: ClipSource + ?Sized,
{
    let mut decoded: Vec<(usize, SampleBuffer)> = stream::iter(locations.iter().enumerate())
        .map(|(index, location)| async move {
            let bytes = source.fetch(location).await?;
            let buffer = decode_clip_blocking(location.clone(), bytes).await?;
            Ok::<_, MergeError>((index, buffer))
        })
        .buffer_unordered(max_concurrency.max(1))
        .try_collect()
        .await?;

    decoded.sort_unstable_by_key(|(index, _)| *index);
    Ok(decoded.into_iter().map(|(_, buffer)| buffer).collect())
}

/// URLやパスから拡張子を取り出す（クエリ文字列は無視）
fn extension_of(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// パケット毎のデコード結果をチャンネル毎に蓄積
#[derive(Default)]
struct PlanarSink {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
    scratch: Option<AudioBuffer<f32>>,
}

impl PlanarSink {
    fn append(&mut self, decoded: &AudioBufferRef) -> Result<(), String> {
        let spec = *decoded.spec();
        let channel_count = spec.channels.count();

        if self.channels.is_empty() {
            self.sample_rate = spec.rate;
            self.channels = vec![Vec::new(); channel_count];
        } else if channel_count != self.channels.len() || spec.rate != self.sample_rate {
            return Err(format!(
                "クリップ内でフォーマットが変化しました: {}ch/{}Hz → {}ch/{}Hz",
                self.channels.len(),
                self.sample_rate,
                channel_count,
                spec.rate
            ));
        }

        let needs_alloc = self
            .scratch
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity() || *buf.spec() != spec);
        if needs_alloc {
            self.scratch = Some(AudioBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(scratch) = self.scratch.as_mut() {
            decoded.convert(scratch);
            for (ch, out) in self.channels.iter_mut().enumerate() {
                out.extend_from_slice(scratch.chan(ch));
            }
        }

        Ok(())
    }

    fn finish(self) -> Option<(u32, Vec<Vec<f32>>)> {
        if self.channels.is_empty() || self.channels[0].is_empty() {
            None
        } else {
            Some((self.sample_rate, self.channels))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip_source::MemoryClipSource;
    use crate::wav_writer::encode_wav;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    /// 無音モノラル 44.1kHz / 128kbps の MPEG-1 Layer III、20フレーム
    const SILENT_MP3: &[u8] = include_bytes!("../testdata/silence_mono_44100.mp3");
    const MP3_FRAME_BYTES: usize = 417;
    const MP3_FRAME_SAMPLES: usize = 1152;

    fn tone(sample_rate: u32, channels: usize, frames: usize, level: f32) -> SampleBuffer {
        let data = (0..channels)
            .map(|ch| {
                (0..frames)
                    .map(|i| ((i as f32 * 0.03) + ch as f32).sin() * level)
                    .collect()
            })
            .collect();
        SampleBuffer::new(sample_rate, data).unwrap()
    }

    fn wav_bytes(buffer: &SampleBuffer) -> Vec<u8> {
        encode_wav(buffer).unwrap()
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        let original = tone(24000, 2, 4800, 0.7);
        let decoded = decode_clip("clip.wav", wav_bytes(&original)).unwrap();

        assert_eq!(decoded.sample_rate(), 24000);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frame_count(), 4800);
        for ch in 0..2 {
            for (a, b) in decoded.channel(ch).iter().zip(original.channel(ch)) {
                assert!((a - b).abs() <= 2.0 / 32767.0);
            }
        }
    }

    #[test]
    fn test_decode_without_extension_hint() {
        let original = tone(16000, 1, 1600, 0.5);
        let decoded = decode_clip("https://example.com/clip?id=1", wav_bytes(&original)).unwrap();
        assert_eq!(decoded.frame_count(), 1600);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_clip("clip.mp3", vec![0x42; 512]).unwrap_err();
        assert!(matches!(err, MergeError::Decode { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("/audio/a_b_0.MP3"), Some("mp3".to_string()));
        assert_eq!(extension_of("https://x/y.wav?sig=abc"), Some("wav".to_string()));
        assert_eq!(extension_of("https://x/clip"), None);
    }

    #[tokio::test]
    async fn test_fetch_and_decode_preserves_order() {
        let mut source = MemoryClipSource::new();
        let lengths = [1200, 300, 2400, 50];
        let locations: Vec<String> = lengths
            .iter()
            .enumerate()
            .map(|(i, &frames)| {
                let name = format!("clip_{}.wav", i);
                source.insert(name.clone(), wav_bytes(&tone(22050, 1, frames, 0.4)));
                name
            })
            .collect();

        let buffers = fetch_and_decode_all(&source, &locations, 3).await.unwrap();
        let frames: Vec<usize> = buffers.iter().map(|b| b.frame_count()).collect();
        assert_eq!(frames, lengths.to_vec());
    }

    #[tokio::test]
    async fn test_fetch_and_decode_aborts_on_first_failure() {
        let mut source = MemoryClipSource::new();
        source.insert("ok.wav", wav_bytes(&tone(22050, 1, 100, 0.4)));
        source.insert("bad.mp3", vec![0u8; 64]);

        let locations = vec!["ok.wav".to_string(), "missing.wav".to_string()];
        let err = fetch_and_decode_all(&source, &locations, 4).await.unwrap_err();
        assert!(matches!(err, MergeError::Fetch { .. }));

        let locations = vec!["ok.wav".to_string(), "bad.mp3".to_string()];
        let err = fetch_and_decode_all(&source, &locations, 4).await.unwrap_err();
        assert!(matches!(err, MergeError::Decode { .. }));
    }

    /// "slow" は応答が遅く、"bad" は即座に失敗するソース
    struct StallingSource;

    #[async_trait]
    impl ClipSource for StallingSource {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, MergeError> {
            if location == "bad" {
                return Err(MergeError::Fetch {
                    location: location.to_string(),
                    reason: "503 Service Unavailable".to_string(),
                });
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failure_is_not_held_behind_slow_clip() {
        let locations = vec!["slow".to_string(), "bad".to_string()];
        let started = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_and_decode_all(&StallingSource, &locations, 4),
        )
        .await
        .expect("先頭の遅いクリップを待たずに失敗するはず");

        let err = result.unwrap_err();
        assert!(matches!(err, MergeError::Fetch { ref location, .. } if location == "bad"));
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_decode_mp3() {
        let decoded = decode_clip("x.mp3", SILENT_MP3.to_vec()).unwrap();

        assert_eq!(decoded.channel_count(), 1);
        assert_eq!(decoded.sample_rate(), 44100);
        assert!(decoded.frame_count() > 0);
        assert_eq!(decoded.frame_count() % MP3_FRAME_SAMPLES, 0);
        assert!(decoded.channel(0).iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_decode_truncated_mp3_keeps_complete_frames() {
        // 最後のフレームが途中で切れている
        let truncated = SILENT_MP3[..SILENT_MP3.len() - MP3_FRAME_BYTES / 2].to_vec();
        let full = decode_clip("x.mp3", SILENT_MP3.to_vec()).unwrap();
        let decoded = decode_clip("x.mp3", truncated).unwrap();

        assert_eq!(decoded.sample_rate(), 44100);
        assert!(decoded.frame_count() > 0);
        assert!(decoded.frame_count() < full.frame_count());
    }

    #[test]
    fn test_decode_mp3_with_damaged_frame() {
        // 途中のフレームヘッダを壊しても残りのフレームはデコードされる
        let mut damaged = SILENT_MP3.to_vec();
        let offset = MP3_FRAME_BYTES * 10;
        damaged[offset..offset + 4].fill(0);

        let decoded = decode_clip("x.mp3", damaged).unwrap();
        assert_eq!(decoded.channel_count(), 1);
        assert!(decoded.frame_count() >= MP3_FRAME_SAMPLES * 10);
    }

    #[test]
    fn test_mp3_without_complete_frame_is_decode_error() {
        let err = decode_clip("x.mp3", SILENT_MP3[..MP3_FRAME_BYTES / 2].to_vec()).unwrap_err();
        assert!(matches!(err, MergeError::Decode { .. }));
    }
}
