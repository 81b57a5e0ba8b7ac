use crate::error::MergeError;
use crate::types::SampleBuffer;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// WAVヘッダのバイト数（RIFF + fmt + data チャンクヘッダ）
pub const WAV_HEADER_LEN: usize = 44;

/// MIMEタイプ
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const PCM_FORMAT_TAG: u16 = 1;

/// サンプルバッファを16bit PCMのWAVコンテナにエンコード
///
/// 出力は常に44バイトの標準ヘッダ + インターリーブされたサンプル
/// （フレーム優先・チャンネル順）。チャンネル数に関わらず
/// WAVE_FORMAT_EXTENSIBLE は使わない。
///
/// ```text
///  0 "RIFF"  4 36+data  8 "WAVE" 12 "fmt " 16 16  20 1(PCM) 22 channels
/// 24 rate   28 byte_rate  32 block_align  34 16  36 "data"  40 data  44 samples...
/// ```
///
/// # Errors
///
/// フレーム数が0、またはサイズがヘッダのフィールドに収まらない場合は `Encode`
///
/// # Examples
///
/// ```
/// # use podcast_merge::types::SampleBuffer;
/// # use podcast_merge::wav_writer::encode_wav;
/// let buffer = SampleBuffer::new(24000, vec![vec![0.0; 100], vec![0.0; 100]]).unwrap();
/// let wav = encode_wav(&buffer).unwrap();
/// assert_eq!(wav.len(), 44 + 100 * 2 * 2);
/// assert_eq!(&wav[0..4], b"RIFF");
/// ```
pub fn encode_wav(buffer: &SampleBuffer) -> Result<Vec<u8>, MergeError> {
    let frame_count = buffer.frame_count();
    if frame_count == 0 {
        return Err(MergeError::Encode("フレーム数が0のため出力できません".to_string()));
    }

    let layout = HeaderLayout::new(buffer)?;

    let mut out = Vec::new();
    out.try_reserve_exact(WAV_HEADER_LEN + layout.data_len as usize)
        .map_err(|e| MergeError::Encode(format!("出力バッファの確保に失敗: {}", e)))?;

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + layout.data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    out.extend_from_slice(&layout.channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate().to_le_bytes());
    out.extend_from_slice(&layout.byte_rate.to_le_bytes());
    out.extend_from_slice(&layout.block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&layout.data_len.to_le_bytes());

    let channels = buffer.channels();
    for frame in 0..frame_count {
        for channel in channels {
            out.extend_from_slice(&float_to_i16(channel[frame]).to_le_bytes());
        }
    }

    debug_assert_eq!(out.len(), WAV_HEADER_LEN + layout.data_len as usize);
    Ok(out)
}

/// `f32` サンプルを16bit整数に変換
///
/// [-1.0, 1.0] にクランプした後、負値は32768倍、非負値は32767倍して
/// ゼロ方向に切り捨てる。
pub fn float_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// ヘッダの可変フィールド
struct HeaderLayout {
    channels: u16,
    byte_rate: u32,
    block_align: u16,
    data_len: u32,
}

impl HeaderLayout {
    fn new(buffer: &SampleBuffer) -> Result<Self, MergeError> {
        let overflow = |field: &str| MergeError::Encode(format!("{} がWAVヘッダに収まりません", field));

        let channels =
            u16::try_from(buffer.channel_count()).map_err(|_| overflow("チャンネル数"))?;
        let block_align = channels
            .checked_mul(BYTES_PER_SAMPLE)
            .ok_or_else(|| overflow("ブロックアライン"))?;
        let byte_rate = buffer
            .sample_rate()
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| overflow("バイトレート"))?;
        let data_len = u32::try_from(buffer.frame_count())
            .ok()
            .and_then(|frames| frames.checked_mul(u32::from(block_align)))
            .filter(|len| len.checked_add(36).is_some())
            .ok_or_else(|| overflow("データサイズ"))?;

        Ok(Self {
            channels,
            byte_rate,
            block_align,
            data_len,
        })
    }
}

/// エンコード済みWAVをファイルに書き出し
///
/// 出力ディレクトリが存在しない場合は作成する。
pub fn write_wav_file<P: AsRef<Path>>(output_dir: P, file_name: &str, wav: &[u8]) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();

    if !output_dir.exists() {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", output_dir))?;
    }

    let filepath = output_dir.join(file_name);
    fs::write(&filepath, wav).with_context(|| format!("WAVファイルの書き込みに失敗: {:?}", filepath))?;

    log::info!("WAVファイル書き込み完了: {:?} ({} バイト)", filepath, wav.len());

    Ok(filepath)
}
