use crate::error::MergeError;
use crate::types::SampleBuffer;
use std::ops::Range;

/// デコード済みクリップを順番に連結して1つのバッファを作成
///
/// `gains[i]` は `buffers[i]` の全チャンネル・全サンプルに一様に掛けられる
/// （行単位の音量調整。行内のフェードは行わない）。
/// ゲイン適用後の値はクランプしない。クランプはエンコード時に行う。
///
/// ミックスではなく連結なので、クリップ `i` は出力の
/// `segment_ranges(buffers)[i]` の区間をそのまま占める。
///
/// # Errors
///
/// - `buffers` が空、または `gains` と件数が異なる → `InvalidInput`
/// - チャンネル数かサンプリングレートが `buffers[0]` と異なる → `FormatMismatch`
///   （リサンプリングやリミックスは行わない）
///
/// # Examples
///
/// ```
/// # use podcast_merge::merge::merge;
/// # use podcast_merge::types::SampleBuffer;
/// let a = SampleBuffer::new(24000, vec![vec![0.5; 3]]).unwrap();
/// let b = SampleBuffer::new(24000, vec![vec![0.5; 2]]).unwrap();
/// let merged = merge(&[a, b], &[1.0, 0.5]).unwrap();
/// assert_eq!(merged.channel(0), &[0.5f32, 0.5, 0.5, 0.25, 0.25]);
/// ```
pub fn merge(buffers: &[SampleBuffer], gains: &[f32]) -> Result<SampleBuffer, MergeError> {
    let first = buffers
        .first()
        .ok_or_else(|| MergeError::InvalidInput("マージ対象のクリップがありません".to_string()))?;

    if gains.len() != buffers.len() {
        return Err(MergeError::InvalidInput(format!(
            "ゲインの数 {} がクリップ数 {} と一致しません",
            gains.len(),
            buffers.len()
        )));
    }

    check_formats(buffers)?;

    let ranges = segment_ranges(buffers);
    let total_frames = ranges.last().map_or(0, |r| r.end);
    let channel_count = first.channel_count();

    let mut channels = vec![vec![0.0f32; total_frames]; channel_count];
    for (ch, output) in channels.iter_mut().enumerate() {
        for ((buffer, &gain), range) in buffers.iter().zip(gains).zip(&ranges) {
            let dest = &mut output[range.clone()];
            for (out, &sample) in dest.iter_mut().zip(buffer.channel(ch)) {
                *out = sample * gain;
            }
        }
    }

    log::debug!(
        "{} クリップを連結: {}ch, {}Hz, {} フレーム",
        buffers.len(),
        channel_count,
        first.sample_rate(),
        total_frames
    );

    SampleBuffer::new(first.sample_rate(), channels)
}

/// 各クリップが連結後に占めるフレーム区間
///
/// クリップ0は `[0, f0)`、クリップ1は `[f0, f0 + f1)`、… と重ならずに並ぶ。
pub fn segment_ranges(buffers: &[SampleBuffer]) -> Vec<Range<usize>> {
    let mut offset = 0;
    buffers
        .iter()
        .map(|buffer| {
            let start = offset;
            offset += buffer.frame_count();
            start..offset
        })
        .collect()
}

/// 全クリップのフォーマットが先頭と一致するか確認
fn check_formats(buffers: &[SampleBuffer]) -> Result<(), MergeError> {
    let Some(first) = buffers.first() else {
        return Ok(());
    };

    for (index, buffer) in buffers.iter().enumerate().skip(1) {
        if buffer.channel_count() != first.channel_count()
            || buffer.sample_rate() != first.sample_rate()
        {
            return Err(MergeError::FormatMismatch {
                index,
                expected_channels: first.channel_count(),
                expected_rate: first.sample_rate(),
                found_channels: buffer.channel_count(),
                found_rate: buffer.sample_rate(),
            });
        }
    }

    Ok(())
}
