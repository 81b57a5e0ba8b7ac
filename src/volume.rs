use regex_lite::Regex;
use std::sync::LazyLock;

/// 常に小さめの音量で再生する相槌・リアクション
const LOW_VOLUME_EXPRESSIONS: &[&str] = &[
    "whoa", "awww", "hmm", "huh", "yeah", "ahhh", "mhm", "ugh", "oh", "right", "sure", "i see",
];

/// 語の区切り
static WORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("静的パターンは常に有効"));

/// 相槌・リアクション判定用のパターン（先頭一致）
static REACTIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 間投詞
        r"^(ah+|oh+|uh+|hmm+|mhm+|mm+|er+|um+)\b",
        // 同意
        r"^(right|sure|okay|yep|yeah|yes|got it|i see)\b",
        // 驚き・関心
        r"^(wow|whoa|cool|nice|great|awesome|amazing)\b",
        // 考え中
        r"^(hmm+|uhh+|err+|well+)\b",
        // 続きを促す
        r"^(go on|tell me|and then)\b",
        // 先頭の三点リーダ
        r"^\.{3,}",
        // 笑い・感嘆
        r"^(haha|lol|oh my|gosh|geez)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("静的パターンは常に有効"))
    .collect()
});

/// この行を小さい音量で再生すべきか判定する
///
/// 短い相槌（"Hmm." や "Yeah!" など）を検出する簡易ヒューリスティック。
/// 判定は決定的で副作用はない。誤判定はありうるので、
/// 呼び出し側は [`crate::gain_plan::VolumeOverrides`] で行毎に上書きできる。
///
/// # Examples
///
/// ```
/// # use podcast_merge::volume::should_lower_volume;
/// assert!(should_lower_volume("Hmm."));
/// assert!(should_lower_volume("ohhhh"));
/// assert!(!should_lower_volume("That's a really interesting point about economics"));
/// ```
pub fn should_lower_volume(text: &str) -> bool {
    let clean = normalize(text);

    if LOW_VOLUME_EXPRESSIONS.contains(&clean.as_str()) {
        return true;
    }

    // 末尾の句読点の前に空白があれば空の語として数える（"Oh wow !" は3語）
    let word_count = WORD_SEPARATOR.split(&clean).count();
    if word_count > 2 {
        return false;
    }

    if REACTIVE_PATTERNS.iter().any(|p| p.is_match(&clean)) {
        return true;
    }

    // "ohhh", "wowww" のような伸ばし
    has_stretched_char(&clean)
}

/// 前後の空白と末尾の句読点を除去して小文字化
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(['.', ',', '!', '?'])
        .to_string()
}

/// 同じ文字が3回以上連続しているか
///
/// 改行類とサロゲートペアになる文字（絵文字など）は連続とみなさない。
fn has_stretched_char(text: &str) -> bool {
    let mut prev = None;
    let mut run = 0;
    for c in text.chars() {
        if matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') || c.len_utf16() > 1 {
            prev = None;
            run = 0;
        } else if Some(c) == prev {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_expressions() {
        assert!(should_lower_volume("Hmm."));
        assert!(should_lower_volume("Yeah!"));
        assert!(should_lower_volume("Whoa"));
        assert!(should_lower_volume("  I see...  "));
        assert!(should_lower_volume("Right?!"));
    }

    #[test]
    fn test_reactive_patterns() {
        assert!(should_lower_volume("Uh huh"));
        assert!(should_lower_volume("Got it."));
        assert!(should_lower_volume("Wow, really?"));
        assert!(should_lower_volume("Go on"));
        assert!(should_lower_volume("...interesting"));
        assert!(should_lower_volume("Haha, true"));
        assert!(should_lower_volume("Oh my!"));
    }

    #[test]
    fn test_stretched_letters() {
        assert!(should_lower_volume("ohhhh"));
        assert!(should_lower_volume("Sooo true"));
        assert!(!should_lower_volume("soo"));
    }

    #[test]
    fn test_stretch_ignores_line_breaks_and_astral_chars() {
        assert!(!has_stretched_char("a\n\n\nb"));
        assert!(!has_stretched_char("x\r\r\r"));
        assert!(!has_stretched_char("😀😀😀"));
        assert!(has_stretched_char("ええええ"));
        assert!(!should_lower_volume("😀😀😀"));
    }

    #[test]
    fn test_space_before_trailing_punctuation_counts_as_word() {
        assert!(!should_lower_volume("Oh wow !"));
        assert!(!should_lower_volume("Yeah sure ?"));
        assert!(should_lower_volume("Oh wow!"));
        assert!(should_lower_volume("Yeah sure?"));
    }

    #[test]
    fn test_ordinary_sentences() {
        assert!(!should_lower_volume(
            "That's a really interesting point about economics"
        ));
        // 3語以上はパターンに一致しても対象外
        assert!(!should_lower_volume("Yeah, I think so"));
        // 単語境界が必要
        assert!(!should_lower_volume("Ahead"));
        assert!(!should_lower_volume("Okayish"));
    }

    #[test]
    fn test_total_on_odd_input() {
        assert!(!should_lower_volume(""));
        assert!(!should_lower_volume("   "));
        assert!(!should_lower_volume("?!"));
        assert!(!should_lower_volume("こんにちは 世界"));
        assert!(should_lower_volume("ええええ"));
    }

    #[test]
    fn test_deterministic() {
        for text in ["Hmm.", "Totally different idea here", "wowww", ""] {
            let first = should_lower_volume(text);
            for _ in 0..5 {
                assert_eq!(should_lower_volume(text), first);
            }
        }
    }
}
