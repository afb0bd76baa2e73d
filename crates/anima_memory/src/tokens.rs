/// CJK, kana, Hangul and fullwidth forms: roughly two characters per token.
pub fn is_wide_char(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF     // Hangul Jamo
        | 0x2E80..=0x2FDF   // CJK radicals
        | 0x3000..=0x303F   // CJK symbols and punctuation
        | 0x3040..=0x309F   // Hiragana
        | 0x30A0..=0x30FF   // Katakana
        | 0x3100..=0x31FF   // Bopomofo, Hangul compat, Katakana ext
        | 0x3400..=0x4DBF   // CJK ext A
        | 0x4E00..=0x9FFF   // CJK unified
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0xF900..=0xFAFF   // CJK compatibility
        | 0xFF00..=0xFFEF   // Halfwidth and fullwidth forms
        | 0x20000..=0x2FA1F // CJK ext B+
    )
}

/// Rough token count: wide characters at ~2 per token, everything else at ~4.
pub fn estimate_tokens(text: &str) -> usize {
    let (wide, narrow) = text.chars().fold((0usize, 0usize), |(w, n), c| {
        if is_wide_char(c) {
            (w + 1, n)
        } else {
            (w, n + 1)
        }
    });
    wide.div_ceil(2) + narrow.div_ceil(4)
}
