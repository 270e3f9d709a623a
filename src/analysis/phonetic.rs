//! Pinyin expansion for CJK tokens.

use pinyin::ToPinyin;

/// Derive the auxiliary phonetic terms for `token`: the tone-less pinyin of
/// every mapped character concatenated, then the concatenated initials.
///
/// Characters without a pinyin mapping are skipped, so latin tokens and
/// punctuation produce nothing. Duplicates are collapsed.
pub fn expand(token: &str) -> Vec<String> {
    let mut full = String::new();
    let mut initials = String::new();

    for syllable in token.to_pinyin().flatten() {
        full.push_str(syllable.plain());
        initials.push_str(syllable.first_letter());
    }

    let mut terms = Vec::with_capacity(2);
    if !full.is_empty() && full != token {
        terms.push(full);
    }
    if !initials.is_empty() && initials != token && !terms.contains(&initials) {
        terms.push(initials);
    }
    terms
}
