/*
 * This module provides token estimation for text about to be sent to a translation
 * vendor. The segmentation engine and the file pipeline both size their work with
 * `estimate_tokens`.
 *
 * The heuristic is deliberately not a real tokenizer. Segment boundaries, and
 * therefore which files are split and how, depend on it being reproduced exactly.
 */

const PUNCTUATION_CHARS: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '\'', '"',
];

/*
 * Word separators for the estimate. A byte-order mark separates words like any
 * other space, while NEL (U+0085) does not.
 */
fn is_word_separator(c: char) -> bool {
    c == '\u{feff}' || (c.is_whitespace() && c != '\u{85}')
}

/*
 * Estimates the token cost of `text`.
 *
 * Splitting follows "split on runs of whitespace": a leading or trailing whitespace
 * run yields an empty word, and an empty word still costs one token. Punctuation is
 * counted over the whole text, so punctuation inside a word is charged twice.
 */
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut token_count: usize = text
        .split(is_word_separator)
        .filter(|word| !word.is_empty())
        .map(|word| word.chars().count().div_ceil(4).max(1))
        .sum();

    if text.starts_with(is_word_separator) {
        token_count += 1;
    }
    if text.ends_with(is_word_separator) {
        token_count += 1;
    }

    token_count += text
        .chars()
        .filter(|c| PUNCTUATION_CHARS.contains(c))
        .count();

    token_count
}
