//! Text preprocessing utilities for narration.
//!
//! Whitespace/case normalization shared by the response cache and the
//! remote client, plus the shape predicates that drive content-aware
//! delivery in local synthesis (alphabet letters are spoken slower than
//! sentences, exclamations get a small pitch lift).

/// Turkish vowels, both cases. Used to classify short tokens: a lone vowel
/// is delivered on a distinct pitch so letter-learning games sound right.
const VOWELS: &str = "aeıioöuüAEIİOÖUÜ";

/// Collapse runs of whitespace into single spaces and trim the ends.
///
/// Applied once at the orchestrator boundary; every downstream consumer
/// (cache key, remote request, local synthesis) sees the normalized form,
/// so identical lines always collide in the cache.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_space = false;

    for c in text.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
            }
            last_was_space = true;
        } else {
            result.push(c);
            last_was_space = false;
        }
    }

    result
}

/// Case-fold a string for cache-key comparison.
///
/// Unicode-aware lowercase. Deterministic for Turkish input; the dotted/
/// dotless-ı distinction folds the same way on read and write, which is
/// all the cache requires.
#[must_use]
pub fn fold_for_key(text: &str) -> String {
    text.to_lowercase()
}

/// Whether the text is a single short token (an alphabet letter, a digit,
/// a two-letter syllable) rather than a sentence.
#[must_use]
pub fn is_short_token(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= 2
        && trimmed.chars().all(char::is_alphanumeric)
}

/// Whether a short token starts with a vowel (vowel-like tokens get a
/// distinct pitch from consonants).
#[must_use]
pub fn is_vowel_like(text: &str) -> bool {
    text.trim()
        .chars()
        .next()
        .is_some_and(|c| VOWELS.contains(c))
}

/// Whether the text carries emphasis punctuation (`!` or `?`).
#[must_use]
pub fn has_emphasis(text: &str) -> bool {
    text.contains('!') || text.contains('?')
}

/// Whether the text contains anything speakable at all.
///
/// Punctuation-only lines (e.g. `"..."` used as a dramatic pause in story
/// data) produce no audio.
#[must_use]
pub fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
