//! Phoneme normalisation and character-level tokenisation.
//!
//! The model consumes IPA phoneme strings one character at a time.  Two
//! steps happen here:
//!
//! 1. [`normalize_phonemes`] — post-phonemisation cleanup: espeak-ng emits
//!    a few symbols the model was not trained on (`ʲ`, `r`, `x`, `ɬ`) and
//!    some spacing quirks around plural endings and "hundred"; these are
//!    rewritten to the training distribution's conventions.
//! 2. [`phonemes_to_ids`] — map each character to its index in the fixed
//!    vocabulary `[_pad] + punctuation + letters + letters_ipa`, dropping
//!    unknown characters, then wrap the sequence in pad tokens (0).
//!
//! The model accepts at most [`MAX_TOKENS`] tokens between the pads.

use std::collections::HashMap;

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::lang::LangCode;

/// Hard context limit of the model (tokens between the two pads).
pub const MAX_TOKENS: usize = 510;

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary — index order matters, it must match the training configuration
// ─────────────────────────────────────────────────────────────────────────────

const PAD: char = '$';

/// Characters: ; : , . ! ? ¡ ¿ — … " « » " "  (space at end)
const PUNCTUATION: &str = ";:,.!?¡¿—…\u{201C}«»\u{201D}\" ";

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// IPA characters; the combining mark ̩ (U+0329) and curly quotes are
/// individual vocabulary entries.
const IPA_LETTERS: &str =
    "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘\u{2019}\u{0329}\u{2018}ᵻ";

static VOCAB: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    std::iter::once(PAD)
        .chain(PUNCTUATION.chars())
        .chain(LETTERS.chars())
        .chain(IPA_LETTERS.chars())
        .enumerate()
        .map(|(i, c)| (c, i as i64))
        .collect()
});

// ─────────────────────────────────────────────────────────────────────────────
// Phoneme normalisation
// ─────────────────────────────────────────────────────────────────────────────

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Re-insert the word boundary espeak-ng drops before "hundred".
static RE_HUNDRED: Lazy<FancyRegex> =
    Lazy::new(|| FancyRegex::new(r"(?<=[a-zɹː])(?=hˈʌndɹɪd)").unwrap());

/// Re-attach a detached final `z` (plural / possessive) to its word.
static RE_DETACHED_Z: Lazy<FancyRegex> =
    Lazy::new(|| FancyRegex::new(" z(?=[;:,.!?¡¿—…\u{201C}«»\u{201D}\" ]|$)").unwrap());

/// American English flaps the t in "ninety" (…nˈaɪnti… → …nˈaɪndi…).
static RE_NINETY_FLAP: Lazy<FancyRegex> =
    Lazy::new(|| FancyRegex::new(r"(?<=nˈaɪn)ti(?!ː)").unwrap());

/// Rewrite a raw espeak-ng IPA string to the model's conventions.
pub fn normalize_phonemes(ps: &str, lang: LangCode) -> String {
    let ps = RE_SPACES.replace_all(ps.trim(), " ").into_owned();
    let ps = ps
        .replace('ʲ', "j")
        .replace('r', "ɹ")
        .replace('x', "k")
        .replace('ɬ', "l");

    let ps = RE_HUNDRED.replace_all(&ps, " ").into_owned();
    let ps = RE_DETACHED_Z.replace_all(&ps, "z").into_owned();
    let ps = if lang == LangCode::AmericanEnglish {
        RE_NINETY_FLAP.replace_all(&ps, "di").into_owned()
    } else {
        ps
    };

    // Drop anything outside the vocabulary up front so the reported phoneme
    // annotation matches what the model actually saw.
    ps.chars()
        .filter(|c| VOCAB.contains_key(c))
        .collect::<String>()
        .trim()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokenisation
// ─────────────────────────────────────────────────────────────────────────────

/// Map a character to its vocabulary index, `None` for unknowns.
pub fn char_to_id(c: char) -> Option<i64> {
    VOCAB.get(&c).copied()
}

/// Convert a normalised phoneme string to a padded token ID sequence:
/// `[0, id…, 0]`.  Unknown characters are silently dropped.
pub fn phonemes_to_ids(ps: &str) -> Vec<i64> {
    let mut ids = vec![0i64];
    ids.extend(ps.chars().filter_map(char_to_id));
    ids.push(0i64);
    ids
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_is_zero() {
        assert_eq!(char_to_id('$'), Some(0));
    }

    #[test]
    fn test_vocab_is_injective() {
        let mut seen = std::collections::HashSet::new();
        for &idx in VOCAB.values() {
            assert!(seen.insert(idx), "duplicate index {}", idx);
        }
    }

    #[test]
    fn test_unknown_chars_dropped() {
        let ids = phonemes_to_ids("h中ɛ");
        // pad + 'h' + 'ɛ' + pad; '中' is not in the vocabulary.
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], 0);
        assert_eq!(*ids.last().unwrap(), 0);
    }

    #[test]
    fn test_ids_are_padded() {
        let ids = phonemes_to_ids("hɛloʊ");
        assert_eq!(ids[0], 0);
        assert_eq!(*ids.last().unwrap(), 0);
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_normalize_substitutions() {
        let out = normalize_phonemes("rʲxɬ", LangCode::AmericanEnglish);
        assert_eq!(out, "ɹjkl");
    }

    #[test]
    fn test_normalize_whitespace() {
        let out = normalize_phonemes("  hɛloʊ \n wɜːld  ", LangCode::BritishEnglish);
        assert_eq!(out, "hɛloʊ wɜːld");
    }

    #[test]
    fn test_ninety_flap_american_only() {
        let us = normalize_phonemes("nˈaɪnti", LangCode::AmericanEnglish);
        assert_eq!(us, "nˈaɪndi");
        let gb = normalize_phonemes("nˈaɪnti", LangCode::BritishEnglish);
        assert_eq!(gb, "nˈaɪnti");
    }

    #[test]
    fn test_detached_z_reattached() {
        let out = normalize_phonemes("dˈɔɡ z,", LangCode::AmericanEnglish);
        assert_eq!(out, "dˈɔɡz,");
    }

    #[test]
    fn test_out_of_vocab_filtered_by_normalize() {
        let out = normalize_phonemes("hɛ👋loʊ", LangCode::AmericanEnglish);
        assert_eq!(out, "hɛloʊ");
    }
}
