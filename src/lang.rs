//! Language codes understood by the model.
//!
//! The hub's voice packs encode the language in the voice name's first
//! letter: `a…` is American English, `b…` is British English.

/// Language a voice pack was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangCode {
    AmericanEnglish,
    BritishEnglish,
}

impl LangCode {
    /// Derive the language from a voice-pack name (`af`, `bm_george`, …).
    /// Anything that is not explicitly British falls back to American.
    pub fn from_voice_name(name: &str) -> Self {
        if name.starts_with('b') {
            LangCode::BritishEnglish
        } else {
            LangCode::AmericanEnglish
        }
    }

    /// The espeak-ng voice that produces this language's phonemes.
    pub fn espeak_voice(self) -> &'static str {
        match self {
            LangCode::AmericanEnglish => "en-us",
            LangCode::BritishEnglish => "en-gb",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_voice_name() {
        assert_eq!(LangCode::from_voice_name("af"), LangCode::AmericanEnglish);
        assert_eq!(LangCode::from_voice_name("am_adam"), LangCode::AmericanEnglish);
        assert_eq!(LangCode::from_voice_name("bf_emma"), LangCode::BritishEnglish);
        assert_eq!(LangCode::from_voice_name("bm_george"), LangCode::BritishEnglish);
    }

    #[test]
    fn test_espeak_voice_names() {
        assert_eq!(LangCode::AmericanEnglish.espeak_voice(), "en-us");
        assert_eq!(LangCode::BritishEnglish.espeak_voice(), "en-gb");
    }
}
