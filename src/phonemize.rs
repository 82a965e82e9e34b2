//! Text-to-IPA conversion through the espeak-ng C library.
//!
//! The library is driven in-process over FFI rather than by spawning the
//! `espeak-ng` binary, so there is no per-chunk process overhead.  Output
//! matches `espeak-ng --ipa -q -v <voice>` for the same input.

use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_int, c_void},
    sync::Mutex,
};

use anyhow::{anyhow, bail, Result};
use once_cell::sync::OnceCell;

use crate::lang::LangCode;

// Raw C API.  Link directives come from build.rs, not a #[link] attribute,
// because the library location differs per platform.
extern "C" {
    fn espeak_ng_InitializePath(path: *const c_char);
    fn espeak_ng_Initialize(context: *mut c_void) -> c_int;
    fn espeak_ng_SetVoiceByName(name: *const c_char) -> c_int;
    fn espeak_TextToPhonemes(
        textptr: *mut *const c_void,
        textmode: c_int,
        phonememode: c_int,
    ) -> *const c_char;
}

/// espeakCHARS_UTF8
const TEXTMODE_UTF8: c_int = 1;
/// espeakPHONEMES_IPA (bit 1)
const PHONEMEMODE_IPA: c_int = 0x02;

// espeak-ng keeps its state in globals and is not thread-safe, so every
// entry point below takes this lock first.
static LOCK: Mutex<()> = Mutex::new(());

// One-time library initialisation, memoised including its failure message.
static INIT: OnceCell<std::result::Result<(), String>> = OnceCell::new();

fn init_library() -> std::result::Result<(), String> {
    unsafe {
        // NULL selects the data path the library was compiled with.
        espeak_ng_InitializePath(std::ptr::null());
        let status = espeak_ng_Initialize(std::ptr::null_mut());
        if status != 0 {
            return Err(format!("espeak_ng_Initialize returned {:#010x}", status));
        }
    }
    Ok(())
}

/// Whether espeak-ng initialised successfully in this process.
pub fn is_espeak_available() -> bool {
    let _guard = LOCK.lock().unwrap_or_else(|p| p.into_inner());
    INIT.get_or_init(init_library).is_ok()
}

/// Convert `text` to an IPA phoneme string using the voice for `lang`.
///
/// espeak-ng translates clause by clause; the clauses are rejoined with
/// single spaces.  Empty input produces an empty string.
pub fn phonemize(text: &str, lang: LangCode) -> Result<String> {
    let _guard = LOCK.lock().unwrap_or_else(|p| p.into_inner());

    if let Err(msg) = INIT.get_or_init(init_library) {
        bail!("espeak-ng: {}", msg);
    }

    // The active voice is library-global state shared by every caller, so
    // it has to be re-selected each call rather than once at startup.
    let voice = CString::new(lang.espeak_voice()).expect("voice name has no NUL");
    let rc = unsafe { espeak_ng_SetVoiceByName(voice.as_ptr()) };
    if rc != 0 {
        bail!("espeak-ng: SetVoiceByName({}) returned {}", lang.espeak_voice(), rc);
    }

    let text_c = CString::new(text).map_err(|_| anyhow!("text contains a NUL byte"))?;
    let mut cursor: *const c_void = text_c.as_ptr() as *const c_void;
    let mut clauses: Vec<String> = Vec::new();

    // espeak_TextToPhonemes advances `cursor` one clause per call and sets
    // it to NULL once the input is exhausted.  The returned buffer is
    // internal to the library and reused, so each clause is copied out
    // before the next call.
    while !cursor.is_null() {
        let ptr = unsafe { espeak_TextToPhonemes(&mut cursor, TEXTMODE_UTF8, PHONEMEMODE_IPA) };
        if ptr.is_null() {
            continue;
        }
        let clause = unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .map_err(|_| anyhow!("espeak-ng produced non-UTF-8 phonemes"))?
            .trim();
        if !clause.is_empty() {
            clauses.push(clause.to_owned());
        }
    }

    Ok(clauses.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability() {
        assert!(is_espeak_available());
    }

    #[test]
    fn test_phonemize_hello() {
        let ipa = phonemize("Hello world", LangCode::AmericanEnglish).unwrap();
        assert!(!ipa.is_empty());
        assert!(
            ipa.contains('h') || ipa.contains('ɛ') || ipa.contains('l'),
            "unexpected IPA for 'Hello world': {ipa}"
        );
    }

    #[test]
    fn test_phonemize_british() {
        let ipa = phonemize("Hello world", LangCode::BritishEnglish).unwrap();
        assert!(!ipa.is_empty());
    }

    #[test]
    fn test_phonemize_empty() {
        let ipa = phonemize("", LangCode::AmericanEnglish).unwrap();
        assert!(ipa.trim().is_empty(), "expected empty IPA, got: {ipa}");
    }
}
