// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Decodes a SIAR CSV file through a chain of encoding fallbacks, stopping
//! at the first that decodes without errors (§4.6 point 1).

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// `latin-1` and `iso-8859-1` are the same byte table `encoding_rs` exposes
/// as `WINDOWS_1252`'s close relative; `encoding_rs` does not ship a
/// dedicated strict Latin-1 codec (`ISO-8859-1` in the WHATWG spec is an
/// alias for `windows-1252`), so the fallback chain named in the data model
/// collapses to two distinct decoders in practice: `windows-1252` (covers
/// `latin-1`/`iso-8859-1`/`cp1252`) and `utf-8`.
const FALLBACK_CHAIN: &[&Encoding] = &[WINDOWS_1252, UTF_8];

/// Decodes `bytes`, returning the first encoding in the chain that produces
/// no replacement characters, or the last attempted decode (lossy) if none
/// decode cleanly.
pub fn decode_with_fallback(bytes: &[u8]) -> String {
    for encoding in FALLBACK_CHAIN {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }
    // Last resort: lossy UTF-8, matching "stop at the first that decodes
    // without errors" when none genuinely do.
    let (text, _, _) = UTF_8.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_ascii() {
        assert_eq!(decode_with_fallback(b"hello"), "hello");
    }

    #[test]
    fn decodes_windows_1252_accented_characters() {
        // 'ñ' in windows-1252 is 0xF1.
        let bytes = [b'A', b'n', 0xF1, b'o'];
        assert_eq!(decode_with_fallback(&bytes), "Anño");
    }
}
