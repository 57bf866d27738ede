//! Wire codecs
//!
//! The device exchanges chords and phrases as hex strings. Chords use a fixed
//! 128-bit packing of 10-bit action codes; phrases use a variable-width byte
//! stream where a small leading byte marks a two-byte scan code.

pub mod chord;
mod error;
pub mod phrase;

pub use chord::Chord;
pub use error::CodecError;
pub use phrase::{ChordPhrase, PhraseElement};

/// Reject anything that is not a non-empty run of ASCII hex digits.
///
/// `from_str_radix` alone would accept a leading `+`.
fn check_hex(hex: &str) -> Result<(), CodecError> {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidHex(hex.to_string()));
    }
    Ok(())
}
