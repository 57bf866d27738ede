//! Codec errors

use thiserror::Error;

/// Errors raised while packing or unpacking chord and phrase wire values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Chord holds {0} actions, at most 12 fit in one chord")]
    TooManyActions(usize),

    #[error("Hex string has odd length {0}")]
    OddLength(usize),

    #[error("Invalid hex string: '{0}'")]
    InvalidHex(String),

    #[error("Chord value does not fit in 128 bits: '{0}'")]
    ChordOverflow(String),

    #[error("Scan code prefix at byte {0} has no low byte")]
    TruncatedScanCode(usize),

    #[error("Character {0:?} has no action code")]
    UnencodableChar(char),
}
