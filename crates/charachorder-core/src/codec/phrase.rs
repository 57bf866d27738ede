//! Phrase encoding
//!
//! A phrase is the output a chord expands to. On the wire it is a hex string
//! of byte groups. Bytes 0x00-0x1F are the high byte of a 10-bit scan code and
//! always pair with the byte after them; every other byte stands alone.
//!
//! Decoding is a single pass into a growable buffer: a backspace action
//! removes the previously decoded element, so it cannot be decoded lazily.

use std::fmt;

use super::{check_hex, CodecError};

/// Highest byte value that starts a two-byte scan code
pub const SCAN_CODE_PREFIX_MAX: u8 = 0x1F;

/// Action code for a line break
pub const LINE_BREAK: u16 = 296;
/// Action code for backspace
pub const BACKSPACE: u16 = 298;
/// Action code for tab
pub const TAB: u16 = 299;
/// Action code for the right-hand space key
pub const SPACE: u16 = 544;

/// One decoded phrase output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhraseElement {
    /// A printable character or raw control code
    Char(char),
    LineBreak,
    Tab,
    Space,
    /// An action with no text form yet; rendered as `<code>`
    Unsupported(u16),
}

impl PhraseElement {
    /// Classify one action code. Backspace is handled by the decoder, not here.
    pub fn from_code(code: u16) -> Self {
        match code {
            LINE_BREAK => PhraseElement::LineBreak,
            TAB => PhraseElement::Tab,
            SPACE => PhraseElement::Space,
            0..=126 => PhraseElement::Char(char::from(code as u8)),
            _ => PhraseElement::Unsupported(code),
        }
    }

    /// The action code this element was decoded from
    pub fn code(&self) -> u16 {
        match self {
            PhraseElement::Char(c) => *c as u16,
            PhraseElement::LineBreak => LINE_BREAK,
            PhraseElement::Tab => TAB,
            PhraseElement::Space => SPACE,
            PhraseElement::Unsupported(code) => *code,
        }
    }
}

impl fmt::Display for PhraseElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhraseElement::Char(c) => write!(f, "{}", c),
            PhraseElement::LineBreak => f.write_str("\n"),
            PhraseElement::Tab => f.write_str("\t"),
            PhraseElement::Space => f.write_str(" "),
            PhraseElement::Unsupported(code) => write!(f, "<{}>", code),
        }
    }
}

/// Encode action codes into the phrase hex wire form.
///
/// Codes above 0xFF take two bytes (high then low), all others take one.
pub fn encode(actions: &[u16]) -> String {
    let mut hex = String::with_capacity(actions.len() * 4);
    for &action in actions {
        if action > 0xFF {
            hex.push_str(&format!("{:02X}", action >> 8));
        }
        hex.push_str(&format!("{:02X}", action & 0xFF));
    }
    hex
}

/// Decode a phrase hex string into output elements.
pub fn decode(hex: &str) -> Result<Vec<PhraseElement>, CodecError> {
    let bytes = parse_bytes(hex)?;
    let mut elements = Vec::with_capacity(bytes.len());

    let mut iter = bytes.into_iter().enumerate();
    while let Some((pos, byte)) = iter.next() {
        let code = if byte <= SCAN_CODE_PREFIX_MAX {
            let (_, low) = iter.next().ok_or(CodecError::TruncatedScanCode(pos))?;
            (u16::from(byte) << 8) | u16::from(low)
        } else {
            u16::from(byte)
        };

        if code == BACKSPACE {
            elements.pop();
        } else {
            elements.push(PhraseElement::from_code(code));
        }
    }
    Ok(elements)
}

fn parse_bytes(hex: &str) -> Result<Vec<u8>, CodecError> {
    if hex.is_empty() {
        return Ok(Vec::new());
    }
    check_hex(hex)?;
    if hex.len() % 2 != 0 {
        return Err(CodecError::OddLength(hex.len()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| CodecError::InvalidHex(hex.to_string()))
        })
        .collect()
}

/// The output sequence a chord expands to
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChordPhrase {
    elements: Vec<PhraseElement>,
}

impl ChordPhrase {
    pub fn new(elements: Vec<PhraseElement>) -> Self {
        Self { elements }
    }

    /// Build a phrase from plain text.
    ///
    /// Printable ASCII maps to itself, `\n` and `\t` to their action codes.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let elements = text
            .chars()
            .map(|c| match c {
                '\n' => Ok(PhraseElement::LineBreak),
                '\t' => Ok(PhraseElement::Tab),
                ' '..='~' => Ok(PhraseElement::Char(c)),
                _ => Err(CodecError::UnencodableChar(c)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { elements })
    }

    /// Parse a phrase from its hex wire form
    pub fn from_hex(hex: &str) -> Result<Self, CodecError> {
        Ok(Self {
            elements: decode(hex)?,
        })
    }

    /// Render the phrase in its hex wire form
    pub fn to_hex(&self) -> String {
        encode(&self.action_codes())
    }

    pub fn elements(&self) -> &[PhraseElement] {
        &self.elements
    }

    /// Action codes of every element, in order
    pub fn action_codes(&self) -> Vec<u16> {
        self.elements.iter().map(PhraseElement::code).collect()
    }
}

impl fmt::Display for ChordPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}
