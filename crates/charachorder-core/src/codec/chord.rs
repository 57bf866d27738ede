//! Chord encoding
//!
//! A chord is packed into a 128-bit value of twelve 10-bit slots, slot 0 being
//! the least significant. A chord of length L occupies slots (12 - L)..=11 in
//! key order: the first action sits in the lowest used slot, the last action
//! in slot 11. Unused low slots stay zero.
//!
//! Wire form is 32 uppercase hex digits. Action code 0 cannot be represented,
//! because an empty slot and a zero action look the same on the wire.

use std::fmt;

use super::{check_hex, CodecError};

/// Maximum number of actions in one chord
pub const MAX_CHORD_ACTIONS: usize = 12;

/// Length of the hex wire form
pub const CHORD_HEX_LEN: usize = 32;

const ACTION_BITS: usize = 10;
const ACTION_MASK: u128 = 0x3FF;

/// Encode action codes into the 32-digit hex wire form.
///
/// Each action is masked to its low 10 bits.
pub fn encode(actions: &[u16]) -> Result<String, CodecError> {
    if actions.len() > MAX_CHORD_ACTIONS {
        return Err(CodecError::TooManyActions(actions.len()));
    }
    Ok(format!("{:032X}", pack(actions)))
}

/// Decode a hex chord value back into its action codes.
///
/// Hex digits are accepted in either case. Zero slots decode to nothing.
pub fn decode(hex: &str) -> Result<Vec<u16>, CodecError> {
    check_hex(hex)?;
    let mut raw =
        u128::from_str_radix(hex, 16).map_err(|_| CodecError::ChordOverflow(hex.to_string()))?;

    let mut actions = Vec::with_capacity(MAX_CHORD_ACTIONS);
    for _ in 0..MAX_CHORD_ACTIONS {
        let action = (raw & ACTION_MASK) as u16;
        if action != 0 {
            actions.push(action);
        }
        raw >>= ACTION_BITS;
    }
    Ok(actions)
}

fn pack(actions: &[u16]) -> u128 {
    actions
        .iter()
        .rev()
        .enumerate()
        .fold(0u128, |raw, (i, &action)| {
            let slot = MAX_CHORD_ACTIONS - 1 - i;
            raw | ((u128::from(action) & ACTION_MASK) << (slot * ACTION_BITS))
        })
}

/// A chord: up to 12 keys pressed together
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Chord {
    actions: Vec<u16>,
}

impl Chord {
    /// Create a chord from action codes
    pub fn new(actions: Vec<u16>) -> Result<Self, CodecError> {
        if actions.len() > MAX_CHORD_ACTIONS {
            return Err(CodecError::TooManyActions(actions.len()));
        }
        let actions = actions.into_iter().map(|a| a & ACTION_MASK as u16).collect();
        Ok(Self { actions })
    }

    /// Create a chord whose actions are the characters of `text`.
    ///
    /// Characters above the 10-bit action range are rejected.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let actions = text
            .chars()
            .map(|c| match u16::try_from(u32::from(c)) {
                Ok(code) if u128::from(code) <= ACTION_MASK => Ok(code),
                _ => Err(CodecError::UnencodableChar(c)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(actions)
    }

    /// Parse a chord from its hex wire form
    pub fn from_hex(hex: &str) -> Result<Self, CodecError> {
        Ok(Self {
            actions: decode(hex)?,
        })
    }

    /// Render the chord in its hex wire form
    pub fn to_hex(&self) -> String {
        format!("{:032X}", pack(&self.actions))
    }

    /// Action codes in key order
    pub fn actions(&self) -> &[u16] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &action in &self.actions {
            let c = char::from_u32(u32::from(action)).unwrap_or(char::REPLACEMENT_CHARACTER);
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(&[97, 98]).unwrap(), "00188610000000000000000000000000");
        assert_eq!(encode(&[1]).unwrap(), "00004000000000000000000000000000");
        assert_eq!(
            encode(&(1..=12).collect::<Vec<u16>>()).unwrap(),
            "000300B0280902007018050100300801"
        );
        assert_eq!(encode(&[1023; 12]).unwrap(), "00FFFFFFFFFFFFFFFFFFFFFFFFFFFFFF");
    }

    #[test]
    fn test_encode_empty_chord() {
        assert_eq!(encode(&[]).unwrap(), "0".repeat(CHORD_HEX_LEN));
        assert!(decode(&"0".repeat(CHORD_HEX_LEN)).unwrap().is_empty());
    }

    #[test]
    fn test_encode_masks_to_ten_bits() {
        assert_eq!(encode(&[0x5FF]).unwrap(), "007FC000000000000000000000000000");
        assert_eq!(decode("007FC000000000000000000000000000").unwrap(), vec![0x1FF]);
    }

    #[test]
    fn test_encode_rejects_thirteen_actions() {
        assert_eq!(encode(&[1; 13]), Err(CodecError::TooManyActions(13)));
        assert!(Chord::new(vec![1; 13]).is_err());
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        assert_eq!(
            decode("001e4651a00000000000000000000000").unwrap(),
            vec![b'h' as u16, b'e' as u16, b'y' as u16]
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("xyz"), Err(CodecError::InvalidHex(_))));
        assert!(matches!(decode(""), Err(CodecError::InvalidHex(_))));
        assert!(matches!(
            decode(&"F".repeat(33)),
            Err(CodecError::ChordOverflow(_))
        ));
    }

    #[test]
    fn test_zero_action_is_lost() {
        let hex = encode(&[0, 65]).unwrap();
        assert_eq!(decode(&hex).unwrap(), vec![65]);
    }

    #[test]
    fn test_chord_text() {
        let chord = Chord::from_text("hey").unwrap();
        assert_eq!(chord.to_hex(), "001E4651A00000000000000000000000");
        assert_eq!(chord.len(), 3);

        let parsed = Chord::from_hex("001E4651A00000000000000000000000").unwrap();
        assert_eq!(parsed, chord);
        assert_eq!(parsed.to_string(), "hey");
    }

    #[test]
    fn test_chord_text_rejects_wide_chars() {
        assert_eq!(Chord::from_text("a€"), Err(CodecError::UnencodableChar('€')));
        assert_eq!(Chord::from_text("\u{3FF}").unwrap().actions(), &[0x3FF]);
        assert_eq!(
            Chord::from_text("\u{400}"),
            Err(CodecError::UnencodableChar('\u{400}'))
        );
    }
}
