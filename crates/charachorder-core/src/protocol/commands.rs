//! Device commands
//!
//! Typed wrappers over [`CommandChannel::execute`] for the CharaChorder
//! serial API. Most are one line; status replies use `"0"` for success.

use serde::{Deserialize, Serialize};

use super::{token, CommandChannel, PortEnumerator, ProtocolError, Token, Transport};
use crate::codec::{Chord, ChordPhrase};
use crate::device;

/// Device parameters readable and writable with `VAR B1` / `VAR B2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParameterCode {
    EnableSerialHeader = 0x01,
    EnableSerialLogging = 0x02,
    EnableSerialDebugging = 0x03,
    EnableSerialRaw = 0x04,
    EnableSerialChord = 0x05,
    EnableSerialKeyboard = 0x06,
    EnableSerialMouse = 0x07,
    EnableUsbHidKeyboard = 0x11,
    EnableCharacterEntry = 0x12,
    GuiCtrlSwapMode = 0x13,
    KeyScanDuration = 0x14,
    KeyDebouncePressDuration = 0x15,
    KeyDebounceReleaseDuration = 0x16,
    KeyboardOutputCharacterMicrosecondDelays = 0x17,
    EnableUsbHidMouse = 0x21,
    SlowMouseSpeed = 0x22,
    FastMouseSpeed = 0x23,
    EnableActiveMouse = 0x24,
    MouseScrollSpeed = 0x25,
    MousePollDuration = 0x26,
    EnableChording = 0x31,
    EnableChordingCharacterCounterTimeout = 0x32,
    ChordingCharacterCounterTimeoutTimer = 0x33,
    ChordDetectionPressTolerance = 0x34,
    ChordDetectionReleaseTolerance = 0x35,
    EnableSpurring = 0x41,
    EnableSpurringCharacterCounterTimeout = 0x42,
    SpurringCharacterCounterTimeoutTimer = 0x43,
    EnableArpeggiates = 0x51,
    ArpeggiateTolerance = 0x52,
    EnableCompoundChording = 0x61,
    CompoundTolerance = 0x64,
    LedBrightness = 0x81,
    LedColorCode = 0x82,
    EnableLedKeyHighlight = 0x83,
    EnableLeds = 0x84,
    OperatingSystem = 0x91,
    EnableRealtimeFeedback = 0x92,
    EnableCharachorderReadyOnStartup = 0x93,
}

impl ParameterCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Keymap layers addressed by `VAR B3` / `VAR B4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeymapCode {
    Primary = 0xA1,
    Secondary = 0xA2,
    Tertiary = 0xA3,
}

impl KeymapCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Valid action ids for `VAR B4`
const ACTION_ID_RANGE: std::ops::Range<u16> = 8..2048;

fn payload_token<'a>(payload: &'a [String], index: usize, command: &str) -> Result<&'a str, ProtocolError> {
    payload
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ProtocolError::InvalidResponse {
            command: command.to_string(),
            response: payload.join(" "),
        })
}

fn parse_number<N: std::str::FromStr>(token: &str, command: &str) -> Result<N, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::InvalidResponse {
        command: command.to_string(),
        response: token.to_string(),
    })
}

impl<T: Transport, E: PortEnumerator> CommandChannel<T, E> {
    /// Run a command that answers with a single status token
    fn status(&mut self, tokens: &[Token]) -> Result<bool, ProtocolError> {
        let payload = self.execute(tokens)?;
        Ok(payload_token(&payload, 0, &token::render(tokens))? == "0")
    }

    fn number<N: std::str::FromStr>(&mut self, tokens: &[Token]) -> Result<N, ProtocolError> {
        let command = token::render(tokens);
        let payload = self.execute(tokens)?;
        parse_number(payload_token(&payload, 0, &command)?, &command)
    }

    fn check_keymap_index(&self, index: usize) -> Result<(), ProtocolError> {
        let target = self.target();
        let bound = device::classify(target.vendor_id(), target.product_id())
            .and_then(|info| info.model.keymap_len());
        match bound {
            Some(len) if index >= len => Err(ProtocolError::IndexOutOfRange {
                what: "keymap",
                index,
                len,
            }),
            _ => Ok(()),
        }
    }

    /// `ID`: the device identification string
    pub fn device_id(&mut self) -> Result<String, ProtocolError> {
        Ok(self.execute(&["ID".into()])?.join(" "))
    }

    /// `VERSION`: the firmware version
    pub fn device_version(&mut self) -> Result<String, ProtocolError> {
        let payload = self.execute(&["VERSION".into()])?;
        Ok(payload_token(&payload, 0, "VERSION")?.to_string())
    }

    /// `CML C0`: number of stored chordmaps
    pub fn chordmap_count(&mut self) -> Result<usize, ProtocolError> {
        self.number(&["CML".into(), "C0".into()])
    }

    /// `CML C1`: the chordmap stored at `index`
    pub fn chordmap_by_index(&mut self, index: usize) -> Result<(Chord, ChordPhrase), ProtocolError> {
        let len = self.chordmap_count()?;
        if index >= len {
            return Err(ProtocolError::IndexOutOfRange {
                what: "chordmap",
                index,
                len,
            });
        }

        let tokens: [Token; 3] = ["CML".into(), "C1".into(), index.into()];
        let command = token::render(&tokens);
        let payload = self.execute(&tokens)?;
        let chord = Chord::from_hex(payload_token(&payload, 0, &command)?)?;
        let phrase = ChordPhrase::from_hex(payload_token(&payload, 1, &command)?)?;
        Ok((chord, phrase))
    }

    /// `CML C2`: the phrase mapped to `chord`, if any
    pub fn chordmap_by_chord(&mut self, chord: &Chord) -> Result<Option<ChordPhrase>, ProtocolError> {
        let tokens: [Token; 3] = ["CML".into(), "C2".into(), chord.to_hex().into()];
        let command = token::render(&tokens);
        let payload = self.execute(&tokens)?;
        match payload_token(&payload, 0, &command)? {
            "0" => Ok(None),
            hex => Ok(Some(ChordPhrase::from_hex(hex)?)),
        }
    }

    /// `CML C3`: map `chord` to `phrase`
    pub fn set_chordmap(&mut self, chord: &Chord, phrase: &ChordPhrase) -> Result<bool, ProtocolError> {
        self.status(&[
            "CML".into(),
            "C3".into(),
            chord.to_hex().into(),
            phrase.to_hex().into(),
        ])
    }

    /// `CML C4`: remove the mapping for `chord`
    pub fn delete_chordmap(&mut self, chord: &Chord) -> Result<bool, ProtocolError> {
        self.status(&["CML".into(), "C4".into(), chord.to_hex().into()])
    }

    /// `VAR B0`: commit parameter changes to flash
    pub fn commit(&mut self) -> Result<bool, ProtocolError> {
        self.status(&["VAR".into(), "B0".into()])
    }

    /// `VAR B1`
    pub fn get_parameter(&mut self, code: ParameterCode) -> Result<i64, ProtocolError> {
        self.number(&["VAR".into(), "B1".into(), code.code().into()])
    }

    /// `VAR B2`
    pub fn set_parameter(&mut self, code: ParameterCode, value: i64) -> Result<bool, ProtocolError> {
        self.status(&["VAR".into(), "B2".into(), code.code().into(), value.into()])
    }

    /// `VAR B3`: action id bound to a key
    pub fn get_keymap(&mut self, code: KeymapCode, index: usize) -> Result<u16, ProtocolError> {
        self.check_keymap_index(index)?;
        self.number(&["VAR".into(), "B3".into(), code.code().into(), index.into()])
    }

    /// `VAR B4`: bind `action_id` to a key
    pub fn set_keymap(&mut self, code: KeymapCode, index: usize, action_id: u16) -> Result<bool, ProtocolError> {
        self.check_keymap_index(index)?;
        if !ACTION_ID_RANGE.contains(&action_id) {
            return Err(ProtocolError::IndexOutOfRange {
                what: "action id",
                index: usize::from(action_id),
                len: usize::from(ACTION_ID_RANGE.end),
            });
        }
        self.status(&[
            "VAR".into(),
            "B4".into(),
            code.code().into(),
            index.into(),
            action_id.into(),
        ])
    }

    fn reset(&mut self, mode: &str) -> Result<(), ProtocolError> {
        self.execute(&["RST".into(), mode.into()]).map(|_| ())
    }

    /// `RST PARAMS`
    pub fn reset_parameters(&mut self) -> Result<(), ProtocolError> {
        self.reset("PARAMS")
    }

    /// `RST KEYMAPS`
    pub fn reset_keymaps(&mut self) -> Result<(), ProtocolError> {
        self.reset("KEYMAPS")
    }

    /// `RST STARTER`
    pub fn append_starter_chords(&mut self) -> Result<(), ProtocolError> {
        self.reset("STARTER")
    }

    /// `RST CLEARCML`: delete every chordmap
    pub fn nuke_chordmaps(&mut self) -> Result<(), ProtocolError> {
        self.reset("CLEARCML")
    }

    /// `RST UPGRADECML`
    pub fn upgrade_chordmaps(&mut self) -> Result<(), ProtocolError> {
        self.reset("UPGRADECML")
    }

    /// `RST FUNC`
    pub fn append_functional_chords(&mut self) -> Result<(), ProtocolError> {
        self.reset("FUNC")
    }

    /// `RAM`: free memory in bytes
    pub fn available_ram(&mut self) -> Result<u32, ProtocolError> {
        self.number(&["RAM".into()])
    }

    /// `SIM`: feed simulated input, returns the device's hex answer
    pub fn sim(&mut self, subcommand: &str, value: &str) -> Result<String, ProtocolError> {
        let tokens: [Token; 3] = ["SIM".into(), subcommand.into(), value.into()];
        let command = token::render(&tokens);
        let payload = self.execute(&tokens)?;
        Ok(payload_token(&payload, 0, &command)?.to_string())
    }
}
