//! # CharaChorder Core Library
//!
//! Protocol engine for the CharaChorder serial API.
//!
//! This library provides:
//! - A command channel speaking the line-oriented request/response protocol
//! - Automatic reconnection when the device reboots and re-enumerates
//! - Codecs for the chord (fixed 128-bit) and phrase (variable width) wire values
//! - Typed wrappers for the device command set
//!
//! ## Example
//!
//! ```rust,ignore
//! use charachorder_core::prelude::*;
//!
//! let target = TransportTarget::new(0x303A, 0x812E, "/dev/ttyACM0");
//! let mut channel = CommandChannel::serial(target, ChannelConfig::default());
//! channel.open()?;
//!
//! println!("{} chordmaps", channel.chordmap_count()?);
//! let chord = Chord::from_text("hey")?;
//! if let Some(phrase) = channel.chordmap_by_chord(&chord)? {
//!     println!("{} -> {}", chord, phrase);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod device;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::{Chord, ChordPhrase, CodecError, PhraseElement};
    pub use crate::device::{DeviceInfo, DeviceModel};
    pub use crate::protocol::{
        ChannelConfig, ChannelState, CommandChannel, KeymapCode, ParameterCode, ProtocolError,
        ResponsePolicy, SerialChannel, Token, TransportTarget,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
