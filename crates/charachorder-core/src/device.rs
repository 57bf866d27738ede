//! Device models
//!
//! Maps USB vendor/product ids to a device model. The tables are plain
//! `match` expressions; finding the ports themselves is left to the
//! [`PortEnumerator`](crate::protocol::PortEnumerator).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Adafruit vendor id (M0 based devices)
pub const ADAFRUIT_VID: u16 = 0x239A;
/// Espressif vendor id (S2 based devices)
pub const ESPRESSIF_VID: u16 = 0x303A;

/// CharaChorder product line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceModel {
    One,
    Lite,
    X,
    Engine,
}

impl DeviceModel {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceModel::One => "One",
            DeviceModel::Lite => "Lite",
            DeviceModel::X => "X",
            DeviceModel::Engine => "Engine",
        }
    }

    /// Number of keymap slots, where the firmware bounds it
    pub fn keymap_len(&self) -> Option<usize> {
        match self {
            DeviceModel::One => Some(90),
            DeviceModel::Lite => Some(67),
            DeviceModel::X | DeviceModel::Engine => None,
        }
    }
}

/// Microcontroller family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chipset {
    M0,
    S2,
}

impl Chipset {
    /// Board vendor for this chipset
    pub fn vendor(&self) -> &'static str {
        match self {
            Chipset::M0 => "Adafruit",
            Chipset::S2 => "Espressif",
        }
    }
}

/// A classified device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: DeviceModel,
    pub chipset: Chipset,
    /// The device is running its UF2 bootloader, not the firmware
    pub bootloader_mode: bool,
}

/// Model for a product id, and whether that id is the bootloader's
pub fn model_for_product(product_id: u16) -> Option<(DeviceModel, bool)> {
    let entry = match product_id {
        0x800F => (DeviceModel::One, false),
        0x801C => (DeviceModel::Lite, false),
        0x812E => (DeviceModel::Lite, false),
        0x812F => (DeviceModel::Lite, true),
        0x818B => (DeviceModel::X, false),
        0x818C => (DeviceModel::X, true),
        0x818D => (DeviceModel::X, false), // host
        0x818E => (DeviceModel::X, true),  // host
        0x8189 => (DeviceModel::Engine, false),
        0x818A => (DeviceModel::Engine, true),
        _ => return None,
    };
    Some(entry)
}

pub fn chipset_for_vendor(vendor_id: u16) -> Option<Chipset> {
    match vendor_id {
        ADAFRUIT_VID => Some(Chipset::M0),
        ESPRESSIF_VID => Some(Chipset::S2),
        _ => None,
    }
}

/// Classify a USB id pair. Returns None for anything that is not a CharaChorder.
pub fn classify(vendor_id: u16, product_id: u16) -> Option<DeviceInfo> {
    let (model, bootloader_mode) = model_for_product(product_id)?;
    let chipset = chipset_for_vendor(vendor_id)?;
    Some(DeviceInfo {
        model,
        chipset,
        bootloader_mode,
    })
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharaChorder {} {:?}", self.model.name(), self.chipset)?;
        if self.bootloader_mode {
            f.write_str(" (bootloader)")?;
        }
        Ok(())
    }
}
