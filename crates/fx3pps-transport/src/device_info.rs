//! Device identity for FX3 PPS boards

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the PPS link a board implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Board observes an external PPS signal and reports edges to the host
    Receiver,
    /// Board drives its output from host writes
    Generator,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Receiver => write!(f, "receiver"),
            DeviceRole::Generator => write!(f, "generator"),
        }
    }
}

/// Vendor/product identifiers that select the boards and their roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbIds {
    pub vendor_id: u16,
    pub receiver_product_id: u16,
    pub generator_product_id: u16,
}

impl UsbIds {
    /// Role of a device with the given identifiers, if it is one of ours.
    pub fn role_of(&self, vendor_id: u16, product_id: u16) -> Option<DeviceRole> {
        if vendor_id != self.vendor_id {
            return None;
        }
        if product_id == self.receiver_product_id {
            Some(DeviceRole::Receiver)
        } else if product_id == self.generator_product_id {
            Some(DeviceRole::Generator)
        } else {
            None
        }
    }

    pub fn product_id(&self, role: DeviceRole) -> u16 {
        match role {
            DeviceRole::Receiver => self.receiver_product_id,
            DeviceRole::Generator => self.generator_product_id,
        }
    }
}

impl Default for UsbIds {
    fn default() -> Self {
        Self {
            vendor_id: 0x04b4,
            receiver_product_id: 0x00f0,
            generator_product_id: 0x00fa,
        }
    }
}

/// Bus position of an attached device; the key of the attach map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub bus: u8,
    pub address: u8,
}

impl DeviceKey {
    pub fn new(bus: u8, address: u8) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub key: DeviceKey,
    pub role: DeviceRole,
}

impl DeviceInfo {
    pub fn new(vendor_id: u16, product_id: u16, key: DeviceKey, role: DeviceRole) -> Self {
        Self {
            vendor_id,
            product_id,
            key,
            role,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }

    pub fn display_name(&self) -> String {
        format!(
            "{} {:04x}:{:04x} at {}",
            self.role, self.vendor_id, self.product_id, self.key
        )
    }
}
