use alloc::vec::Vec;

use serde::Serialize;

/// One outbound report: `{"device": ..., "msg": ...}`.
///
/// Encoded compactly, with no space after `:` (`{"device":"esp32cam",...}`).
/// Receivers that compare bytes instead of parsing JSON see a different body
/// than the spaced form the HTTP sketch this replaces used to send.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report<'a> {
    pub device: &'a str,
    pub msg: &'a str,
}

impl<'a> Report<'a> {
    pub const fn new(device: &'a str, msg: &'a str) -> Self {
        Self { device, msg }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
