//! CRC-16/X.25 used for the HDLC header (HCS) and frame (FCS) check sequences

use cosem_core::{DlmsError, DlmsResult};
use once_cell::sync::Lazy;

const INITIAL_FCS: u16 = 0xFFFF;
/// Residue after running the calculator over data followed by its FCS
const GOOD_FCS: u16 = 0xF0B8;
/// Bit-reversed 0x1021
const KEY: u16 = 0x8408;

static FCS_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        let mut v = b as u16;
        for _ in 0..8 {
            v = if v & 1 == 1 { (v >> 1) ^ KEY } else { v >> 1 };
        }
        *entry = v;
    }
    table
});

/// Incremental check sequence calculator
#[derive(Debug, Clone, Copy)]
pub struct FcsCalc {
    fcs_value: u16,
}

impl FcsCalc {
    pub fn new() -> Self {
        Self {
            fcs_value: INITIAL_FCS,
        }
    }

    pub fn reset(&mut self) {
        self.fcs_value = INITIAL_FCS;
    }

    pub fn update(&mut self, data: u8) {
        self.fcs_value =
            (self.fcs_value >> 8) ^ FCS_TABLE[((self.fcs_value ^ data as u16) & 0xFF) as usize];
    }

    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Check sequence as sent on the wire, least significant byte first.
    pub fn fcs_value_bytes(&self) -> [u8; 2] {
        (self.fcs_value ^ 0xFFFF).to_le_bytes()
    }

    /// Check that the bytes fed so far ended with a valid check sequence.
    pub fn validate(&self) -> DlmsResult<()> {
        if self.fcs_value != GOOD_FCS {
            return Err(DlmsError::FrameInvalid(format!(
                "Check sequence has wrong value: 0x{:04X}, expected 0x{:04X}",
                self.fcs_value, GOOD_FCS
            )));
        }
        Ok(())
    }

    pub fn value(&self) -> u16 {
        self.fcs_value
    }
}

impl Default for FcsCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Check sequence bytes of `data`.
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let mut calc = FcsCalc::new();
    calc.update_bytes(data);
    calc.fcs_value_bytes()
}

/// Validate `data` whose last two bytes are its check sequence.
pub fn verify(data: &[u8]) -> bool {
    let mut calc = FcsCalc::new();
    calc.update_bytes(data);
    calc.validate().is_ok()
}
