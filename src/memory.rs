//! Memory area and address definitions for S7 PLCs.
//!
//! This module defines the [`MemoryArea`] enum and the [`Address`] /
//! [`BitAddress`] types that identify a location in the controller's
//! address space.
//!
//! # Memory Areas Overview
//!
//! | Area | Description | Uses block number | Bit Access |
//! |------|-------------|:-----------------:|:----------:|
//! | I | Process image inputs | ✗ | ✓ |
//! | Q | Process image outputs | ✗ | ✓ |
//! | M | Markers (flag memory) | ✗ | ✓ |
//! | DB | Data blocks | ✓ | ✓ |
//! | T | Timers | ✗ | ✗ |
//! | C | Counters | ✗ | ✗ |
//!
//! # Example
//!
//! ```
//! use s7_gate::{Address, MemoryArea};
//!
//! let addr = Address::db(5, 10);
//! assert_eq!(addr.to_string(), "DB5.10");
//!
//! let bit = addr.bit(3).unwrap();
//! assert_eq!(bit.to_string(), "DB5.10.3");
//!
//! assert!(!MemoryArea::Timer.supports_bit_access());
//! ```

use crate::error::{GateError, Result};

/// Memory areas available in S7 PLCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryArea {
    /// Process image inputs (I / E).
    Input,
    /// Process image outputs (Q / A).
    Output,
    /// Marker / flag memory (M).
    Marker,
    /// Data blocks (DB), addressed by block number.
    DataBlock,
    /// Timers (T).
    Timer,
    /// Counters (C / Z).
    Counter,
}

impl MemoryArea {
    /// Returns the S7 protocol area code for this memory area.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::MemoryArea;
    ///
    /// assert_eq!(MemoryArea::DataBlock.code(), 0x84);
    /// ```
    pub fn code(self) -> u8 {
        match self {
            MemoryArea::Input => 0x81,
            MemoryArea::Output => 0x82,
            MemoryArea::Marker => 0x83,
            MemoryArea::DataBlock => 0x84,
            MemoryArea::Timer => 0x1D,
            MemoryArea::Counter => 0x1C,
        }
    }

    /// Returns whether single bits of this area can be addressed.
    pub fn supports_bit_access(self) -> bool {
        !matches!(self, MemoryArea::Timer | MemoryArea::Counter)
    }

    /// Returns whether addresses in this area carry a block number.
    pub fn uses_block(self) -> bool {
        matches!(self, MemoryArea::DataBlock)
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryArea::Input => write!(f, "I"),
            MemoryArea::Output => write!(f, "Q"),
            MemoryArea::Marker => write!(f, "M"),
            MemoryArea::DataBlock => write!(f, "DB"),
            MemoryArea::Timer => write!(f, "T"),
            MemoryArea::Counter => write!(f, "C"),
        }
    }
}

/// Byte-level location in the PLC address space.
///
/// `block` is only meaningful for [`MemoryArea::DataBlock`]; other areas
/// ignore it and [`Address::new`] stores it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Memory area.
    pub area: MemoryArea,
    /// Data block number (0 for areas without blocks).
    pub block: u16,
    /// Start byte offset inside the area or block.
    pub offset: u32,
}

impl Address {
    /// Creates a new address.
    pub fn new(area: MemoryArea, block: u16, offset: u32) -> Self {
        Self {
            area,
            block,
            offset,
        }
    }

    /// Creates an address inside data block `block`.
    pub fn db(block: u16, offset: u32) -> Self {
        Self::new(MemoryArea::DataBlock, block, offset)
    }

    /// Creates a marker (M) address.
    pub fn marker(offset: u32) -> Self {
        Self::new(MemoryArea::Marker, 0, offset)
    }

    /// Narrows this byte address to a single bit.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidAddress` if `bit` is greater than 7 or the
    /// area has no bit access.
    pub fn bit(self, bit: u8) -> Result<BitAddress> {
        if bit > 7 {
            return Err(GateError::invalid_address(format!(
                "bit index {} is out of range 0-7",
                bit
            )));
        }
        if !self.area.supports_bit_access() {
            return Err(GateError::invalid_address(format!(
                "{} area does not support bit access",
                self.area
            )));
        }
        Ok(BitAddress { byte: self, bit })
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.area.uses_block() {
            write!(f, "{}{}.{}", self.area, self.block, self.offset)
        } else {
            write!(f, "{}{}", self.area, self.offset)
        }
    }
}

/// A single bit inside a byte of the PLC address space.
///
/// Constructed through [`Address::bit`], which validates the bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitAddress {
    byte: Address,
    bit: u8,
}

impl BitAddress {
    /// Returns the byte containing this bit.
    pub fn byte(&self) -> Address {
        self.byte
    }

    /// Returns the bit index (0-7).
    pub fn bit(&self) -> u8 {
        self.bit
    }
}

impl std::fmt::Display for BitAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.byte, self.bit)
    }
}
