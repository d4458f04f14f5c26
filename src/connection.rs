//! Device connection capability.
//!
//! The [`DeviceConnection`] trait is the seam between the access layer and
//! whatever actually talks to the PLC. The access layer only knows about
//! addresses and bytes; the connection only knows about the wire.
//!
//! Implementors provide the byte-level operations. Typed reads and writes
//! have default implementations built on the [`value`](crate::value) codec,
//! which connections with native typed requests can override.

use crate::error::{GateError, Result};
use crate::memory::{Address, BitAddress};
use crate::value::{self, PlcValue, VarType};

/// A stateful connection to exactly one PLC.
///
/// Methods take `&mut self`: the access layer guarantees that only one
/// operation uses the connection at a time.
pub trait DeviceConnection: Send {
    /// Opens the connection.
    fn open(&mut self) -> Result<()>;

    /// Closes the connection.
    fn close(&mut self) -> Result<()>;

    /// Returns whether the connection is currently open.
    fn is_connected(&self) -> bool;

    /// Label identifying the remote device in log annotations (e.g. its IP).
    fn endpoint(&self) -> String;

    /// Reads `count` raw bytes starting at `address`.
    fn read_bytes(&mut self, address: Address, count: usize) -> Result<Vec<u8>>;

    /// Writes raw bytes starting at `address`.
    fn write_bytes(&mut self, address: Address, data: &[u8]) -> Result<()>;

    /// Writes a single bit.
    fn write_bit(&mut self, address: BitAddress, value: bool) -> Result<()>;

    /// Reads `count` elements of `var_type` starting at `address`.
    ///
    /// Returns `Ok(None)` when the bytes read cannot be decoded as the
    /// requested type.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidParameter` without reading if `count`
    /// elements of `var_type` do not fit in memory.
    fn read_value(
        &mut self,
        address: Address,
        var_type: VarType,
        count: usize,
    ) -> Result<Option<PlcValue>> {
        let len = var_type.byte_len(count).ok_or_else(|| {
            GateError::invalid_parameter("count", format!("{} x {:?} overflows", count, var_type))
        })?;
        let bytes = self.read_bytes(address, len)?;
        Ok(value::decode(var_type, &bytes, count))
    }

    /// Writes a typed value starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Encode` if the value has no S7 representation.
    fn write_value(&mut self, address: Address, value: &PlcValue) -> Result<()> {
        let bytes = value::encode(value)
            .ok_or_else(|| GateError::encode(format!("{:?} has no S7 encoding", value)))?;
        self.write_bytes(address, &bytes)
    }
}

impl<C: DeviceConnection + ?Sized> DeviceConnection for Box<C> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn endpoint(&self) -> String {
        (**self).endpoint()
    }

    fn read_bytes(&mut self, address: Address, count: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, count)
    }

    fn write_bytes(&mut self, address: Address, data: &[u8]) -> Result<()> {
        (**self).write_bytes(address, data)
    }

    fn write_bit(&mut self, address: BitAddress, value: bool) -> Result<()> {
        (**self).write_bit(address, value)
    }

    fn read_value(
        &mut self,
        address: Address,
        var_type: VarType,
        count: usize,
    ) -> Result<Option<PlcValue>> {
        (**self).read_value(address, var_type, count)
    }

    fn write_value(&mut self, address: Address, value: &PlcValue) -> Result<()> {
        (**self).write_value(address, value)
    }
}
