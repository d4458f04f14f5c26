//! In-process PLC address space.
//!
//! [`InMemoryDevice`] implements [`DeviceConnection`] over a map of byte
//! buffers, one per memory area and block. It behaves like a controller that
//! answers instantly, which makes it useful for demos, commissioning dry runs
//! and tests. Failures can be injected to exercise retry paths.
//!
//! Handles are cheap to clone and share state, so a test can keep one handle
//! while the access layer owns another.
//!
//! # Example
//!
//! ```
//! use s7_gate::{Address, DeviceConnection, InMemoryDevice};
//!
//! let mut device = InMemoryDevice::new("10.0.0.5");
//! device.open().unwrap();
//! device.write_bytes(Address::db(1, 4), &[0xAB, 0xCD]).unwrap();
//!
//! assert_eq!(device.read_bytes(Address::db(1, 3), 4).unwrap(), vec![0, 0xAB, 0xCD, 0]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::DeviceConnection;
use crate::error::{GateError, Result};
use crate::memory::{Address, BitAddress, MemoryArea};

#[derive(Debug, Default)]
struct DeviceState {
    areas: HashMap<(MemoryArea, u16), Vec<u8>>,
    connected: bool,
    pending_failures: u32,
    operations: usize,
}

impl DeviceState {
    fn region(&mut self, address: Address, len: usize) -> &mut [u8] {
        let block = if address.area.uses_block() { address.block } else { 0 };
        let buf = self.areas.entry((address.area, block)).or_default();
        let start = address.offset as usize;
        if buf.len() < start + len {
            buf.resize(start + len, 0);
        }
        &mut buf[start..start + len]
    }

    /// Counts one physical operation and applies any injected failure.
    fn begin(&mut self) -> Result<()> {
        self.operations += 1;
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(GateError::Timeout);
        }
        if !self.connected {
            return Err(GateError::NotConnected);
        }
        Ok(())
    }
}

/// Shared in-memory PLC.
#[derive(Debug, Clone)]
pub struct InMemoryDevice {
    endpoint: String,
    state: Arc<Mutex<DeviceState>>,
}

impl InMemoryDevice {
    /// Creates a closed device with an empty address space.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    /// Stores bytes directly, as the PLC program would. Does not count as an
    /// operation and ignores injected failures.
    pub fn poke(&self, address: Address, data: &[u8]) {
        self.state
            .lock()
            .region(address, data.len())
            .copy_from_slice(data);
    }

    /// Returns stored bytes directly, bypassing the connection state.
    pub fn peek(&self, address: Address, count: usize) -> Vec<u8> {
        self.state.lock().region(address, count).to_vec()
    }

    /// Makes the next `count` operations (including `open`) fail with
    /// `GateError::Timeout`.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().pending_failures = count;
    }

    /// Number of physical operations attempted so far, failed ones included.
    pub fn operations(&self) -> usize {
        self.state.lock().operations
    }
}

impl DeviceConnection for InMemoryDevice {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.operations += 1;
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(GateError::Timeout);
        }
        state.connected = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn read_bytes(&mut self, address: Address, count: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.begin()?;
        Ok(state.region(address, count).to_vec())
    }

    fn write_bytes(&mut self, address: Address, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.begin()?;
        state.region(address, data.len()).copy_from_slice(data);
        Ok(())
    }

    fn write_bit(&mut self, address: BitAddress, value: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.begin()?;
        let byte = &mut state.region(address.byte(), 1)[0];
        if value {
            *byte |= 1 << address.bit();
        } else {
            *byte &= !(1 << address.bit());
        }
        Ok(())
    }
}
