//! Gated, retried and logged access to one PLC connection.
//!
//! [`GatedTransport`] wraps a [`DeviceConnection`] and is the primary
//! interface of this crate. Every operation follows the same template:
//!
//! 1. pass through the [`CommunicationGate`] (exclusive, spaced by the
//!    configured interval),
//! 2. perform exactly one physical attempt on the connection,
//! 3. record the outcome in the communication log,
//! 4. release the gate,
//! 5. on failure, record the attempt index and start over until the attempt
//!    budget is spent, then return the last error unchanged.
//!
//! There is no backoff beyond the gate interval.
//!
//! # Example
//!
//! ```
//! use s7_gate::{Address, GatedTransport, InMemoryDevice, TransportConfig};
//! use std::time::Duration;
//!
//! let device = InMemoryDevice::new("192.168.0.10");
//! let config = TransportConfig::default().with_communication_interval(Duration::from_millis(5));
//! let plc = GatedTransport::new(device, config);
//! plc.connect(3)?;
//!
//! plc.write_value(Address::db(1, 0), 42i16, Some("recipe step"))?;
//! plc.write_bit(Address::db(1, 2).bit(0)?, true, None)?;
//!
//! let step: Option<i16> = plc.read_as(Address::db(1, 0))?;
//! assert_eq!(step, Some(42));
//! assert_eq!(plc.read_status(Address::db(1, 2), 1)?, vec![0x01]);
//!
//! // connect, write, bit write, typed read, status read
//! assert_eq!(plc.log().len(), 5);
//! # Ok::<(), s7_gate::GateError>(())
//! ```
//!
//! # Thread Safety
//!
//! `GatedTransport` is `Sync` when the connection is `Send`; share it behind
//! an `Arc` and call it from as many threads as needed. Calls are serialized
//! by the gate. A sequence of calls (e.g. read-modify-write) is not atomic.

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::connection::DeviceConnection;
use crate::error::{GateError, Result};
use crate::gate::{Admission, CommunicationGate};
use crate::log::{Direction, LogEntry, LogRecorder};
use crate::memory::{Address, BitAddress};
use crate::status::{StatusDecision, StatusFilter, StatusLogRule};
use crate::value::{self, PlcScalar, PlcValue, VarType};

/// Operation kinds, as they appear in log annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Connect,
    WriteValue,
    WriteBit,
    WriteBytes,
    ReadStatus,
    ReadBytes,
    ReadValue,
}

impl Operation {
    fn code(self) -> &'static str {
        match self {
            Operation::Connect => "CO",
            Operation::WriteValue => "WO",
            Operation::WriteBit => "WB",
            Operation::WriteBytes => "WR",
            Operation::ReadStatus => "RS",
            Operation::ReadBytes => "RB",
            Operation::ReadValue => "RO",
        }
    }

    fn direction(self) -> Direction {
        match self {
            Operation::Connect
            | Operation::WriteValue
            | Operation::WriteBit
            | Operation::WriteBytes => Direction::Sent,
            Operation::ReadStatus | Operation::ReadBytes | Operation::ReadValue => {
                Direction::Received
            }
        }
    }
}

/// Access layer for one PLC connection shared by many callers.
pub struct GatedTransport<C: DeviceConnection> {
    gate: CommunicationGate<C>,
    log: LogRecorder,
    status: StatusFilter,
    config: RwLock<TransportConfig>,
    endpoint: String,
}

impl<C: DeviceConnection> GatedTransport<C> {
    /// Wraps `connection`. The connection is not opened; call
    /// [`connect`](Self::connect).
    pub fn new(connection: C, config: TransportConfig) -> Self {
        let endpoint = connection.endpoint();
        Self {
            gate: CommunicationGate::new(connection, config.communication_interval()),
            log: LogRecorder::new(config.log_capacity),
            status: StatusFilter::new(),
            config: RwLock::new(config),
            endpoint,
        }
    }

    /// Returns a copy of the live configuration.
    pub fn config(&self) -> TransportConfig {
        self.config.read().clone()
    }

    /// Replaces the live configuration. Takes effect for the next operation.
    pub fn set_config(&self, config: TransportConfig) {
        self.gate.set_interval(config.communication_interval());
        *self.config.write() = config;
    }

    /// The communication log.
    pub fn log(&self) -> &LogRecorder {
        &self.log
    }

    /// The status-read snapshots.
    pub fn status_filter(&self) -> &StatusFilter {
        &self.status
    }

    /// The gate guarding the connection.
    pub fn gate(&self) -> &CommunicationGate<C> {
        &self.gate
    }

    /// Label of the remote device.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Consumes the transport and returns the connection.
    pub fn into_inner(self) -> C {
        self.gate.into_inner()
    }

    /// Opens the connection, trying up to `attempts` times.
    ///
    /// # Errors
    ///
    /// Returns the last failure if every attempt fails.
    pub fn connect(&self, attempts: u32) -> Result<()> {
        self.attempt(Operation::Connect, attempts, |conn| {
            conn.open()?;
            self.log.append(LogEntry::note(
                Direction::Sent,
                format!("CO [PLC: {}] connected", self.endpoint),
            ));
            Ok(())
        })?;
        info!(endpoint = %self.endpoint, "connected to PLC");
        Ok(())
    }

    /// Closes the connection.
    pub fn disconnect(&self) -> Result<()> {
        self.pass(|conn| conn.close())??;
        info!(endpoint = %self.endpoint, "disconnected from PLC");
        Ok(())
    }

    /// Returns whether the connection is open. Waits for any operation in
    /// progress, but not for the interval.
    pub fn is_connected(&self) -> bool {
        self.gate.peek(|conn| conn.is_connected())
    }

    /// Writes a typed value with the default attempt budget.
    ///
    /// See [`write_value_with`](Self::write_value_with).
    pub fn write_value(
        &self,
        address: Address,
        value: impl Into<PlcValue>,
        description: Option<&str>,
    ) -> Result<()> {
        let budget = self.config.read().retry_count;
        self.write_value_with(address, &value.into(), description, budget)
    }

    /// Writes a typed value, trying up to `attempts` times.
    ///
    /// The log payload is the S7 encoding of the value. `description` is
    /// added to the annotation only when description logging is enabled.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Encode` without touching the PLC if the value has
    /// no S7 encoding, otherwise the last connection error once the budget
    /// is spent.
    pub fn write_value_with(
        &self,
        address: Address,
        value: &PlcValue,
        description: Option<&str>,
        attempts: u32,
    ) -> Result<()> {
        let bytes = value::encode(value)
            .ok_or_else(|| GateError::encode(format!("{:?} has no S7 encoding", value)))?;
        let annotation = format!(
            "WO value: {}, [PLC: {}], {}{}",
            value,
            self.endpoint,
            address,
            self.description_suffix(description)
        );

        self.attempt(Operation::WriteValue, attempts, |conn| {
            conn.write_value(address, value)?;
            self.log
                .append(LogEntry::bytes(Direction::Sent, bytes.clone(), annotation.clone()));
            Ok(())
        })
    }

    /// Writes a single bit with the default attempt budget.
    pub fn write_bit(&self, address: BitAddress, value: bool, description: Option<&str>) -> Result<()> {
        let budget = self.config.read().retry_count;
        self.write_bit_with(address, value, description, budget)
    }

    /// Writes a single bit, trying up to `attempts` times. The log payload is
    /// one byte, `01` or `00`.
    pub fn write_bit_with(
        &self,
        address: BitAddress,
        value: bool,
        description: Option<&str>,
        attempts: u32,
    ) -> Result<()> {
        let annotation = format!(
            "WB [PLC: {}], {}{}",
            self.endpoint,
            address,
            self.description_suffix(description)
        );

        self.attempt(Operation::WriteBit, attempts, |conn| {
            conn.write_bit(address, value)?;
            self.log.append(LogEntry::bytes(
                Direction::Sent,
                vec![u8::from(value)],
                annotation.clone(),
            ));
            Ok(())
        })
    }

    /// Writes raw bytes with the default attempt budget.
    pub fn write_bytes(&self, address: Address, data: &[u8]) -> Result<()> {
        let budget = self.config.read().retry_count;
        self.write_bytes_with(address, data, budget)
    }

    /// Writes raw bytes, trying up to `attempts` times.
    pub fn write_bytes_with(&self, address: Address, data: &[u8], attempts: u32) -> Result<()> {
        let annotation = format!("WR [PLC: {}], {}", self.endpoint, address);

        self.attempt(Operation::WriteBytes, attempts, |conn| {
            conn.write_bytes(address, data)?;
            self.log
                .append(LogEntry::bytes(Direction::Sent, data.to_vec(), annotation.clone()));
            Ok(())
        })
    }

    /// Reads status bytes with the configured log rule and attempt budget.
    pub fn read_status(&self, address: Address, count: usize) -> Result<Vec<u8>> {
        let (rule, budget) = {
            let config = self.config.read();
            (config.status_log_rule, config.retry_count)
        };
        self.read_status_with(address, count, rule, budget)
    }

    /// Reads `count` status bytes, trying up to `attempts` times.
    ///
    /// `rule` only decides what is logged; the freshly read bytes are always
    /// returned.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::{Address, GatedTransport, InMemoryDevice, StatusLogRule, TransportConfig};
    /// use std::time::Duration;
    ///
    /// let device = InMemoryDevice::new("plc-1");
    /// device.poke(Address::db(20, 0), &[0x01, 0x02]);
    /// let plc = GatedTransport::new(
    ///     device,
    ///     TransportConfig::default().with_communication_interval(Duration::ZERO),
    /// );
    /// plc.connect(1)?;
    /// plc.log().clear();
    ///
    /// let rule = StatusLogRule::LogChangeAndSimpleSameReceive;
    /// plc.read_status_with(Address::db(20, 0), 2, rule, 3)?;
    /// plc.read_status_with(Address::db(20, 0), 2, rule, 3)?;
    ///
    /// let entries = plc.log().snapshot();
    /// assert_eq!(entries[0].payload_bytes(), Some(&[0x01, 0x02][..]));
    /// assert!(entries[1].payload().is_none());
    /// assert!(entries[1].annotation().unwrap().ends_with("same as last"));
    /// # Ok::<(), s7_gate::GateError>(())
    /// ```
    pub fn read_status_with(
        &self,
        address: Address,
        count: usize,
        rule: StatusLogRule,
        attempts: u32,
    ) -> Result<Vec<u8>> {
        let annotation = format!("RS [PLC: {}], {}", self.endpoint, address);

        self.attempt(Operation::ReadStatus, attempts, |conn| {
            let bytes = conn.read_bytes(address, count)?;
            match self.status.evaluate(rule, address, &bytes) {
                StatusDecision::Full => self.log.append(LogEntry::bytes(
                    Direction::Received,
                    bytes.clone(),
                    annotation.clone(),
                )),
                StatusDecision::Unchanged => self.log.append(LogEntry::note(
                    Direction::Received,
                    format!("{} same as last", annotation),
                )),
                StatusDecision::Skip => {}
            }
            Ok(bytes)
        })
    }

    /// Reads raw bytes with the default attempt budget.
    pub fn read_bytes(&self, address: Address, count: usize) -> Result<Vec<u8>> {
        let budget = self.config.read().retry_count;
        self.read_bytes_with(address, count, budget)
    }

    /// Reads `count` raw bytes, trying up to `attempts` times. Always logs
    /// the full payload.
    pub fn read_bytes_with(&self, address: Address, count: usize, attempts: u32) -> Result<Vec<u8>> {
        let annotation = format!("RB [PLC: {}], {}", self.endpoint, address);

        self.attempt(Operation::ReadBytes, attempts, |conn| {
            let bytes = conn.read_bytes(address, count)?;
            self.log.append(LogEntry::bytes(
                Direction::Received,
                bytes.clone(),
                annotation.clone(),
            ));
            Ok(bytes)
        })
    }

    /// Reads one value of `var_type` with the default attempt budget.
    pub fn read_value(&self, address: Address, var_type: VarType) -> Result<Option<PlcValue>> {
        let budget = self.config.read().retry_count;
        self.read_value_with(address, var_type, 1, budget)
    }

    /// Reads `count` elements of `var_type`, trying up to `attempts` times.
    ///
    /// Returns `Ok(None)` when the PLC data cannot be decoded as the
    /// requested type; that is not a failure and is not retried.
    pub fn read_value_with(
        &self,
        address: Address,
        var_type: VarType,
        count: usize,
        attempts: u32,
    ) -> Result<Option<PlcValue>> {
        self.attempt(Operation::ReadValue, attempts, |conn| {
            let read = conn.read_value(address, var_type, count)?;
            let entry = match &read {
                Some(value) => {
                    let annotation = format!(
                        "RO value: {}, [PLC: {}], {}",
                        value, self.endpoint, address
                    );
                    match value::encode(value) {
                        Some(bytes) => LogEntry::bytes(Direction::Received, bytes, annotation),
                        None => LogEntry::text(Direction::Received, value.to_string(), annotation),
                    }
                }
                None => LogEntry::note(
                    Direction::Received,
                    format!(
                        "RO unsupported {:?} x{}, [PLC: {}], {}",
                        var_type, count, self.endpoint, address
                    ),
                ),
            };
            self.log.append(entry);
            Ok(read)
        })
    }

    /// Reads one value as the Rust type `T`.
    ///
    /// Returns `Ok(None)` when the PLC data is not a valid `T`.
    pub fn read_as<T: PlcScalar>(&self, address: Address) -> Result<Option<T>> {
        Ok(self
            .read_value(address, T::VAR_TYPE)?
            .and_then(T::from_value))
    }

    fn description_suffix(&self, description: Option<&str>) -> String {
        match description {
            Some(d) if !d.is_empty() && self.config.read().log_description => {
                format!(", desc: {}", d)
            }
            _ => String::new(),
        }
    }

    /// One gated pass over the connection, honouring the configured gate
    /// timeout.
    fn pass<T>(&self, f: impl FnOnce(&mut C) -> T) -> Result<T> {
        let timeout = self.config.read().gate_timeout();
        let run = |conn: &mut C, admission: Admission| {
            if admission.clock_anomaly {
                self.log.append(LogEntry::note(
                    Direction::Sent,
                    format!(
                        "wait exception: last release in the future, waited {} ms",
                        admission.waited.as_millis()
                    ),
                ));
            }
            f(conn)
        };

        match timeout {
            None => Ok(self.gate.run(run)),
            Some(timeout) => self.gate.run_timeout(timeout, run).ok_or_else(|| {
                let waited_ms = timeout.as_millis() as u64;
                warn!(endpoint = %self.endpoint, waited_ms, "gate not acquired");
                self.log.append(LogEntry::note(
                    Direction::Sent,
                    format!("gate timeout after {} ms", waited_ms),
                ));
                GateError::GateTimeout { waited_ms }
            }),
        }
    }

    /// Runs `once` through the gate up to `attempts` times (at least once),
    /// returning the first success or the last failure. Errors that did not
    /// come from the device connection end the loop at once.
    fn attempt<T>(
        &self,
        op: Operation,
        attempts: u32,
        mut once: impl FnMut(&mut C) -> Result<T>,
    ) -> Result<T> {
        let budget = attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.pass(&mut once)? {
                Ok(value) => {
                    debug!(op = op.code(), attempt, budget, "PLC operation succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(op = op.code(), attempt, budget, error = %e, "PLC operation failed");
                    self.log.append(LogEntry::note(
                        op.direction(),
                        format!("{} exception: attempt {}/{}: {}", op.code(), attempt, budget, e),
                    ));
                    if !e.is_transport() {
                        error!(op = op.code(), attempt, error = %e, "request rejected, not retrying");
                        return Err(e);
                    }
                    if attempt >= budget {
                        error!(op = op.code(), budget, error = %e, "attempt budget exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}

impl<C: DeviceConnection> std::fmt::Debug for GatedTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedTransport")
            .field("endpoint", &self.endpoint)
            .field("config", &*self.config.read())
            .field("log_entries", &self.log.len())
            .finish()
    }
}
