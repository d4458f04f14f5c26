//! # S7 Gate
//!
//! A serialized, throttled, retried and logged access layer for one Siemens
//! S7 PLC connection shared by many callers.
//!
//! Several parts of a control application (status pollers, recipe writers,
//! operator commands) usually share a single PLC connection. This crate puts
//! a gate in front of that connection so that:
//!
//! - **Exclusive**: at most one physical operation is in flight at a time
//! - **Throttled**: consecutive operations are spaced by a minimum interval
//! - **Retried**: each operation gets a bounded attempt budget, then the
//!   last error is returned unchanged
//! - **Logged**: every successful exchange and every failed attempt is
//!   recorded, in order, in a communication log
//! - **Quiet on status polls**: repeated identical status reads can be
//!   logged once, as a short note, or not at all
//!
//! The wire protocol itself is not part of this crate: anything that
//! implements [`DeviceConnection`] can be gated. [`InMemoryDevice`] is a
//! ready-made in-process PLC for tests and dry runs.
//!
//! ## Quick Start
//!
//! ```
//! use s7_gate::{Address, GatedTransport, InMemoryDevice, StatusLogRule, TransportConfig, VarType};
//! use std::time::Duration;
//!
//! fn main() -> s7_gate::Result<()> {
//!     let config = TransportConfig::default()
//!         .with_communication_interval(Duration::from_millis(10))
//!         .with_retry_count(3)
//!         .with_log_description(true)
//!         .with_status_log_rule(StatusLogRule::LogOnlyOnChange);
//!
//!     let plc = GatedTransport::new(InMemoryDevice::new("192.168.0.1"), config);
//!     plc.connect(3)?;
//!
//!     // Write a setpoint with a description for the log
//!     plc.write_value(Address::db(10, 0), 72.5f32, Some("oven setpoint"))?;
//!
//!     // Read it back, typed
//!     let value = plc.read_value(Address::db(10, 0), VarType::Real)?;
//!     assert_eq!(value.map(|v| v.to_string()), Some("72.5".to_string()));
//!
//!     // Poll a status word; identical reads are not logged twice
//!     let status = plc.read_status(Address::db(10, 4), 2)?;
//!     plc.read_status(Address::db(10, 4), 2)?;
//!     assert_eq!(status, vec![0, 0]);
//!
//!     // Dump the communication log
//!     let mut out = Vec::new();
//!     plc.log().flush("oven line", &mut out)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Operation Template
//!
//! Every operation of [`GatedTransport`] runs the same sequence, once per
//! attempt:
//!
//! 1. acquire the [`CommunicationGate`] and wait out the interval
//! 2. perform one physical operation on the connection
//! 3. on success, append a log entry
//! 4. release the gate (always, also on failure)
//! 5. on failure, append an attempt note and try again while budget remains
//!
//! ## Log Rules for Status Reads
//!
//! | Rule | First read | Same bytes again | Changed bytes |
//! |------|------------|------------------|---------------|
//! | [`StatusLogRule::LogAll`] | full | full | full |
//! | [`StatusLogRule::LogOnlyOnChange`] | full | nothing | full |
//! | [`StatusLogRule::LogChangeAndSimpleSameReceive`] | full | note | full |
//! | [`StatusLogRule::LogNothing`] | nothing | nothing | nothing |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, GateError>`](Result). Typed
//! reads of data that cannot be decoded return `Ok(None)` instead of an
//! error.
//!
//! ## Thread Safety
//!
//! [`GatedTransport`] is `Send + Sync` for any connection that is `Send`;
//! share it with `Arc`.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod config;
mod connection;
mod device;
mod error;
mod gate;
mod log;
mod memory;
mod status;
mod transport;
pub mod value;

// Public re-exports
pub use config::{
    TransportConfig, DEFAULT_COMMUNICATION_INTERVAL_MS, DEFAULT_LOG_CAPACITY, DEFAULT_RETRY_COUNT,
};
pub use connection::DeviceConnection;
pub use device::InMemoryDevice;
pub use error::{GateError, Result};
pub use gate::{Admission, CommunicationGate};
pub use log::{Direction, LogEntry, LogPayload, LogRecorder};
pub use memory::{Address, BitAddress, MemoryArea};
pub use status::{StatusDecision, StatusFilter, StatusLogRule};
pub use transport::GatedTransport;
pub use value::{PlcScalar, PlcValue, VarType};
