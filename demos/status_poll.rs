//! Example: Sharing one PLC connection between a status poller and a writer
//!
//! Run with: cargo run --example status_poll
//!
//! Set `RUST_LOG=s7_gate=debug` to see every attempt.
//!
//! This example demonstrates:
//! - Sharing a `GatedTransport` between threads
//! - Retrying through injected failures
//! - Keeping the log small with `StatusLogRule::LogChangeAndSimpleSameReceive`
//! - Flushing the communication log

use s7_gate::{Address, GatedTransport, InMemoryDevice, StatusLogRule, TransportConfig, VarType};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> s7_gate::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s7_gate=info")),
        )
        .init();

    // =========================================================================
    // Connect
    // =========================================================================

    let device = InMemoryDevice::new("192.168.0.1");
    let config = TransportConfig::default()
        .with_communication_interval(Duration::from_millis(20))
        .with_retry_count(3)
        .with_log_description(true)
        .with_status_log_rule(StatusLogRule::LogChangeAndSimpleSameReceive);

    let plc = Arc::new(GatedTransport::new(device.clone(), config));
    plc.connect(3)?;

    let status = Address::db(100, 0);
    let setpoint = Address::db(100, 2);

    // =========================================================================
    // Poll status in the background
    // =========================================================================

    let poller = {
        let plc = Arc::clone(&plc);
        thread::spawn(move || -> s7_gate::Result<()> {
            for _ in 0..10 {
                let bytes = plc.read_status(status, 2)?;
                println!("status: {:02X?}", bytes);
                thread::sleep(Duration::from_millis(15));
            }
            Ok(())
        })
    };

    // =========================================================================
    // Write from the foreground
    // =========================================================================

    // The PLC program raises a status bit
    thread::sleep(Duration::from_millis(60));
    device.poke(status, &[0x00, 0x01]);

    // The next write hits two communication faults before it gets through
    device.fail_next(2);
    plc.write_value(setpoint, 180.0f32, Some("furnace setpoint"))?;

    if let Some(value) = plc.read_value(setpoint, VarType::Real)? {
        println!("setpoint readback: {}", value);
    }

    match poller.join() {
        Ok(result) => result?,
        Err(_) => eprintln!("status poller panicked"),
    }

    // =========================================================================
    // Dump the communication log
    // =========================================================================

    println!();
    plc.log().flush("furnace line", &mut std::io::stdout())?;
    plc.disconnect()?;

    Ok(())
}
