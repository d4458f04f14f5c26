//! End-to-end behavior of `GatedTransport` over a scripted connection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use s7_gate::{
    Address, BitAddress, DeviceConnection, Direction, GateError, GatedTransport, InMemoryDevice,
    LogEntry, StatusLogRule, TransportConfig, VarType,
};
use tracing_test::traced_test;

/// Connection whose read results are scripted in advance.
///
/// Each physical operation pops the next outcome; an empty script answers
/// reads with zeros and accepts writes.
#[derive(Clone, Default)]
struct Scripted {
    script: Arc<Mutex<VecDeque<Result<Vec<u8>, GateError>>>>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl Scripted {
    fn push_ok(&self, bytes: &[u8]) {
        self.script.lock().push_back(Ok(bytes.to_vec()));
    }

    fn push_err(&self, reason: &str) {
        self.script
            .lock()
            .push_back(Err(GateError::transport(reason)));
    }

    fn next(&self, len: usize) -> Result<Vec<u8>, GateError> {
        self.calls.lock().push(Instant::now());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![0; len]))
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl DeviceConnection for Scripted {
    fn open(&mut self) -> s7_gate::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> s7_gate::Result<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }

    fn read_bytes(&mut self, _address: Address, count: usize) -> s7_gate::Result<Vec<u8>> {
        self.next(count)
    }

    fn write_bytes(&mut self, _address: Address, data: &[u8]) -> s7_gate::Result<()> {
        self.next(data.len()).map(|_| ())
    }

    fn write_bit(&mut self, _address: BitAddress, _value: bool) -> s7_gate::Result<()> {
        self.next(1).map(|_| ())
    }
}

fn fast_config() -> TransportConfig {
    TransportConfig::default().with_communication_interval(Duration::ZERO)
}

fn annotations(entries: &[LogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.annotation().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_two_failures_then_success() {
    let conn = Scripted::default();
    conn.push_err("no answer");
    conn.push_err("no answer");
    conn.push_ok(&[]);
    let plc = GatedTransport::new(conn.clone(), fast_config());

    plc.write_value_with(Address::db(1, 0), &42i16.into(), None, 3)
        .unwrap();

    let entries = plc.log().snapshot();
    let notes = annotations(&entries);
    assert_eq!(entries.len(), 3);
    assert_eq!(notes[0], "WO exception: attempt 1/3: Transport error: no answer");
    assert_eq!(notes[1], "WO exception: attempt 2/3: Transport error: no answer");
    assert_eq!(entries[2].payload_bytes(), Some(&[0x00, 0x2A][..]));
    assert!(entries.iter().all(|e| e.direction() == Direction::Sent));
    assert_eq!(conn.call_count(), 3);
}

#[test]
#[traced_test]
fn test_exhausted_budget_returns_last_error() {
    let conn = Scripted::default();
    conn.push_err("first");
    conn.push_err("second");
    let plc = GatedTransport::new(conn.clone(), fast_config());

    let err = plc.read_bytes_with(Address::db(1, 0), 4, 2).unwrap_err();

    match err {
        GateError::Transport { reason } => assert_eq!(reason, "second"),
        other => panic!("unexpected error: {other}"),
    }
    let notes = annotations(&plc.log().snapshot());
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n.starts_with("RB exception")));
    assert_eq!(conn.call_count(), 2);
    assert!(logs_contain("PLC operation failed"));
    assert!(logs_contain("attempt budget exhausted"));
}

#[test]
fn test_status_only_on_change() {
    let conn = Scripted::default();
    conn.push_ok(&[1, 2]);
    conn.push_ok(&[1, 2]);
    conn.push_ok(&[1, 3]);
    let plc = GatedTransport::new(conn, fast_config());
    let addr = Address::db(7, 0);

    for _ in 0..3 {
        plc.read_status_with(addr, 2, StatusLogRule::LogOnlyOnChange, 1)
            .unwrap();
    }

    let entries = plc.log().snapshot();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payload_bytes(), Some(&[1, 2][..]));
    assert_eq!(entries[1].payload_bytes(), Some(&[1, 3][..]));
}

#[test]
fn test_status_log_all_logs_duplicates() {
    let conn = Scripted::default();
    conn.push_ok(&[5]);
    conn.push_ok(&[5]);
    let plc = GatedTransport::new(conn, fast_config());

    plc.read_status_with(Address::db(7, 0), 1, StatusLogRule::LogAll, 1)
        .unwrap();
    plc.read_status_with(Address::db(7, 0), 1, StatusLogRule::LogAll, 1)
        .unwrap();

    assert_eq!(plc.log().len(), 2);
}

#[test]
fn test_status_simple_same_note() {
    let conn = Scripted::default();
    conn.push_ok(&[1, 2]);
    conn.push_ok(&[1, 2]);
    let plc = GatedTransport::new(conn, fast_config());
    let rule = StatusLogRule::LogChangeAndSimpleSameReceive;

    let first = plc.read_status_with(Address::db(7, 0), 2, rule, 1).unwrap();
    let second = plc.read_status_with(Address::db(7, 0), 2, rule, 1).unwrap();

    assert_eq!(first, second);
    let entries = plc.log().snapshot();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payload_bytes(), Some(&[1, 2][..]));
    assert!(entries[1].payload().is_none());
    assert_eq!(
        entries[1].annotation(),
        Some("RS [PLC: scripted], DB7.0 same as last")
    );
}

#[test]
fn test_status_failure_does_not_touch_snapshot() {
    let conn = Scripted::default();
    conn.push_ok(&[9]);
    conn.push_err("glitch");
    conn.push_ok(&[9]);
    let plc = GatedTransport::new(conn, fast_config());
    let rule = StatusLogRule::LogOnlyOnChange;

    plc.read_status_with(Address::db(7, 0), 1, rule, 1).unwrap();
    assert!(plc.read_status_with(Address::db(7, 0), 1, rule, 1).is_err());
    plc.read_status_with(Address::db(7, 0), 1, rule, 1).unwrap();

    // full entry, one failure note, nothing for the unchanged read
    assert_eq!(plc.log().len(), 2);
    assert_eq!(plc.status_filter().snapshot(Address::db(7, 0)), Some(vec![9]));
}

#[test]
fn test_interval_spacing() {
    let conn = Scripted::default();
    let config = TransportConfig::default().with_communication_interval(Duration::from_millis(40));
    let plc = GatedTransport::new(conn.clone(), config);

    plc.read_bytes(Address::db(1, 0), 1).unwrap();
    plc.read_bytes(Address::db(1, 0), 1).unwrap();
    plc.read_bytes(Address::db(1, 0), 1).unwrap();

    let calls = conn.calls.lock().clone();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(40));
    }
}

#[test]
fn test_retries_are_spaced_by_interval() {
    let conn = Scripted::default();
    conn.push_err("busy");
    let config = TransportConfig::default().with_communication_interval(Duration::from_millis(25));
    let plc = GatedTransport::new(conn.clone(), config);

    plc.read_bytes_with(Address::db(1, 0), 1, 2).unwrap();

    let calls = conn.calls.lock().clone();
    assert!(calls[1].duration_since(calls[0]) >= Duration::from_millis(25));
}

#[test]
fn test_concurrent_callers_share_one_connection() {
    let device = InMemoryDevice::new("shared");
    let plc = Arc::new(GatedTransport::new(device.clone(), fast_config()));
    plc.connect(1).unwrap();

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let plc = Arc::clone(&plc);
            thread::spawn(move || {
                for i in 0..10i16 {
                    plc.write_value(Address::db(1, t * 2), i, None).unwrap();
                    plc.read_status(Address::db(2, 0), 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // connect + 40 writes + 40 status reads under LogAll
    assert_eq!(plc.log().len(), 81);
    for t in 0..4u32 {
        assert_eq!(plc.read_as::<i16>(Address::db(1, t * 2)).unwrap(), Some(9));
    }
}

#[test]
fn test_gate_timeout_is_not_retried() {
    let device = InMemoryDevice::new("slow");
    let config = fast_config().with_gate_timeout(Duration::from_millis(20));
    let plc = Arc::new(GatedTransport::new(device, config));
    plc.connect(1).unwrap();

    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let holder = {
        let plc = Arc::clone(&plc);
        thread::spawn(move || {
            plc.gate().run(|_, _| {
                entered_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(200));
            })
        })
    };
    entered_rx.recv().unwrap();

    let err = plc.read_bytes_with(Address::db(1, 0), 1, 5).unwrap_err();
    assert!(matches!(err, GateError::GateTimeout { waited_ms: 20 }));
    holder.join().unwrap();

    let notes = annotations(&plc.log().snapshot());
    assert_eq!(notes.last().map(String::as_str), Some("gate timeout after 20 ms"));
    assert!(!notes.iter().any(|n| n.contains("exception")));
}

#[test]
fn test_typed_read_unsupported_is_none() {
    let conn = Scripted::default();
    // 0x3F is not a valid BCD digit pair for a counter
    conn.push_ok(&[0x00, 0x3F]);
    let plc = GatedTransport::new(conn, fast_config());

    assert_eq!(plc.read_value(Address::db(1, 0), VarType::Counter).unwrap(), None);
    let notes = annotations(&plc.log().snapshot());
    assert_eq!(notes.len(), 1);
    assert!(notes[0].starts_with("RO unsupported"));
}

#[test]
fn test_typed_read_logs_value() {
    let conn = Scripted::default();
    conn.push_ok(&[0x00, 0x00, 0x01, 0x00]);
    let plc = GatedTransport::new(conn, fast_config());

    assert_eq!(plc.read_as::<i32>(Address::db(1, 0)).unwrap(), Some(256));
    let entries = plc.log().snapshot();
    assert_eq!(entries[0].direction(), Direction::Received);
    assert_eq!(
        entries[0].annotation(),
        Some("RO value: 256, [PLC: scripted], DB1.0")
    );
}

#[test]
fn test_description_follows_live_config() {
    let conn = Scripted::default();
    let plc = GatedTransport::new(conn, fast_config().with_log_description(true));

    plc.write_bit(Address::db(1, 0).bit(1).unwrap(), true, Some("pump on"))
        .unwrap();
    plc.set_config(plc.config().with_log_description(false));
    plc.write_bit(Address::db(1, 0).bit(1).unwrap(), false, Some("pump off"))
        .unwrap();

    let notes = annotations(&plc.log().snapshot());
    assert_eq!(notes[0], "WB [PLC: scripted], DB1.0.1, desc: pump on");
    assert_eq!(notes[1], "WB [PLC: scripted], DB1.0.1");
}

#[test]
fn test_flush_renders_log() {
    let conn = Scripted::default();
    conn.push_ok(&[0xAB]);
    let plc = GatedTransport::new(conn, fast_config());
    plc.read_bytes(Address::marker(3), 1).unwrap();

    let mut out = Vec::new();
    plc.log().flush("shift report", &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert!(lines[0].ends_with("  shift report"));
    assert!(lines[1].ends_with("<< AB //RB [PLC: scripted], M3"));
    assert!(text.ends_with("\n\n\n"));
}
