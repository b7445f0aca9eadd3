use serial_telemetry_bridge::port::{PortDetector, SystemBackend};
use serial_telemetry_bridge::{PortBackend, PortConfig, SessionController, SessionState};
use std::env;
use std::time::{Duration, Instant};

/// Get the test port from environment variable (empty: auto-detect).
fn get_test_port() -> String {
    env::var("TEST_PORT").unwrap_or_default()
}

/// Get the test baud rate from environment variable (default: 115200).
fn get_test_baud() -> u32 {
    env::var("TEST_BAUD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(115_200)
}

fn test_config() -> PortConfig {
    PortConfig {
        baud_rate: get_test_baud(),
        ..PortConfig::named(get_test_port())
    }
}

/// Skip test if no port can be found.
fn skip_without_hardware() -> bool {
    let detected = PortDetector::default().resolve(&get_test_port(), &SystemBackend);
    if detected.is_none() {
        println!("Skipping hardware test: no serial port found");
    }
    detected.is_none()
}

#[test]
#[ignore]
fn test_real_port_streams_records() {
    if skip_without_hardware() {
        return;
    }

    let mut bridge = SessionController::new(test_config());
    bridge.open().expect("device should open");
    assert_eq!(bridge.state(), SessionState::Streaming);
    println!("Opened {}", bridge.port_name().unwrap_or("?"));

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut record = None;
    while record.is_none() && Instant::now() < deadline {
        let outcome = bridge.poll();
        assert!(outcome.error.is_none(), "read error: {:?}", outcome.error);
        if outcome.updated {
            record = outcome.record;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    bridge.close();
    let record = record.expect("device sent no valid record within 5s");
    println!("Received {:?}", record);
}

#[test]
#[ignore]
fn test_real_port_close_is_bounded() {
    if skip_without_hardware() {
        return;
    }

    let mut bridge = SessionController::new(test_config());
    bridge.open().expect("device should open");

    let start = Instant::now();
    bridge.close();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(bridge.state(), SessionState::Closed);

    // The port is free again.
    bridge.open().expect("device should reopen");
    bridge.close();
}

#[test]
#[ignore]
fn test_real_port_enumeration() {
    match SystemBackend.available_ports() {
        Some(ports) => {
            println!("Found {} port(s)", ports.len());
            for port in &ports {
                let family = PortDetector::default().is_family_match(port);
                println!("  {} {}", if family { "*" } else { " " }, port);
            }
        }
        None => println!("Port enumeration unsupported on this platform"),
    }
}
