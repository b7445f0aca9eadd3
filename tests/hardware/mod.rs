//! Tests against a real serial device.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/cu.usbmodem101   # optional, auto-detected otherwise
//! export TEST_BAUD=115200                # optional, default: 115200
//! cargo test --features hardware-tests -- --ignored
//! ```
//!
//! The device must be streaming `<on> <brightness> <color>` lines.

pub mod real_port_tests;
