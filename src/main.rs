use clap::Parser;
use serial_telemetry_bridge::config::{Config, ConfigLoader};
use serial_telemetry_bridge::{
    logging, BridgeResult, PollOutcome, PortBackend, Record, SessionController, SystemBackend,
};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{error, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Stream telemetry records from a serial device at a fixed tick rate.",
    long_about = "Opens a serial telemetry device (auto-detected unless a port is given), reads newline-delimited `<on> <brightness> <color>` records on a background thread and reports the latest record once per tick."
)]
struct Args {
    /// Configuration file (defaults to the standard search path).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port name or configured alias.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Blocking read timeout in milliseconds.
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Use the given port name verbatim instead of detecting one.
    #[arg(long)]
    no_auto_detect: bool,

    /// Ticks per second of the polling loop.
    #[arg(long)]
    tick_hz: Option<u32>,

    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Reopen the port this many milliseconds after it fails.
    #[arg(long)]
    reconnect_ms: Option<u64>,

    /// List serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// Print records as JSON lines.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    apply_args(&mut config, &args);
    config.validate()?;

    logging::init(&config.logging, args.verbose)?;

    if args.list_ports {
        list_ports(&config);
        return Ok(());
    }

    run(&config, &args)?;
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(port) = &args.port {
        config.serial.port_name = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(ms) = args.read_timeout_ms {
        config.serial.read_timeout_ms = ms;
    }
    if args.no_auto_detect {
        config.serial.auto_detect_port = false;
    }
    if let Some(hz) = args.tick_hz {
        config.session.tick_rate_hz = hz;
    }
    if let Some(ms) = args.reconnect_ms {
        config.session.reconnect_ms = Some(ms);
    }
}

fn list_ports(config: &Config) {
    for line in port_listing(config, &SystemBackend) {
        println!("{}", line);
    }
}

/// One line per port, with `*` on the one `open()` would pick.
fn port_listing(config: &Config, backend: &dyn PortBackend) -> Vec<String> {
    let preferred = config.serial.resolve_port(&config.serial.port_name);
    let chosen = if config.serial.auto_detect_port {
        config.serial.detector().resolve(&preferred, backend)
    } else {
        Some(preferred).filter(|p| !p.is_empty())
    };

    match backend.available_ports() {
        Some(ports) if ports.is_empty() => vec!["No serial ports detected".to_string()],
        Some(ports) => ports
            .iter()
            .map(|name| {
                let mark = if chosen.as_deref() == Some(name.as_str()) { "*" } else { " " };
                format!("{} {}", mark, name)
            })
            .collect(),
        None => match chosen {
            Some(name) => vec![format!("Port enumeration unavailable, would open {}", name)],
            None => vec!["Port enumeration unavailable and no port configured".to_string()],
        },
    }
}

/// The host loop: poll once per tick, never wait on the port.
///
/// A failed first open is returned unless reconnecting is enabled.
fn run(config: &Config, args: &Args) -> BridgeResult<()> {
    let tick = config.session.tick_interval();
    let reconnect = config.session.reconnect_delay();

    let mut bridge = SessionController::new(config.serial.port_config())
        .with_detector(config.serial.detector())
        .with_join_timeout(config.session.join_timeout());

    let mut retry_at = match bridge.open() {
        Ok(()) => None,
        Err(e) => match reconnect {
            Some(delay) => {
                error!("{}", e);
                Some(Instant::now() + delay)
            }
            None => return Err(e),
        },
    };

    if let Some(name) = bridge.port_name() {
        info!(port = name, tick = ?tick, "Streaming");
    }

    let mut ticks = 0u64;
    let mut next_tick = Instant::now();
    while args.max_ticks.map_or(true, |max| ticks < max) {
        let outcome = bridge.poll();
        report(&outcome, args.json);

        if let Some(err) = &outcome.error {
            error!("{}", err);
            if let Some(delay) = reconnect {
                bridge.close();
                retry_at = Some(Instant::now() + delay);
            }
        }

        if retry_at.is_some_and(|at| Instant::now() >= at) {
            retry_at = match bridge.open() {
                Ok(()) => {
                    info!(port = bridge.port_name().unwrap_or(""), "Reconnected");
                    None
                }
                Err(e) => {
                    warn!("Reconnect failed: {}", e);
                    reconnect.map(|delay| Instant::now() + delay)
                }
            };
        }

        ticks += 1;
        next_tick += tick;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }

    bridge.close();
    Ok(())
}

fn report(outcome: &PollOutcome, json: bool) {
    let Some(record) = outcome.record.filter(|_| outcome.updated) else {
        return;
    };
    if json {
        match serde_json::to_string(&record) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode record: {}", e),
        }
    } else {
        println!("{}", describe(&record));
    }
}

fn describe(record: &Record) -> String {
    format!(
        "light={} brightness={} color={}",
        if record.on { "on" } else { "off" },
        record.brightness,
        record.color_selector
    )
}
