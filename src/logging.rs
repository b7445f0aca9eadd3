//! Tracing subscriber setup for the binary.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for the configured level raised by `-v` flags.
pub fn effective_level(config: &LoggingConfig, verbosity: u8) -> String {
    match verbosity {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Output goes to the configured
/// file (appending, no colors) or to stderr. Installing twice is a no-op.
pub fn init(config: &LoggingConfig, verbosity: u8) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(config, verbosity)));

    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    };

    if let Err(e) = result {
        tracing::debug!("Tracing already initialised: {}", e);
    }
    Ok(())
}
