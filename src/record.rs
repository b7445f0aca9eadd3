//! Telemetry records and the line parser.
//!
//! Wire format, one record per line:
//!
//! ```text
//! <onOff 0|1> <brightness 0-255> <colorSelector 0-3>
//! ```
//!
//! There is no checksum. Lines that don't parse are noise on the link and are
//! dropped without comment; values are passed through unclamped.

use serde::Serialize;

/// One decoded telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    pub on: bool,
    pub brightness: i32,
    pub color_selector: i32,
}

/// Parse a raw line into a record.
///
/// Needs at least three whitespace-separated base-10 integers; fields past the
/// third are ignored. The device sends `1` for on, anything else reads as off.
pub fn parse(line: &str) -> Option<Record> {
    let mut fields = line.split_whitespace();
    let on = fields.next()?.parse::<i32>().ok()?;
    let brightness = fields.next()?.parse::<i32>().ok()?;
    let color_selector = fields.next()?.parse::<i32>().ok()?;

    Some(Record {
        on: on == 1,
        brightness,
        color_selector,
    })
}

/// The record from the last parseable line, if any.
pub fn latest<I, S>(lines: I) -> Option<Record>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| parse(line.as_ref()))
        .last()
}
