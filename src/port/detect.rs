//! Port selection heuristics.
//!
//! There is no discovery protocol: the telemetry device is picked by name.
//! An explicit choice wins, then the first port whose name looks like a USB
//! serial device, then whatever the platform lists first.

use super::traits::PortBackend;
use tracing::debug;

/// Name fragments used by USB CDC and USB-serial drivers.
///
/// `usbmodem`/`usbserial` are the macOS `/dev/cu.*` conventions, `ttyACM` and
/// `ttyUSB` the Linux ones.
pub const DEFAULT_FAMILY_MARKERS: &[&str] = &["usbmodem", "usbserial", "ttyACM", "ttyUSB"];

/// Selects the port to open from the ports the platform reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDetector {
    markers: Vec<String>,
}

impl Default for PortDetector {
    fn default() -> Self {
        Self::with_markers(DEFAULT_FAMILY_MARKERS.iter().copied())
    }
}

impl PortDetector {
    /// Detector recognising the given device-family markers.
    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// The markers this detector recognises.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Whether `name` carries one of the device-family markers.
    pub fn is_family_match(&self, name: &str) -> bool {
        self.markers.iter().any(|m| name.contains(m.as_str()))
    }

    /// Pick a port from `available`.
    ///
    /// 1. `preferred`, if non-empty and listed.
    /// 2. The first listed port carrying a family marker.
    /// 3. The first listed port.
    ///
    /// Returns `None` only when `available` is empty.
    pub fn choose<S: AsRef<str>>(&self, preferred: &str, available: &[S]) -> Option<String> {
        if !preferred.is_empty() && available.iter().any(|p| p.as_ref() == preferred) {
            return Some(preferred.to_string());
        }

        available
            .iter()
            .map(AsRef::as_ref)
            .find(|p| self.is_family_match(p))
            .or_else(|| available.first().map(AsRef::as_ref))
            .map(str::to_string)
    }

    /// Enumerate through `backend` and choose.
    ///
    /// Without enumeration this degrades to `preferred` unchanged (`None` if
    /// it is empty).
    pub fn resolve(&self, preferred: &str, backend: &dyn PortBackend) -> Option<String> {
        match backend.available_ports() {
            Some(available) => {
                let chosen = self.choose(preferred, &available);
                debug!(
                    preferred,
                    candidates = available.len(),
                    chosen = chosen.as_deref().unwrap_or(""),
                    "Port detection finished"
                );
                chosen
            }
            None => {
                debug!(preferred, "No port enumeration, keeping preferred name");
                Some(preferred.to_string()).filter(|p| !p.is_empty())
            }
        }
    }
}

/// `PortDetector::default().choose(..)`.
pub fn choose<S: AsRef<str>>(preferred: &str, available: &[S]) -> Option<String> {
    PortDetector::default().choose(preferred, available)
}
