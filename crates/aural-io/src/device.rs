//! Device descriptions and enumeration.

/// One playback or capture endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports capture.
    pub is_input: bool,
    /// Whether the device supports playback.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Iterator over a backend's devices.
///
/// The iterator owns its list and cursor, so several enumerations can run
/// side by side and none of them disturbs the backend.
///
/// ```rust
/// use aural_io::{DeviceInfo, DeviceIter};
///
/// let devices = DeviceIter::new(vec![DeviceInfo {
///     name: "null".into(),
///     is_input: true,
///     is_output: true,
///     default_sample_rate: 48000,
/// }]);
/// let mut other = devices.clone();
/// assert_eq!(devices.count(), 1);
/// assert_eq!(other.next().map(|d| d.name), Some("null".to_string()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceIter {
    devices: Vec<DeviceInfo>,
    cursor: usize,
}

impl DeviceIter {
    /// Iterates over `devices` from the start.
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self { devices, cursor: 0 }
    }

    /// An iterator that yields nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// First device whose name contains `pattern`, ignoring case.
    pub fn find_fuzzy(mut self, pattern: &str) -> Option<DeviceInfo> {
        let pattern = pattern.to_lowercase();
        self.find(|d| d.name.to_lowercase().contains(&pattern))
    }
}

impl Iterator for DeviceIter {
    type Item = DeviceInfo;

    fn next(&mut self) -> Option<DeviceInfo> {
        let device = self.devices.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(device)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.devices.len() - self.cursor;
        (left, Some(left))
    }
}

impl ExactSizeIterator for DeviceIter {}
