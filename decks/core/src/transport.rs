//! The device boundary consumed by deck drivers.

use std::fmt;

use crate::Result;

/// Immutable description of an enumerated HID device.
///
/// Produced only by enumeration, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub release_number: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub usage_page: u16,
    pub usage: u16,
    pub interface_number: i32,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:04x}:{:04x}] serial={} manufacturer={} product={} interface={}",
            self.path,
            self.vendor_id,
            self.product_id,
            self.serial_number.as_deref().unwrap_or("-"),
            self.manufacturer.as_deref().unwrap_or("-"),
            self.product.as_deref().unwrap_or("-"),
            self.interface_number,
        )
    }
}

/// Blocking, bidirectional channel to a single device.
///
/// A transport is shared between exactly one reader (the key poller) and the
/// writer-side command API, so implementations must allow `read_timeout` to run
/// concurrently with `write`/`send_feature_report`.
pub trait Transport: Send + Sync {
    /// Write a raw output report
    fn write(&self, data: &[u8]) -> Result<()>;

    /// Read up to `max_len` bytes, waiting at most `timeout_ms`.
    /// Returns an empty buffer when the timeout elapses without data.
    fn read_timeout(&self, max_len: usize, timeout_ms: i32) -> Result<Vec<u8>>;

    /// Send a feature report over the control channel
    fn send_feature_report(&self, data: &[u8]) -> Result<()>;

    /// Release the device. Calling this more than once is a no-op.
    fn close(&self) -> Result<()>;
}
