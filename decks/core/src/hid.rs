//! hidapi implementation of the `Transport` boundary.

use std::ffi::CString;
use std::sync::LazyLock;

use hidapi::{DeviceInfo, HidApi, HidDevice};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{DeckError, DeviceDescriptor, Result, Transport};

/// Lazy handle to hidapi
static API: LazyLock<std::result::Result<RwLock<HidApi>, String>> = LazyLock::new(|| {
    let api = HidApi::new().map_err(|e| e.to_string())?;
    allow_shared_open(&api);
    Ok(RwLock::new(api))
});

/// macOS opens devices exclusively by default, which would make the second
/// handle of a `HidTransport` fail to open.
#[cfg(target_os = "macos")]
fn allow_shared_open(api: &HidApi) {
    api.set_open_exclusive(false);
}

#[cfg(not(target_os = "macos"))]
fn allow_shared_open(_api: &HidApi) {}

fn api() -> Result<&'static RwLock<HidApi>> {
    API.as_ref()
        .map_err(|e| DeckError::Transport(format!("failed to init hidapi: {e}")))
}

impl From<&DeviceInfo> for DeviceDescriptor {
    fn from(d: &DeviceInfo) -> Self {
        Self {
            path: d.path().to_string_lossy().into_owned(),
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
            serial_number: d.serial_number().map(str::to_owned),
            release_number: d.release_number(),
            manufacturer: d.manufacturer_string().map(str::to_owned),
            product: d.product_string().map(str::to_owned),
            usage_page: d.usage_page(),
            usage: d.usage(),
            interface_number: d.interface_number(),
        }
    }
}

/// List every connected HID device matching the vendor and product id
pub fn enumerate(vendor_id: u16, product_id: u16) -> Result<Vec<DeviceDescriptor>> {
    let lock = api()?;
    lock.write().refresh_devices()?;
    let api = lock.read();
    Ok(api
        .device_list()
        .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
        .map(DeviceDescriptor::from)
        .collect())
}

/// HID transport backed by two handles to the same device.
///
/// hidapi handles are not `Sync`, so the read side and the write side each get
/// their own handle. The reader lock is only contended by whoever polls input
/// reports, which keeps writers from queueing behind a pending timed read.
pub struct HidTransport {
    path: String,
    writer: Mutex<Option<HidDevice>>,
    reader: Mutex<Option<HidDevice>>,
}

impl HidTransport {
    /// Open the device at a platform specific HID path
    pub fn open_path(path: &str) -> Result<Self> {
        let c_path = CString::new(path)
            .map_err(|_| DeckError::InvalidArgument(format!("path contains a nul byte: {path}")))?;
        let api = api()?.read();
        let not_found = |e: hidapi::HidError| DeckError::DeviceNotFound(format!("{path}: {e}"));
        let writer = api.open_path(&c_path).map_err(not_found)?;
        let reader = api.open_path(&c_path).map_err(not_found)?;
        debug!("opened hid device {path}");

        Ok(Self {
            path: path.to_owned(),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Open the device with the given vendor id, product id and serial number
    pub fn open_serial(vendor_id: u16, product_id: u16, serial: &str) -> Result<Self> {
        let api = api()?.read();
        let not_found = |e: hidapi::HidError| {
            DeckError::DeviceNotFound(format!("{vendor_id:04x}:{product_id:04x} {serial}: {e}"))
        };
        let writer = api
            .open_serial(vendor_id, product_id, serial)
            .map_err(not_found)?;
        let reader = api
            .open_serial(vendor_id, product_id, serial)
            .map_err(not_found)?;
        debug!("opened hid device {vendor_id:04x}:{product_id:04x} serial {serial}");

        Ok(Self {
            path: format!("{vendor_id:04x}:{product_id:04x}:{serial}"),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Path (or id triple) this transport was opened with
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn closed() -> DeckError {
    DeckError::Transport("device is closed".into())
}

impl Transport for HidTransport {
    fn write(&self, data: &[u8]) -> Result<()> {
        let guard = self.writer.lock();
        let device = guard.as_ref().ok_or_else(closed)?;
        device.write(data)?;
        Ok(())
    }

    fn read_timeout(&self, max_len: usize, timeout_ms: i32) -> Result<Vec<u8>> {
        let guard = self.reader.lock();
        let device = guard.as_ref().ok_or_else(closed)?;
        let mut buf = vec![0u8; max_len];
        let len = device.read_timeout(&mut buf, timeout_ms)?;
        buf.truncate(len);
        Ok(buf)
    }

    fn send_feature_report(&self, data: &[u8]) -> Result<()> {
        let guard = self.writer.lock();
        let device = guard.as_ref().ok_or_else(closed)?;
        device.send_feature_report(data)?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        // Dropping the handles closes them
        let reader = self.reader.lock().take();
        let writer = self.writer.lock().take();
        if reader.is_some() || writer.is_some() {
            debug!("closed hid device {}", self.path);
        }
        Ok(())
    }
}

#[cfg(all(test, target_os = "macos"))]
mod tests {
    use super::*;

    #[test]
    fn devices_open_shared() {
        let api = api().unwrap().read();
        assert!(!api.get_open_exclusive());
    }
}
