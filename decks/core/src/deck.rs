//! Core Deck trait and related types.

use crate::Result;

/// Static information about a deck type for detection and CLI
#[derive(Debug, Clone, Copy)]
pub struct DeckInfo {
    pub name: &'static str,
    pub cli_name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub num_keys: usize,
    pub columns: usize,
    pub rows: usize,
    pub icon_size: u32,
}

/// A key changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Logical (row-major, left to right) key index
    pub key: usize,
    /// `true` on press, `false` on release
    pub pressed: bool,
}

/// Handle returned by `subscribe`, used to unsubscribe again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Callback invoked from the deck's polling thread for each key change
pub type KeyHandler = Box<dyn Fn(KeyEvent) + Send + Sync>;

/// Core deck trait - object-safe for `dyn Deck`
///
/// Every method takes `&self` so a deck can be shared between threads; writes
/// are serialized by the implementation.
pub trait Deck: Send + Sync {
    /// Get deck info (instance method for object safety)
    fn info(&self) -> &'static DeckInfo;

    /// Fill a single key with a solid color
    fn fill_color(&self, key: usize, r: u8, g: u8, b: u8) -> Result<()>;

    /// Fill every key with a solid color, one key after the other
    fn fill_all_keys_with_color(&self, r: u8, g: u8, b: u8) -> Result<()> {
        for key in 0..self.info().num_keys {
            self.fill_color(key, r, g, b)?;
        }
        Ok(())
    }

    /// Blank a single key
    fn clear_key(&self, key: usize) -> Result<()> {
        self.fill_color(key, 0, 0, 0)
    }

    /// Blank every key
    fn clear_all_keys(&self) -> Result<()> {
        self.fill_all_keys_with_color(0, 0, 0)
    }

    /// Reset the device back to its boot logo
    fn reset(&self) -> Result<()>;

    /// Set the backlight brightness in percent (0-100)
    fn set_brightness(&self, percent: u8) -> Result<()>;

    /// Register a key change callback
    fn subscribe(&self, handler: KeyHandler) -> SubscriptionId;

    /// Remove a key change callback. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Reset the device, stop polling and release the device. Idempotent.
    fn close(&self);

    /// Feature opt-in - override to return `Some(self)` if key images are supported
    fn as_key_images(&self) -> Option<&dyn HasKeyImages> {
        None
    }
}

/// Per-key image upload capability
pub trait HasKeyImages {
    /// Upload a raw, row-major RGB888 icon of exactly `icon_size` x `icon_size` pixels
    fn set_key_image(&self, key: usize, rgb: &[u8]) -> Result<()>;
}
