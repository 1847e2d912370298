//! High level hidapi abstraction for the original 15 key Stream Deck.
//!
//! This crate provides reverse-engineered bindings to fill keys with colors or
//! icons, control brightness, and receive key press/release events. Icons are
//! written as two 8191 byte pages per key; key states are polled on a dedicated
//! thread for as long as the deck is open.
//!
//! Geometry: 5x3 keys, 72x72 pixel BGR icons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread::{self, JoinHandle};

use deck_core::{
    Deck, DeckError, DeckInfo, DeviceDescriptor, HasKeyImages, HidTransport, KeyEvent, KeyHandler,
    Result, SubscriptionId, Transport,
};
use image::RgbImage;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::abi::Pages;
use crate::events::Subscribers;
use crate::poller::KeyPoller;

pub mod abi;
pub mod keymap;
pub mod poller;

mod events;

pub mod consts {
    pub const VENDOR_ID: u16 = 0x0fd9;
    pub const PRODUCT_ID: u16 = 0x0060;

    pub const NUM_KEYS: usize = 15;
    pub const NUM_BUTTON_COLUMNS: usize = 5;
    pub const NUM_BUTTON_ROWS: usize = 3;
    /// Icon width and height in pixels
    pub const ICON_SIZE: u32 = 72;

    /// Upper bound on a single key state read, and so on shutdown latency
    pub const READ_TIMEOUT_MS: i32 = 500;
}

/// Static deck info for detection
pub static INFO: DeckInfo = DeckInfo {
    name: "Stream Deck (original)",
    cli_name: "streamdeck-original",
    vendor_id: consts::VENDOR_ID,
    product_id: consts::PRODUCT_ID,
    num_keys: consts::NUM_KEYS,
    columns: consts::NUM_BUTTON_COLUMNS,
    rows: consts::NUM_BUTTON_ROWS,
    icon_size: consts::ICON_SIZE,
};

/// List all connected original Stream Decks
pub fn enumerate() -> Result<Vec<DeviceDescriptor>> {
    deck_core::enumerate(consts::VENDOR_ID, consts::PRODUCT_ID)
}

/// Controller lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Transport open, poller not running yet
    Created,
    /// Poller running
    Started,
    /// Close in progress
    Disposing,
    /// Poller joined and transport released
    Disposed,
}

struct Lifecycle {
    state: State,
    poller: Option<JoinHandle<()>>,
}

/// High level abstraction for managing an original Stream Deck
///
/// The deck owns its transport. Writes may come from any thread and are
/// serialized by a single lock; key states are read by a background thread
/// that never takes that lock. Dropping the deck closes it.
pub struct StreamDeck<T: Transport + 'static = HidTransport> {
    transport: Arc<T>,
    write_lock: Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
    shutdown: Arc<AtomicBool>,
    subscribers: Arc<Subscribers>,
    poller_failure: Arc<Mutex<Option<String>>>,
}

impl StreamDeck<HidTransport> {
    /// Open the deck at `path`, or the first connected deck when no path is given,
    /// and start polling key states.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let path = match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => path.to_owned(),
            None => {
                let first = enumerate()?.into_iter().next();
                let not_found = || DeckError::DeviceNotFound("no stream decks connected".into());
                first.ok_or_else(not_found)?.path
            },
        };
        debug!("opening stream deck at {path}");
        Self::from_transport(HidTransport::open_path(&path)?)
    }

    /// Open the deck with the given serial number and start polling key states
    pub fn open_serial(serial: &str) -> Result<Self> {
        Self::from_transport(HidTransport::open_serial(
            consts::VENDOR_ID,
            consts::PRODUCT_ID,
            serial,
        )?)
    }
}

impl<T: Transport + 'static> StreamDeck<T> {
    /// Wrap an already opened transport. The key poller is not running yet.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            write_lock: Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle {
                state: State::Created,
                poller: None,
            }),
            shutdown: Arc::new(AtomicBool::new(false)),
            subscribers: Arc::new(Subscribers::default()),
            poller_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Wrap an already opened transport and start the key poller
    pub fn from_transport(transport: T) -> Result<Self> {
        let deck = Self::new(transport);
        deck.start()?;
        Ok(deck)
    }

    /// Spawn the key poller. Only valid once, right after construction.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            State::Created => {},
            State::Started => return Err(DeckError::IllegalState("key poller already started")),
            State::Disposing | State::Disposed => {
                return Err(DeckError::IllegalState("deck is closed"))
            },
        }

        let poller = KeyPoller {
            transport: self.transport.clone(),
            shutdown: self.shutdown.clone(),
            subscribers: self.subscribers.clone(),
            failure: self.poller_failure.clone(),
        };
        let handle = thread::Builder::new()
            .name("streamdeck-key-poller".into())
            .spawn(move || poller.run())
            .map_err(|e| {
                warn!("failed to spawn key poller: {e}");
                DeckError::IllegalState("failed to spawn key poller thread")
            })?;

        lifecycle.poller = Some(handle);
        lifecycle.state = State::Started;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.lifecycle.lock().state
    }

    /// Whether the key poller is still running
    pub fn is_polling(&self) -> bool {
        self.lifecycle
            .lock()
            .poller
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// The failure that stopped the key poller, if any
    pub fn poller_failure(&self) -> Option<String> {
        self.poller_failure.lock().clone()
    }

    /// Writer side operations are only valid before close
    fn ensure_open(&self) -> Result<()> {
        match self.lifecycle.lock().state {
            State::Created | State::Started => Ok(()),
            State::Disposing | State::Disposed => Err(DeckError::IllegalState("deck is closed")),
        }
    }

    fn write_pages(&self, pages: Pages) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.ensure_open()?;
        for page in pages {
            self.transport.write(&page).map_err(into_transport_error)?;
        }
        Ok(())
    }

    fn write_feature_report(&self, report: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.ensure_open()?;
        self.transport
            .send_feature_report(report)
            .map_err(into_transport_error)
    }

    /// Fill a key with a solid color
    pub fn fill_color(&self, key: usize, r: u8, g: u8, b: u8) -> Result<()> {
        let physical = keymap::validate_key(key)?;
        self.write_pages(abi::solid_color(physical, r, g, b))
    }

    /// Fill every key with a solid color. Keys update one at a time.
    pub fn fill_all_keys_with_color(&self, r: u8, g: u8, b: u8) -> Result<()> {
        for key in 0..consts::NUM_KEYS {
            self.fill_color(key, r, g, b)?;
        }
        Ok(())
    }

    /// Upload an icon to a key. Must already be exactly 72x72.
    pub fn set_image(&self, key: usize, image: &RgbImage) -> Result<()> {
        let physical = keymap::validate_key(key)?;
        self.write_pages(abi::icon(physical, image)?)
    }

    /// Blank a key
    pub fn clear_key(&self, key: usize) -> Result<()> {
        self.fill_color(key, 0, 0, 0)
    }

    /// Blank every key
    pub fn clear_all_keys(&self) -> Result<()> {
        self.fill_all_keys_with_color(0, 0, 0)
    }

    /// Reset the deck back to the logo
    pub fn reset(&self) -> Result<()> {
        self.write_feature_report(&abi::reset())
    }

    /// Set the backlight brightness in percent (0-100)
    pub fn set_brightness(&self, percent: u8) -> Result<()> {
        self.write_feature_report(&abi::brightness(percent)?)
    }

    /// Register a callback for key changes. Called from the poller thread.
    pub fn subscribe(&self, handler: impl Fn(KeyEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribers.subscribe(Box::new(handler))
    }

    /// Remove a callback registered with `subscribe`
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Number of registered key change callbacks
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Receive key changes over a channel instead of a callback.
    ///
    /// The channel's handler unregisters itself on the first event after the
    /// receiver is dropped.
    pub fn key_events(&self) -> mpsc::Receiver<KeyEvent> {
        let (tx, rx) = mpsc::channel();
        let own_id = Arc::new(OnceLock::new());
        let subscribers = Arc::downgrade(&self.subscribers);

        let handler_id = own_id.clone();
        let id = self.subscribe(move |event| {
            if tx.send(event).is_ok() {
                return;
            }
            if let (Some(subscribers), Some(id)) = (subscribers.upgrade(), handler_id.get()) {
                debug!("key event receiver dropped, unsubscribing {id:?}");
                subscribers.unsubscribe(*id);
            }
        });
        let _ = own_id.set(id);
        rx
    }

    /// Reset the deck, stop the poller and release the transport.
    ///
    /// Safe to call more than once; only the first call does any work. The
    /// reset is best effort and never makes close fail.
    pub fn close(&self) {
        let poller = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                State::Disposing | State::Disposed => return,
                State::Created | State::Started => lifecycle.state = State::Disposing,
            }
            lifecycle.poller.take()
        };

        {
            let _guard = self.write_lock.lock();
            if let Err(e) = self.transport.send_feature_report(&abi::reset()) {
                warn!("failed to reset stream deck while closing: {e}");
            }
        }

        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = poller {
            if handle.thread().id() == thread::current().id() {
                warn!("stream deck closed from its own key poller, not joining");
            } else if handle.join().is_err() {
                warn!("key poller panicked");
            }
        }

        let _guard = self.write_lock.lock();
        if let Err(e) = self.transport.close() {
            warn!("failed to release stream deck: {e}");
        }
        self.lifecycle.lock().state = State::Disposed;
        debug!("stream deck closed");
    }
}

/// Keep non-transport failures coming out of a transport from leaking through
fn into_transport_error(e: DeckError) -> DeckError {
    match e {
        DeckError::Transport(_) => e,
        other => DeckError::Transport(other.to_string()),
    }
}

impl<T: Transport + 'static> Drop for StreamDeck<T> {
    fn drop(&mut self) {
        self.close();
    }
}

// === Trait Implementations ===

impl<T: Transport + 'static> Deck for StreamDeck<T> {
    fn info(&self) -> &'static DeckInfo {
        &INFO
    }

    fn fill_color(&self, key: usize, r: u8, g: u8, b: u8) -> Result<()> {
        StreamDeck::fill_color(self, key, r, g, b)
    }

    fn fill_all_keys_with_color(&self, r: u8, g: u8, b: u8) -> Result<()> {
        StreamDeck::fill_all_keys_with_color(self, r, g, b)
    }

    fn reset(&self) -> Result<()> {
        StreamDeck::reset(self)
    }

    fn set_brightness(&self, percent: u8) -> Result<()> {
        StreamDeck::set_brightness(self, percent)
    }

    fn subscribe(&self, handler: KeyHandler) -> SubscriptionId {
        self.subscribers.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        StreamDeck::unsubscribe(self, id)
    }

    fn close(&self) {
        StreamDeck::close(self)
    }

    fn as_key_images(&self) -> Option<&dyn HasKeyImages> {
        Some(self)
    }
}

impl<T: Transport + 'static> HasKeyImages for StreamDeck<T> {
    fn set_key_image(&self, key: usize, rgb: &[u8]) -> Result<()> {
        let size = consts::ICON_SIZE;
        let image = (rgb.len() == (size * size * 3) as usize)
            .then(|| RgbImage::from_raw(size, size, rgb.to_vec()))
            .flatten()
            .ok_or_else(|| {
                DeckError::InvalidArgument(format!(
                    "icon must be {size}x{size} rgb, got {} bytes",
                    rgb.len()
                ))
            })?;
        self.set_image(key, &image)
    }
}
