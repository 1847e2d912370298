//! Deck detection and selection logic.

use std::str::FromStr;

use bpaf::Bpaf;
use deck_core::{Deck, DeckError, DeckInfo, DeviceDescriptor};
use streamdeck_original::{StreamDeck, INFO as STREAMDECK_ORIGINAL_INFO};
use tracing::debug;

/// Every deck type this build knows how to drive
static SUPPORTED: &[&DeckInfo] = &[&STREAMDECK_ORIGINAL_INFO];

/// Supported deck types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Bpaf)]
#[bpaf(fallback(DeckKind::Auto), group_help("Deck selection:"))]
pub enum DeckKind {
    /// Auto-detect connected deck (default)
    #[default]
    Auto,
    /// Original 15 key Stream Deck
    StreamdeckOriginal,
}

impl FromStr for DeckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "streamdeck-original" => Ok(Self::StreamdeckOriginal),
            _ => Err(format!(
                "unknown deck: {s}. Available: auto, streamdeck-original"
            )),
        }
    }
}

impl std::fmt::Display for DeckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::StreamdeckOriginal => write!(f, "streamdeck-original"),
        }
    }
}

/// Where to find the device to open
#[derive(Clone, Debug, Default)]
pub struct Selector {
    pub path: Option<String>,
    pub serial: Option<String>,
}

impl DeckKind {
    /// Open the specified deck, or auto-detect if Auto
    pub fn as_deck(&self, selector: &Selector) -> Result<Box<dyn Deck>, DeckError> {
        match self {
            DeckKind::Auto => {
                // Pick the first deck type with a connected device
                for info in SUPPORTED {
                    let found = deck_core::enumerate(info.vendor_id, info.product_id)?;
                    if !found.is_empty() || selector.path.is_some() {
                        return open(info, selector);
                    }
                    // Add more decks here as they're implemented
                }
                Err(DeckError::DeviceNotFound("no supported decks are connected".into()))
            },
            DeckKind::StreamdeckOriginal => open(&STREAMDECK_ORIGINAL_INFO, selector),
        }
    }
}

fn open(info: &DeckInfo, selector: &Selector) -> Result<Box<dyn Deck>, DeckError> {
    debug!(deck = info.cli_name, ?selector, "opening deck");
    match info.cli_name {
        "streamdeck-original" => {
            let deck = match (&selector.path, &selector.serial) {
                (None, Some(serial)) => StreamDeck::open_serial(serial)?,
                (path, _) => StreamDeck::open(path.as_deref())?,
            };
            Ok(Box::new(deck))
        },
        name => Err(DeckError::DeviceNotFound(format!("no driver for {name}"))),
    }
}

/// List connected devices of every supported deck type
pub fn list_devices() -> Result<Vec<(&'static DeckInfo, DeviceDescriptor)>, DeckError> {
    let mut devices = Vec::new();
    for info in SUPPORTED {
        for descriptor in deck_core::enumerate(info.vendor_id, info.product_id)? {
            devices.push((*info, descriptor));
        }
    }
    Ok(devices)
}
