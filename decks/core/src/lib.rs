//! Core traits and types for the deck abstraction.
//!
//! This crate provides:
//! - The `DeckError` taxonomy shared by every deck driver
//! - The `Transport` trait, the boundary a driver talks to the device through
//! - `HidTransport`, the hidapi implementation of that boundary
//! - The `Deck` trait with `as_*()` methods for feature discovery

mod deck;
mod error;
mod hid;
mod transport;

pub use deck::{Deck, DeckInfo, HasKeyImages, KeyEvent, KeyHandler, SubscriptionId};
pub use error::{DeckError, Result};
pub use hid::{enumerate, HidTransport};
pub use transport::{DeviceDescriptor, Transport};
