use std::error::Error;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;

use bpaf::{construct, Bpaf, Parser};
use deck_core::{Deck, KeyEvent};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::detection::{deck_kind, DeckKind, Selector};
use crate::media::encode_icon;

mod config;
mod detection;
mod media;

fn key() -> impl Parser<Option<usize>> {
    bpaf::short('k')
        .long("key")
        .help("Key index (0-14, row-major from the top left). Applies to every key if omitted.")
        .argument::<usize>("KEY")
        .optional()
}

/// Commands that need an open deck
#[derive(Clone, Debug, Bpaf)]
enum DeckCommand {
    /// Reset the deck back to its logo
    #[bpaf(command)]
    Reset,
    /// Set the backlight brightness
    #[bpaf(command)]
    Brightness {
        /// Brightness in percent (0-100)
        #[bpaf(
            positional("PERCENT"),
            guard(|p| *p <= 100, "brightness must be between 0 and 100")
        )]
        percent: u8,
    },
    /// Fill keys with a solid color
    #[bpaf(command)]
    Fill {
        #[bpaf(external)]
        key: Option<usize>,
        /// Fill color (hex: #RRGGBB or #RGB)
        #[bpaf(short, long, argument("COLOR"))]
        color: Color,
    },
    /// Blank keys
    #[bpaf(command)]
    Clear {
        #[bpaf(external)]
        key: Option<usize>,
    },
    /// Upload an image to keys
    #[bpaf(command, fallback_to_usage)]
    Image {
        #[bpaf(external)]
        key: Option<usize>,
        /// Use nearest neighbor interpolation when resizing, otherwise uses gaussian
        #[bpaf(short('n'), long("nearest"))]
        nearest: bool,
        /// Background color for transparent images, defaults to the configured one
        #[bpaf(short, long, argument("COLOR"))]
        bg: Option<Color>,
        /// Path to image to re-encode and upload
        #[bpaf(positional("PATH"), guard(|p| p.exists(), "file not found"))]
        path: PathBuf,
    },
    /// Print key presses and releases
    #[bpaf(command)]
    Watch {
        /// Stop after this long (e.g. 30s, 5m). Runs until interrupted otherwise.
        #[bpaf(long("for"), argument("DURATION"))]
        duration: Option<humantime::Duration>,
    },
    /// Cycle brightness, reset and color sweeps while printing key events
    #[bpaf(command)]
    Demo,
}

#[derive(Clone, Debug)]
enum Command {
    List,
    Deck(DeckCommand),
}

fn command() -> impl Parser<Command> {
    let list = bpaf::pure(Command::List)
        .to_options()
        .descr("List connected decks")
        .command("list");
    let deck = deck_command().map(Command::Deck);
    construct!([list, deck])
}

/// Keys addressed by an optional `--key`, every key when absent
fn target_keys(key: Option<usize>, num_keys: usize) -> RangeInclusive<usize> {
    match key {
        Some(key) => key..=key,
        None => 0..=num_keys.saturating_sub(1),
    }
}

/// Utility for easily parsing hex colors from bpaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Color(pub [u8; 3]);
impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.0;
        f.write_str(&format!("#{r:02x}{g:02x}{b:02x}"))
    }
}
impl FromStr for Color {
    type Err = String;
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        // parse hex string into rgb
        let mut hex = code.trim_start_matches('#').to_string();
        match hex.len() {
            3 => {
                // Extend 3 character hex colors
                hex = hex.chars().flat_map(|a| [a, a]).collect();
            },
            6 => {},
            l => return Err(format!("Invalid hex length for {code}: {l}")),
        }
        if let Ok(channel_bytes) = u32::from_str_radix(&hex, 16) {
            let r = ((channel_bytes >> 16) & 0xFF) as u8;
            let g = ((channel_bytes >> 8) & 0xFF) as u8;
            let b = (channel_bytes & 0xFF) as u8;
            Ok(Self([r, g, b]))
        } else {
            Err(format!("Invalid hex color: {code}"))
        }
    }
}

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version, descr(env!("CARGO_PKG_DESCRIPTION")))]
struct Cli {
    #[bpaf(external(deck_kind))]
    deck: DeckKind,
    /// HID path of the deck to open
    #[bpaf(long, argument("PATH"))]
    path: Option<String>,
    /// Serial number of the deck to open
    #[bpaf(long, argument("SERIAL"))]
    serial: Option<String>,
    #[bpaf(external(command))]
    command: Command,
}

fn print_event(event: KeyEvent) {
    let state = if event.pressed { "pressed" } else { "released" };
    println!("key {:2} {state}", event.key);
}

fn list() -> Result<(), Box<dyn Error>> {
    let devices = detection::list_devices()?;
    if devices.is_empty() {
        println!("no decks connected");
    }
    for (info, descriptor) in devices {
        println!("{}: {descriptor}", info.name);
    }
    Ok(())
}

/// Apply a color to one key, or every key
fn fill(deck: &dyn Deck, key: Option<usize>, color: Color) -> Result<(), Box<dyn Error>> {
    let [r, g, b] = color.0;
    match key {
        Some(key) => deck.fill_color(key, r, g, b)?,
        None => deck.fill_all_keys_with_color(r, g, b)?,
    }
    println!("filled {} with {color}", key.map_or("all keys".into(), |k| format!("key {k}")));
    Ok(())
}

fn demo(deck: &dyn Deck, config: &Config) -> Result<(), Box<dyn Error>> {
    let delay = config.demo.step_delay;

    deck.set_brightness(config.display.brightness)?;
    thread::sleep(delay);
    for _ in 0..2 {
        deck.reset()?;
        thread::sleep(delay);
        deck.clear_all_keys()?;
        thread::sleep(delay);
    }

    let subscription = deck.subscribe(Box::new(print_event));
    let step = config.demo.color_step.max(1) as usize;
    for channel in 0..3 {
        for value in (0..u8::MAX).step_by(step) {
            let mut rgb = [0u8; 3];
            rgb[channel] = value;
            deck.fill_all_keys_with_color(rgb[0], rgb[1], rgb[2])?;
        }
    }
    deck.clear_all_keys()?;
    deck.unsubscribe(subscription);
    println!("demo done");
    Ok(())
}

fn run(deck: &dyn Deck, command: DeckCommand, config: &Config) -> Result<(), Box<dyn Error>> {
    match command {
        DeckCommand::Reset => {
            deck.reset()?;
            println!("reset {}", deck.info().name);
            Ok(())
        },
        DeckCommand::Brightness { percent } => {
            deck.set_brightness(percent)?;
            println!("set brightness to {percent}%");
            Ok(())
        },
        DeckCommand::Fill { key, color } => fill(deck, key, color),
        DeckCommand::Clear { key } => {
            match key {
                Some(key) => deck.clear_key(key)?,
                None => deck.clear_all_keys()?,
            }
            Ok(())
        },
        DeckCommand::Image {
            key,
            nearest,
            bg,
            path,
        } => {
            let images = deck
                .as_key_images()
                .ok_or("deck does not support key images")?;
            let bg = match bg {
                Some(bg) => bg,
                None => config.display.background_color.parse()?,
            };
            let nearest = nearest || config.display.use_nearest_neighbor;

            let image = ::image::open(&path)?;
            let icon = encode_icon(image, bg.0, nearest, deck.info().icon_size);
            for key in target_keys(key, deck.info().num_keys) {
                images.set_key_image(key, icon.as_raw())?;
            }
            println!("uploaded {}", path.display());
            Ok(())
        },
        DeckCommand::Watch { duration } => {
            let subscription = deck.subscribe(Box::new(print_event));
            println!("watching {} for key events", deck.info().name);
            match duration {
                Some(duration) => thread::sleep(duration.into()),
                None => loop {
                    thread::park();
                },
            }
            deck.unsubscribe(subscription);
            Ok(())
        },
        DeckCommand::Demo => demo(deck, config),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli().run();
    let command = match cli.command {
        Command::List => return list(),
        Command::Deck(command) => command,
    };

    let config = Config::load_or_create()?;
    let selector = Selector {
        path: cli.path.or_else(|| config.device.path.clone()),
        serial: cli.serial.or_else(|| config.device.serial.clone()),
    };

    let deck = cli.deck.as_deck(&selector)?;
    let result = run(deck.as_ref(), command, &config);
    deck.close();
    result
}
