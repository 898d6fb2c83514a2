//! # Ring
//!
//! A minimal keyboard-driven selection menu drawn on the overlay layer of a
//! wlroots-based Wayland compositor.
//!
//! ## Architecture
//!
//! - `protocol`: connection, global discovery and binding
//! - `surface`: layer-shell overlay, configure handshake, buffer commits
//! - `shm`: anonymous shared memory and buffer release bookkeeping
//! - `input`: seat and keyboard handling, keymaps, key repeat
//! - `menu`: selection state machine and the stdin item reader
//! - `renderer`: software painter used for every frame
//! - `session`: the context object passed to every protocol callback
//! - `event_loop`: multiplexes the socket and the repeat timer
//! - `config`: resolved configuration and the optional TOML file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ring_menu::{MenuConfig, Outcome};
//!
//! fn main() -> anyhow::Result<()> {
//!     let items = vec!["firefox".to_string(), "foot".to_string()];
//!     if let Outcome::Selected(item) = ring_menu::run(MenuConfig::default(), items)? {
//!         println!("{item}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event_loop;
pub mod input;
pub mod menu;
pub mod protocol;
pub mod renderer;
pub mod session;
pub mod shm;
pub mod surface;

pub use config::{Color, ColorScheme, MenuConfig};
pub use error::{Result, RingError};
pub use event_loop::run;
pub use menu::{MenuAction, MenuKey, MenuState};
pub use renderer::{FontDescriptor, Renderer, SoftwareRenderer};
pub use session::{Outcome, RunState, Session};

/// Version string including the commit and build date
pub const VERSION: &str = env!("RING_LONG_VERSION");
