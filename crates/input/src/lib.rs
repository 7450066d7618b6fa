//! Player commands: the single vocabulary every front end speaks.
//!
//! # Invariants
//! - Buttons, popups, geolocation feeds and scripts all produce `Command`s; the
//!   engine never sees raw UI events.

pub mod command;

pub use command::{Command, Direction, ParseCommandError};
