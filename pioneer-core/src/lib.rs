//! Core address-space and configuration primitives shared by every layer of
//! the storage stack: the error taxonomy, the `StorageKey` address model,
//! reserved-key constants, and the `.pioneer.json` configuration loader.

mod config;
mod error;
mod path;
mod reserved;

pub use config::*;
pub use error::*;
pub use path::*;
pub use reserved::*;
