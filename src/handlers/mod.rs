//! Handler modules.

pub mod audio;
pub mod connection;
pub mod room;

pub use audio::*;
pub use connection::*;
pub use room::*;
