pub mod app;
pub mod buffer;
pub mod classify;
pub mod command;
pub mod cookies;
pub mod error;
pub mod stats;
pub mod supervisor;
pub mod tui;

pub use error::{Error, Result};
