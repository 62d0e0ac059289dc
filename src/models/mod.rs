//! Core data models for examforge.

mod blueprint;
mod config;
mod document;
mod error;
mod exam;
mod question;

pub use blueprint::*;
pub use config::*;
pub use document::*;
pub use error::*;
pub use exam::*;
pub use question::*;
