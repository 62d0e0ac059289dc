//! Synthesis module - the three-agent question pipeline.

mod craft;
mod extract;
mod pipeline;
mod prompts;
mod review;

pub use craft::*;
pub use extract::*;
pub use pipeline::*;
pub use prompts::{salvage_json, StyleProfile};
pub use review::*;
