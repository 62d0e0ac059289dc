//! Completion service client: transport, credential pool, rotation.

mod backend;
mod completion;
mod pool;

pub use backend::*;
pub use completion::*;
pub use pool::*;
