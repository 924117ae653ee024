// Application layer - caller-side use cases on top of the transfer engine.
// Resolves accounts, applies caller policy (currency checks) and maps
// engine errors for the CLI.

pub mod error;
mod service;

pub use error::*;
pub use service::*;
