#![forbid(unsafe_code)]

//! SQLite transport for a hierarchical content repository.

mod store;

pub use store::*;
