// DltExport - core/mod.rs
//
// Core business logic layer.
// Dependencies: standard library plus pure data crates (csv, chrono, regex).
// Must NOT depend on: platform, app, or touch the filesystem directly.

pub mod codec;
pub mod decoder;
pub mod export;
pub mod filter;
pub mod format;
pub mod model;
pub mod progress;
pub mod selection;
pub mod sink;
pub mod store;
