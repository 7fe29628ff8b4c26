// DltExport - platform/mod.rs
//
// Platform abstraction layer: filesystem-backed stores and sinks, config and
// catalog files.
// Dependencies: core traits, memmap2, directories, toml.
// Must NOT depend on: app.

pub mod catalog;
pub mod config;
pub mod dlt_file;
pub mod sink;
