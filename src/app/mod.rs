// DltExport - app/mod.rs
//
// Application layer: command-line orchestration of export runs.
// Dependencies: core and platform layers.

pub mod exporter;
pub mod progress;
pub mod reporter;
