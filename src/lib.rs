//
// lib.rs
// dicom-batch
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: the batch pipeline, its three processors and the operator session.
pub mod anonymize;
pub mod batch;
pub mod cli;
pub mod dicom_access;
pub mod dump;
pub mod image;
pub mod logging;
pub mod rules;
pub mod session;
pub mod settings;
pub mod walker;

pub use cli::{run as run_cli, Cli, Commands};
