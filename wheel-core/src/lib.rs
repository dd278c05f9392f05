#![no_std]

// Shared logic for the wheel telemetry feature set.
//
// This crate stays portable across MCU firmware and the host service by avoiding
// the Rust standard library. Platform crates supply the instant type, the raw
// mutex flavour, and the analog source.

pub mod api;
pub mod config;
pub mod pulse;
pub mod query;
pub mod telemetry;
