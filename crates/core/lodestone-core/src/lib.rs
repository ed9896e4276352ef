//! Core primitives shared by the Lodestone early-boot crates.
//!
//! Everything here runs before the heap, the scheduler, or any secondary
//! CPU exists, so the crate is `no_std`, allocation-free and lock-free. It
//! is kept apart from the parsers so it can be exercised with `cargo test`
//! on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod cpu;
pub mod log;

pub use cpu::{CpuFeatureQuery, CpuFeatures};
pub use log::LogLevel;
