//! `lodestone-topology` --- boot-time interrupt-controller topology discovery.
//!
//! Runs once on the boot CPU, before any other processor is started. Walks
//! the ACPI MADT and works out how many processors exist, which APIC
//! addressing scheme they use, where the local and I/O APICs live, and
//! how NMIs are wired.
//!
//! - [`handlers`]: one decoder-plus-rules function per MADT entry type.
//! - [`state`]: the [`TopologyState`] aggregate and its capacity ceilings.
//! - [`discovery`]: the [`MadtDiscovery`] state machine and [`discover`].
//! - [`registry`]: the [`CpuRegistry`] hand-off to CPU enumeration.
//!
//! # Usage
//!
//! ```ignore
//! let topology = discover(&tables, CpuFeatures::from_cpuid_leaf1(ecx, edx), &mut cpus,
//!     DiscoveryConfig::default());
//! match topology.mode() {
//!     SmpMode::FullAcpi => { /* program I/O APICs from the registry */ }
//!     SmpMode::ProcessorOnly => { /* legacy interrupt routing */ }
//!     SmpMode::Unusable => { /* MP table or uniprocessor */ }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod state;

pub use config::DiscoveryConfig;
pub use discovery::{MadtDiscovery, Phase, SmpMode, Topology, discover};
pub use error::DiscoveryError;
pub use registry::{ApicKind, CpuRegistry, IoApicDescriptor, ProcessorDescriptor};
pub use state::{ApicScheme, Diagnostics, TopologyState};
