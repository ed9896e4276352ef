//! Discovery error taxonomy.

use core::fmt;

use lodestone_acpi::AcpiError;

/// Why a discovery step produced nothing usable.
///
/// None of these stop the boot: the caller falls back to a non-ACPI way of
/// finding processors and interrupt controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The boot CPU has no local APIC, so there is nothing to discover.
    MissingCapability,
    /// The MADT, or every entry of an expected category, is absent.
    NotFound,
    /// Firmware data failed validation; nothing past the bad entry is
    /// trusted.
    Malformed,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCapability => f.write_str("CPU has no local APIC"),
            Self::NotFound => f.write_str("not found"),
            Self::Malformed => f.write_str("malformed firmware table"),
        }
    }
}

impl From<AcpiError> for DiscoveryError {
    fn from(err: AcpiError) -> Self {
        match err {
            AcpiError::TableNotFound => Self::NotFound,
            AcpiError::InvalidSignature
            | AcpiError::TruncatedData
            | AcpiError::MalformedEntry { .. } => Self::Malformed,
        }
    }
}
