//! `lodestone-acpi` --- a standalone, `no_std` ACPI sub-table parser.
//!
//! Firmware tables are handed to this crate as byte slices that the
//! platform has already mapped. Nothing here dereferences a raw pointer:
//! every multi-byte field is read with `from_le_bytes` after the enclosing
//! entry has passed the bounds validator in [`subtable`].
//!
//! - [`sdt`]: the 36-byte System Description Table header and checksum.
//! - [`subtable`]: the bounds validator and the generic sub-table walker
//!   shared by every table made of `{type, length}` prefixed entries.
//! - [`madt`]: the Multiple APIC Description Table header and its entry
//!   decoders.
//!
//! # Usage
//!
//! ```ignore
//! let data = locator.locate_table(MADT_SIGNATURE).ok_or(AcpiError::TableNotFound)?;
//! let madt = MadtTable::parse(data)?;
//! for entry in madt.entries() {
//!     // ...
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod madt;
pub mod sdt;
pub mod subtable;

use core::fmt;

pub use madt::{MadtEntry, MadtEntryIter, MadtEntryType, MadtTable};
pub use sdt::SdtHeader;
pub use subtable::{Subtable, SubtableHeader, SubtableProc, Visit, WalkSummary};

/// Errors that can occur while parsing ACPI tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiError {
    /// A table with the requested signature was not found.
    TableNotFound,
    /// The table signature did not match the expected value.
    InvalidSignature,
    /// A table was too short to contain its fixed header fields.
    TruncatedData,
    /// A sub-table entry declared a length that is too small for its type
    /// or that runs past the end of the table.
    MalformedEntry {
        /// The entry type byte.
        entry_type: u8,
        /// Offset of the entry from the start of the table.
        offset: usize,
    },
}

impl fmt::Display for AcpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableNotFound => f.write_str("table not found"),
            Self::InvalidSignature => f.write_str("invalid table signature"),
            Self::TruncatedData => f.write_str("table truncated"),
            Self::MalformedEntry { entry_type, offset } => {
                write!(f, "malformed entry type {entry_type:#04x} at offset {offset:#x}")
            }
        }
    }
}

/// Finds firmware tables by signature.
///
/// The implementation walks the RSDT/XSDT and maps the matching table. The
/// returned slice must cover the whole table as declared by its header
/// length, and stays valid (and unmodified) for as long as the locator is
/// borrowed.
pub trait TableLocator {
    /// Returns the mapped bytes of the first table whose signature matches.
    fn locate_table(&self, signature: &[u8; 4]) -> Option<&[u8]>;
}

impl<T: TableLocator + ?Sized> TableLocator for &T {
    fn locate_table(&self, signature: &[u8; 4]) -> Option<&[u8]> {
        (**self).locate_table(signature)
    }
}
