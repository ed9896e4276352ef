//! System Description Table (SDT) header and checksum utilities.

use crate::AcpiError;

/// Read a little-endian `u16` at `off`. Callers bounds-check first.
pub(crate) fn le_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

/// Read a little-endian `u32` at `off`. Callers bounds-check first.
pub(crate) fn le_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// Read a little-endian `u64` at `off`. Callers bounds-check first.
pub(crate) fn le_u64(data: &[u8], off: usize) -> u64 {
    u64::from(le_u32(data, off)) | (u64::from(le_u32(data, off + 4)) << 32)
}

/// Read-only view of the standard 36-byte ACPI table header.
///
/// The header is not copied out of firmware memory; every accessor reads
/// the underlying bytes, so the view cannot outlive the mapping.
#[derive(Clone, Copy)]
pub struct SdtHeader<'a> {
    raw: &'a [u8],
}

impl<'a> SdtHeader<'a> {
    /// The size of an SDT header in bytes.
    pub const SIZE: usize = 36;

    /// Wraps the first [`SdtHeader::SIZE`] bytes of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::TruncatedData`] if `data` is shorter than the
    /// header.
    pub fn parse(data: &'a [u8]) -> Result<Self, AcpiError> {
        let raw = data.get(..Self::SIZE).ok_or(AcpiError::TruncatedData)?;
        Ok(Self { raw })
    }

    /// 4-byte ASCII signature identifying the table type.
    #[must_use]
    pub fn signature(&self) -> [u8; 4] {
        [self.raw[0], self.raw[1], self.raw[2], self.raw[3]]
    }

    /// Total length of the table, header included, in bytes.
    #[must_use]
    pub fn length(&self) -> u32 {
        le_u32(self.raw, 4)
    }

    /// Revision of the table structure.
    #[must_use]
    pub fn revision(&self) -> u8 {
        self.raw[8]
    }

    /// Checksum byte; the whole table must sum to zero.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.raw[9]
    }

    /// OEM identification string.
    #[must_use]
    pub fn oem_id(&self) -> &'a [u8] {
        &self.raw[10..16]
    }

    /// OEM table identification string.
    #[must_use]
    pub fn oem_table_id(&self) -> &'a [u8] {
        &self.raw[16..24]
    }

    /// OEM revision number.
    #[must_use]
    pub fn oem_revision(&self) -> u32 {
        le_u32(self.raw, 24)
    }
}

impl core::fmt::Debug for SdtHeader<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sig = self.signature();
        f.debug_struct("SdtHeader")
            .field("signature", &core::str::from_utf8(&sig).unwrap_or("????"))
            .field("length", &self.length())
            .field("revision", &self.revision())
            .field("checksum", &self.checksum())
            .finish_non_exhaustive()
    }
}

/// Validate the checksum of a byte slice.
///
/// ACPI tables sum to zero (mod 256) over their declared length.
#[must_use]
pub fn validate_checksum(data: &[u8]) -> bool {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0
}
