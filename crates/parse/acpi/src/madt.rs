//! Multiple APIC Description Table (MADT) parsing.
//!
//! The MADT describes the interrupt controller topology of the system:
//! local APICs in their three addressing flavours (xAPIC, x2APIC, SAPIC),
//! I/O APICs, interrupt source overrides, and NMI wiring.
//!
//! Layout: the 36-byte SDT header, a 32-bit local APIC address, 32-bit
//! flags, then back-to-back entries starting at byte 44. Each entry type
//! has its own decoder, and every decoder goes through
//! [`Subtable::body`] before reading a field.

use core::fmt;

use crate::sdt::{SdtHeader, le_u16, le_u32, le_u64, validate_checksum};
use crate::subtable::{self, Subtable, SubtableHandler, SubtableIter, SubtableProc, WalkSummary};
use crate::AcpiError;

/// MADT table signature (`b"APIC"`).
pub const MADT_SIGNATURE: &[u8; 4] = b"APIC";

bitflags::bitflags! {
    /// Flags of the processor entries (local APIC, x2APIC, SAPIC).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LocalApicFlags: u32 {
        /// The processor is usable.
        const ENABLED        = 1 << 0;
        /// A disabled processor may be brought online at runtime.
        const ONLINE_CAPABLE = 1 << 1;
    }
}

bitflags::bitflags! {
    /// MPS INTI flags carried by overrides and NMI entries.
    ///
    /// Bits 0-1 select the polarity and bits 2-3 the trigger mode; a field
    /// value of zero means "conforms to the bus".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MpsIntiFlags: u16 {
        /// Active-high polarity.
        const ACTIVE_HIGH   = 0b01;
        /// Active-low polarity.
        const ACTIVE_LOW    = 0b11;
        /// Edge-triggered.
        const EDGE          = 0b01 << 2;
        /// Level-triggered.
        const LEVEL         = 0b11 << 2;
    }
}

/// Interrupt pin polarity decoded from [`MpsIntiFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Conforms to the bus specification.
    Conforming,
    /// Active high.
    ActiveHigh,
    /// Active low.
    ActiveLow,
    /// The reserved encoding `0b10`.
    Reserved,
}

/// Interrupt trigger mode decoded from [`MpsIntiFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Conforms to the bus specification.
    Conforming,
    /// Edge-triggered.
    Edge,
    /// Level-triggered.
    Level,
    /// The reserved encoding `0b10`.
    Reserved,
}

impl MpsIntiFlags {
    /// Pin polarity.
    #[must_use]
    pub fn polarity(self) -> Polarity {
        match self.bits() & 0b11 {
            0b00 => Polarity::Conforming,
            0b01 => Polarity::ActiveHigh,
            0b11 => Polarity::ActiveLow,
            _ => Polarity::Reserved,
        }
    }

    /// Trigger mode.
    #[must_use]
    pub fn trigger_mode(self) -> TriggerMode {
        match (self.bits() >> 2) & 0b11 {
            0b00 => TriggerMode::Conforming,
            0b01 => TriggerMode::Edge,
            0b11 => TriggerMode::Level,
            _ => TriggerMode::Reserved,
        }
    }
}

/// MADT entry type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MadtEntryType {
    /// Type 0: Processor Local APIC.
    LocalApic,
    /// Type 1: I/O APIC.
    IoApic,
    /// Type 2: Interrupt Source Override.
    InterruptOverride,
    /// Type 3: Non-Maskable Interrupt Source.
    NmiSource,
    /// Type 4: Local APIC NMI.
    LocalApicNmi,
    /// Type 5: Local APIC Address Override.
    LocalApicOverride,
    /// Type 6: I/O SAPIC.
    IoSapic,
    /// Type 7: Local SAPIC.
    LocalSapic,
    /// Type 8: Platform Interrupt Sources.
    PlatformInterruptSource,
    /// Type 9: Processor Local x2APIC.
    LocalX2Apic,
    /// Type 10: Local x2APIC NMI.
    LocalX2ApicNmi,
    /// Any other (newer or vendor) type.
    Unknown(u8),
}

impl MadtEntryType {
    /// Maps a raw type byte to its tag.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::LocalApic,
            1 => Self::IoApic,
            2 => Self::InterruptOverride,
            3 => Self::NmiSource,
            4 => Self::LocalApicNmi,
            5 => Self::LocalApicOverride,
            6 => Self::IoSapic,
            7 => Self::LocalSapic,
            8 => Self::PlatformInterruptSource,
            9 => Self::LocalX2Apic,
            10 => Self::LocalX2ApicNmi,
            other => Self::Unknown(other),
        }
    }

    /// The raw type byte.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::LocalApic => 0,
            Self::IoApic => 1,
            Self::InterruptOverride => 2,
            Self::NmiSource => 3,
            Self::LocalApicNmi => 4,
            Self::LocalApicOverride => 5,
            Self::IoSapic => 6,
            Self::LocalSapic => 7,
            Self::PlatformInterruptSource => 8,
            Self::LocalX2Apic => 9,
            Self::LocalX2ApicNmi => 10,
            Self::Unknown(raw) => raw,
        }
    }
}

/// Processor Local APIC structure (type 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalApic {
    /// ACPI processor id.
    pub acpi_processor_id: u8,
    /// 8-bit local APIC id.
    pub apic_id: u8,
    /// Processor flags.
    pub flags: LocalApicFlags,
}

impl LocalApic {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 8;
    /// Id value firmware uses to mark an unusable entry.
    pub const INVALID_ID: u8 = 0xFF;

    /// Decodes a type 0 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry is too short or
    /// runs past the end of the table.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            acpi_processor_id: b[2],
            apic_id: b[3],
            flags: LocalApicFlags::from_bits_retain(le_u32(b, 4)),
        })
    }

    /// Whether the processor is usable.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(LocalApicFlags::ENABLED)
    }
}

/// I/O APIC structure (type 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoApic {
    /// I/O APIC id.
    pub io_apic_id: u8,
    /// Physical address of the register window.
    pub address: u32,
    /// First Global System Interrupt handled by this I/O APIC.
    pub gsi_base: u32,
}

impl IoApic {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 12;

    /// Decodes a type 1 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            io_apic_id: b[2],
            // byte 3 is reserved
            address: le_u32(b, 4),
            gsi_base: le_u32(b, 8),
        })
    }
}

/// Interrupt Source Override (type 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptOverride {
    /// Bus, always 0 (ISA).
    pub bus: u8,
    /// Bus-relative (ISA) IRQ.
    pub source_irq: u8,
    /// Global System Interrupt the source is wired to.
    pub gsi: u32,
    /// Polarity and trigger mode.
    pub flags: MpsIntiFlags,
}

impl InterruptOverride {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 10;

    /// Decodes a type 2 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            bus: b[2],
            source_irq: b[3],
            gsi: le_u32(b, 4),
            flags: MpsIntiFlags::from_bits_retain(le_u16(b, 8)),
        })
    }
}

/// Non-Maskable Interrupt Source (type 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NmiSource {
    /// Polarity and trigger mode.
    pub flags: MpsIntiFlags,
    /// Global System Interrupt line the NMI arrives on.
    pub gsi: u32,
}

impl NmiSource {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 8;

    /// Decodes a type 3 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            flags: MpsIntiFlags::from_bits_retain(le_u16(b, 2)),
            gsi: le_u32(b, 4),
        })
    }
}

/// Local APIC NMI structure (type 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalApicNmi {
    /// ACPI processor id; `0xFF` means every processor.
    pub acpi_processor_id: u8,
    /// Polarity and trigger mode.
    pub flags: MpsIntiFlags,
    /// Local APIC `LINTn` pin the NMI is wired to.
    pub lint: u8,
}

impl LocalApicNmi {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 6;

    /// Decodes a type 4 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            acpi_processor_id: b[2],
            flags: MpsIntiFlags::from_bits_retain(le_u16(b, 3)),
            lint: b[5],
        })
    }
}

/// Local APIC Address Override (type 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalApicOverride {
    /// 64-bit physical address of the local APIC.
    pub address: u64,
}

impl LocalApicOverride {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 12;

    /// Decodes a type 5 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            address: le_u64(b, 4),
        })
    }
}

/// Local SAPIC structure (type 7).
///
/// The fixed part is 16 bytes; a NUL-terminated UID string may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSapic {
    /// ACPI processor id.
    pub acpi_processor_id: u8,
    /// Local SAPIC id (the cluster).
    pub id: u8,
    /// Local SAPIC extended id.
    pub eid: u8,
    /// Processor flags.
    pub flags: LocalApicFlags,
    /// ACPI processor UID.
    pub uid: u32,
}

impl LocalSapic {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 16;

    /// Decodes a type 7 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            acpi_processor_id: b[2],
            id: b[3],
            eid: b[4],
            // bytes 5..8 are reserved
            flags: LocalApicFlags::from_bits_retain(le_u32(b, 8)),
            uid: le_u32(b, 12),
        })
    }

    /// The combined physical id: cluster in bits 8-15, eid in bits 0-7.
    #[must_use]
    pub fn apic_id(&self) -> u32 {
        (u32::from(self.id) << 8) | u32::from(self.eid)
    }

    /// Whether the processor is usable.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(LocalApicFlags::ENABLED)
    }
}

/// Processor Local x2APIC structure (type 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalX2Apic {
    /// 32-bit x2APIC id.
    pub x2apic_id: u32,
    /// Processor flags.
    pub flags: LocalApicFlags,
    /// ACPI processor UID.
    pub uid: u32,
}

impl LocalX2Apic {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 16;
    /// Id value that can never address a processor.
    pub const INVALID_ID: u32 = u32::MAX;

    /// Decodes a type 9 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            // bytes 2..4 are reserved
            x2apic_id: le_u32(b, 4),
            flags: LocalApicFlags::from_bits_retain(le_u32(b, 8)),
            uid: le_u32(b, 12),
        })
    }

    /// Whether the processor is usable.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(LocalApicFlags::ENABLED)
    }
}

/// Local x2APIC NMI structure (type 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalX2ApicNmi {
    /// Polarity and trigger mode.
    pub flags: MpsIntiFlags,
    /// ACPI processor UID; `0xFFFF_FFFF` means every processor.
    pub uid: u32,
    /// Local x2APIC `LINTn` pin the NMI is wired to.
    pub lint: u8,
}

impl LocalX2ApicNmi {
    /// Minimum entry length.
    pub const MIN_LENGTH: usize = 12;

    /// Decodes a type 10 entry.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds
    /// check.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        let b = entry.body(Self::MIN_LENGTH)?;
        Ok(Self {
            flags: MpsIntiFlags::from_bits_retain(le_u16(b, 2)),
            uid: le_u32(b, 4),
            lint: b[8],
        })
    }
}

/// A single decoded MADT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MadtEntry {
    /// Type 0.
    LocalApic(LocalApic),
    /// Type 1.
    IoApic(IoApic),
    /// Type 2.
    InterruptOverride(InterruptOverride),
    /// Type 3.
    NmiSource(NmiSource),
    /// Type 4.
    LocalApicNmi(LocalApicNmi),
    /// Type 5.
    LocalApicOverride(LocalApicOverride),
    /// Type 7.
    LocalSapic(LocalSapic),
    /// Type 9.
    LocalX2Apic(LocalX2Apic),
    /// Type 10.
    LocalX2ApicNmi(LocalX2ApicNmi),
    /// A type this crate does not decode.
    Unknown {
        /// The entry type byte.
        entry_type: u8,
        /// The entry length including the 2-byte header.
        length: u8,
    },
}

impl MadtEntry {
    /// Decodes `entry` with the decoder selected by its type tag.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] if the entry is too short for
    /// its type or runs past the end of the table.
    pub fn decode(entry: &Subtable<'_>) -> Result<Self, AcpiError> {
        Ok(match MadtEntryType::from_raw(entry.entry_type()) {
            MadtEntryType::LocalApic => Self::LocalApic(LocalApic::decode(entry)?),
            MadtEntryType::IoApic => Self::IoApic(IoApic::decode(entry)?),
            MadtEntryType::InterruptOverride => {
                Self::InterruptOverride(InterruptOverride::decode(entry)?)
            }
            MadtEntryType::NmiSource => Self::NmiSource(NmiSource::decode(entry)?),
            MadtEntryType::LocalApicNmi => Self::LocalApicNmi(LocalApicNmi::decode(entry)?),
            MadtEntryType::LocalApicOverride => {
                Self::LocalApicOverride(LocalApicOverride::decode(entry)?)
            }
            MadtEntryType::LocalSapic => Self::LocalSapic(LocalSapic::decode(entry)?),
            MadtEntryType::LocalX2Apic => Self::LocalX2Apic(LocalX2Apic::decode(entry)?),
            MadtEntryType::LocalX2ApicNmi => {
                Self::LocalX2ApicNmi(LocalX2ApicNmi::decode(entry)?)
            }
            MadtEntryType::IoSapic
            | MadtEntryType::PlatformInterruptSource
            | MadtEntryType::Unknown(_) => {
                let header = entry.header();
                Self::Unknown {
                    entry_type: header.entry_type,
                    length: header.length,
                }
            }
        })
    }
}

fn enabled_str(flags: LocalApicFlags) -> &'static str {
    if flags.contains(LocalApicFlags::ENABLED) {
        "enabled"
    } else {
        "disabled"
    }
}

impl fmt::Display for MadtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalApic(e) => write!(
                f,
                "LAPIC (acpi_id[{:#04x}] lapic_id[{:#04x}] {})",
                e.acpi_processor_id,
                e.apic_id,
                enabled_str(e.flags)
            ),
            Self::IoApic(e) => write!(
                f,
                "IOAPIC (id[{:#04x}] address[{:#010x}] gsi_base[{}])",
                e.io_apic_id, e.address, e.gsi_base
            ),
            Self::InterruptOverride(e) => write!(
                f,
                "INT_SRC_OVR (bus {} bus_irq {} global_irq {} {:?} {:?})",
                e.bus,
                e.source_irq,
                e.gsi,
                e.flags.polarity(),
                e.flags.trigger_mode()
            ),
            Self::NmiSource(e) => write!(
                f,
                "NMI_SRC ({:?} {:?} global_irq {})",
                e.flags.polarity(),
                e.flags.trigger_mode(),
                e.gsi
            ),
            Self::LocalApicNmi(e) => write!(
                f,
                "LAPIC_NMI (acpi_id[{:#04x}] {:?} {:?} lint[{:#x}])",
                e.acpi_processor_id,
                e.flags.polarity(),
                e.flags.trigger_mode(),
                e.lint
            ),
            Self::LocalApicOverride(e) => {
                write!(f, "LAPIC_ADDR_OVR (address[{:#018x}])", e.address)
            }
            Self::LocalSapic(e) => write!(
                f,
                "LSAPIC (acpi_id[{:#04x}] lsapic_id[{:#04x}] lsapic_eid[{:#04x}] {})",
                e.acpi_processor_id,
                e.id,
                e.eid,
                enabled_str(e.flags)
            ),
            Self::LocalX2Apic(e) => write!(
                f,
                "X2APIC (apic_id[{:#010x}] uid[{:#010x}] {})",
                e.x2apic_id,
                e.uid,
                enabled_str(e.flags)
            ),
            Self::LocalX2ApicNmi(e) => write!(
                f,
                "X2APIC_NMI (uid[{:#010x}] {:?} {:?} lint[{:#x}])",
                e.uid,
                e.flags.polarity(),
                e.flags.trigger_mode(),
                e.lint
            ),
            Self::Unknown { entry_type, length } => {
                write!(f, "type[{entry_type:#04x}] length[{length}]")
            }
        }
    }
}

/// Parsed MADT: a validated header view over the firmware bytes.
#[derive(Debug, Clone, Copy)]
pub struct MadtTable<'a> {
    header: SdtHeader<'a>,
    /// Table bytes, trimmed to the header's declared length.
    data: &'a [u8],
    local_apic_address: u32,
    flags: u32,
}

impl<'a> MadtTable<'a> {
    /// Offset of the first entry: SDT header + LAPIC address + flags.
    pub const HEADER_SIZE: usize = SdtHeader::SIZE + 8;

    /// Validates the header of the MADT in `data`.
    ///
    /// `data` may extend past the table; only the declared length is used.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::InvalidSignature`] if the table is not an MADT
    /// and [`AcpiError::TruncatedData`] if the declared length is shorter
    /// than the fixed fields or longer than `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self, AcpiError> {
        let header = SdtHeader::parse(data)?;
        if &header.signature() != MADT_SIGNATURE {
            return Err(AcpiError::InvalidSignature);
        }

        let length = usize::try_from(header.length()).map_err(|_| AcpiError::TruncatedData)?;
        if length < Self::HEADER_SIZE {
            return Err(AcpiError::TruncatedData);
        }
        let data = data.get(..length).ok_or(AcpiError::TruncatedData)?;

        Ok(Self {
            header,
            data,
            local_apic_address: le_u32(data, SdtHeader::SIZE),
            flags: le_u32(data, SdtHeader::SIZE + 4),
        })
    }

    /// The SDT header view.
    #[must_use]
    pub fn header(&self) -> SdtHeader<'a> {
        self.header
    }

    /// The whole table, header included.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The 32-bit local APIC physical address field, as declared.
    #[must_use]
    pub fn local_apic_address(&self) -> u32 {
        self.local_apic_address
    }

    /// The local APIC address if firmware supplied one (non-zero).
    #[must_use]
    pub fn lapic_address_override(&self) -> Option<u32> {
        (self.local_apic_address != 0).then_some(self.local_apic_address)
    }

    /// MADT flags word.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Whether dual legacy 8259 PICs are also installed.
    #[must_use]
    pub fn pcat_compat(&self) -> bool {
        self.flags & 1 != 0
    }

    /// Whether the table bytes sum to zero.
    #[must_use]
    pub fn checksum_valid(&self) -> bool {
        validate_checksum(self.data)
    }

    /// Iterates the decoded entries in table order.
    #[must_use]
    pub fn entries(&self) -> MadtEntryIter<'a> {
        MadtEntryIter {
            inner: SubtableIter::new(self.data, Self::HEADER_SIZE),
            failed: false,
        }
    }

    /// Runs `handler` over every entry of `entry_type`.
    ///
    /// See [`subtable::walk_array`] for the counting and error rules.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] on the first inconsistent
    /// entry or handler failure.
    pub fn walk<C>(
        &self,
        entry_type: MadtEntryType,
        handler: SubtableHandler<C>,
        ctx: &mut C,
        max_entries: Option<usize>,
    ) -> Result<WalkSummary, AcpiError> {
        subtable::walk(
            self.data,
            Self::HEADER_SIZE,
            entry_type.id(),
            handler,
            ctx,
            max_entries,
        )
    }

    /// Runs several handlers over the entries in a single pass.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedEntry`] on the first inconsistent
    /// entry or handler failure.
    pub fn walk_array<C>(
        &self,
        procs: &mut [SubtableProc<C>],
        ctx: &mut C,
        max_entries: Option<usize>,
    ) -> Result<WalkSummary, AcpiError> {
        subtable::walk_array(self.data, Self::HEADER_SIZE, procs, ctx, max_entries)
    }
}

/// Iterator over decoded MADT entries.
///
/// Stops after yielding the first error.
pub struct MadtEntryIter<'a> {
    inner: SubtableIter<'a>,
    failed: bool,
}

impl Iterator for MadtEntryIter<'_> {
    type Item = Result<MadtEntry, AcpiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?.and_then(|entry| MadtEntry::decode(&entry));
        self.failed = item.is_err();
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn madt(lapic_addr: u32, entries: &[&[u8]]) -> Vec<u8> {
        let mut t = vec![0u8; MadtTable::HEADER_SIZE];
        t[0..4].copy_from_slice(MADT_SIGNATURE);
        t[36..40].copy_from_slice(&lapic_addr.to_le_bytes());
        t[40..44].copy_from_slice(&1u32.to_le_bytes());
        for e in entries {
            t.extend_from_slice(e);
        }
        let len = u32::try_from(t.len()).unwrap();
        t[4..8].copy_from_slice(&len.to_le_bytes());
        let sum = t.iter().fold(0u8, |s, &b| s.wrapping_add(b));
        t[9] = 0u8.wrapping_sub(sum);
        t
    }

    const LAPIC0: [u8; 8] = [0, 8, 0x01, 0x02, 1, 0, 0, 0];
    const IOAPIC: [u8; 12] = [1, 12, 3, 0, 0x00, 0x00, 0xC0, 0xFE, 0x10, 0, 0, 0];
    const ISO: [u8; 10] = [2, 10, 0, 0, 2, 0, 0, 0, 0x0F, 0x00];
    const NMI_SRC: [u8; 8] = [3, 8, 0x05, 0x00, 9, 0, 0, 0];
    const LAPIC_NMI: [u8; 6] = [4, 6, 0xFF, 0x05, 0x00, 1];
    const LAPIC_OVR: [u8; 12] = [5, 12, 0, 0, 0x00, 0x00, 0xE0, 0xFE, 0x01, 0, 0, 0];
    const SAPIC: [u8; 16] = [7, 16, 4, 0x12, 0x34, 0, 0, 0, 1, 0, 0, 0, 42, 0, 0, 0];
    const X2APIC: [u8; 16] = [9, 16, 0, 0, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0];
    const X2APIC_NMI: [u8; 12] = [10, 12, 0x0D, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 1, 0, 0, 0];

    #[test]
    fn parse_header_fields() {
        let t = madt(0xFEE0_0000, &[]);
        let m = MadtTable::parse(&t).unwrap();
        assert_eq!(m.local_apic_address(), 0xFEE0_0000);
        assert_eq!(m.lapic_address_override(), Some(0xFEE0_0000));
        assert!(m.pcat_compat());
        assert!(m.checksum_valid());
        assert_eq!(m.data().len(), MadtTable::HEADER_SIZE);
        assert_eq!(m.entries().count(), 0);
    }

    #[test]
    fn zero_address_is_no_override() {
        let t = madt(0, &[]);
        assert_eq!(MadtTable::parse(&t).unwrap().lapic_address_override(), None);
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut t = madt(0, &[]);
        t[0..4].copy_from_slice(b"HPET");
        assert_eq!(MadtTable::parse(&t).unwrap_err(), AcpiError::InvalidSignature);
    }

    #[test]
    fn rejects_bad_lengths() {
        let mut t = madt(0, &[&LAPIC0]);
        assert_eq!(
            MadtTable::parse(&t[..t.len() - 1]).unwrap_err(),
            AcpiError::TruncatedData
        );
        t[4..8].copy_from_slice(&40u32.to_le_bytes());
        assert_eq!(MadtTable::parse(&t).unwrap_err(), AcpiError::TruncatedData);
    }

    #[test]
    fn declared_length_bounds_the_entries() {
        let mut t = madt(0, &[&LAPIC0]);
        t.extend_from_slice(&LAPIC0);
        let m = MadtTable::parse(&t).unwrap();
        assert_eq!(m.entries().count(), 1);
    }

    #[test]
    fn decodes_every_known_entry() {
        let t = madt(
            0,
            &[
                &LAPIC0, &IOAPIC, &ISO, &NMI_SRC, &LAPIC_NMI, &LAPIC_OVR, &SAPIC, &X2APIC,
                &X2APIC_NMI,
            ],
        );
        let m = MadtTable::parse(&t).unwrap();
        let entries: Vec<_> = m.entries().map(Result::unwrap).collect();

        assert_eq!(
            entries[0],
            MadtEntry::LocalApic(LocalApic {
                acpi_processor_id: 1,
                apic_id: 2,
                flags: LocalApicFlags::ENABLED,
            })
        );
        assert_eq!(
            entries[1],
            MadtEntry::IoApic(IoApic {
                io_apic_id: 3,
                address: 0xFEC0_0000,
                gsi_base: 16,
            })
        );
        let MadtEntry::InterruptOverride(iso) = entries[2] else {
            panic!("expected an interrupt override");
        };
        assert_eq!((iso.source_irq, iso.gsi), (0, 2));
        assert_eq!(iso.flags.polarity(), Polarity::ActiveLow);
        assert_eq!(iso.flags.trigger_mode(), TriggerMode::Level);

        let MadtEntry::NmiSource(nmi) = entries[3] else {
            panic!("expected an NMI source");
        };
        assert_eq!(nmi.gsi, 9);
        assert_eq!(nmi.flags.polarity(), Polarity::ActiveHigh);
        assert_eq!(nmi.flags.trigger_mode(), TriggerMode::Edge);

        assert_eq!(
            entries[4],
            MadtEntry::LocalApicNmi(LocalApicNmi {
                acpi_processor_id: 0xFF,
                flags: MpsIntiFlags::from_bits_retain(5),
                lint: 1,
            })
        );
        assert_eq!(
            entries[5],
            MadtEntry::LocalApicOverride(LocalApicOverride {
                address: 0x1_FEE0_0000,
            })
        );
        let MadtEntry::LocalSapic(sapic) = entries[6] else {
            panic!("expected a SAPIC");
        };
        assert_eq!(sapic.apic_id(), 0x1234);
        assert_eq!(sapic.uid, 42);
        assert!(sapic.is_enabled());

        let MadtEntry::LocalX2Apic(x2) = entries[7] else {
            panic!("expected an x2APIC");
        };
        assert_eq!(x2.x2apic_id, 0x100);
        assert_eq!(x2.uid, 7);
        assert!(!x2.is_enabled());

        let MadtEntry::LocalX2ApicNmi(x2nmi) = entries[8] else {
            panic!("expected an x2APIC NMI");
        };
        assert_eq!((x2nmi.uid, x2nmi.lint), (u32::MAX, 1));
    }

    #[test]
    fn unknown_types_pass_through() {
        let t = madt(0, &[&[0x7F, 4, 0, 0], &[6, 16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]]);
        let m = MadtTable::parse(&t).unwrap();
        let entries: Vec<_> = m.entries().map(Result::unwrap).collect();
        assert_eq!(
            entries,
            [
                MadtEntry::Unknown {
                    entry_type: 0x7F,
                    length: 4
                },
                MadtEntry::Unknown {
                    entry_type: 6,
                    length: 16
                },
            ]
        );
    }

    #[test]
    fn short_entry_ends_iteration_with_error() {
        let t = madt(0, &[&[0, 6, 0, 0, 1, 0], &LAPIC0]);
        let m = MadtTable::parse(&t).unwrap();
        let results: Vec<_> = m.entries().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0],
            Err(AcpiError::MalformedEntry {
                entry_type: 0,
                offset: MadtTable::HEADER_SIZE
            })
        );
    }

    #[test]
    fn entry_type_ids_round_trip() {
        for raw in 0..=u8::MAX {
            assert_eq!(MadtEntryType::from_raw(raw).id(), raw);
        }
        assert_eq!(MadtEntryType::from_raw(9), MadtEntryType::LocalX2Apic);
    }

    #[test]
    fn display_matches_firmware_dump_style() {
        let t = madt(0, &[&LAPIC0]);
        let m = MadtTable::parse(&t).unwrap();
        let entry = m.entries().next().unwrap().unwrap();
        assert_eq!(
            format!("{entry}"),
            "LAPIC (acpi_id[0x01] lapic_id[0x02] enabled)"
        );
    }
}
