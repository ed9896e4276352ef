//! Hand-off points to the CPU-enumeration and interrupt-routing layers.
//!
//! Discovery stops at "a valid candidate was observed". Turning physical
//! APIC ids into logical CPU numbers and building redirection tables is the
//! job of whoever implements [`CpuRegistry`].

use lodestone_acpi::madt::InterruptOverride;

/// Which addressing scheme a processor entry used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApicKind {
    /// Legacy 8-bit local APIC id.
    XApic,
    /// 32-bit x2APIC id.
    X2Apic,
    /// SAPIC cluster/eid pair.
    Sapic,
}

/// A processor observed in the MADT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorDescriptor {
    /// Physical APIC id. For SAPIC this is `(cluster << 8) | eid`.
    pub apic_id: u32,
    /// ACPI processor id (or UID for x2APIC).
    pub acpi_id: u32,
    /// Whether firmware marked the processor usable. Disabled processors
    /// are still reported so downstream tables can be sized for them.
    pub enabled: bool,
    /// Addressing scheme of the entry.
    pub kind: ApicKind,
}

/// An I/O APIC observed in the MADT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoApicDescriptor {
    /// I/O APIC id.
    pub id: u8,
    /// Physical address of its register window.
    pub address: u64,
    /// First Global System Interrupt it handles.
    pub gsi_base: u32,
}

/// Receives what discovery finds, one entry at a time.
pub trait CpuRegistry {
    /// A processor entry passed validation.
    fn register_processor(&mut self, cpu: ProcessorDescriptor);

    /// An I/O APIC entry passed validation.
    fn register_io_apic(&mut self, _io_apic: IoApicDescriptor) {}

    /// An interrupt source override passed validation.
    fn register_interrupt_override(&mut self, _ovr: InterruptOverride) {}
}

/// Discards everything; discovery then only produces counts.
impl CpuRegistry for () {
    fn register_processor(&mut self, _cpu: ProcessorDescriptor) {}
}
