//! Platform limits and switches for MADT discovery.

/// Default physical base of the local APIC register window.
pub const APIC_DEFAULT_PHYS_BASE: u64 = 0xFEE0_0000;

/// Most local APICs the CPU-enumeration layer can track.
pub const MAX_LOCAL_APIC: usize = 32768;

/// Most I/O APICs the interrupt controller driver can route through.
pub const MAX_IO_APICS: usize = 128;

/// Number of IRQ lines; bounds the override and NMI source entries.
pub const NR_IRQS: usize = 256;

/// Knobs for one discovery run.
///
/// The defaults describe an x86-64 platform; tests and unusual boards
/// tighten them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Ceiling for processor entries (SAPIC, or legacy + x2APIC together).
    pub max_local_apics: usize,
    /// Ceiling for I/O APIC entries.
    pub max_io_apics: usize,
    /// Ceiling for interrupt source override and NMI source entries.
    pub max_irq_lines: usize,
    /// Local APIC base used when the MADT does not override it.
    pub lapic_default_base: u64,
    /// Whether this build honors x2APIC processor entries at all. The CPU
    /// must still report x2APIC support for them to be registered.
    pub x2apic: bool,
}

impl DiscoveryConfig {
    /// The compiled-in defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_local_apics: MAX_LOCAL_APIC,
            max_io_apics: MAX_IO_APICS,
            max_irq_lines: NR_IRQS,
            lapic_default_base: APIC_DEFAULT_PHYS_BASE,
            x2apic: cfg!(feature = "x2apic"),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}
