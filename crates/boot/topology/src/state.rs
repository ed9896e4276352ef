//! Topology aggregation.
//!
//! [`TopologyState`] is the single result of discovery. It is built by the
//! orchestrator during the single-threaded discovery phase and handed to
//! later boot stages by value, after which nothing mutates it: every
//! mutator is crate-private.

use crate::config::DiscoveryConfig;

/// Which processor enumeration path populated the local APIC count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApicScheme {
    /// Local SAPIC entries. Legacy and x2APIC entries were not counted.
    Sapic,
    /// Legacy local APIC and x2APIC entries.
    Legacy,
}

/// Diagnostic-only conditions seen while walking. They never change the
/// outcome of a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// x2APIC entries skipped (unsupported build or CPU, or invalid id).
    pub ignored_x2apic: usize,
    /// Legacy local APIC entries skipped for carrying the `0xFF` id.
    pub invalid_lapic_ids: usize,
    /// NMI entries wired to a pin other than `LINT1`.
    pub unusual_nmi_lint: usize,
    /// Bounded walks that reached their ceiling.
    pub capped_walks: usize,
    /// Whether the table checksum failed to verify.
    pub bad_checksum: bool,
}

/// Everything discovery learned about the interrupt-controller topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyState {
    max_local_apics: usize,
    max_io_apics: usize,
    max_irq_lines: usize,

    lapic_base: u64,
    lapic_found: bool,
    ioapic_found: bool,
    scheme: Option<ApicScheme>,
    local_apic_count: usize,
    x2apic_count: usize,
    disabled_cpu_count: usize,
    ioapic_count: usize,
    interrupt_override_count: usize,
    nmi_source_count: usize,
    diagnostics: Diagnostics,
}

impl TopologyState {
    /// An empty state with the limits and default LAPIC base of `config`.
    #[must_use]
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            max_local_apics: config.max_local_apics,
            max_io_apics: config.max_io_apics,
            max_irq_lines: config.max_irq_lines,
            lapic_base: config.lapic_default_base,
            lapic_found: false,
            ioapic_found: false,
            scheme: None,
            local_apic_count: 0,
            x2apic_count: 0,
            disabled_cpu_count: 0,
            ioapic_count: 0,
            interrupt_override_count: 0,
            nmi_source_count: 0,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Records the processor walk's result.
    ///
    /// `count` is the SAPIC count for [`ApicScheme::Sapic`] and the legacy
    /// LAPIC count for [`ApicScheme::Legacy`]; `x2count` only applies to
    /// the legacy scheme and is dropped otherwise. Both are clamped to the
    /// local APIC ceiling. Local APICs are found if either count is
    /// non-zero.
    pub(crate) fn register_apic_family(
        &mut self,
        scheme: ApicScheme,
        count: usize,
        x2count: usize,
    ) {
        let x2count = match scheme {
            ApicScheme::Sapic => 0,
            ApicScheme::Legacy => x2count,
        };
        self.scheme = Some(scheme);
        self.local_apic_count = count.min(self.max_local_apics);
        self.x2apic_count = x2count.min(self.max_local_apics);
        self.lapic_found = self.local_apic_count + self.x2apic_count > 0;
    }

    /// Records the I/O APIC walk's result.
    pub(crate) fn register_ioapic_family(&mut self, count: usize) {
        self.ioapic_count = count.min(self.max_io_apics);
        self.ioapic_found = self.ioapic_count > 0;
    }

    /// Records how many interrupt source overrides were registered.
    pub(crate) fn register_interrupt_overrides(&mut self, count: usize) {
        self.interrupt_override_count = count.min(self.max_irq_lines);
    }

    /// Records how many NMI sources were decoded.
    pub(crate) fn register_nmi_sources(&mut self, count: usize) {
        self.nmi_source_count = count.min(self.max_irq_lines);
    }

    pub(crate) fn note_disabled_cpu(&mut self) {
        self.disabled_cpu_count += 1;
    }

    pub(crate) fn set_lapic_base(&mut self, base: u64) {
        self.lapic_base = base;
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Physical base of the local APIC register window.
    #[must_use]
    pub fn lapic_base(&self) -> u64 {
        self.lapic_base
    }

    /// Whether usable processor entries were found.
    #[must_use]
    pub fn lapic_found(&self) -> bool {
        self.lapic_found
    }

    /// Whether at least one I/O APIC was found.
    #[must_use]
    pub fn ioapic_found(&self) -> bool {
        self.ioapic_found
    }

    /// The enumeration path that produced [`Self::local_apic_count`].
    #[must_use]
    pub fn scheme(&self) -> Option<ApicScheme> {
        self.scheme
    }

    /// Processors registered through SAPIC or legacy LAPIC entries,
    /// disabled ones included.
    #[must_use]
    pub fn local_apic_count(&self) -> usize {
        self.local_apic_count
    }

    /// Processors registered through x2APIC entries.
    #[must_use]
    pub fn x2apic_count(&self) -> usize {
        self.x2apic_count
    }

    /// Processors registered with the enabled flag clear.
    #[must_use]
    pub fn disabled_cpu_count(&self) -> usize {
        self.disabled_cpu_count
    }

    /// I/O APICs registered.
    #[must_use]
    pub fn ioapic_count(&self) -> usize {
        self.ioapic_count
    }

    /// Interrupt source overrides registered.
    #[must_use]
    pub fn interrupt_override_count(&self) -> usize {
        self.interrupt_override_count
    }

    /// NMI source entries decoded.
    #[must_use]
    pub fn nmi_source_count(&self) -> usize {
        self.nmi_source_count
    }

    /// Diagnostic-only observations.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}
