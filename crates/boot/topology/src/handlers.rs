//! Per-type MADT entry handlers.
//!
//! Every handler has the [`SubtableHandler`](lodestone_acpi::subtable::SubtableHandler)
//! shape so the walker can dispatch to it. A handler decodes its entry
//! (which runs the bounds check before any field read), dumps it at debug
//! level, applies the acceptance rules for its kind and hands accepted
//! entries to the [`CpuRegistry`]. The return value tells the walker
//! whether the entry counts toward the walk's total.

use lodestone_acpi::madt::{
    InterruptOverride, IoApic, LocalApic, LocalApicNmi, LocalApicOverride, LocalSapic,
    LocalX2Apic, LocalX2ApicNmi, MadtEntry, NmiSource,
};
use lodestone_acpi::{AcpiError, Subtable, Visit};

use crate::registry::{ApicKind, CpuRegistry, IoApicDescriptor, ProcessorDescriptor};
use crate::state::TopologyState;

/// The `LINTn` pin NMIs are conventionally wired to.
const NMI_LINT: u8 = 1;

/// Walk context shared by every handler of one discovery run.
pub struct MadtContext<'s, R: CpuRegistry> {
    state: &'s mut TopologyState,
    registry: &'s mut R,
    x2apic_usable: bool,
}

impl<'s, R: CpuRegistry> MadtContext<'s, R> {
    /// Creates a context that records into `state` and forwards accepted
    /// entries to `registry`.
    ///
    /// `x2apic_usable` is the combined build and CPU decision on whether
    /// x2APIC processor entries are honored.
    pub fn new(state: &'s mut TopologyState, registry: &'s mut R, x2apic_usable: bool) -> Self {
        Self {
            state,
            registry,
            x2apic_usable,
        }
    }

    fn register_processor(&mut self, cpu: ProcessorDescriptor) {
        if !cpu.enabled {
            self.state.note_disabled_cpu();
        }
        self.registry.register_processor(cpu);
    }
}

fn dump(entry: MadtEntry) {
    lodestone_core::kdebug!("ACPI: {entry}");
}

/// Local SAPIC (type 7).
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_sapic<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let sapic = LocalSapic::decode(entry)?;
    dump(MadtEntry::LocalSapic(sapic));

    ctx.register_processor(ProcessorDescriptor {
        apic_id: sapic.apic_id(),
        acpi_id: u32::from(sapic.acpi_processor_id),
        enabled: sapic.is_enabled(),
        kind: ApicKind::Sapic,
    });
    Ok(Visit::Counted)
}

/// Processor local APIC (type 0).
///
/// Entries carrying the `0xFF` id are skipped; disabled processors are
/// still registered.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_lapic<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let lapic = LocalApic::decode(entry)?;
    dump(MadtEntry::LocalApic(lapic));

    if lapic.apic_id == LocalApic::INVALID_ID {
        ctx.state.diagnostics_mut().invalid_lapic_ids += 1;
        return Ok(Visit::Skipped);
    }

    ctx.register_processor(ProcessorDescriptor {
        apic_id: u32::from(lapic.apic_id),
        acpi_id: u32::from(lapic.acpi_processor_id),
        enabled: lapic.is_enabled(),
        kind: ApicKind::XApic,
    });
    Ok(Visit::Counted)
}

/// Processor local x2APIC (type 9).
///
/// Skipped with a warning when x2APIC is unusable, or when an enabled
/// entry carries the all-ones id.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_x2apic<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let x2apic = LocalX2Apic::decode(entry)?;
    dump(MadtEntry::LocalX2Apic(x2apic));

    let invalid = x2apic.is_enabled() && x2apic.x2apic_id == LocalX2Apic::INVALID_ID;
    if !ctx.x2apic_usable || invalid {
        lodestone_core::kwarn!("ACPI: x2apic entry ignored (apic_id {:#x})", x2apic.x2apic_id);
        ctx.state.diagnostics_mut().ignored_x2apic += 1;
        return Ok(Visit::Skipped);
    }

    ctx.register_processor(ProcessorDescriptor {
        apic_id: x2apic.x2apic_id,
        acpi_id: x2apic.uid,
        enabled: x2apic.is_enabled(),
        kind: ApicKind::X2Apic,
    });
    Ok(Visit::Counted)
}

fn check_nmi_lint<R: CpuRegistry>(ctx: &mut MadtContext<'_, R>, lint: u8) {
    if lint != NMI_LINT {
        lodestone_core::kwarn!("ACPI: NMI not connected to LINT 1!");
        ctx.state.diagnostics_mut().unusual_nmi_lint += 1;
    }
}

/// Local APIC NMI (type 4). Any pin other than `LINT1` only draws a
/// warning.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_lapic_nmi<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let nmi = LocalApicNmi::decode(entry)?;
    dump(MadtEntry::LocalApicNmi(nmi));
    check_nmi_lint(ctx, nmi.lint);
    Ok(Visit::Counted)
}

/// Local x2APIC NMI (type 10). Same wiring rule as [`parse_lapic_nmi`].
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_x2apic_nmi<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let nmi = LocalX2ApicNmi::decode(entry)?;
    dump(MadtEntry::LocalX2ApicNmi(nmi));
    check_nmi_lint(ctx, nmi.lint);
    Ok(Visit::Counted)
}

/// I/O APIC (type 1).
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_ioapic<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let ioapic = IoApic::decode(entry)?;
    dump(MadtEntry::IoApic(ioapic));

    ctx.registry.register_io_apic(IoApicDescriptor {
        id: ioapic.io_apic_id,
        address: u64::from(ioapic.address),
        gsi_base: ioapic.gsi_base,
    });
    Ok(Visit::Counted)
}

/// Interrupt source override (type 2).
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_interrupt_override<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let ovr = InterruptOverride::decode(entry)?;
    dump(MadtEntry::InterruptOverride(ovr));
    ctx.registry.register_interrupt_override(ovr);
    Ok(Visit::Counted)
}

/// NMI source (type 3). Decoded and counted only.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_nmi_source<R: CpuRegistry>(
    _ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let nmi = NmiSource::decode(entry)?;
    dump(MadtEntry::NmiSource(nmi));
    Ok(Visit::Counted)
}

/// Local APIC address override (type 5). Replaces the LAPIC base.
///
/// # Errors
///
/// Returns [`AcpiError::MalformedEntry`] if the entry fails the bounds check.
pub fn parse_lapic_addr_override<R: CpuRegistry>(
    ctx: &mut MadtContext<'_, R>,
    entry: &Subtable<'_>,
) -> Result<Visit, AcpiError> {
    let ovr = LocalApicOverride::decode(entry)?;
    dump(MadtEntry::LocalApicOverride(ovr));

    ctx.state.set_lapic_base(ovr.address);
    lodestone_core::kinfo!("ACPI: Local APIC address override {:#x}", ovr.address);
    Ok(Visit::Counted)
}
