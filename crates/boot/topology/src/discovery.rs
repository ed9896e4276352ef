//! MADT discovery orchestration.
//!
//! [`MadtDiscovery`] sequences the walks over the MADT:
//!
//! ```text
//! Unstarted -> HeaderParsed -> ApicEntriesParsed -> IoApicEntriesParsed -> Done(mode)
//!     |
//!     `-> Aborted(reason)
//! ```
//!
//! Only an unusable header aborts. A walk that finds no entry of its
//! category, or runs into a damaged entry, records the error, keeps what
//! it accepted so far and moves on. [`MadtDiscovery::finish`] consumes the
//! discovery and publishes the immutable [`Topology`].

use lodestone_acpi::madt::{MADT_SIGNATURE, MadtEntryType, MadtTable};
use lodestone_acpi::subtable::SubtableHandler;
use lodestone_acpi::{AcpiError, SubtableProc, TableLocator, WalkSummary};
use lodestone_core::cpu::{CpuFeatureQuery, CpuFeatures};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::handlers::{self, MadtContext};
use crate::registry::CpuRegistry;
use crate::state::{ApicScheme, TopologyState};

/// How the rest of the boot should configure SMP and interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmpMode {
    /// Processors and I/O APICs both come from the MADT.
    FullAcpi,
    /// Processors come from the MADT; interrupt routing does not.
    ProcessorOnly,
    /// The MADT contributed nothing usable.
    Unusable,
}

impl SmpMode {
    fn from_state(state: &TopologyState) -> Self {
        match (state.lapic_found(), state.ioapic_found()) {
            (true, true) => Self::FullAcpi,
            (true, false) => Self::ProcessorOnly,
            (false, _) => Self::Unusable,
        }
    }
}

/// Where a discovery run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has been read.
    Unstarted,
    /// The header validated; the LAPIC base is final unless a type 5 entry
    /// overrides it.
    HeaderParsed,
    /// The processor and local NMI entries have been walked.
    ApicEntriesParsed,
    /// The I/O APIC, override and NMI source entries have been walked.
    IoApicEntriesParsed,
    /// Discovery completed in the given mode.
    Done(SmpMode),
    /// The header step failed and discovery stopped for good.
    Aborted(DiscoveryError),
}

/// Processor entries accepted by the processor walk.
struct ApicTally {
    scheme: ApicScheme,
    count: usize,
    x2count: usize,
    capped: bool,
}

/// Entries accepted by the I/O APIC phase, filled in walk by walk.
#[derive(Default)]
struct RoutingTally {
    ioapics: WalkSummary,
    overrides: WalkSummary,
    nmi_sources: WalkSummary,
}

/// One discovery run over one MADT.
pub struct MadtDiscovery<'t, 'r, Q, R> {
    table: Option<&'t [u8]>,
    madt: Option<MadtTable<'t>>,
    cpu: Q,
    registry: &'r mut R,
    config: DiscoveryConfig,
    state: TopologyState,
    phase: Phase,
    apic_error: Option<DiscoveryError>,
    ioapic_error: Option<DiscoveryError>,
}

impl<'t, 'r, Q: CpuFeatureQuery, R: CpuRegistry> MadtDiscovery<'t, 'r, Q, R> {
    /// Prepares a run over `table`, the MADT bytes if the platform has one.
    pub fn new(
        table: Option<&'t [u8]>,
        cpu: Q,
        registry: &'r mut R,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            table,
            madt: None,
            cpu,
            registry,
            config,
            state: TopologyState::new(&config),
            phase: Phase::Unstarted,
            apic_error: None,
            ioapic_error: None,
        }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The state gathered so far.
    #[must_use]
    pub fn state(&self) -> &TopologyState {
        &self.state
    }

    /// Runs every step and publishes the result.
    #[must_use]
    pub fn run(mut self) -> Topology {
        if self.parse_header().is_err() {
            return self.finish();
        }
        // Both walks run even if the first fails; each keeps its own error.
        let processors = self.parse_apic_entries();
        let routing = self.parse_ioapic_entries();
        if let Err(err) = processors.and(routing) {
            lodestone_core::kdebug!("ACPI: MADT walk incomplete: {err}");
        }
        self.finish()
    }

    /// Returns `Ok(true)` if the run is exactly at `phase`.
    fn ready_for(&self, phase: Phase) -> Result<bool, DiscoveryError> {
        match self.phase {
            Phase::Aborted(err) => Err(err),
            current => Ok(current == phase),
        }
    }

    fn table(&self) -> Result<MadtTable<'t>, DiscoveryError> {
        self.madt.ok_or(DiscoveryError::NotFound)
    }

    fn x2apic_usable(&self) -> bool {
        self.config.x2apic && self.cpu.has(CpuFeatures::X2APIC)
    }

    /// Validates the MADT header and applies its LAPIC base.
    ///
    /// Does nothing unless the run is [`Phase::Unstarted`].
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::MissingCapability`] if the CPU has no local APIC,
    /// [`DiscoveryError::NotFound`] if there is no table, and
    /// [`DiscoveryError::Malformed`] if the header does not validate. All
    /// three abort the run.
    pub fn parse_header(&mut self) -> Result<(), DiscoveryError> {
        if !self.ready_for(Phase::Unstarted)? {
            return Ok(());
        }
        match self.read_header() {
            Ok(madt) => {
                self.madt = Some(madt);
                self.phase = Phase::HeaderParsed;
                Ok(())
            }
            Err(err) => {
                self.phase = Phase::Aborted(err);
                Err(err)
            }
        }
    }

    fn read_header(&mut self) -> Result<MadtTable<'t>, DiscoveryError> {
        if !self.cpu.has(CpuFeatures::APIC) {
            return Err(DiscoveryError::MissingCapability);
        }
        let data = self.table.ok_or(DiscoveryError::NotFound)?;
        let madt = MadtTable::parse(data)
            .inspect_err(|err| lodestone_core::kerr!("ACPI: Invalid MADT header: {err}"))?;

        if !madt.checksum_valid() {
            lodestone_core::kwarn!("ACPI: MADT checksum mismatch");
            self.state.diagnostics_mut().bad_checksum = true;
        }
        if let Some(address) = madt.lapic_address_override() {
            self.state.set_lapic_base(u64::from(address));
            lodestone_core::kinfo!("ACPI: Local APIC address {:#010x}", address);
        }
        Ok(madt)
    }

    /// Walks the processor entries, then the local NMI entries.
    ///
    /// The LAPIC address override is applied first. SAPIC entries are tried
    /// next; only if there are none are the legacy and x2APIC entries
    /// walked, together in one pass. Processors accepted before a damaged
    /// entry stay counted.
    ///
    /// Does nothing unless the run is at [`Phase::HeaderParsed`].
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::NotFound`] if no usable processor entry exists and
    /// [`DiscoveryError::Malformed`] if an entry is damaged. Either way the
    /// error is kept for [`Topology::apic_error`] and the run continues.
    pub fn parse_apic_entries(&mut self) -> Result<(), DiscoveryError> {
        if !self.ready_for(Phase::HeaderParsed)? {
            return Ok(());
        }
        let result = self.table().and_then(|madt| self.walk_apic_entries(&madt));
        self.apic_error = result.err();
        self.phase = Phase::ApicEntriesParsed;
        result
    }

    fn walk_apic_entries(&mut self, madt: &MadtTable<'t>) -> Result<(), DiscoveryError> {
        let max = self.config.max_local_apics;
        let x2apic_usable = self.x2apic_usable();

        let (tally, walked) = {
            let mut ctx = MadtContext::new(&mut self.state, &mut *self.registry, x2apic_usable);
            madt.walk(
                MadtEntryType::LocalApicOverride,
                handlers::parse_lapic_addr_override::<R>,
                &mut ctx,
                None,
            )
            .inspect_err(|_| {
                lodestone_core::kerr!("ACPI: Error parsing LAPIC address override entry");
            })?;
            walk_processors(madt, &mut ctx, max)
        };

        // The registry already holds these, damaged entry or not.
        if tally.count + tally.x2count > 0 {
            self.state.register_apic_family(tally.scheme, tally.count, tally.x2count);
        }
        if tally.capped {
            self.note_capped("local APIC", max);
        }
        walked.inspect_err(|_| lodestone_core::kerr!("ACPI: Error parsing LAPIC entry"))?;
        if !self.state.lapic_found() {
            lodestone_core::kerr!("ACPI: No LAPIC entries present");
            return Err(DiscoveryError::NotFound);
        }

        let mut ctx = MadtContext::new(&mut self.state, &mut *self.registry, x2apic_usable);
        madt.walk(
            MadtEntryType::LocalX2ApicNmi,
            handlers::parse_x2apic_nmi::<R>,
            &mut ctx,
            None,
        )
        .and_then(|_| {
            madt.walk(
                MadtEntryType::LocalApicNmi,
                handlers::parse_lapic_nmi::<R>,
                &mut ctx,
                None,
            )
        })
        .inspect_err(|_| lodestone_core::kerr!("ACPI: Error parsing LAPIC NMI entry"))?;
        Ok(())
    }

    /// Walks the I/O APIC entries, then the interrupt source overrides and
    /// NMI sources.
    ///
    /// Runs whether or not processors were found. Entries accepted before a
    /// damaged entry stay counted. Does nothing unless the run is at
    /// [`Phase::ApicEntriesParsed`].
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::NotFound`] if there is no I/O APIC entry and
    /// [`DiscoveryError::Malformed`] if an entry is damaged. Either way the
    /// error is kept for [`Topology::ioapic_error`] and the run continues.
    pub fn parse_ioapic_entries(&mut self) -> Result<(), DiscoveryError> {
        if !self.ready_for(Phase::ApicEntriesParsed)? {
            return Ok(());
        }
        let result = self.table().and_then(|madt| self.walk_ioapic_entries(&madt));
        self.ioapic_error = result.err();
        self.phase = Phase::IoApicEntriesParsed;
        result
    }

    fn walk_ioapic_entries(&mut self, madt: &MadtTable<'t>) -> Result<(), DiscoveryError> {
        let x2apic_usable = self.x2apic_usable();
        let mut tally = RoutingTally::default();

        let walked = {
            let mut ctx = MadtContext::new(&mut self.state, &mut *self.registry, x2apic_usable);
            walk_routing(madt, &mut ctx, &self.config, &mut tally)
        };

        let limits = [
            ("I/O APIC", tally.ioapics, self.config.max_io_apics),
            ("interrupt override", tally.overrides, self.config.max_irq_lines),
            ("NMI source", tally.nmi_sources, self.config.max_irq_lines),
        ];
        for (what, summary, max) in limits {
            if summary.capped {
                self.note_capped(what, max);
            }
        }
        self.state.register_ioapic_family(tally.ioapics.count);
        self.state.register_interrupt_overrides(tally.overrides.count);
        self.state.register_nmi_sources(tally.nmi_sources.count);
        walked
    }

    fn note_capped(&mut self, what: &str, max: usize) {
        lodestone_core::kwarn!("ACPI: {what} limit of {max} reached, further entries ignored");
        self.state.diagnostics_mut().capped_walks += 1;
    }

    /// Ends the run and publishes its result.
    ///
    /// The mode is derived from what was found; a run that is not complete
    /// yet resolves to whatever the steps so far produced.
    #[must_use]
    pub fn finish(self) -> Topology {
        let phase = match self.phase {
            Phase::Aborted(DiscoveryError::Malformed) => {
                lodestone_core::kerr!("ACPI: Invalid BIOS MADT, disabling ACPI");
                self.phase
            }
            Phase::Aborted(err) => {
                lodestone_core::kwarn!("ACPI: MADT discovery skipped: {err}");
                self.phase
            }
            _ => {
                let mode = SmpMode::from_state(&self.state);
                match mode {
                    SmpMode::FullAcpi => lodestone_core::kinfo!(
                        "ACPI: Using ACPI (MADT) for SMP configuration information"
                    ),
                    SmpMode::ProcessorOnly => lodestone_core::kinfo!(
                        "ACPI: Using ACPI for processor (LAPIC) configuration information"
                    ),
                    SmpMode::Unusable => lodestone_core::kwarn!(
                        "ACPI: MADT unusable, falling back to legacy configuration"
                    ),
                }
                Phase::Done(mode)
            }
        };

        Topology {
            state: self.state,
            phase,
            apic_error: self.apic_error,
            ioapic_error: self.ioapic_error,
        }
    }
}

/// Runs one bounded single-type walk and leaves what it accepted in
/// `summary`, also when it fails part way.
fn walk_counted<C>(
    madt: &MadtTable<'_>,
    entry_type: MadtEntryType,
    handler: SubtableHandler<C>,
    ctx: &mut C,
    max: usize,
    summary: &mut WalkSummary,
) -> Result<(), AcpiError> {
    let mut procs = [SubtableProc::new(entry_type.id(), handler)];
    let walked = madt.walk_array(&mut procs, ctx, Some(max));
    *summary = match &walked {
        Ok(done) => *done,
        Err(_) => WalkSummary {
            count: procs[0].count,
            capped: false,
        },
    };
    walked.map(drop)
}

/// Tries the SAPIC entries, then falls back to one pass over the legacy
/// and x2APIC entries when there are none.
fn walk_processors<R: CpuRegistry>(
    madt: &MadtTable<'_>,
    ctx: &mut MadtContext<'_, R>,
    max: usize,
) -> (ApicTally, Result<(), AcpiError>) {
    let mut sapic = WalkSummary::default();
    let walked = walk_counted(
        madt,
        MadtEntryType::LocalSapic,
        handlers::parse_sapic::<R>,
        ctx,
        max,
        &mut sapic,
    );
    if sapic.count > 0 || walked.is_err() {
        let tally = ApicTally {
            scheme: ApicScheme::Sapic,
            count: sapic.count,
            x2count: 0,
            capped: sapic.capped,
        };
        return (tally, walked);
    }

    let mut procs = [
        SubtableProc::new(MadtEntryType::LocalApic.id(), handlers::parse_lapic::<R>),
        SubtableProc::new(MadtEntryType::LocalX2Apic.id(), handlers::parse_x2apic::<R>),
    ];
    let walked = madt.walk_array(&mut procs, ctx, Some(max));
    let tally = ApicTally {
        scheme: ApicScheme::Legacy,
        count: procs[0].count,
        x2count: procs[1].count,
        capped: walked.as_ref().is_ok_and(|done| done.capped),
    };
    (tally, walked.map(drop))
}

/// Walks the I/O APICs, then the interrupt source overrides and NMI
/// sources, which are only read when an I/O APIC exists.
fn walk_routing<R: CpuRegistry>(
    madt: &MadtTable<'_>,
    ctx: &mut MadtContext<'_, R>,
    config: &DiscoveryConfig,
    tally: &mut RoutingTally,
) -> Result<(), DiscoveryError> {
    walk_counted(
        madt,
        MadtEntryType::IoApic,
        handlers::parse_ioapic::<R>,
        ctx,
        config.max_io_apics,
        &mut tally.ioapics,
    )
    .inspect_err(|_| lodestone_core::kerr!("ACPI: Error parsing IOAPIC entry"))?;
    if tally.ioapics.count == 0 {
        lodestone_core::kerr!("ACPI: No IOAPIC entries present");
        return Err(DiscoveryError::NotFound);
    }

    walk_counted(
        madt,
        MadtEntryType::InterruptOverride,
        handlers::parse_interrupt_override::<R>,
        ctx,
        config.max_irq_lines,
        &mut tally.overrides,
    )
    .inspect_err(|_| {
        lodestone_core::kerr!("ACPI: Error parsing interrupt source overrides entry");
    })?;

    walk_counted(
        madt,
        MadtEntryType::NmiSource,
        handlers::parse_nmi_source::<R>,
        ctx,
        config.max_irq_lines,
        &mut tally.nmi_sources,
    )
    .inspect_err(|_| lodestone_core::kerr!("ACPI: Error parsing NMI SRC entry"))?;
    Ok(())
}

/// The published result of discovery. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    state: TopologyState,
    phase: Phase,
    apic_error: Option<DiscoveryError>,
    ioapic_error: Option<DiscoveryError>,
}

impl Topology {
    /// What was found.
    #[must_use]
    pub fn state(&self) -> &TopologyState {
        &self.state
    }

    /// The terminal phase: [`Phase::Done`] or [`Phase::Aborted`].
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The SMP configuration mode. An aborted run is [`SmpMode::Unusable`].
    #[must_use]
    pub fn mode(&self) -> SmpMode {
        match self.phase {
            Phase::Done(mode) => mode,
            _ => SmpMode::Unusable,
        }
    }

    /// Outcome of the processor walk, if it did not succeed.
    #[must_use]
    pub fn apic_error(&self) -> Option<DiscoveryError> {
        self.apic_error
    }

    /// Outcome of the I/O APIC walk, if it did not succeed.
    #[must_use]
    pub fn ioapic_error(&self) -> Option<DiscoveryError> {
        self.ioapic_error
    }

    /// The first thing that went wrong: the abort reason, else the first
    /// failed walk.
    #[must_use]
    pub fn error(&self) -> Option<DiscoveryError> {
        match self.phase {
            Phase::Aborted(err) => Some(err),
            _ => self.apic_error.or(self.ioapic_error),
        }
    }
}

/// Discovers the interrupt-controller topology from the platform's MADT.
///
/// Processors, I/O APICs and interrupt overrides are reported to `registry`
/// as they are accepted. Never fails: problems show up in the returned
/// [`Topology`].
pub fn discover<L, Q, R>(
    locator: &L,
    cpu: Q,
    registry: &mut R,
    config: DiscoveryConfig,
) -> Topology
where
    L: TableLocator + ?Sized,
    Q: CpuFeatureQuery,
    R: CpuRegistry,
{
    let table = locator.locate_table(MADT_SIGNATURE);
    MadtDiscovery::new(table, cpu, registry, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn madt(entries: &[&[u8]]) -> Vec<u8> {
        let mut t = vec![0u8; MadtTable::HEADER_SIZE];
        t[0..4].copy_from_slice(MADT_SIGNATURE);
        for e in entries {
            t.extend_from_slice(e);
        }
        let len = u32::try_from(t.len()).unwrap();
        t[4..8].copy_from_slice(&len.to_le_bytes());
        let sum = t.iter().fold(0u8, |s, &b| s.wrapping_add(b));
        t[9] = 0u8.wrapping_sub(sum);
        t
    }

    #[derive(Default)]
    struct Cpus(usize);

    impl CpuRegistry for Cpus {
        fn register_processor(&mut self, _cpu: crate::registry::ProcessorDescriptor) {
            self.0 += 1;
        }
    }

    const LAPIC: [u8; 8] = [0, 8, 0, 0, 1, 0, 0, 0];
    const IOAPIC: [u8; 12] = [1, 12, 0, 0, 0x00, 0x00, 0xC0, 0xFE, 0, 0, 0, 0];

    fn cpu() -> CpuFeatures {
        CpuFeatures::APIC | CpuFeatures::X2APIC
    }

    #[test]
    fn steps_advance_the_phase() {
        let t = madt(&[&LAPIC, &IOAPIC]);
        let mut reg = Cpus::default();
        let mut d = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default());
        assert_eq!(d.phase(), Phase::Unstarted);
        d.parse_header().unwrap();
        assert_eq!(d.phase(), Phase::HeaderParsed);
        d.parse_apic_entries().unwrap();
        assert_eq!(d.phase(), Phase::ApicEntriesParsed);
        assert_eq!(d.state().local_apic_count(), 1);
        d.parse_ioapic_entries().unwrap();
        assert_eq!(d.phase(), Phase::IoApicEntriesParsed);
        let topo = d.finish();
        assert_eq!(topo.phase(), Phase::Done(SmpMode::FullAcpi));
        assert_eq!(topo.error(), None);
        assert_eq!(reg.0, 1);
    }

    #[test]
    fn out_of_order_steps_do_nothing() {
        let t = madt(&[&LAPIC, &IOAPIC]);
        let mut reg = Cpus::default();
        let mut d = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default());
        assert_eq!(d.parse_ioapic_entries(), Ok(()));
        assert_eq!(d.parse_apic_entries(), Ok(()));
        assert_eq!(d.phase(), Phase::Unstarted);
        d.parse_header().unwrap();
        assert_eq!(d.parse_header(), Ok(()));
        assert_eq!(d.phase(), Phase::HeaderParsed);
    }

    #[test]
    fn abort_is_sticky() {
        let mut reg = Cpus::default();
        let mut d = MadtDiscovery::new(None, cpu(), &mut reg, DiscoveryConfig::default());
        assert_eq!(d.parse_header(), Err(DiscoveryError::NotFound));
        assert_eq!(d.parse_apic_entries(), Err(DiscoveryError::NotFound));
        assert_eq!(d.phase(), Phase::Aborted(DiscoveryError::NotFound));
        let topo = d.finish();
        assert_eq!(topo.mode(), SmpMode::Unusable);
        assert_eq!(topo.error(), Some(DiscoveryError::NotFound));
    }

    #[test]
    fn capability_checked_before_table() {
        let mut reg = Cpus::default();
        let config = DiscoveryConfig::default();
        let topo = MadtDiscovery::new(None, CpuFeatures::empty(), &mut reg, config).run();
        assert_eq!(topo.phase(), Phase::Aborted(DiscoveryError::MissingCapability));
    }

    #[test]
    fn bad_signature_is_malformed() {
        let mut t = madt(&[&LAPIC]);
        t[0..4].copy_from_slice(b"FACP");
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default()).run();
        assert_eq!(topo.phase(), Phase::Aborted(DiscoveryError::Malformed));
    }

    #[test]
    fn checksum_mismatch_only_warns() {
        let mut t = madt(&[&LAPIC, &IOAPIC]);
        t[9] = t[9].wrapping_add(1);
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default()).run();
        assert_eq!(topo.mode(), SmpMode::FullAcpi);
        assert!(topo.state().diagnostics().bad_checksum);
    }

    #[test]
    fn missing_ioapic_is_processor_only() {
        let t = madt(&[&LAPIC]);
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default()).run();
        assert_eq!(topo.mode(), SmpMode::ProcessorOnly);
        assert_eq!(topo.apic_error(), None);
        assert_eq!(topo.ioapic_error(), Some(DiscoveryError::NotFound));
    }

    #[test]
    fn missing_lapic_still_walks_ioapics() {
        let t = madt(&[&IOAPIC]);
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default()).run();
        assert_eq!(topo.mode(), SmpMode::Unusable);
        assert_eq!(topo.apic_error(), Some(DiscoveryError::NotFound));
        assert_eq!(topo.ioapic_error(), None);
        assert!(topo.state().ioapic_found());
        assert_eq!(topo.state().ioapic_count(), 1);
    }

    #[test]
    fn damaged_entry_is_recorded_and_the_run_continues() {
        let short_ioapic: [u8; 6] = [1, 6, 0, 0, 0, 0];
        let t = madt(&[&LAPIC, &short_ioapic]);
        let mut reg = Cpus::default();
        let mut d = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default());
        d.parse_header().unwrap();
        d.parse_apic_entries().unwrap();
        assert_eq!(d.parse_ioapic_entries(), Err(DiscoveryError::Malformed));
        assert_eq!(d.phase(), Phase::IoApicEntriesParsed);
        let topo = d.finish();
        assert_eq!(topo.phase(), Phase::Done(SmpMode::ProcessorOnly));
        assert_eq!(topo.ioapic_error(), Some(DiscoveryError::Malformed));
        assert_eq!(topo.error(), Some(DiscoveryError::Malformed));
    }

    #[test]
    fn processors_before_a_damaged_entry_stay_counted() {
        let short_lapic: [u8; 6] = [0, 6, 0, 0, 1, 0];
        let t = madt(&[&LAPIC, &short_lapic, &IOAPIC]);
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&t), cpu(), &mut reg, DiscoveryConfig::default()).run();
        assert_eq!(topo.apic_error(), Some(DiscoveryError::Malformed));
        assert_eq!(topo.state().local_apic_count(), 1);
        assert!(topo.state().lapic_found());
        assert_eq!(topo.mode(), SmpMode::FullAcpi);
        assert_eq!(reg.0, 1);
    }

    #[test]
    fn ceiling_warns_only_when_entries_are_dropped() {
        let config = DiscoveryConfig {
            max_local_apics: 1,
            ..DiscoveryConfig::default()
        };

        let exact = madt(&[&LAPIC, &IOAPIC]);
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&exact), cpu(), &mut reg, config).run();
        assert_eq!(topo.state().local_apic_count(), 1);
        assert_eq!(topo.state().diagnostics().capped_walks, 0);

        let over = madt(&[&LAPIC, &LAPIC, &IOAPIC]);
        let mut reg = Cpus::default();
        let topo = MadtDiscovery::new(Some(&over), cpu(), &mut reg, config).run();
        assert_eq!(topo.state().local_apic_count(), 1);
        assert_eq!(topo.state().diagnostics().capped_walks, 1);
        assert_eq!(reg.0, 1);
    }
}
