//! CPU capability queries.

bitflags::bitflags! {
    /// Interrupt-controller capabilities of the boot CPU.
    ///
    /// Bit positions follow `CPUID`: `APIC` is leaf 1 EDX bit 9 and
    /// `X2APIC` is leaf 1 ECX bit 21, packed here into a single word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFeatures: u32 {
        /// An on-chip local APIC is present.
        const APIC   = 1 << 0;
        /// The local APIC supports x2APIC (32-bit id) mode.
        const X2APIC = 1 << 1;
    }
}

impl CpuFeatures {
    /// Builds the feature set from raw `CPUID` leaf 1 `ECX`/`EDX` values.
    #[must_use]
    pub const fn from_cpuid_leaf1(ecx: u32, edx: u32) -> Self {
        let mut bits = 0;
        if edx & (1 << 9) != 0 {
            bits |= Self::APIC.bits();
        }
        if ecx & (1 << 21) != 0 {
            bits |= Self::X2APIC.bits();
        }
        Self::from_bits_truncate(bits)
    }
}

/// Answers "does the running CPU have this capability?".
///
/// Implemented by the architecture layer on top of `CPUID`. A plain
/// [`CpuFeatures`] value also implements it, which is how tests and
/// emulated platforms supply a fixed feature set.
pub trait CpuFeatureQuery {
    /// Returns `true` if every capability in `features` is present.
    fn has(&self, features: CpuFeatures) -> bool;
}

impl CpuFeatureQuery for CpuFeatures {
    fn has(&self, features: CpuFeatures) -> bool {
        self.contains(features)
    }
}

impl<T: CpuFeatureQuery + ?Sized> CpuFeatureQuery for &T {
    fn has(&self, features: CpuFeatures) -> bool {
        (**self).has(features)
    }
}
