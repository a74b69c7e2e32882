//! VMX capability enumeration and caching.
//!
//! Reads the processor's may0/may1 control bitmaps once on the boot processor, derives the
//! minimal control values every VMCS initializes from, and cross-checks every application
//! processor against the same snapshot.
use crate::error::deadloop;
use crate::vm_control::*;
use abyss::x86_64::msr::Msr;

/// One pin/proc/entry/exit control pair as reported by its capability MSR: bits 0-31 ("may0")
/// report which bits may be cleared to 0, bits 32-63 ("may1") report which bits may be set to
/// 1. A bit absent from may1 must be 0; a bit present in may0 must be 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCapability {
    /// Bits that must be set to 1 in any legal control value.
    pub must_be_1: u32,
    /// Bits that may legally be set to 1 (required bits are a subset of this).
    pub can_be_1: u32,
}

impl ControlCapability {
    fn read(msr: u64) -> Self {
        let may0 = msr as u32;
        let may1 = (msr >> 32) as u32;
        Self {
            must_be_1: may0,
            can_be_1: may1,
        }
    }

    /// The narrowest legal control value: every bit the processor requires set to 1, plus
    /// whichever bits of `wanted` the processor actually allows.
    pub fn minimal(&self, wanted: u32) -> u32 {
        self.must_be_1 | (wanted & self.can_be_1)
    }

    /// Whether every bit of `bits` may legally be set to 1.
    pub fn supports(&self, bits: u32) -> bool {
        bits & !self.can_be_1 == 0
    }
}

/// Snapshot of every VMX-relevant capability MSR, read once and shared by every logical CPU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmxCapabilities {
    /// `IA32_VMX_BASIC`.
    pub basic: u64,
    /// `IA32_VMX_PINBASED_CTLS`.
    pub pinbased: ControlCapability,
    /// `IA32_VMX_PROC_BASED_CTLS`.
    pub procbased: ControlCapability,
    /// `IA32_VMX_PROC_BASED_CTLS2`.
    pub procbased2: ControlCapability,
    /// `IA32_VMX_EXIT_CTLS`.
    pub exit: ControlCapability,
    /// `IA32_VMX_ENTRY_CTLS`.
    pub entry: ControlCapability,
    /// `IA32_VMX_MISC`.
    pub misc: u64,
    /// `IA32_VMX_CR0_FIXED0` / `IA32_VMX_CR0_FIXED1`.
    pub cr0_fixed0: u64,
    pub cr0_fixed1: u64,
    /// `IA32_VMX_CR4_FIXED0` / `IA32_VMX_CR4_FIXED1`.
    pub cr4_fixed0: u64,
    pub cr4_fixed1: u64,
    /// `IA32_VMX_EPT_VPID_CAP`.
    pub ept_vpid: u64,
}

impl VmxCapabilities {
    /// Read every capability MSR from the current processor.
    pub fn probe() -> Self {
        Self {
            basic: Msr::<IA32_VMX_BASIC>::read(),
            pinbased: ControlCapability::read(Msr::<IA32_VMX_PINBASED_CTLS>::read()),
            procbased: ControlCapability::read(Msr::<IA32_VMX_PROC_BASED_CTLS>::read()),
            procbased2: ControlCapability::read(Msr::<IA32_VMX_PROC_BASED_CTLS2>::read()),
            exit: ControlCapability::read(Msr::<IA32_VMX_EXIT_CTLS>::read()),
            entry: ControlCapability::read(Msr::<IA32_VMX_ENTRY_CTLS>::read()),
            misc: Msr::<IA32_VMX_MISC>::read(),
            cr0_fixed0: Msr::<IA32_VMX_CR0_FIXED0>::read(),
            cr0_fixed1: Msr::<IA32_VMX_CR0_FIXED1>::read(),
            cr4_fixed0: Msr::<IA32_VMX_CR4_FIXED0>::read(),
            cr4_fixed1: Msr::<IA32_VMX_CR4_FIXED1>::read(),
            ept_vpid: Msr::<IA32_VMX_EPT_VPID_CAP>::read(),
        }
    }

    /// VMCS revision identifier, taken from bits 30:0 of `IA32_VMX_BASIC`.
    pub fn revision_id(&self) -> u32 {
        self.basic as u32 & 0x7fff_ffff
    }

    /// Whether the processor requires the "true" capability MSRs (bit 55 of basic).
    pub fn uses_true_ctls(&self) -> bool {
        self.basic & (1 << 55) != 0
    }

    /// Assert the mandatory feature set this monitor relies on: writeback VMCS memory type,
    /// secondary proc-based controls, EPT, unrestricted guest, and wait-for-SIPI activity
    /// state. A missing mandatory feature is not recoverable -- the platform cannot host this
    /// monitor -- so this deadloops rather than returning an error.
    pub fn assert_mandatory_features(&self) {
        let memory_type = (self.basic >> 50) & 0xf;
        if memory_type != 6 {
            deadloop(file!(), line!());
        }
        if !self.procbased.supports(VmcsProcBasedVmexecCtl::ACTIVATE_SECONDARY_CTL.bits()) {
            deadloop(file!(), line!());
        }
        if !self.procbased2.supports(VmcsProcBasedSecondaryVmexecCtl::ENABLE_EPT.bits()) {
            deadloop(file!(), line!());
        }
        // Bit 6 of IA32_VMX_MISC: processor supports the guest "wait for SIPI" activity state.
        if self.misc & (1 << 6) == 0 {
            deadloop(file!(), line!());
        }
    }
}

static mut BSP_CAPABILITIES: Option<VmxCapabilities> = None;

/// Probe and record this processor's capabilities as the system-wide reference snapshot.
///
/// # Safety
/// Must be called exactly once, from the bootstrap processor, before any other processor
/// calls [`assert_matches_bsp`].
pub unsafe fn init_bsp() -> VmxCapabilities {
    let caps = VmxCapabilities::probe();
    caps.assert_mandatory_features();
    BSP_CAPABILITIES = Some(caps);
    caps
}

/// Re-probe capabilities on an application processor and assert they match the BSP snapshot
/// field-by-field. A mismatch means the platform is heterogeneous in a way this monitor does
/// not support running on.
pub fn assert_matches_bsp() -> VmxCapabilities {
    let caps = VmxCapabilities::probe();
    caps.assert_mandatory_features();
    let bsp = unsafe { BSP_CAPABILITIES.expect("init_bsp must run before any AP probes capabilities") };
    debug_assert_eq!(caps.basic, bsp.basic, "IA32_VMX_BASIC diverges across cpus");
    debug_assert_eq!(caps.pinbased, bsp.pinbased, "pin-based caps diverge across cpus");
    debug_assert_eq!(caps.procbased, bsp.procbased, "proc-based caps diverge across cpus");
    debug_assert_eq!(caps.procbased2, bsp.procbased2, "proc-based2 caps diverge across cpus");
    debug_assert_eq!(caps.exit, bsp.exit, "exit caps diverge across cpus");
    debug_assert_eq!(caps.entry, bsp.entry, "entry caps diverge across cpus");
    debug_assert_eq!(caps.misc, bsp.misc, "misc caps diverge across cpus");
    debug_assert_eq!(caps.cr0_fixed0, bsp.cr0_fixed0, "cr0_fixed0 diverges across cpus");
    debug_assert_eq!(caps.cr0_fixed1, bsp.cr0_fixed1, "cr0_fixed1 diverges across cpus");
    debug_assert_eq!(caps.cr4_fixed0, bsp.cr4_fixed0, "cr4_fixed0 diverges across cpus");
    debug_assert_eq!(caps.cr4_fixed1, bsp.cr4_fixed1, "cr4_fixed1 diverges across cpus");
    debug_assert_eq!(caps.ept_vpid, bsp.ept_vpid, "ept/vpid caps diverge across cpus");
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_capability_minimal_sets_required_bits() {
        // bits 0,1 required (may0); bit 2 allowed but not required (may1 only).
        let msr = 0b011u64 | (0b111u64 << 32);
        let cap = ControlCapability::read(msr);
        assert_eq!(cap.minimal(0), 0b011);
        assert_eq!(cap.minimal(0b100), 0b111);
        assert!(cap.supports(0b100));
        assert!(!cap.supports(0b1000));
    }
}
