//! Monitor-wide debug/diagnostic configuration.
//!
//! The monitor has exactly one external configuration surface -- the loader-supplied
//! descriptor handed to the BSP at boot -- and within it, a single bitmask of optional
//! diagnostics a deployer may turn on. There is no runtime config file or command line: every
//! other behavior (control bits, memory layout, cpu topology) is either hardware capability or
//! derived from the guest descriptor itself.
bitflags::bitflags! {
    /// Optional diagnostics, off by default. Each bit trades overhead for observability and is
    /// meant to be flipped on for a single debugging session, not left on in deployment.
    pub struct DebugParams: u32 {
        /// Log every vm-exit's basic reason and guest rip before dispatch.
        const TRACE_VMEXITS = 1 << 0;
        /// Log every IPC send/receive, including resends.
        const TRACE_IPC = 1 << 1;
        /// Dump the full VMCS guest-state area on an unhandled vm-exit.
        ///
        /// This is on unconditionally in `error::deadloop`'s caller sites regardless of this
        /// flag; the flag only controls the *additional* dump on recoverable paths.
        const DUMP_VMCS_ON_ERROR = 1 << 2;
        /// Cross-check every VMCS write against the cached value before flush.
        const VALIDATE_CACHE_WRITES = 1 << 3;
    }
}

impl Default for DebugParams {
    fn default() -> Self {
        DebugParams::empty()
    }
}

static ACTIVE: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

/// Install the debug flags decoded from the loader descriptor. Called once on the BSP.
pub fn set(params: DebugParams) {
    ACTIVE.store(params.bits(), core::sync::atomic::Ordering::Relaxed);
}

/// The currently active debug flags.
pub fn get() -> DebugParams {
    DebugParams::from_bits_truncate(ACTIVE.load(core::sync::atomic::Ordering::Relaxed))
}

/// Log `$($arg)*` iff `TRACE_VMEXITS` is set, with no cost on the common path beyond the
/// flag check.
#[macro_export]
macro_rules! trace_exit {
    ($($arg:tt)*) => {
        if $crate::config::get().contains($crate::config::DebugParams::TRACE_VMEXITS) {
            $crate::println!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        set(DebugParams::TRACE_IPC | DebugParams::DUMP_VMCS_ON_ERROR);
        assert!(get().contains(DebugParams::TRACE_IPC));
        assert!(!get().contains(DebugParams::TRACE_VMEXITS));
        set(DebugParams::default());
    }
}
