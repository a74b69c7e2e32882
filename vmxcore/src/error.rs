//! Crate-wide error type and the fatal deadloop path.
use crate::vmcs::{ExitReason, InstructionError};
use alloc::{boxed::Box, string::String};

/// Recoverable failure surfaced by some CORE operation.
///
/// Fatal conditions (triple fault, vm-entry failure, init-time HMM failure, an invariant
/// violation caught by an assertion) are not representable here; they flow through
/// [`deadloop`] instead, which never returns.
#[derive(Debug)]
pub enum VmError {
    /// A VMX instruction (VMREAD/VMWRITE/VMPTRLD/VMCLEAR/VMLAUNCH/VMRESUME) failed; carries
    /// the decoded `VM-instruction error` field.
    VmxOperationError(InstructionError),
    /// No controller in the dispatch chain claimed this exit reason.
    HandleVmexitFailed(ExitReason),
    /// A controller-specific error, boxed so the dispatcher stays handler-type-agnostic.
    ControllerError(Box<dyn core::fmt::Debug + Send + Sync>),
    /// A guest-cpu lifecycle error (index out of range, already started, ...).
    VCpuError(String),
    /// `iced-x86` could not decode the faulting instruction.
    FailedToDecodeInstruction,
    /// A runtime (post-init) host memory mapping failed; caller must back out.
    HmmMappingFailed,
    /// An IPC send named a destination CPU id outside `[0, num_cpus)`.
    IpcTargetInvalid(usize),
    /// A guest virtual-address walk or a `copy_from_gva`/`copy_to_gva` page crossing failed;
    /// carries the faulting guest linear address and the page-fault error code to inject.
    GuestPageFault { gva: usize, error_code: u32 },
}

impl core::fmt::Display for VmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::VmxOperationError(e) => write!(f, "vmx instruction failed: {e:?}"),
            Self::HandleVmexitFailed(r) => write!(f, "unhandled vmexit: {r:?}"),
            Self::ControllerError(e) => write!(f, "controller error: {e:?}"),
            Self::VCpuError(s) => write!(f, "vcpu error: {s}"),
            Self::FailedToDecodeInstruction => write!(f, "failed to decode instruction"),
            Self::HmmMappingFailed => write!(f, "host memory mapping failed"),
            Self::IpcTargetInvalid(id) => write!(f, "ipc destination {id} out of range"),
            Self::GuestPageFault { gva, error_code } => {
                write!(f, "guest page fault at gva {gva:#x}, error code {error_code:#x}")
            }
        }
    }
}

/// Per-cpu guard against re-entering [`deadloop`] from within its own recovery attempt.
const FALSE: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);
static IN_DEADLOOP: [core::sync::atomic::AtomicBool; abyss::MAX_CPU] = [FALSE; abyss::MAX_CPU];

/// Record a fatal monitor invariant violation and never return.
///
/// Mirrors the taxonomy in the monitor's error-handling design: log unconditionally
/// (bypassing the `debug_params` trace gate), then either halt (debug builds) or reset the
/// platform through port 0xCF9 (release builds). A CPU that faults while already inside
/// `deadloop` skips straight to reset instead of recursing.
pub fn deadloop(file: &str, line: u32) -> ! {
    use core::sync::atomic::Ordering;
    let cpu = abyss::x86_64::intrinsics::cpuid();
    let reentrant = IN_DEADLOOP[cpu].swap(true, Ordering::SeqCst);

    println!("\n========== MONITOR DEADLOOP [core #{cpu}] ==========");
    println!("at {file}:{line}");

    if reentrant {
        reset_platform();
    }

    #[cfg(debug_assertions)]
    {
        loop {
            core::hint::spin_loop();
        }
    }
    #[cfg(not(debug_assertions))]
    {
        reset_platform()
    }
}

fn reset_platform() -> ! {
    let port = abyss::x86_64::pio::Pio::new(0xCF9);
    port.write_u8(0x00);
    port.write_u8(0x06);
    loop {
        core::hint::spin_loop();
    }
}

/// Record a fatal invariant violation at the caller's location.
#[macro_export]
macro_rules! deadloop {
    () => {
        $crate::error::deadloop(file!(), line!())
    };
}
