//! Interface to play with vmexits.
use crate::{
    probe::Probe,
    vcpu::{GenericVCpuState, VmexitResult},
    vmcs::{ActiveVmcs, BasicExitReason, EptViolationQualification, ExitReason, Field},
    VmError,
};

/// Fixed preamble run on every vm-exit before any [`VmexitController`] sees it.
///
/// Two things hardware requires the monitor to redo on every single exit, regardless of cause:
/// reflecting a pending IDT-vectoring event back into the next entry's injection field (an
/// exception was already partway through delivery when the exit happened; if it is dropped the
/// guest silently loses it), and restoring the "blocked by NMI" interruptibility bit when this
/// exit happened to occur during delivery of an IRET that was itself unblocking NMIs. Both are
/// copy-the-field operations, not handler logic, so they run unconditionally ahead of dispatch.
pub fn dispatch_preamble(vmcs: &ActiveVmcs, exit: &ExitReason) -> Result<(), VmError> {
    let idt_info = vmcs.read(Field::IdtVectoringInfo)?;
    if idt_info & (1 << 31) != 0 {
        let mut entry_info = idt_info & 0x7FFF_FFFF;
        // Clear the NMI-unblocking-due-to-IRET bit copied along with vectoring info; it is not
        // part of the entry-interruption-information encoding.
        entry_info &= !(1 << 12);
        vmcs.write(Field::VmentryInterruptionInfo, entry_info)?;
        let has_error_code = idt_info & (1 << 11) != 0;
        if has_error_code {
            let err = vmcs.read(Field::IdtVectoringErrCode)?;
            vmcs.write(Field::VmentryExceptionErrCode, err)?;
        }
        let len = vmcs.read(Field::VmexitInstructionLength)?;
        vmcs.write(Field::VmentryInstructionLength, len)?;
    }

    let nmi_unblocked_by_iret = matches!(
        exit.get_basic_reason(),
        BasicExitReason::ExternalInt(Some(info)) if info.nmi_unblocked_by_iret
    ) || matches!(
        exit.get_basic_reason(),
        BasicExitReason::EptViolation { qualification, .. }
            if qualification.contains(EptViolationQualification::BIT12)
    );
    if nmi_unblocked_by_iret {
        let interruptibility = vmcs.read(Field::GuestInterruptibilityState)?;
        vmcs.write(Field::GuestInterruptibilityState, interruptibility | (1 << 3))?;
    }
    Ok(())
}

/// Controller that defines action on vmexit.
pub trait VmexitController {
    /// Handle the vmexit on this controller.
    ///
    /// Returns [`VmError::HandleVmexitFailed`] when failed to handle vmexit on this controller.
    fn handle<P: Probe>(
        &mut self,
        reason: ExitReason,
        p: &mut P,
        generic_vcpu_state: &mut GenericVCpuState,
    ) -> Result<VmexitResult, VmError>;
}

impl VmexitController for () {
    fn handle<P: Probe>(
        &mut self,
        _reason: ExitReason,
        _p: &mut P,
        _generic_vcpu_state: &mut GenericVCpuState,
    ) -> Result<VmexitResult, VmError> {
        Err(VmError::HandleVmexitFailed(_reason))
    }
}

impl<A: VmexitController, B: VmexitController> VmexitController for (A, B) {
    fn handle<P: Probe>(
        &mut self,
        reason: ExitReason,
        p: &mut P,
        generic_vcpu_state: &mut GenericVCpuState,
    ) -> Result<VmexitResult, VmError> {
        let (a, b) = self;
        match a.handle(reason, p, generic_vcpu_state) {
            Err(VmError::HandleVmexitFailed(reason)) => b.handle(reason, p, generic_vcpu_state),
            r => r,
        }
    }
}
