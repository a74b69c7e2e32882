//! Virtual CPU implementation.
use crate::{
    probe::Probe,
    vm::{Gpa, Gva, Vm, VmOps, VmState},
    vm_control::*,
    vmcs::{ActiveVmcs, BasicExitReason, ExternalIntInfo, Field, Vmcs},
    VmError,
};
use abyss::spin_lock::SpinLock;
use alloc::sync::Weak;
use core::{
    arch::asm,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

pub use abyss::{interrupt::GeneralPurposeRegisters, x86_64::*};
use interrupt::IDT;
use intrinsics::read_cr3;
use msr::Msr;
use segmentation::{Segment, SegmentTable, SEGMENT_TABLE};
use table::SystemTableRegister;

#[naked]
unsafe extern "C" fn vmlaunch_resume(
    _gp: &mut GeneralPurposeRegisters,
    _launched: &mut bool,
) -> i8 {
    asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "push rdi",
        "clc",
        "mov rax, 0x6c14", // HostRsp.
        "vmwrite rax, rsp",
        "setna al",
        // If failed return.
        "cmp al, 0",
        "je 1f",
        "pop rdi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "mov al, 1",
        "ret",
        // start vmlaunch.
        "1: ",
        "mov rax, [rsi]",
        "cmp rax, 1",
        "mov rax, 1",
        "mov [rsi], rax",
        "mov rax, [rdi + 0x78]",
        "mov cr2, rax",
        "mov rax, [rdi + 0x70]",
        "mov rbx, [rdi + 0x68]",
        "mov rcx, [rdi + 0x60]",
        "mov rdx, [rdi + 0x58]",
        "mov rbp, [rdi + 0x50]",
        "mov rsi, [rdi + 0x40]",
        "mov r8, [rdi + 0x38]",
        "mov r9, [rdi + 0x30]",
        "mov r10, [rdi + 0x28]",
        "mov r11, [rdi + 0x20]",
        "mov r12, [rdi + 0x18]",
        "mov r13, [rdi + 0x10]",
        "mov r14, [rdi + 0x8]",
        "mov r15, [rdi]",
        "mov rdi, [rdi + 0x48]",
        "jne 2f",
        "vmresume",
        "jmp 3f",
        "2:",
        "vmlaunch",
        "3:",
        "pop rdi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "mov al, 2",
        "ret",
        options(noreturn)
    )
}

#[naked]
#[no_mangle]
unsafe extern "C" fn vmexit() {
    asm!(
        "sub rsp, 8",
        "mov [rsp], rdi",
        "mov rdi, [rsp + 8]",
        "mov [rdi + 0x70], rax",
        "mov rax, cr2",
        "mov [rdi + 0x78], rax",
        "mov [rdi + 0x68], rbx",
        "mov [rdi + 0x60], rcx",
        "mov [rdi + 0x58], rdx",
        "mov [rdi + 0x50], rbp",
        "mov [rdi + 0x40], rsi",
        "mov [rdi + 0x38], r8",
        "mov [rdi + 0x30], r9",
        "mov [rdi + 0x28], r10",
        "mov [rdi + 0x20], r11",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x10], r13",
        "mov [rdi + 0x8], r14",
        "mov [rdi], r15",
        "mov rax, [rsp]",
        "mov [rdi + 0x48], rax",
        "add rsp, 16",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "xor rax, rax",
        "ret",
        options(noreturn)
    )
}

/// Per-vcpu private state.
pub trait VCpuState
where
    Self: Sync + Send + 'static,
{
    /// Get enabled pin-based control fields.
    fn pinbase_ctls(&self) -> VmcsPinBasedVmexecCtl;
    /// Get enabled proc-based control fields.
    fn procbase_ctls(&self) -> VmcsProcBasedVmexecCtl;
    /// Get enabled proc-based secondary control fields.
    fn procbase_ctls2(&self) -> VmcsProcBasedSecondaryVmexecCtl;
    /// Get enabled exit control fields.
    fn exit_ctls(&self) -> VmcsExitCtl;
    /// Get enabled entry control fields.
    fn entry_ctls(&self) -> VmcsEntryCtl;
    /// Initialize the guest state.
    fn init_guest_state(&self, vmcs: &ActiveVmcs) -> Result<(), VmError>;
    /// Handle the vmexit on this vcpu.
    fn handle_vmexit(
        &mut self,
        genenric_state: &mut GenericVCpuState,
    ) -> Result<VmexitResult, VmError>;
}

/// A visible state for VCpu.
pub struct GenericVCpuState<'a> {
    /// The activated vmcs.
    pub vmcs: ActiveVmcs,
    /// general purpose register of the vcpu.
    pub gprs: &'a mut GeneralPurposeRegisters,
    /// Weak reference of the vm.
    pub vm: Weak<dyn VmOps>,
    // smp id of this vcpu.
    id: usize,
    // Pending interrupts.
    pending_interrupts: &'a [AtomicU64; 4],
}

impl<'a> GenericVCpuState<'a> {
    /// Get smp id of this vcpu.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Inject the interrupt `vec` into the `active_vmcs`.
    pub fn inject_interrupt(&self, vec: u8) {
        // Inject interrupt to the interrupt window
        let (index, ofs) = (vec / 64, vec & 63);
        self.pending_interrupts[index as usize].store(1 << ofs, Ordering::SeqCst);
    }

    /// Withdraw a previously set pending interrupt, e.g. when the source that raised it is
    /// masked again before the vcpu reached an open interrupt window.
    pub fn clear_pending_intr(&self, vec: u8) {
        let (index, ofs) = (vec / 64, vec & 63);
        self.pending_interrupts[index as usize].fetch_and(!(1 << ofs), Ordering::SeqCst);
    }

    /// Read one general-purpose register out of the trap frame saved on the last vm-exit.
    pub fn get_gp(&self, reg: GpReg) -> usize {
        match reg {
            GpReg::Rax => self.gprs.rax,
            GpReg::Rbx => self.gprs.rbx,
            GpReg::Rcx => self.gprs.rcx,
            GpReg::Rdx => self.gprs.rdx,
            GpReg::Rsi => self.gprs.rsi,
            GpReg::Rdi => self.gprs.rdi,
            GpReg::Rbp => self.gprs.rbp,
            GpReg::R8 => self.gprs.r8,
            GpReg::R9 => self.gprs.r9,
            GpReg::R10 => self.gprs.r10,
            GpReg::R11 => self.gprs.r11,
            GpReg::R12 => self.gprs.r12,
            GpReg::R13 => self.gprs.r13,
            GpReg::R14 => self.gprs.r14,
            GpReg::R15 => self.gprs.r15,
        }
    }

    /// Overwrite one general-purpose register; takes effect at the next vm-entry since the trap
    /// frame is reloaded from this same storage on resume.
    pub fn set_gp(&mut self, reg: GpReg, value: usize) {
        *(match reg {
            GpReg::Rax => &mut self.gprs.rax,
            GpReg::Rbx => &mut self.gprs.rbx,
            GpReg::Rcx => &mut self.gprs.rcx,
            GpReg::Rdx => &mut self.gprs.rdx,
            GpReg::Rsi => &mut self.gprs.rsi,
            GpReg::Rdi => &mut self.gprs.rdi,
            GpReg::Rbp => &mut self.gprs.rbp,
            GpReg::R8 => &mut self.gprs.r8,
            GpReg::R9 => &mut self.gprs.r9,
            GpReg::R10 => &mut self.gprs.r10,
            GpReg::R11 => &mut self.gprs.r11,
            GpReg::R12 => &mut self.gprs.r12,
            GpReg::R13 => &mut self.gprs.r13,
            GpReg::R14 => &mut self.gprs.r14,
            GpReg::R15 => &mut self.gprs.r15,
        }) = value;
    }

    /// Read a segment register's selector, base, limit and raw VMX access-rights value out of
    /// the vmcs.
    pub fn get_seg(&self, seg: SegReg) -> Result<(u16, u64, u32, u32), VmError> {
        let (sel, base, limit, ar) = seg.fields();
        Ok((
            self.vmcs.read(sel)? as u16,
            self.vmcs.read(base)?,
            self.vmcs.read(limit)? as u32,
            self.vmcs.read(ar)? as u32,
        ))
    }

    /// Write a segment register's selector, base, limit and raw VMX access-rights value into the
    /// vmcs.
    pub fn set_seg(
        &self,
        seg: SegReg,
        selector: u16,
        base: u64,
        limit: u32,
        ar: u32,
    ) -> Result<(), VmError> {
        let (sel_field, base_field, limit_field, ar_field) = seg.fields();
        self.vmcs.write(sel_field, selector as u64)?;
        self.vmcs.write(base_field, base)?;
        self.vmcs.write(limit_field, limit as u64)?;
        self.vmcs.write(ar_field, ar as u64)
    }

    /// CR0 as the guest would observe it: for bits the host has claimed in
    /// [`Field::Cr0GuestHostMask`], the guest sees its own last write (the read shadow) rather
    /// than the value actually loaded into hardware.
    pub fn get_visible_cr0(&self) -> Result<Cr0, VmError> {
        let mask = self.vmcs.read(Field::Cr0GuestHostMask)?;
        let shadow = self.vmcs.read(Field::Cr0ReadShadow)?;
        let actual = self.vmcs.read(Field::GuestCr0)?;
        Ok(Cr0::from_bits_truncate((actual & !mask) | (shadow & mask)))
    }

    /// CR4 equivalent of [`Self::get_visible_cr0`].
    pub fn get_visible_cr4(&self) -> Result<Cr4, VmError> {
        let mask = self.vmcs.read(Field::Cr4GuestHostMask)?;
        let shadow = self.vmcs.read(Field::Cr4ReadShadow)?;
        let actual = self.vmcs.read(Field::GuestCr4)?;
        Ok(Cr4::from_bits_truncate((actual & !mask) | (shadow & mask)))
    }

    /// Advance guest RIP past the instruction that caused the current vm-exit.
    pub fn skip_instruction(&self) -> Result<(), VmError> {
        let len = self.vmcs.read(Field::VmexitInstructionLength)?;
        let rip = self.vmcs.read(Field::GuestRip)?;
        self.vmcs.write(Field::GuestRip, rip + len)
    }

    /// Inject `#GP(0)` at the next vm-entry.
    pub fn inject_gp0(&self) -> Result<(), VmError> {
        self.inject_exception(13, Some(0))
    }

    /// Inject `#UD` at the next vm-entry.
    pub fn inject_ud(&self) -> Result<(), VmError> {
        self.inject_exception(6, None)
    }

    /// Inject the hardware exception `vector` at the next vm-entry, only legal while this vcpu
    /// is in the active activity state. Vectors that architecturally carry an error code (`#DF`,
    /// `#TS`, `#NP`, `#SS`, `#GP`, `#PF`, `#AC`) get one; `code` is ignored for any other vector.
    /// Vectors 3 (`#BP`) and 4 (`#OF`) are encoded as software exceptions and carry forward the
    /// last exit's instruction length, per the vectoring-event-injection rules.
    pub fn inject_exception(&self, vector: u8, code: Option<u32>) -> Result<(), VmError> {
        const ACTIVE: u64 = 0;
        if self.vmcs.read(Field::GuestActivityState)? != ACTIVE {
            return Err(VmError::VCpuError(alloc::string::String::from(
                "cannot inject an exception while the vcpu is not in the active activity state",
            )));
        }

        let is_software_exception = matches!(vector, 3 | 4);
        let ty: u64 = if is_software_exception { 6 } else { 3 };
        let carries_error_code = matches!(vector, 8 | 10 | 11 | 12 | 13 | 14 | 17);

        let mut info = (vector as u64) | (ty << 8) | (1 << 31);
        if carries_error_code {
            info |= 1 << 11;
        }
        self.vmcs.write(Field::VmentryInterruptionInfo, info)?;
        if carries_error_code {
            self.vmcs
                .write(Field::VmentryExceptionErrCode, code.unwrap_or(0) as u64)?;
        }
        if is_software_exception {
            let len = self.vmcs.read(Field::VmexitInstructionLength)?;
            self.vmcs.write(Field::VmentryInstructionLength, len)?;
        }
        Ok(())
    }

    /// Translate a guest linear address to the host virtual address backing it, walking the
    /// guest's own page tables through `probe`'s guest-physical view.
    ///
    /// Supports the unpaged (`CR0.PG = 0`) and IA-32e 4-level paging modes, including 1 GiB and
    /// 2 MiB large pages. Legacy 32-bit and PAE-without-long-mode guest paging are not walked;
    /// a guest running in one of those modes faults on every translation attempt instead of
    /// silently reading through stale state.
    pub fn gva_to_hva<P: Probe>(
        &self,
        probe: &P,
        gva: Gva,
        access: GvaAccess,
    ) -> Result<abyss::addressing::Va, VmError> {
        let gva_val = unsafe { gva.into_usize() } as u64;
        let fault = |present: bool| VmError::GuestPageFault {
            gva: gva_val as usize,
            error_code: access.error_code(present),
        };

        let cr0 = self.get_visible_cr0()?;
        if !cr0.contains(Cr0::PG) {
            let gpa = Gpa::new(gva_val as usize).ok_or_else(|| fault(false))?;
            return probe.gpa2hva(&self.vmcs, gpa).ok_or_else(|| fault(false));
        }

        let cr4 = self.get_visible_cr4()?;
        let efer = self.vmcs.read(Field::GuestIa32Efer)?;
        const EFER_LMA: u64 = 1 << 10;
        if !cr4.contains(Cr4::PAE) || efer & EFER_LMA == 0 {
            return Err(fault(false));
        }

        let mut table_gpa = self.vmcs.read(Field::GuestCr3)? & 0x000F_FFFF_FFFF_F000;
        let indices = [
            (gva_val >> 39) & 0x1FF,
            (gva_val >> 30) & 0x1FF,
            (gva_val >> 21) & 0x1FF,
            (gva_val >> 12) & 0x1FF,
        ];
        for (level, index) in indices.iter().enumerate() {
            let entry_gpa = Gpa::new((table_gpa + index * 8) as usize).ok_or_else(|| fault(false))?;
            let entry_hva = probe.gpa2hva(&self.vmcs, entry_gpa).ok_or_else(|| fault(false))?;
            let entry = unsafe { entry_hva.as_ref::<u64>().copied().ok_or_else(|| fault(false))? };
            if entry & 1 == 0 {
                return Err(fault(false));
            }
            if access.write && entry & (1 << 1) == 0 {
                return Err(fault(true));
            }
            if access.user && entry & (1 << 2) == 0 {
                return Err(fault(true));
            }
            let is_large_page_level = level == 1 || level == 2;
            if is_large_page_level && entry & (1 << 7) != 0 {
                let page_shift = if level == 1 { 30 } else { 21 };
                let page_base = entry & !((1u64 << page_shift) - 1) & 0x000F_FFFF_FFFF_F000;
                let offset = gva_val & ((1u64 << page_shift) - 1);
                let gpa = Gpa::new((page_base + offset) as usize).ok_or_else(|| fault(false))?;
                return probe.gpa2hva(&self.vmcs, gpa).ok_or_else(|| fault(false));
            }
            table_gpa = entry & 0x000F_FFFF_FFFF_F000;
        }
        let gpa = Gpa::new((table_gpa + (gva_val & 0xFFF)) as usize).ok_or_else(|| fault(false))?;
        probe.gpa2hva(&self.vmcs, gpa).ok_or_else(|| fault(false))
    }

    /// Copy `size` bytes from guest linear address `gva` into the host buffer at `hva`,
    /// page by page, stopping at the first page that fails to translate.
    pub fn copy_from_gva<P: Probe>(
        &self,
        probe: &P,
        gva: Gva,
        hva: *mut u8,
        size: usize,
    ) -> Result<(), VmError> {
        self.copy_gva(probe, gva, hva, size, false)
    }

    /// Copy `size` bytes from the host buffer at `hva` into guest linear address `gva`, page by
    /// page, stopping at the first page that fails to translate.
    pub fn copy_to_gva<P: Probe>(
        &self,
        probe: &P,
        gva: Gva,
        hva: *const u8,
        size: usize,
    ) -> Result<(), VmError> {
        self.copy_gva(probe, gva, hva as *mut u8, size, true)
    }

    fn copy_gva<P: Probe>(
        &self,
        probe: &P,
        gva: Gva,
        hva: *mut u8,
        size: usize,
        to_guest: bool,
    ) -> Result<(), VmError> {
        use abyss::addressing::PAGE_SIZE;
        let access = GvaAccess {
            write: to_guest,
            user: false,
            fetch: false,
        };
        let mut done = 0usize;
        while done < size {
            let cur_gva = gva + done;
            let cur_gva_val = unsafe { cur_gva.into_usize() };
            let page_off = cur_gva_val & (PAGE_SIZE - 1);
            let chunk = core::cmp::min(size - done, PAGE_SIZE - page_off);
            let guest_page_hva = self.gva_to_hva(probe, cur_gva, access)?;
            let guest_ptr = unsafe { guest_page_hva.into_usize() as *mut u8 };
            unsafe {
                if to_guest {
                    core::ptr::copy_nonoverlapping(hva.add(done), guest_ptr, chunk);
                } else {
                    core::ptr::copy_nonoverlapping(guest_ptr, hva.add(done), chunk);
                }
            }
            done += chunk;
        }
        Ok(())
    }
}

/// Names one general-purpose register for [`GenericVCpuState::get_gp`]/[`GenericVCpuState::set_gp`].
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpReg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

/// Names one segment register for [`GenericVCpuState::get_seg`]/[`GenericVCpuState::set_seg`].
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegReg {
    Es,
    Cs,
    Ss,
    Ds,
    Fs,
    Gs,
    Ldtr,
    Tr,
}

impl SegReg {
    /// The vmcs (selector, base, limit, access-rights) field quadruple backing this register.
    fn fields(&self) -> (Field, Field, Field, Field) {
        match self {
            SegReg::Es => (
                Field::GuestEsSelector,
                Field::GuestEsBase,
                Field::GuestEsLimit,
                Field::GuestEsAccessRights,
            ),
            SegReg::Cs => (
                Field::GuestCsSelector,
                Field::GuestCsBase,
                Field::GuestCsLimit,
                Field::GuestCsAccessRights,
            ),
            SegReg::Ss => (
                Field::GuestSsSelector,
                Field::GuestSsBase,
                Field::GuestSsLimit,
                Field::GuestSsAccessRights,
            ),
            SegReg::Ds => (
                Field::GuestDsSelector,
                Field::GuestDsBase,
                Field::GuestDsLimit,
                Field::GuestDsAccessRights,
            ),
            SegReg::Fs => (
                Field::GuestFsSelector,
                Field::GuestFsBase,
                Field::GuestFsLimit,
                Field::GuestFsAccessRights,
            ),
            SegReg::Gs => (
                Field::GuestGsSelector,
                Field::GuestGsBase,
                Field::GuestGsLimit,
                Field::GuestGsAccessRights,
            ),
            SegReg::Ldtr => (
                Field::GuestLdtrSelector,
                Field::GuestLdtrBase,
                Field::GuestLdtrLimit,
                Field::GuestLdtrAccessRights,
            ),
            SegReg::Tr => (
                Field::GuestTrSelector,
                Field::GuestTrBase,
                Field::GuestTrLimit,
                Field::GuestTrAccessRights,
            ),
        }
    }
}

/// Access kind requested of a [`GenericVCpuState::gva_to_hva`] walk; determines the page-fault
/// error code bits synthesized on failure.
#[derive(Clone, Copy, Default)]
pub struct GvaAccess {
    /// The access is a write (or the walk otherwise requires a writable mapping).
    pub write: bool,
    /// The access originates from CPL 3 and requires a user-accessible mapping.
    pub user: bool,
    /// The access is an instruction fetch.
    pub fetch: bool,
}

impl GvaAccess {
    fn error_code(&self, present: bool) -> u32 {
        let mut code = 0u32;
        if present {
            code |= 1 << 0;
        }
        if self.write {
            code |= 1 << 1;
        }
        if self.user {
            code |= 1 << 2;
        }
        if self.fetch {
            code |= 1 << 4;
        }
        code
    }
}

/// Virtual cpu.
#[repr(C, align(4096))]
pub struct VCpu<S: VmState + 'static> {
    // This must be the first field of the VCpu.
    vmcs: Vmcs,
    // general purpose register of the vcpu.
    gprs: GeneralPurposeRegisters,
    /// Indicate whether this vcpu is launched after vmclear.
    launched: bool,
    /// vcpu id.
    pub vcpu_id: usize,
    /// The state of VCpu.
    state: S::VcpuState,
    /// Vm that owned this VCpu.
    vm: Weak<Vm<S>>,
    /// pending interrupt bitmask
    pending_interrupts: [AtomicU64; 4],
}

impl<'a, S: VmState + 'static> VCpu<S> {
    pub(crate) fn new(vcpu_id: usize, state: S::VcpuState, vm: Weak<Vm<S>>) -> Self {
        Self {
            vmcs: Vmcs::new(),
            gprs: GeneralPurposeRegisters::default(),
            launched: false,
            vcpu_id,
            state,
            vm,
            pending_interrupts: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
        }
    }

    pub(crate) fn unpack_activate(&mut self) -> Result<Activated<S>, VmError> {
        let Self {
            vmcs,
            gprs,
            vcpu_id,
            state,
            launched,
            vm,
            pending_interrupts,
        } = self;
        Ok(Activated {
            generic_state: GenericVCpuState {
                vmcs: Vmcs::activate(vmcs)?,
                gprs,
                id: *vcpu_id,
                vm: vm.clone(),
                pending_interrupts,
            },
            vcpu_state: state,
            launched,
            vmcs,
        })
    }
}

/// VCpuOps
pub trait VCpuOps
where
    Self: Send + Sync,
{
    /// Inject interrupt to the VCpu with vec.
    fn inject_interrupt(&self, vec: u8);
}

impl<'a, S: VmState + 'static> VCpuOps for SpinLock<VCpu<S>> {
    fn inject_interrupt(&self, vec: u8) {
        let (index, ofs) = (vec / 64, vec & 63);
        self.lock().pending_interrupts[index as usize].store(1 << ofs, Ordering::SeqCst);
    }
}

pub(crate) struct Activated<'a, S: VmState + 'static> {
    pub(crate) generic_state: GenericVCpuState<'a>,
    pub(crate) vcpu_state: &'a mut S::VcpuState,
    vmcs: &'a mut Vmcs,
    launched: &'a mut bool,
}

impl<'a, S: VmState + 'static> Activated<'a, S> {
    pub(crate) unsafe fn init_vcpu(&mut self, exception_bitmap: u32) -> Result<(), VmError> {
        let Self {
            generic_state: GenericVCpuState { vmcs, .. },
            vcpu_state,
            ..
        } = self;
        // 26.2.1.1 VM-Execution Control Fields
        {
            // Reserved bits in the pin-based VM-execution controls must be set properly. Software may consult the VMX
            // capability MSRs to determine the proper settings (see Appendix A.3.1).
            {
                let pinbase_ctls = Msr::<IA32_VMX_PINBASED_CTLS>::read();
                let (supported, mut enabled) = (
                    VmcsPinBasedVmexecCtl::from_bits_unchecked((pinbase_ctls >> 32) as u32),
                    VmcsPinBasedVmexecCtl::from_bits_unchecked(
                        pinbase_ctls as u32 & !(VmcsPinBasedVmexecCtl::all().bits()),
                    ),
                );
                // enable the guest external interrupt exit
                enabled |= vcpu_state.pinbase_ctls();
                vmcs.write(
                    Field::PinBasedExecControls,
                    (enabled & supported).bits() as u64,
                )?;
            }
            // Reserved bits in the primary processor-based VM-execution controls must be set properly. Software may
            // consult the VMX capability MSRs to determine the proper settings (see Appendix A.3.2).
            {
                let procbase_ctls = Msr::<IA32_VMX_PROC_BASED_CTLS>::read();
                let (supported, mut enabled) = (
                    VmcsProcBasedVmexecCtl::from_bits_unchecked((procbase_ctls >> 32) as u32),
                    VmcsProcBasedVmexecCtl::from_bits_unchecked(
                        procbase_ctls as u32 & !(VmcsProcBasedVmexecCtl::all().bits()),
                    ),
                );
                // Make sure there are secondary controls.
                assert!(supported.contains(VmcsProcBasedVmexecCtl::ACTIVATE_SECONDARY_CTL));
                enabled |= VmcsProcBasedVmexecCtl::ACTIVATE_SECONDARY_CTL;
                enabled |= vcpu_state.procbase_ctls();
                vmcs.write(
                    Field::ProcessorBasedVmexecControls,
                    (enabled & supported).bits() as u64,
                )?;
            }
            // If the “activate secondary controls” primary processor-based VM-execution control is 1, reserved bits in the
            // secondary processor-based VM-execution controls must be cleared. Software may consult the VMX capability
            // MSRs to determine which bits are reserved (see Appendix A.3.3).
            {
                let procbase_ctls2 = Msr::<IA32_VMX_PROC_BASED_CTLS2>::read();
                let (supported, mut enabled) = (
                    VmcsProcBasedSecondaryVmexecCtl::from_bits_unchecked(
                        (procbase_ctls2 >> 32) as u32,
                    ),
                    VmcsProcBasedSecondaryVmexecCtl::from_bits_unchecked(
                        procbase_ctls2 as u32 & !(VmcsProcBasedSecondaryVmexecCtl::all().bits()),
                    ),
                );
                enabled |= vcpu_state.procbase_ctls2();
                vmcs.write(
                    Field::SecondaryVmexecControls,
                    (enabled & supported).bits() as u64,
                )?;
            }
            // 26.2.1.2 VM-Exit Control Fields
            {
                // Reserved bits in the primary VM-exit controls must be set properly.
                // Software may consult the VMX capability MSRs to determine the proper settings (see Appendix A.4.1).
                let exit_ctls = Msr::<IA32_VMX_EXIT_CTLS>::read();
                let (supported, mut enabled) = (
                    VmcsExitCtl::from_bits_unchecked((exit_ctls >> 32) as u32),
                    VmcsExitCtl::from_bits_unchecked(exit_ctls as u32),
                );
                enabled |= vcpu_state.exit_ctls();
                vmcs.write(Field::VmexitControls, (enabled & supported).bits() as u64)?;
            }
            // 26.2.1.3 VM-Entry Control Fields
            {
                // Reserved bits in the VM-entry controls must be set properly.
                // Software may consult the VMX capability MSRs to determine the proper settings (see Appendix A.5).
                let entry_ctls = Msr::<IA32_VMX_ENTRY_CTLS>::read();
                let (supported, mut enabled) = (
                    VmcsEntryCtl::from_bits_unchecked((entry_ctls >> 32) as u32),
                    VmcsEntryCtl::from_bits_unchecked(entry_ctls as u32),
                );
                enabled |= vcpu_state.entry_ctls();
                vmcs.write(Field::VmentryControls, (supported & enabled).bits() as u64)?;
            }
            vmcs.write(Field::ExceptionBitmap, exception_bitmap as u64)?;
        }
        // 26.2.2 Checks on Host Control Registers, MSRs, and SSP
        // 26.2.3 Checks on Host Segment and Descriptor-Table Registers
        // 26.2.4 Checks Related to Address-Space Size
        {
            // The CR0 field must not set any bit to a value not supported in VMX operation (see Section 23.8).
            vmcs.write(Field::HostCr0, Cr0::current().bits())?;
            // The CR4 field must not set any bit to a value not supported in VMX operation (see Section 23.8).
            vmcs.write(Field::HostCr4, Cr4::current().bits())?;
            vmcs.write(Field::HostCr3, read_cr3() as u64)?;

            // Load segments
            vmcs.write(
                Field::HostEsSelector,
                Segment::KernelData.into_selector().pack() as u64,
            )?;
            vmcs.write(
                Field::HostSsSelector,
                Segment::KernelData.into_selector().pack() as u64,
            )?;
            vmcs.write(
                Field::HostDsSelector,
                Segment::KernelData.into_selector().pack() as u64,
            )?;
            vmcs.write(
                Field::HostFsSelector,
                Segment::KernelData.into_selector().pack() as u64,
            )?;
            vmcs.write(
                Field::HostGsSelector,
                Segment::KernelData.into_selector().pack() as u64,
            )?;
            vmcs.write(
                Field::HostCsSelector,
                Segment::KernelCode.into_selector().pack() as u64,
            )?;
            vmcs.write(
                Field::HostTrSelector,
                Segment::Tss.into_selector().pack() as u64,
            )?;

            // Load gdt, Idt
            vmcs.write(
                Field::HostGdtrBase,
                SystemTableRegister::new(unsafe { &SEGMENT_TABLE }).address,
            )?;
            vmcs.write(
                Field::HostIdtrBase,
                SystemTableRegister::new(unsafe { &IDT }).address,
            )?;

            // Load gs, fs, tr
            vmcs.write(Field::HostFsBase, 0)?;
            vmcs.write(Field::HostGsBase, 0)?;
            let tss = unsafe { SegmentTable::current_tss() };
            vmcs.write(Field::HostTrBase, tss as *mut _ as usize as u64)?;

            // Vmexit location
            vmcs.write(Field::HostRip, vmexit as *const () as usize as u64)?;
        }
        vcpu_state.init_guest_state(vmcs)
    }

    pub fn vcpu_loop(&mut self, have_kicked: &AtomicBool) -> Result<VmexitResult, VmError> {
        assert_eq!(
            abyss::interrupt::InterruptState::current(),
            abyss::interrupt::InterruptState::Off
        );
        let Self {
            generic_state,
            vcpu_state,
            launched,
            ..
        } = self;
        unsafe {
            loop {
                // CHAPTER 26. VM ENTRIES
                //
                // Each VM entry performs the following steps in the order indicated:
                // 1. Basic checks are performed to ensure that VM entry can commence (Section 26.1).
                // 2. The control and host-state areas of the VMCS are checked to ensure that they are proper for supporting VMX
                // non-root operation and that the VMCS is correctly configured to support the next VM exit (Section 26.2).
                // 3. The following may be performed in parallel or in any order (Section 26.3):
                // - The guest-state area of the VMCS is checked to ensure that, after the VM entry completes, the state of the
                // logical processor is consistent with IA-32 and Intel 64 architectures.
                // - Processor state is loaded from the guest-state area and based on controls in the VMCS.
                // - Address-range monitoring is cleared.
                // 4. MSRs are loaded from the VM-entry MSR-load area (Section 26.4).
                // 5. If VMLAUNCH is being executed, the launch state of the VMCS is set to “launched.”
                // 6. If the “Intel PT uses guest physical addresses” VM-execution control is 1, trace-address pre-translation (TAPT)
                // may occur (see Section 25.5.4 and Section 26.5).
                // 7. An event may be injected in the guest context (Section 26.6).
                //
                // Steps 1–4 above perform checks that may cause VM entry to fail. Such failures occur in one of the following three
                // ways:
                // - Some of the checks in Section 26.1 may generate ordinary faults (for example, an invalid-opcode exception).
                // Such faults are delivered normally.
                // - Some of the checks in Section 26.1 and all the checks in Section 26.2 cause control to pass to the instruction
                // following the VM-entry instruction. The failure is indicated by setting RFLAGS.ZF1 (if there is a current VMCS)
                // or RFLAGS.CF (if there is no current VMCS). If there is a current VMCS, an error number indicating the cause of
                // the failure is stored in the VM-instruction error field. See Chapter 30 for the error numbers.

                // Inject an NMI this gcpu is owed, ahead of any regular interrupt: NMIs take
                // priority at vm-entry. Dropped outright if the guest is parked waiting for
                // SIPI (nothing to inject into); requeued for the next NMI-window exit if
                // blocked by an already-pending entry event or by NMI masking.
                if crate::ipc::IPC.nmi_window_exit(generic_state.id()) {
                    let activity = generic_state.vmcs.read(Field::GuestActivityState)?;
                    const WAIT_FOR_SIPI: u64 = 3;
                    if activity != WAIT_FOR_SIPI {
                        let entry_info = generic_state.vmcs.read(Field::VmentryInterruptionInfo)?;
                        let interruptibility =
                            generic_state.vmcs.read(Field::GuestInterruptibilityState)?;
                        const BLOCKED_BY_NMI: u64 = 1 << 3;
                        const BLOCKED_BY_STI: u64 = 1 << 0;
                        const BLOCKED_BY_MOV_SS: u64 = 1 << 1;
                        let nmi_blocked = interruptibility
                            & (BLOCKED_BY_NMI | BLOCKED_BY_STI | BLOCKED_BY_MOV_SS)
                            != 0;
                        if entry_info & (1 << 31) == 0 && !nmi_blocked {
                            const NMI_VECTOR: u64 = 2;
                            const TYPE_NMI: u64 = 2;
                            generic_state.vmcs.write(
                                Field::VmentryInterruptionInfo,
                                NMI_VECTOR | (TYPE_NMI << 8) | (1 << 31),
                            )?;
                        } else {
                            crate::ipc::IPC.requeue_blocked_guest_nmi(generic_state.id());
                            let proc_ctls = VmcsProcBasedVmexecCtl::from_bits_unchecked(
                                generic_state
                                    .vmcs
                                    .read(Field::ProcessorBasedVmexecControls)?
                                    as u32,
                            ) | VmcsProcBasedVmexecCtl::NMIWINEXIT;
                            generic_state.vmcs.write(
                                Field::ProcessorBasedVmexecControls,
                                proc_ctls.bits() as u64,
                            )?;
                        }
                    }
                }

                // Inject the highest pending interrupt if any exists. Skipped entirely when the
                // NMI block above already populated entry-info this round -- entry-info holds at
                // most one event, and NMIs take priority -- so the interrupt stays pending for
                // the next entry.
                let entry_info_taken =
                    generic_state.vmcs.read(Field::VmentryInterruptionInfo)? & (1 << 31) != 0;
                for (index, intr_bitmap) in generic_state.pending_interrupts.iter().enumerate().rev()
                {
                    if entry_info_taken {
                        break;
                    }
                    let v = intr_bitmap.load(Ordering::SeqCst);
                    if v != 0 {
                        let guest_rflags = Rflags::from_bits_truncate(
                            generic_state
                                .vmcs
                                .read(Field::GuestRflags)
                                .expect("Failed to read guest rflags."),
                        );
                        let interruptibility = generic_state
                            .vmcs
                            .read(Field::GuestInterruptibilityState)
                            .expect("Failed to read guest interruptibility state.");
                        const BLOCKED_BY_STI: u64 = 1 << 0;
                        const BLOCKED_BY_MOV_SS: u64 = 1 << 1;
                        let shadowed = interruptibility & (BLOCKED_BY_STI | BLOCKED_BY_MOV_SS) != 0;
                        const ACTIVE: u64 = 0;
                        const HLT: u64 = 1;
                        let activity = generic_state
                            .vmcs
                            .read(Field::GuestActivityState)
                            .expect("Failed to read guest activity state.");
                        let runnable = matches!(activity, ACTIVE | HLT);
                        if guest_rflags.contains(Rflags::IF) && !shadowed && runnable {
                            let ofs = 63 - v.leading_zeros() as usize;
                            intr_bitmap.fetch_and(!(1 << ofs), Ordering::SeqCst);
                            let vec = (index * 64 + ofs) as u64;
                            generic_state
                                .vmcs
                                .write(Field::VmentryInterruptionInfo, vec as u64 | (1 << 31))
                                .expect("Failed to set VmentryInterruptionInfo.");
                        } else if runnable {
                            // We required to wait until Rflags::IF is set. Trap immediatly when it becomes 1.
                            let proc_based_ctls = VmcsProcBasedVmexecCtl::from_bits_unchecked(
                                generic_state
                                    .vmcs
                                    .read(Field::ProcessorBasedVmexecControls)
                                    .expect("Failed to read vmcs field")
                                    as u32,
                            ) | VmcsProcBasedVmexecCtl::INTRWINEXIT;
                            generic_state
                                .vmcs
                                .write(
                                    Field::ProcessorBasedVmexecControls,
                                    proc_based_ctls.bits() as u64,
                                )
                                .expect("Failed to update ProcessorBasedVmexecControls.");
                        }
                        break;
                    }
                }

                // Check whether this vcpu is kicked.
                if have_kicked.load(Ordering::SeqCst) {
                    return Ok(VmexitResult::Kicked);
                }

                match vmlaunch_resume(generic_state.gprs, launched) {
                    0 => {
                        let rip = generic_state.vmcs.read(Field::GuestRip)?;
                        let exit = generic_state.vmcs.exit_reason()?;
                        crate::vmexits::dispatch_preamble(&generic_state.vmcs, &exit)?;
                        if let Err(err) = match exit.get_basic_reason()
                        {
                            BasicExitReason::ExternalInt(Some(ExternalIntInfo {
                                host_int,
                                ..
                            })) => {
                                return Ok(VmexitResult::ExtInt(*host_int));
                            }
                            BasicExitReason::InterruptWindow => {
                                let proc_based_ctls = VmcsProcBasedVmexecCtl::from_bits_unchecked(
                                    generic_state
                                        .vmcs
                                        .read(Field::ProcessorBasedVmexecControls)
                                        .expect("Failed to read vmcs field")
                                        as u32
                                        & !VmcsProcBasedVmexecCtl::INTRWINEXIT.bits(),
                                );
                                generic_state
                                    .vmcs
                                    .write(
                                        Field::ProcessorBasedVmexecControls,
                                        proc_based_ctls.bits() as u64,
                                    )
                                    .expect("Failed to update ProcessorBasedVmexecControls.");
                                Ok(())
                            }
                            BasicExitReason::NmiWindow => {
                                let proc_based_ctls = VmcsProcBasedVmexecCtl::from_bits_unchecked(
                                    generic_state
                                        .vmcs
                                        .read(Field::ProcessorBasedVmexecControls)
                                        .expect("Failed to read vmcs field")
                                        as u32
                                        & !VmcsProcBasedVmexecCtl::NMIWINEXIT.bits(),
                                );
                                generic_state
                                    .vmcs
                                    .write(
                                        Field::ProcessorBasedVmexecControls,
                                        proc_based_ctls.bits() as u64,
                                    )
                                    .expect("Failed to update ProcessorBasedVmexecControls.");
                                Ok(())
                            }
                            _ => match vcpu_state.handle_vmexit(generic_state) {
                                Ok(VmexitResult::Ok) => Ok(()),
                                r => return r,
                            },
                        } {
                            println!("err {:?} rip: {:x}", err, rip);
                            generic_state.vmcs.dump();
                            return Err(err);
                        }
                    }
                    1 | 2 => return Err(VmError::VmxOperationError(Vmcs::instruction_error())),
                    _ => unreachable!(),
                }
            }
        }
    }
}

impl<'a, S: VmState> Drop for Activated<'a, S> {
    fn drop(&mut self) {
        *self.launched = false;
        self.vmcs.clear().unwrap();
    }
}

/// Possible result of the Vmexit.
pub enum VmexitResult {
    /// VCpu can be continued.
    Ok,
    /// VCpu is exited.
    Exited(i32),
    /// External Interrupt is come.
    ///
    /// This is for internal-control uses.
    ExtInt(u8),
    /// VCpu is kicked.
    ///
    /// This is for internal-control uses.
    Kicked,
}
