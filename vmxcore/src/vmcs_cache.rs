//! Dirty/valid field cache layered over the hardware VMCS accessors in [`crate::vmcs`].
//!
//! [`crate::vmcs::ActiveVmcs::read`]/`write` talk to hardware on every call. This module adds
//! a software mirror on top: reads against a cache-valid entry never touch hardware, writes
//! mark a field dirty instead of issuing VMWRITE immediately, and
//! [`VmcsCache::flush`] walks the dirty set once per resume. The processor-based execution
//! controls field gets a dedicated transactional flush so the NMI ISR can race it safely.
use crate::primitives::U64HashMap;
use crate::vm_control::VmcsProcBasedVmexecCtl;
use crate::vmcs::{ActiveVmcs, Field};
use crate::VmError;
use core::sync::atomic::{AtomicU32, Ordering};

/// Which of the three access classes a field falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Hardware-written exit-info field; software may never write it, and the cache must be
    /// invalidated (not just left stale) at the start of every exit handler.
    ReadOnly,
    /// Ordinary software-writable field with no special hardware interaction.
    Writable,
    /// Software-writable, but hardware also updates it as a side effect of execution (e.g.
    /// guest activity/interruptibility state); treated the same as `Writable` by the cache,
    /// called out separately because callers must not assume their last write still holds
    /// after a vm-exit without re-validating.
    WritableInCache,
}

/// Classify a VMCS field's access discipline.
pub fn field_class(field: Field) -> FieldClass {
    use Field::*;
    match field {
        InstructionError | VmexitReason | VmexitInterruptionInfo | VmexitInterruptionErrCode
        | IdtVectoringInfo | IdtVectoringErrCode | VmexitInstructionLength
        | VmexitInstructionInfo | VmexitQualification | IoRcx | IoRsi | IoRdi | IoRip
        | GuestLinearAddr | GuestPhysicalAddr | GuestPhysicalAddrHi => FieldClass::ReadOnly,
        GuestInterruptibilityState | GuestActivityState => FieldClass::WritableInCache,
        _ => FieldClass::Writable,
    }
}

struct CacheEntry {
    value: u64,
    dirty: bool,
}

/// Outcome of a transactional flush attempt on the processor-based execution controls field,
/// used to arbitrate against a concurrent NMI ISR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateStatus {
    Succeeded = 0,
    Finished = 1,
    Failed = 2,
}

/// Software cache over one activated VMCS's fields.
pub struct VmcsCache {
    entries: U64HashMap<CacheEntry>,
    update_status: AtomicU32,
}

impl VmcsCache {
    /// A cache with nothing cached yet.
    pub fn new() -> Self {
        Self {
            entries: U64HashMap::with_capacity(64),
            update_status: AtomicU32::new(UpdateStatus::Finished as u32),
        }
    }

    fn key(field: Field) -> u64 {
        field as i32 as u32 as u64
    }

    /// Invalidate every cached read-only field. Must run at the start of every vm-exit
    /// handler so the next read observes the hardware value for this exit, not a stale one
    /// from a previous exit.
    pub fn invalidate_readonly(&mut self) {
        // A hashmap-of-chains has no cheap "retain matching a classifier" without rebuilding;
        // read-only fields are few and well known, so drop them by key explicitly.
        for field in READONLY_FIELDS {
            self.entries.remove(Self::key(*field));
        }
    }

    /// Read `field`, consulting the cache first.
    ///
    /// Read-only fields always go to hardware (after, per the invalidation contract above,
    /// any stale entry has already been dropped). Writable fields return the cached value
    /// without touching hardware if present.
    pub fn read(&mut self, vmcs: &ActiveVmcs, field: Field) -> Result<u64, VmError> {
        match field_class(field) {
            FieldClass::ReadOnly => vmcs.read(field),
            FieldClass::Writable | FieldClass::WritableInCache => {
                if let Some(entry) = self.entries.get(Self::key(field)) {
                    Ok(entry.value)
                } else {
                    let v = vmcs.read(field)?;
                    self.entries.insert(Self::key(field), CacheEntry { value: v, dirty: false });
                    Ok(v)
                }
            }
        }
    }

    /// Write `field`, marking it dirty instead of issuing VMWRITE immediately.
    ///
    /// Writes to read-only fields are silently dropped, matching hardware's own behavior of
    /// rejecting a VMWRITE to such a field.
    pub fn write(&mut self, field: Field, value: u64) {
        if field_class(field) == FieldClass::ReadOnly {
            return;
        }
        self.entries.insert(Self::key(field), CacheEntry { value, dirty: true });
    }

    /// Flush every dirty field to hardware, using the transactional protocol for the
    /// processor-based execution controls field so a racing NMI ISR's edit is never lost.
    pub fn flush(&mut self, vmcs: &ActiveVmcs, nmi_window_pending: bool) -> Result<(), VmError> {
        for field in ALL_WRITABLE_FIELDS {
            let key = Self::key(*field);
            let dirty = self.entries.get(key).map(|e| e.dirty).unwrap_or(false);
            if !dirty {
                continue;
            }
            if *field == Field::ProcessorBasedVmexecControls {
                self.flush_proc_based_transactional(vmcs, nmi_window_pending)?;
            } else {
                let value = self.entries.get(key).unwrap().value;
                vmcs.write(*field, value)?;
            }
            if let Some(entry) = self.entries.get_mut(key) {
                entry.dirty = false;
            }
        }
        Ok(())
    }

    /// NMI-window transactional flush.
    ///
    /// Loops writing the processor-based controls until a CAS confirms the NMI ISR did not
    /// spoil the update mid-flight. The ISR itself forces `update_status` to `Failed` and
    /// OR's the NMI-window bit directly, so it always wins a race against this loop.
    fn flush_proc_based_transactional(
        &mut self,
        vmcs: &ActiveVmcs,
        nmi_window_pending: bool,
    ) -> Result<(), VmError> {
        loop {
            self.update_status
                .store(UpdateStatus::Succeeded as u32, Ordering::SeqCst);
            let mut value = self
                .entries
                .get(Self::key(Field::ProcessorBasedVmexecControls))
                .map(|e| e.value)
                .unwrap_or(0);
            if nmi_window_pending {
                value |= VmcsProcBasedVmexecCtl::NMIWINEXIT.bits() as u64;
            }
            vmcs.write(Field::ProcessorBasedVmexecControls, value)?;
            if self
                .update_status
                .compare_exchange(
                    UpdateStatus::Succeeded as u32,
                    UpdateStatus::Finished as u32,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Called from the NMI ISR: force the next in-flight flush to retry, then OR the
    /// NMI-window bit into the hardware field directly so a flush racing the ISR still sees
    /// it requested even before the retry loop reruns.
    pub fn nmi_spoil_inflight_flush(&self, vmcs: &ActiveVmcs) -> Result<(), VmError> {
        self.update_status
            .store(UpdateStatus::Failed as u32, Ordering::SeqCst);
        let current = vmcs.read(Field::ProcessorBasedVmexecControls)?;
        vmcs.write(
            Field::ProcessorBasedVmexecControls,
            current | VmcsProcBasedVmexecCtl::NMIWINEXIT.bits() as u64,
        )
    }
}

impl Default for VmcsCache {
    fn default() -> Self {
        Self::new()
    }
}

const READONLY_FIELDS: &[Field] = &[
    Field::InstructionError,
    Field::VmexitReason,
    Field::VmexitInterruptionInfo,
    Field::VmexitInterruptionErrCode,
    Field::IdtVectoringInfo,
    Field::IdtVectoringErrCode,
    Field::VmexitInstructionLength,
    Field::VmexitInstructionInfo,
    Field::VmexitQualification,
    Field::IoRcx,
    Field::IoRsi,
    Field::IoRdi,
    Field::IoRip,
    Field::GuestLinearAddr,
    Field::GuestPhysicalAddr,
    Field::GuestPhysicalAddrHi,
];

/// Every writable field this monitor actually touches; kept as an explicit list (rather than
/// walking the whole `Field` enum) since flushing is a hot path run once per resume.
const ALL_WRITABLE_FIELDS: &[Field] = &[
    Field::PinBasedExecControls,
    Field::ProcessorBasedVmexecControls,
    Field::SecondaryVmexecControls,
    Field::ExceptionBitmap,
    Field::VmexitControls,
    Field::VmentryControls,
    Field::VmentryInterruptionInfo,
    Field::VmentryExceptionErrCode,
    Field::VmentryInstructionLength,
    Field::Cr0GuestHostMask,
    Field::Cr4GuestHostMask,
    Field::Cr0ReadShadow,
    Field::Cr4ReadShadow,
    Field::GuestCr0,
    Field::GuestCr3,
    Field::GuestCr4,
    Field::GuestRsp,
    Field::GuestRip,
    Field::GuestRflags,
    Field::GuestEsSelector,
    Field::GuestCsSelector,
    Field::GuestSsSelector,
    Field::GuestDsSelector,
    Field::GuestFsSelector,
    Field::GuestGsSelector,
    Field::GuestTrSelector,
    Field::GuestLdtrSelector,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_cached_value_without_hardware() {
        // Pure bookkeeping test: verify the dirty-marking logic without touching real VMX
        // hardware, by inspecting the cache's internal entries directly.
        let mut cache = VmcsCache::new();
        cache.write(Field::GuestRip, 0xDEAD_BEEF_CAFE_0000);
        let entry = cache.entries.get(VmcsCache::key(Field::GuestRip)).unwrap();
        assert_eq!(entry.value, 0xDEAD_BEEF_CAFE_0000);
        assert!(entry.dirty);
    }

    #[test]
    fn write_to_readonly_field_is_dropped() {
        let mut cache = VmcsCache::new();
        cache.write(Field::VmexitReason, 0x12);
        assert!(cache.entries.get(VmcsCache::key(Field::VmexitReason)).is_none());
    }

    #[test]
    fn field_classification_matches_access_rules() {
        assert_eq!(field_class(Field::VmexitReason), FieldClass::ReadOnly);
        assert_eq!(field_class(Field::GuestRip), FieldClass::Writable);
        assert_eq!(
            field_class(Field::GuestActivityState),
            FieldClass::WritableInCache
        );
    }
}
