//! Host memory manager: the monitor's view of its own physical/virtual memory.
//!
//! The HAL ([`abyss::addressing`]) already maintains a bijective HVA<->HPA map via a constant
//! virtual offset applied to all of physical memory, and [`keos::mm`] already provides a
//! bitmap-backed physical page allocator on top of it. This module adds the bookkeeping the
//! monitor-specific contract needs on top of that foundation: per-page write/execute attribute
//! tracking (so monitor code pages are enforceably W^X), guard pages around per-cpu exception
//! stacks, and the translation entry points every other component calls through.
use crate::primitives::RwLock;
use abyss::addressing::{Pa, Va, PAGE_SIZE};
use alloc::vec::Vec;
use keos::mm::Page;

/// Access rights tracked per mapped page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAttrs {
    /// Whether the page may be written by monitor code.
    pub writable: bool,
    /// Whether the page may be fetched from by monitor code.
    pub executable: bool,
    /// Whether the page is an intentional unmapped hole (guard page).
    pub guard: bool,
}

impl PageAttrs {
    /// Ordinary read/write data page.
    pub const RW: Self = Self {
        writable: true,
        executable: false,
        guard: false,
    };
    /// Read-only data page.
    pub const RO: Self = Self {
        writable: false,
        executable: false,
        guard: false,
    };
    /// Executable code page (never writable: W^X).
    pub const RX: Self = Self {
        writable: false,
        executable: true,
        guard: false,
    };
    /// An explicit guard hole: neither readable, writable, nor executable.
    pub const GUARD: Self = Self {
        writable: false,
        executable: false,
        guard: true,
    };

    fn is_wx_safe(&self) -> bool {
        !(self.writable && self.executable)
    }
}

struct Mapping {
    hva: Va,
    attrs: PageAttrs,
}

/// The monitor's host memory manager.
///
/// Registration is a write operation (init-time section scan, per-cpu guard-page setup);
/// translation and attribute lookups are reads. Both go through the same [`RwLock`] so many
/// vm-exit handlers can translate addresses concurrently while registration stays rare.
pub struct HostMemoryManager {
    mappings: RwLock<Vec<Mapping>>,
}

impl HostMemoryManager {
    /// An empty manager with no registered pages.
    pub const fn new() -> Self {
        Self {
            mappings: RwLock::new(Vec::new()),
        }
    }

    /// Translate a host virtual address to its host physical address.
    ///
    /// Uses the HAL's constant-offset direct map; always succeeds for any address the HAL
    /// considers a valid kernel VA, independent of whether the page has been registered here.
    pub fn hva_to_hpa(&self, hva: Va) -> Pa {
        hva.into_pa()
    }

    /// Translate a host physical address to its host virtual address.
    pub fn hpa_to_hva(&self, hpa: Pa) -> Va {
        hpa.into_va()
    }

    /// Register a page's access attributes. Called at init time while scanning the monitor
    /// image's sections, and at runtime when a fresh page is carved out for a guest-facing
    /// buffer (MSR lists, I/O bitmaps, the VMCS region itself).
    ///
    /// Returns an error if the attributes would violate W^X -- this monitor never maps a page
    /// both writable and executable.
    pub fn register(&self, hva: Va, attrs: PageAttrs) -> Result<(), crate::VmError> {
        if !attrs.is_wx_safe() {
            return Err(crate::VmError::HmmMappingFailed);
        }
        let mut mappings = self.mappings.write();
        if let Some(existing) = mappings.iter_mut().find(|m| m.hva == hva) {
            existing.attrs = attrs;
        } else {
            mappings.push(Mapping { hva, attrs });
        }
        Ok(())
    }

    /// Look up the attributes registered for `hva`, if any.
    pub fn attrs_of(&self, hva: Va) -> Option<PageAttrs> {
        self.mappings
            .read()
            .iter()
            .find(|m| m.hva == hva)
            .map(|m| m.attrs)
    }

    /// Register every section of the monitor's own image with its proper W^X attributes.
    ///
    /// `sections` is `(start, end, writable, executable)` per section, as handed down in the
    /// loader's `evmm_desc.mon_memory_layout` descriptor.
    pub fn register_image_sections(
        &self,
        sections: &[(Va, Va, bool, bool)],
    ) -> Result<(), crate::VmError> {
        for &(start, end, writable, executable) in sections {
            let mut va = start;
            while va < end {
                self.register(
                    va,
                    PageAttrs {
                        writable,
                        executable,
                        guard: false,
                    },
                )?;
                va += PAGE_SIZE;
            }
        }
        Ok(())
    }

    /// Allocate a guarded stack: a mapped page flanked on both sides by registered guard
    /// holes, so overflow and underflow are recorded here (and can be asserted against by a
    /// page-fault handler) rather than silently corrupting an adjacent allocation.
    ///
    /// Returns the mapped stack page; the two neighboring guard virtual addresses are
    /// registered but never backed by a real page.
    pub fn alloc_guarded_stack(&self) -> Result<Page, crate::VmError> {
        let page = Page::new().ok_or(crate::VmError::HmmMappingFailed)?;
        let va = page.va();
        self.register(va - PAGE_SIZE, PageAttrs::GUARD)?;
        self.register(va, PageAttrs::RW)?;
        self.register(va + PAGE_SIZE, PageAttrs::GUARD)?;
        Ok(page)
    }

    /// Whether `hva` falls on a page registered as a guard hole.
    pub fn is_guard_page(&self, hva: Va) -> bool {
        matches!(self.attrs_of(page_align(hva)), Some(a) if a.guard)
    }
}

fn page_align(va: Va) -> Va {
    let raw = unsafe { va.into_usize() } & !(PAGE_SIZE - 1);
    Va::new(raw).expect("page-aligning a valid VA stays valid")
}

/// The crate-wide host memory manager instance.
pub static HMM: HostMemoryManager = HostMemoryManager::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_writable_and_executable() {
        let hmm = HostMemoryManager::new();
        let va = Va::new(0x1000).unwrap();
        assert!(hmm
            .register(
                va,
                PageAttrs {
                    writable: true,
                    executable: true,
                    guard: false,
                },
            )
            .is_err());
    }

    #[test]
    fn register_and_lookup_round_trips() {
        let hmm = HostMemoryManager::new();
        let va = Va::new(0x2000).unwrap();
        hmm.register(va, PageAttrs::RX).unwrap();
        assert_eq!(hmm.attrs_of(va), Some(PageAttrs::RX));
    }

    #[test]
    fn hva_hpa_round_trip() {
        let hmm = HostMemoryManager::new();
        let va = Va::new(0xffff_0000_0000_1000).unwrap_or_else(|| Va::new(0x1000).unwrap());
        let hpa = hmm.hva_to_hpa(va);
        assert_eq!(hmm.hpa_to_hva(hpa), va);
    }
}
