//! A bare-metal Intel VMX virtual machine monitor core.
//!
//! This crate provides the root-mode building blocks a type-2 hypervisor running on top of
//! [`keos`] composes into a concrete monitor: VMX capability probing, a VMCS field cache, a
//! host memory manager, per-physical-cpu gcpu scheduling, cross-cpu IPC/NMI coordination, and
//! the vm-exit dispatch and resume path. A concrete monitor supplies a [`vcpu::VCpuState`] and
//! a [`vm::VmState`] impl and gets the rest -- VMLAUNCH/VMRESUME framing, control-field setup,
//! capability probing -- from this crate.
#![cfg_attr(not(test), no_std)]
#![feature(
    alloc_layout_extra,
    abi_x86_interrupt,
    asm_const,
    const_mut_refs,
    core_intrinsics,
    naked_functions,
    negative_impls
)]

#[macro_use]
extern crate abyss;
extern crate alloc;

pub mod capability;
pub mod config;
pub mod error;
pub mod hmm;
pub mod ipc;
pub mod primitives;
pub mod probe;
pub mod scheduler;
pub mod vcpu;
pub mod vm;
pub mod vm_control;
pub mod vmcs;
pub mod vmcs_cache;
pub mod vmexits;

pub use error::VmError;

/// One-time, boot-cpu-only setup: probe and cache VMX capabilities, assert the features this
/// monitor requires are present. Must run once on the BSP before any [`vm::VmBuilder`] is used,
/// and `capability::assert_matches_bsp` must run once on every AP before it enters its own
/// gcpu loop.
///
/// # Safety
/// Must be called exactly once, from the bootstrap processor, before any vm is built and
/// before any application processor calls [`capability::assert_matches_bsp`].
pub unsafe fn init_bsp() {
    capability::init_bsp();
}
