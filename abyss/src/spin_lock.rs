//! Re-export of the standalone spinlock crate under the HAL's namespace.
pub use spin_lock::*;
