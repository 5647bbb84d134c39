//! Page-level lock management.

pub mod lock;

pub use lock::{LockManager, LockMode};
