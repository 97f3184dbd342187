//! Warren Engine Core
//!
//! The storage-and-dispatch core of the engine:
//! - paged, type-erased entity storage with bitmap occupancy tracking
//! - per-type function tables generated at registration time
//! - stable descriptors plus reuse-detecting id/version references
//! - typed message dispatch, batched through strided views

pub mod store;
pub mod strided;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
