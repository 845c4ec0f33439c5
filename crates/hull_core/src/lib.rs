//! # hull_core - Hull Item Engine Core
//!
//! Zero-dependency primitives shared by the item engine and the gameplay
//! modules that consume it:
//! - **Handles**: generational references into per-arena catalog tables
//! - **Identifiers**: players, ships and (ship, shipset) hull keys

pub mod handle;
pub mod id;

pub use handle::*;
pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handle::Handle;
    pub use crate::id::{HullKey, PlayerId, Ship};
}
