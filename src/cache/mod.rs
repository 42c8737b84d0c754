pub mod hot;
pub mod warm;

// Re-export the two in-memory tiers (e.g. `use crate::cache::HotCache`).
pub use hot::HotCache;
pub use warm::WarmCache;
