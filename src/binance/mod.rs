pub mod fetcher;
pub mod gateway;

// Re-export the transport seam and the paginated fetcher.
pub use fetcher::{Fetcher, KlineSource};
pub use gateway::BinanceGateway;
