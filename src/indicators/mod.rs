// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free building blocks for the feature extractor. Every
// public function takes a close-price slice and returns `Option<T>` or an
// empty series so callers are forced to handle insufficient-data and
// numerical-edge-case scenarios.

pub mod bollinger;
pub mod ema;
pub mod roc;
pub mod rsi;
