//! Pattern detectors
//!
//! All detectors read candles most-recent-first: index 0 is the latest
//! session, index 1 the one before it, and so on.
//!
//! # Pattern Categories
//!
//! - **Two-bar (3)**: Bearish Engulfing, Bullish Engulfing, Dark Cloud Cover
//! - **Three-bar (1)**: Three Black Crows
//! - **Momentum (2)**: Call-option and put-option percentage-change heuristics

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod momentum;
pub mod three_bar;
pub mod two_bar;

// Re-export all detectors for convenience
pub use helpers::*;
pub use momentum::*;
pub use three_bar::*;
pub use two_bar::*;
