//! Parameter metadata for pattern detectors
//!
//! Tunable thresholds are described by [`ParamMeta`] so they can be listed
//! and checked against their accepted range before a detector is built.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use tradedesk::params::ParameterizedDetector;
//! use tradedesk::prelude::*;
//!
//! for param in ThreeBlackCrowsDetector::param_meta() {
//!     println!("{} (default: {})", param.name, param.default);
//! }
//!
//! let mut params = HashMap::new();
//! params.insert("min_body_ratio", 0.6);
//! let detector = ThreeBlackCrowsDetector::with_params(&params).unwrap();
//! assert_eq!(detector.min_body_ratio.get(), 0.6);
//! ```

use std::collections::HashMap;

use crate::{Ratio, Result, TradeDeskError};

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "min_body_ratio")
  pub name: &'static str,
  /// Default value
  pub default: f64,
  /// Accepted values: (min, max), inclusive
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn new(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(TradeDeskError::OutOfRange { field: self.name, value, min, max });
    }
    Ok(())
  }
}

/// Trait for detectors that support parameterization
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Returns the pattern ID string
  fn pattern_id_str() -> &'static str;
}

/// Read `meta.name` from params as a Ratio, falling back to `meta.default`
///
/// The value must lie in `meta.range`.
pub fn get_ratio(params: &HashMap<&str, f64>, meta: &ParamMeta) -> Result<Ratio> {
  let value = params.get(meta.name).copied().unwrap_or(meta.default);
  meta.validate(value)?;
  Ratio::new(value)
}
