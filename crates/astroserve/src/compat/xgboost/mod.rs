//! XGBoost JSON model format support.
//!
//! Parsing of XGBoost's JSON model format and conversion to native types.

mod convert;
mod json;

pub use convert::{Booster, ConversionError};
pub use json::*;
