//! Readers for model formats produced by other libraries.

pub mod xgboost;
