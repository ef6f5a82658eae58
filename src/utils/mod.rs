// file: src/utils/mod.rs
// description: utility functions module exports
// reference: internal module structure

pub mod logging;
pub mod timestamp;
pub mod validation;

pub use timestamp::{ReferenceZone, epoch_millis};
pub use validation::Validator;
