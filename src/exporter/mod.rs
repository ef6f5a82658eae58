// file: src/exporter/mod.rs
// description: csv accumulation and attachment output
// reference: internal module structure

pub mod accumulator;
pub mod document;
pub mod response;
pub mod sanitize;
pub mod throttle;

pub use accumulator::{CsvAccumulator, SUMMARY_ROWS};
pub use document::{CsvDocument, UTF8_BOM};
pub use response::Response;
pub use sanitize::escape_formula;
pub use throttle::AttachmentThrottler;
