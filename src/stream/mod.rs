// file: src/stream/mod.rs
// description: submission byte sources and line splitting
// reference: internal module structure

pub mod source;
pub mod splitter;

pub use source::{DownloadParams, SubmissionSource, SubmissionsClient, open_file};
pub use splitter::{ByteStream, LineSplitter};
