#![forbid(unsafe_code)]

//! Public entry point for the tubefetch crate.
//!
//! Everything lives in the [`pipeline`] module: resolve a URL into a stream
//! catalog, pick streams, fetch them, merge split halves with the external
//! encoder, and deliver the finished bytes. The `fetch` and `backend`
//! binaries are thin shells over it.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
