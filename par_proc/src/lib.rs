//! Parallel processing
#![deny(missing_docs)]

mod par_proc;

pub use par_proc::{ComputeContext, JobHandle, LocalContext};
