//! Types shared across vdlaunch crates.

pub mod errors;

pub use errors::{VdError, VdResult};
