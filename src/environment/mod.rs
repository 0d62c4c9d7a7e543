//! Target environments and run parameters.
//!
//! Every run targets exactly one of the four org environments. The
//! environment drives credential selection, validation, approval and the
//! ticket state reached after deployment, so each of those decisions is an
//! exhaustive match over [`Environment`].

pub mod parameters;
pub mod target;

pub use parameters::{RunParameters, TestLevel};
pub use target::{ApproverRole, Environment};
