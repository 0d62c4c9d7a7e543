//! Secret masking.
//!
//! - [`OutputMasker`] - Masks secret values in output streams
//! - [`MaskingWriter`] - `Write` adapter that masks line by line

pub mod mask;

pub use mask::{MaskingWriter, OutputMasker};
