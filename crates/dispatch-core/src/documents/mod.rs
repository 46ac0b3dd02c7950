//! Document validation and assembly

pub mod assembler;

pub use assembler::{AssembledDocument, DocumentAssembler};
