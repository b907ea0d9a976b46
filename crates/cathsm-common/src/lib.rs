//! cathsm-common — Shared types used across all CATH-SM pipeline crates.

pub mod error;
pub mod fasta;
pub mod ident;

pub use error::CommonError;
pub use fasta::{read_fasta_file, SequenceRecord};
pub use ident::safe_id;
