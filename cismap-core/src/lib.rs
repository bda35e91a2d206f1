//! # cismap-core
//!
//! Shared models for cismap: regulatory element loci, the TSS annotation,
//! and the regulatory link records produced by the link prediction pipeline.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use cismap_core::models::TssAnnotation;
//! use cismap_core::models::locus::read_loci;
//!
//! let annotation = TssAnnotation::try_from(Path::new("tss.bed.gz")).unwrap();
//! let loci = read_loci(Path::new("peaks.bed")).unwrap();
//! println!("{} TSSes, {} loci", annotation.len(), loci.len());
//! ```
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::{CisMapError, Result};
