//! # cismap-links
//!
//! Predicts regulatory links between regulatory elements and genes by
//! correlating histone-mark signal at each element with TSS expression
//! across tissues, then corrects the resulting p-values hierarchically per
//! element, TSS and gene.
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use cismap_core::models::TssAnnotation;
//! use cismap_core::models::locus::read_loci;
//! use cismap_links::config::PipelineConfig;
//! use cismap_links::signal::TissueMatrixProvider;
//! use cismap_links::pipeline::predict_links;
//!
//! let config = PipelineConfig::try_from(Path::new("cismap.toml")).unwrap();
//! let provider = TissueMatrixProvider::from_config(&config).unwrap();
//! let annotation = TssAnnotation::try_from(Path::new("tss.bed")).unwrap();
//! let loci = read_loci(Path::new("peaks.bed")).unwrap();
//!
//! let table = predict_links(&config, &provider, &annotation, &loci).unwrap();
//! for link in table.gene_targets() {
//!     println!("{}\t{}\t{:e}", link.gene_id, link.re_locus, link.gene_score);
//! }
//! ```
pub mod adjust;
pub mod builder;
pub mod config;
pub mod correlation;
pub mod errors;
pub mod export;
pub mod filter;
pub mod pipeline;
pub mod select;
pub mod signal;
pub mod table;

// re-exports
pub use adjust::{LinkArena, ScoreAdjuster, adjust};
pub use builder::{BuildParams, BuildReport, LinkBuilder};
pub use config::{HistoneConfig, PipelineConfig, UpstreamFilter};
pub use correlation::{Correlation, CorrelationBackend, PearsonFisher, correlate};
pub use errors::{LinkError, LinkResult};
pub use filter::{FilterSpec, LinkFilter, LinkOrder};
pub use pipeline::predict_links;
pub use select::LinkSelector;
pub use signal::{AlignedSignals, SignalMatrix, SignalProvider, TissueMatrixProvider};
pub use table::ResultTable;
