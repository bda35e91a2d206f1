use thiserror::Error;

#[derive(Error, Debug)]
pub enum CisMapError {
    /// Fewer aligned tissue observations than a correlation needs.
    #[error("Insufficient data: {observed} aligned observations, at least {required} required")]
    InsufficientData { observed: usize, required: usize },

    /// Zero-variance or non-finite vectors; the coefficient is undefined.
    #[error("Correlation is undefined: {0}")]
    UndefinedCorrelation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing annotation: {0}")]
    MissingAnnotation(String),

    #[error("Nothing to report: {0}")]
    EmptyCorpus(String),

    #[error("Error parsing input: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CisMapError {
    ///
    /// Whether the error only concerns a single (TSS, locus, histone)
    /// candidate. Such errors are logged and the candidate skipped.
    ///
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            CisMapError::InsufficientData { .. } | CisMapError::UndefinedCorrelation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CisMapError>;
