use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::CisMapError;
use crate::models::strand::Strand;

///
/// Direction of a correlation as shown in the summary views.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorrelationSign {
    #[serde(rename = "+")]
    Positive,
    #[serde(rename = "-")]
    Negative,
}

impl CorrelationSign {
    ///
    /// `+` only for strictly positive correlations; zero counts as `-`.
    ///
    pub fn of(correlation: f64) -> Self {
        if correlation > 0.0 {
            CorrelationSign::Positive
        } else {
            CorrelationSign::Negative
        }
    }
}

impl Display for CorrelationSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationSign::Positive => write!(f, "+"),
            CorrelationSign::Negative => write!(f, "-"),
        }
    }
}

impl TryFrom<&str> for CorrelationSign {
    type Error = CisMapError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim() {
            "+" | "positive" | "Positive" => Ok(CorrelationSign::Positive),
            "-" | "negative" | "Negative" => Ok(CorrelationSign::Negative),
            other => Err(CisMapError::InvalidArgument(format!(
                "Invalid correlation sign '{}', expected '+' or '-'",
                other
            ))),
        }
    }
}

///
/// One correlation measurement between a histone mark at a regulatory
/// element and the expression of a gene's TSS.
///
/// Built with raw `correlation`/`score`; adjusted scores, flags and
/// counters are filled in place by the adjustment and selection passes.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryLink {
    pub gene_id: String,
    pub gene_name: Option<String>,
    pub tss_id: String,
    pub tss_locus: String,
    pub strand: Strand,
    pub re_locus: String,
    pub distance: i64,
    pub histone: String,
    pub correlation: f64,
    pub score: f64,
    pub re_score: f64,
    pub best_histone: bool,
    pub best_re: bool,
    pub tss_score: f64,
    pub best_tss: bool,
    pub gene_score: f64,
    pub loci_per_tss: usize,
    pub tsses_per_gene: usize,
    pub num_tsses: usize,
    pub num_genes: usize,
}

impl RegulatoryLink {
    ///
    /// A freshly measured link. Adjusted scores start equal to the raw score.
    ///
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gene_id: &str,
        gene_name: Option<&str>,
        tss_id: &str,
        tss_locus: &str,
        strand: Strand,
        re_locus: &str,
        distance: i64,
        histone: &str,
        correlation: f64,
        score: f64,
    ) -> Self {
        RegulatoryLink {
            gene_id: gene_id.to_string(),
            gene_name: gene_name.map(str::to_string),
            tss_id: tss_id.to_string(),
            tss_locus: tss_locus.to_string(),
            strand,
            re_locus: re_locus.to_string(),
            distance,
            histone: histone.to_string(),
            correlation,
            score,
            re_score: score,
            best_histone: false,
            best_re: false,
            tss_score: score,
            best_tss: false,
            gene_score: score,
            loci_per_tss: 0,
            tsses_per_gene: 0,
            num_tsses: 0,
            num_genes: 0,
        }
    }

    pub fn correlation_sign(&self) -> CorrelationSign {
        CorrelationSign::of(self.correlation)
    }

    pub fn abs_distance(&self) -> u64 {
        self.distance.unsigned_abs()
    }

    ///
    /// Gene name for display; `.` when the annotation has none.
    ///
    pub fn display_gene_name(&self) -> &str {
        self.gene_name.as_deref().unwrap_or(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn link() -> RegulatoryLink {
        RegulatoryLink::new(
            "G1",
            None,
            "T1",
            "chr1:100-101",
            Strand::Forward,
            "chr1:10-20",
            -80,
            "H3K27ac",
            -0.4,
            0.02,
        )
    }

    #[rstest]
    fn test_new_link_defaults(link: RegulatoryLink) {
        assert_eq!(link.re_score, 0.02);
        assert_eq!(link.tss_score, 0.02);
        assert_eq!(link.gene_score, 0.02);
        assert!(!link.best_re && !link.best_tss && !link.best_histone);
        assert_eq!(link.display_gene_name(), ".");
        assert_eq!(link.abs_distance(), 80);
        assert_eq!(link.correlation_sign(), CorrelationSign::Negative);
    }

    #[rstest]
    #[case(0.3, CorrelationSign::Positive)]
    #[case(0.0, CorrelationSign::Negative)]
    #[case(-0.3, CorrelationSign::Negative)]
    fn test_sign_of(#[case] r: f64, #[case] expected: CorrelationSign) {
        assert_eq!(CorrelationSign::of(r), expected);
    }

    #[rstest]
    fn test_sign_parse() {
        assert_eq!(CorrelationSign::try_from("+").unwrap(), CorrelationSign::Positive);
        assert_eq!(CorrelationSign::try_from("-").unwrap(), CorrelationSign::Negative);
        assert!(CorrelationSign::try_from("up").is_err());
    }
}
