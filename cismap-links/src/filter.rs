//! Filter predicates and sort orders over regulatory links.
//!
//! Mirrors the interactive filter form: every predicate is optional, and an
//! entry that does not parse disables only its own predicate.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use cismap_core::errors::CisMapError;
use cismap_core::models::{CorrelationSign, RegulatoryLink};

///
/// Compiled link predicates. The default filter accepts every link.
///
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub best_tss_only: bool,
    pub best_re_only: bool,
    pub gene_id: Option<Regex>,
    pub gene_name: Option<Regex>,
    pub tss_id: Option<Regex>,
    pub re_locus: Option<Regex>,
    /// inclusive `[ge, le]` on `|distance|`
    pub absolute_distance: Option<(f64, f64)>,
    /// inclusive `[ge, le]` on the signed distance
    pub distance: Option<(f64, f64)>,
    pub correlation_sign: Option<CorrelationSign>,
    /// links with `score` above the ceiling are excluded
    pub score: Option<f64>,
    pub gene_score: Option<f64>,
}

impl LinkFilter {
    pub fn matches(&self, link: &RegulatoryLink) -> bool {
        if self.best_tss_only && !link.best_tss {
            return false;
        }
        if self.best_re_only && !link.best_re {
            return false;
        }
        if self.gene_id.as_ref().is_some_and(|re| !re.is_match(&link.gene_id)) {
            return false;
        }
        if self.gene_name.as_ref().is_some_and(|re| !re.is_match(link.display_gene_name())) {
            return false;
        }
        if self.tss_id.as_ref().is_some_and(|re| !re.is_match(&link.tss_id)) {
            return false;
        }
        if self.re_locus.as_ref().is_some_and(|re| !re.is_match(&link.re_locus)) {
            return false;
        }
        if let Some((ge, le)) = self.absolute_distance {
            let d = link.abs_distance() as f64;
            if d < ge || d > le {
                return false;
            }
        }
        if let Some((ge, le)) = self.distance {
            let d = link.distance as f64;
            if d < ge || d > le {
                return false;
            }
        }
        if self
            .correlation_sign
            .is_some_and(|sign| link.correlation_sign() != sign)
        {
            return false;
        }
        if self.score.is_some_and(|ceiling| link.score > ceiling) {
            return false;
        }
        if self.gene_score.is_some_and(|ceiling| link.gene_score > ceiling) {
            return false;
        }
        true
    }

    ///
    /// Lazily keep the links that pass. Restartable: nothing is consumed
    /// from the underlying corpus.
    ///
    pub fn apply<'a, I>(&'a self, links: I) -> impl Iterator<Item = &'a RegulatoryLink> + 'a
    where
        I: IntoIterator<Item = &'a RegulatoryLink>,
        I::IntoIter: 'a,
    {
        links.into_iter().filter(move |link| self.matches(link))
    }
}

///
/// Raw, string-valued filter entries as a user types them.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub best_tss: bool,
    #[serde(default)]
    pub best_re: bool,
    pub gene_id: Option<String>,
    pub gene_name: Option<String>,
    pub tss_id: Option<String>,
    pub re_locus: Option<String>,
    pub absolute_distance_ge: Option<String>,
    pub absolute_distance_le: Option<String>,
    pub distance_ge: Option<String>,
    pub distance_le: Option<String>,
    pub correlation_sign: Option<String>,
    pub score: Option<String>,
    pub gene_score: Option<String>,
}

fn compile_regex(field: &str, pattern: &Option<String>) -> Result<Option<Regex>, CisMapError> {
    match pattern.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(p) => RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .map(Some)
            .map_err(|e| CisMapError::InvalidArgument(format!("{}: invalid pattern: {}", field, e))),
    }
}

fn parse_number(field: &str, value: &str) -> Result<f64, CisMapError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| {
            CisMapError::InvalidArgument(format!("{}: '{}' is not a number", field, value.trim()))
        })
}

fn parse_optional_number(field: &str, value: &Option<String>) -> Result<Option<f64>, CisMapError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_number(field, v).map(Some),
    }
}

///
/// Parse a `[ge, le]` range; a missing bound is open.
///
fn parse_range(
    field: &str,
    ge: &Option<String>,
    le: &Option<String>,
    non_negative: bool,
) -> Result<Option<(f64, f64)>, CisMapError> {
    let ge_value = parse_optional_number(&format!("{}_ge", field), ge)?;
    let le_value = parse_optional_number(&format!("{}_le", field), le)?;
    if ge_value.is_none() && le_value.is_none() {
        return Ok(None);
    }

    let lower_default = if non_negative { 0.0 } else { f64::NEG_INFINITY };
    let ge_value = ge_value.unwrap_or(lower_default);
    let le_value = le_value.unwrap_or(f64::INFINITY);

    if non_negative && (ge_value < 0.0 || le_value < 0.0) {
        return Err(CisMapError::InvalidArgument(format!(
            "{}: bounds must not be negative",
            field
        )));
    }
    if ge_value > le_value {
        return Err(CisMapError::InvalidArgument(format!(
            "{}: lower bound {} exceeds upper bound {}",
            field, ge_value, le_value
        )));
    }
    Ok(Some((ge_value, le_value)))
}

fn parse_sign(value: &Option<String>) -> Result<Option<CorrelationSign>, CisMapError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => CorrelationSign::try_from(s).map(Some),
    }
}

fn keep<T>(errors: &mut Vec<CisMapError>, result: Result<Option<T>, CisMapError>) -> Option<T> {
    result.unwrap_or_else(|e| {
        errors.push(e);
        None
    })
}

impl FilterSpec {
    ///
    /// Compile into a [LinkFilter].
    ///
    /// # Returns
    ///
    /// The filter plus one `InvalidArgument` per rejected entry; rejected
    /// entries leave their predicate disabled.
    ///
    pub fn compile(&self) -> (LinkFilter, Vec<CisMapError>) {
        let mut errors = Vec::new();

        let gene_id = keep(&mut errors, compile_regex("gene_id", &self.gene_id));
        let gene_name = keep(&mut errors, compile_regex("gene_name", &self.gene_name));
        let tss_id = keep(&mut errors, compile_regex("tss_id", &self.tss_id));
        let re_locus = keep(&mut errors, compile_regex("re_locus", &self.re_locus));
        let absolute_distance = keep(
            &mut errors,
            parse_range(
                "absolute_distance",
                &self.absolute_distance_ge,
                &self.absolute_distance_le,
                true,
            ),
        );
        let distance = keep(
            &mut errors,
            parse_range("distance", &self.distance_ge, &self.distance_le, false),
        );
        let correlation_sign = keep(&mut errors, parse_sign(&self.correlation_sign));
        let score = keep(&mut errors, parse_optional_number("score", &self.score));
        let gene_score = keep(
            &mut errors,
            parse_optional_number("gene_score", &self.gene_score),
        );

        let filter = LinkFilter {
            best_tss_only: self.best_tss,
            best_re_only: self.best_re,
            gene_id,
            gene_name,
            tss_id,
            re_locus,
            absolute_distance,
            distance,
            correlation_sign,
            score,
            gene_score,
        };

        (filter, errors)
    }
}

///
/// Sort orders. Each compares its primary field(s) and then falls back to
/// `(tss_id, re_locus, histone)`, so distinct links never compare equal.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOrder {
    #[default]
    GeneScore,
    Score,
    TssScore,
    GeneId,
    GeneName,
    TssId,
    ReLocus,
    Distance,
    AbsoluteDistance,
    CorrelationSign,
}

pub const LINK_ORDERS: [LinkOrder; 10] = [
    LinkOrder::GeneScore,
    LinkOrder::Score,
    LinkOrder::TssScore,
    LinkOrder::GeneId,
    LinkOrder::GeneName,
    LinkOrder::TssId,
    LinkOrder::ReLocus,
    LinkOrder::Distance,
    LinkOrder::AbsoluteDistance,
    LinkOrder::CorrelationSign,
];

/// The terminal tie-break chain.
pub fn by_tss_id(a: &RegulatoryLink, b: &RegulatoryLink) -> Ordering {
    a.tss_id
        .cmp(&b.tss_id)
        .then_with(|| a.re_locus.cmp(&b.re_locus))
        .then_with(|| a.histone.cmp(&b.histone))
}

impl LinkOrder {
    pub fn name(&self) -> &'static str {
        match self {
            LinkOrder::GeneScore => "gene_score",
            LinkOrder::Score => "score",
            LinkOrder::TssScore => "tss_score",
            LinkOrder::GeneId => "gene_id",
            LinkOrder::GeneName => "gene_name",
            LinkOrder::TssId => "tss_id",
            LinkOrder::ReLocus => "re_locus",
            LinkOrder::Distance => "distance",
            LinkOrder::AbsoluteDistance => "absolute_distance",
            LinkOrder::CorrelationSign => "correlation_sign",
        }
    }

    pub fn compare(&self, a: &RegulatoryLink, b: &RegulatoryLink) -> Ordering {
        match self {
            LinkOrder::GeneScore => a
                .gene_score
                .total_cmp(&b.gene_score)
                .then_with(|| a.score.total_cmp(&b.score))
                .then_with(|| by_tss_id(a, b)),
            LinkOrder::Score => a.score.total_cmp(&b.score).then_with(|| by_tss_id(a, b)),
            LinkOrder::TssScore => a
                .tss_score
                .total_cmp(&b.tss_score)
                .then_with(|| a.score.total_cmp(&b.score))
                .then_with(|| by_tss_id(a, b)),
            LinkOrder::GeneId => a.gene_id.cmp(&b.gene_id).then_with(|| by_tss_id(a, b)),
            LinkOrder::GeneName => a
                .display_gene_name()
                .cmp(b.display_gene_name())
                .then_with(|| by_tss_id(a, b)),
            LinkOrder::TssId => by_tss_id(a, b),
            LinkOrder::ReLocus => a
                .re_locus
                .cmp(&b.re_locus)
                .then_with(|| a.tss_id.cmp(&b.tss_id))
                .then_with(|| a.histone.cmp(&b.histone)),
            LinkOrder::Distance => a.distance.cmp(&b.distance).then_with(|| by_tss_id(a, b)),
            LinkOrder::AbsoluteDistance => a
                .abs_distance()
                .cmp(&b.abs_distance())
                .then_with(|| by_tss_id(a, b)),
            LinkOrder::CorrelationSign => a
                .correlation_sign()
                .cmp(&b.correlation_sign())
                .then_with(|| by_tss_id(a, b)),
        }
    }
}

impl Display for LinkOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LinkOrder {
    type Err = CisMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        LINK_ORDERS
            .iter()
            .find(|order| order.name() == wanted)
            .copied()
            .ok_or_else(|| {
                CisMapError::InvalidArgument(format!(
                    "Unknown sort order '{}', expected one of: {}",
                    s,
                    LINK_ORDERS
                        .iter()
                        .map(LinkOrder::name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}
