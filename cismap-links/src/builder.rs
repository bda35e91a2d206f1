use fxhash::FxHashMap;
use rayon::prelude::*;

use cismap_core::errors::{CisMapError, Result};
use cismap_core::models::{Locus, RegulatoryLink, Tss, TssAnnotation};

use crate::config::{MIN_FEATURE_COUNT, PipelineConfig};
use crate::correlation::{CorrelationBackend, PearsonFisher};
use crate::signal::{AlignedSignals, SignalProvider};

///
/// Candidate eligibility and search window settings.
///
#[derive(Debug, Clone, PartialEq)]
pub struct BuildParams {
    /// (histone mark, maximum |distance|) pairs
    pub histones: Vec<(String, u32)>,
    pub min_feature_count: usize,
    pub min_max_expression: f64,
    pub require_expression_change: bool,
}

impl From<&PipelineConfig> for BuildParams {
    fn from(config: &PipelineConfig) -> Self {
        BuildParams {
            histones: config
                .histones
                .iter()
                .map(|h| (h.name.clone(), h.max_link_distance))
                .collect(),
            min_feature_count: config.min_feature_count.max(MIN_FEATURE_COUNT),
            min_max_expression: config.min_max_expression,
            require_expression_change: config.require_expression_change,
        }
    }
}

impl BuildParams {
    fn max_distance(&self) -> u32 {
        self.histones.iter().map(|(_, d)| *d).max().unwrap_or(0)
    }
}

///
/// Raw links plus tallies of what did not become a link.
///
#[derive(Debug, Default)]
pub struct BuildReport {
    pub links: Vec<RegulatoryLink>,
    /// (TSS, locus, histone) combinations within range
    pub candidates: usize,
    /// candidates whose correlation was not defined (too few tissues, constant series)
    pub skipped: usize,
    /// candidates without signal, or failing an eligibility rule
    pub ineligible: usize,
    /// TSSes absent from the expression matrix
    pub tsses_without_expression: usize,
}

impl BuildReport {
    fn merge(mut self, other: BuildReport) -> BuildReport {
        self.links.extend(other.links);
        self.candidates += other.candidates;
        self.skipped += other.skipped;
        self.ineligible += other.ineligible;
        self.tsses_without_expression += other.tsses_without_expression;
        self
    }
}

///
/// Loci of one chromosome sorted by start, with the widest locus width so
/// a distance window can be turned into a start-coordinate range.
///
struct ChromLoci<'a> {
    loci: Vec<&'a Locus>,
    max_width: u32,
}

struct LocusIndex<'a> {
    by_chr: FxHashMap<&'a str, ChromLoci<'a>>,
}

impl<'a> LocusIndex<'a> {
    fn new(loci: &'a [Locus]) -> Self {
        let mut by_chr: FxHashMap<&'a str, ChromLoci<'a>> = FxHashMap::default();
        for locus in loci {
            let entry = by_chr.entry(locus.chr.as_str()).or_insert(ChromLoci {
                loci: Vec::new(),
                max_width: 0,
            });
            entry.max_width = entry.max_width.max(locus.width());
            entry.loci.push(locus);
        }
        for chrom in by_chr.values_mut() {
            chrom.loci.sort();
        }
        LocusIndex { by_chr }
    }

    ///
    /// Loci that can lie within `max_distance` of the TSS.
    ///
    fn near(&self, tss: &Tss, max_distance: u32) -> &[&'a Locus] {
        let Some(chrom) = self.by_chr.get(tss.chr.as_str()) else {
            return &[];
        };
        let pos = tss.directional_start() as u64;
        let reach = max_distance as u64 + 1;
        let lo = pos.saturating_sub(reach + chrom.max_width as u64);
        let hi = pos + reach;

        let first = chrom.loci.partition_point(|l| (l.start as u64) < lo);
        let last = chrom.loci.partition_point(|l| (l.start as u64) <= hi);
        &chrom.loci[first..last.max(first)]
    }
}

///
/// Whether the expression vector varies enough across tissues: with
/// `y = ln(expr + 1)`, the maximum must reach three times the mean or the
/// minimum must fall to two thirds of it.
///
pub fn has_expression_change(expression: &[f64]) -> bool {
    if expression.is_empty() {
        return false;
    }
    let y: Vec<f64> = expression.iter().map(|v| v.ln_1p()).collect();
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    if !(mean > 0.0) {
        return false;
    }
    let max = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = y.iter().cloned().fold(f64::INFINITY, f64::min);

    max - mean >= 2.0 * mean || mean - min >= mean / 3.0
}

///
/// Enumerates (TSS, locus, histone) candidates within the configured
/// distances and turns each into a [RegulatoryLink] with raw scores.
///
pub struct LinkBuilder<B: CorrelationBackend = PearsonFisher> {
    params: BuildParams,
    backend: B,
}

impl LinkBuilder<PearsonFisher> {
    pub fn new(params: BuildParams) -> Self {
        LinkBuilder {
            params,
            backend: PearsonFisher,
        }
    }
}

impl<B: CorrelationBackend> LinkBuilder<B> {
    pub fn with_backend(params: BuildParams, backend: B) -> Self {
        LinkBuilder { params, backend }
    }

    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    ///
    /// Check the eligibility rules for one candidate.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when a rule excludes the candidate, an
    /// `InsufficientData` error when too few tissues remain.
    ///
    pub fn is_eligible(&self, signals: &AlignedSignals) -> Result<bool> {
        if signals.len() < self.params.min_feature_count {
            return Err(CisMapError::InsufficientData {
                observed: signals.len(),
                required: self.params.min_feature_count,
            });
        }
        if !signals.histone.iter().any(|x| *x > 0.0) {
            return Ok(false);
        }
        if !signals
            .expression
            .iter()
            .any(|y| *y >= self.params.min_max_expression)
        {
            return Ok(false);
        }
        if self.params.require_expression_change && !has_expression_change(&signals.expression)
        {
            return Ok(false);
        }
        Ok(true)
    }

    fn evaluate_tss<P: SignalProvider>(
        &self,
        tss: &Tss,
        provider: &P,
        index: &LocusIndex,
        max_distance: u32,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        if provider.expression(&tss.id).is_none() {
            log::debug!("{}: no expression, skipped", tss.id);
            report.tsses_without_expression = 1;
            return Ok(report);
        }

        let tss_locus = tss.locus().name();

        for locus in index.near(tss, max_distance) {
            let Some(distance) = tss.distance_to(locus) else {
                continue;
            };
            let re_locus = locus.name();

            for (histone, max_link_distance) in self.params.histones.iter() {
                if distance.unsigned_abs() > *max_link_distance as u64 {
                    continue;
                }
                report.candidates += 1;

                let Some(signals) = provider.signals(histone, &re_locus, &tss.id) else {
                    report.ineligible += 1;
                    continue;
                };

                let outcome = self
                    .is_eligible(&signals)
                    .and_then(|eligible| match eligible {
                        true => self
                            .backend
                            .correlate(&signals.histone, &signals.expression)
                            .map(Some),
                        false => Ok(None),
                    });

                match outcome {
                    Ok(Some(correlation)) => report.links.push(RegulatoryLink::new(
                        &tss.gene_id,
                        tss.gene_name.as_deref(),
                        &tss.id,
                        &tss_locus,
                        tss.strand,
                        &re_locus,
                        distance,
                        histone,
                        correlation.r,
                        correlation.p,
                    )),
                    Ok(None) => report.ineligible += 1,
                    Err(e) if e.is_candidate_local() => {
                        log::debug!("{} {} {}: skipped: {}", tss.id, re_locus, histone, e);
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(report)
    }

    pub fn build<P: SignalProvider>(
        &self,
        provider: &P,
        annotation: &TssAnnotation,
        loci: &[Locus],
    ) -> Result<BuildReport> {
        self.build_with_progress(provider, annotation, loci, |_| {})
    }

    ///
    /// Evaluate every TSS in parallel. `on_progress` is called with 1 after
    /// each TSS is done.
    ///
    /// Candidates whose correlation is undefined are counted as skipped;
    /// any other error stops the build and is returned.
    ///
    pub fn build_with_progress<P, F>(
        &self,
        provider: &P,
        annotation: &TssAnnotation,
        loci: &[Locus],
        on_progress: F,
    ) -> Result<BuildReport>
    where
        P: SignalProvider,
        F: Fn(u64) + Sync,
    {
        let index = LocusIndex::new(loci);
        let max_distance = self.params.max_distance();

        let report = annotation
            .tsses
            .par_iter()
            .map(|tss| {
                let report = self.evaluate_tss(tss, provider, &index, max_distance);
                on_progress(1);
                report
            })
            .try_reduce(BuildReport::default, |a, b| Ok(a.merge(b)))?;

        if report.skipped > 0 {
            log::warn!(
                "{} of {} candidates skipped: correlation could not be computed",
                report.skipped,
                report.candidates
            );
        }
        if report.tsses_without_expression > 0 {
            log::warn!(
                "{} TSSes have no expression values",
                report.tsses_without_expression
            );
        }
        log::info!(
            "Built {} links from {} candidates ({} ineligible)",
            report.links.len(),
            report.candidates,
            report.ineligible
        );

        Ok(report)
    }
}
