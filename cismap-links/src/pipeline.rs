use cismap_core::errors::{CisMapError, Result};
use cismap_core::models::{Locus, TssAnnotation};

use crate::adjust::ScoreAdjuster;
use crate::builder::{BuildParams, LinkBuilder};
use crate::config::PipelineConfig;
use crate::export::TSS_INFO_PARAM;
use crate::select::LinkSelector;
use crate::signal::SignalProvider;
use crate::table::ResultTable;

///
/// Run the full prediction: build raw links, drop those failing the
/// upstream filters, adjust, flag and count.
///
/// # Arguments
///
/// - config: pipeline settings
/// - provider: tissue-aligned histone and expression lookups
/// - annotation: the TSSes to link
/// - loci: the regulatory elements
///
/// Empty inputs and a corpus with no surviving links are errors; nothing
/// is returned for them to write.
///
pub fn predict_links<P: SignalProvider>(
    config: &PipelineConfig,
    provider: &P,
    annotation: &TssAnnotation,
    loci: &[Locus],
) -> Result<ResultTable> {
    predict_links_with_progress(config, provider, annotation, loci, |_| {})
}

pub fn predict_links_with_progress<P, F>(
    config: &PipelineConfig,
    provider: &P,
    annotation: &TssAnnotation,
    loci: &[Locus],
    on_progress: F,
) -> Result<ResultTable>
where
    P: SignalProvider,
    F: Fn(u64) + Sync,
{
    if loci.is_empty() {
        return Err(CisMapError::EmptyCorpus("no regulatory element loci".to_string()));
    }
    if annotation.is_empty() {
        return Err(CisMapError::EmptyCorpus("the annotation has no TSSes".to_string()));
    }
    log::info!(
        "Linking {} loci to {} TSSes across {} tissues",
        loci.len(),
        annotation.len(),
        provider.tissues().len()
    );

    let builder = LinkBuilder::new(BuildParams::from(config));
    let report = builder.build_with_progress(provider, annotation, loci, on_progress)?;

    let mut links = report.links;
    if !config.upstream.is_empty() {
        let before = links.len();
        links.retain(|link| config.upstream.passes(link));
        log::info!(
            "Upstream filters kept {} of {} links",
            links.len(),
            before
        );
    }

    if links.is_empty() {
        return Err(CisMapError::EmptyCorpus(
            "no links survived; no gene has a candidate regulatory element".to_string(),
        ));
    }

    let mut arena = ScoreAdjuster::adjust_links(links);
    LinkSelector::select(arena.links_mut());

    Ok(ResultTable::new(arena.into_links(), annotation.have_tss_info))
}

///
/// Parameters for output trailers: the config plus the TSS capability flag.
///
pub fn output_params(config: &PipelineConfig, have_tss_info: bool) -> Vec<(String, String)> {
    let mut params = config.params();
    params.push((TSS_INFO_PARAM.to_string(), have_tss_info.to_string()));
    params
}
