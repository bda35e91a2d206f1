use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};

use cismap_core::models::TssAnnotation;
use cismap_core::models::locus::read_loci;
use cismap_links::config::PipelineConfig;
use cismap_links::export::{Trailer, write_outputs};
use cismap_links::pipeline::{output_params, predict_links_with_progress};
use cismap_links::signal::TissueMatrixProvider;

use super::cli::DEFAULT_OUTPUT_DIR;

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow!("--{} is required", name))
}

///
/// Reconstruct the invocation for the output trailers.
///
pub fn command_line() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

fn progress_bar(len: u64, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")?
            .progress_chars("##-"),
    );
    bar.set_message("TSSes");
    Ok(bar)
}

pub fn run_predict(matches: &ArgMatches) -> Result<()> {
    let loci_path = required(matches, "loci")?;
    let annotation_path = required(matches, "annotation")?;
    let config_path = required(matches, "config")?;
    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let quiet = matches.get_flag("quiet");

    if let Some(threads) = matches.get_one::<usize>("threads") {
        rayon::ThreadPoolBuilder::new()
            .num_threads(*threads)
            .build_global()
            .context("Failed to configure the worker pool")?;
    }

    let config = PipelineConfig::try_from(Path::new(config_path))
        .with_context(|| format!("Failed to load config {}", config_path))?;
    let annotation = TssAnnotation::try_from(Path::new(annotation_path))
        .with_context(|| format!("Failed to read annotation {}", annotation_path))?;
    let loci = read_loci(Path::new(loci_path))
        .with_context(|| format!("Failed to read loci {}", loci_path))?;
    let provider = TissueMatrixProvider::from_config(&config)?;

    tracing::info!(
        loci = loci.len(),
        tsses = annotation.len(),
        tss_info = annotation.have_tss_info,
        "Inputs loaded"
    );

    let bar = progress_bar(annotation.len() as u64, quiet)?;
    let table = predict_links_with_progress(&config, &provider, &annotation, &loci, |n| {
        bar.inc(n)
    })?;
    bar.finish_and_clear();

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let trailer = Trailer::new(
        &command_line(),
        output_params(&config, table.have_tss_info),
    );
    let written = write_outputs(&table, &output_dir, &trailer)?;

    tracing::info!(links = table.len(), "Prediction complete");
    for path in written {
        println!("{}", path.display());
    }

    Ok(())
}
