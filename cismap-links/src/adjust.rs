//! Hierarchical score correction.
//!
//! Links live in a [LinkArena] sorted by `(gene_id, tss_id, re_locus,
//! histone)`, so every TSS and gene group is a contiguous run. The three
//! corrections run as separate passes, each parallel over its groups:
//!
//! 1. `re_score`: per TSS, the best score of each (RE, TSS) pair corrected
//!    for the number of distinct loci linked to the TSS.
//! 2. `tss_score`: per gene, the best `re_score` of each TSS corrected for
//!    the number of TSSes of the gene.
//! 3. `gene_score`: the best `tss_score` of each gene corrected for the
//!    number of genes with links.

use std::cmp::Ordering;

use rayon::prelude::*;

use cismap_core::models::RegulatoryLink;

///
/// Šidák correction of `p` for `n` tests: `1 - (1 - p)^n`, computed as
/// `-expm1(n * ln(1 - p))` so small `p` keeps its precision.
/// `adjust(p, 1) == p` exactly.
///
pub fn adjust(p: f64, n: usize) -> f64 {
    if n <= 1 {
        return p;
    }
    let adjusted = -((n as f64) * (-p).ln_1p()).exp_m1();
    adjusted.clamp(p, 1.0)
}

/// Canonical arena order.
pub fn arena_order(a: &RegulatoryLink, b: &RegulatoryLink) -> Ordering {
    a.gene_id
        .cmp(&b.gene_id)
        .then_with(|| a.tss_id.cmp(&b.tss_id))
        .then_with(|| a.re_locus.cmp(&b.re_locus))
        .then_with(|| a.histone.cmp(&b.histone))
}

fn min_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(f64::INFINITY, f64::min)
}

///
/// The owning collection of links during adjustment and selection.
///
#[derive(Debug, Clone, Default)]
pub struct LinkArena {
    links: Vec<RegulatoryLink>,
}

impl LinkArena {
    pub fn new(mut links: Vec<RegulatoryLink>) -> Self {
        links.par_sort_by(arena_order);
        LinkArena { links }
    }

    pub fn links(&self) -> &[RegulatoryLink] {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut [RegulatoryLink] {
        &mut self.links
    }

    pub fn into_links(self) -> Vec<RegulatoryLink> {
        self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of distinct genes.
    pub fn num_genes(&self) -> usize {
        self.links
            .chunk_by(|a, b| a.gene_id == b.gene_id)
            .count()
    }

    ///
    /// Phase 1: `re_score` for every (RE, TSS) pair.
    ///
    pub fn adjust_re_scores(&mut self) {
        self.links
            .par_chunk_by_mut(|a, b| a.tss_id == b.tss_id)
            .for_each(|tss_links| {
                let n_re = tss_links
                    .chunk_by(|a, b| a.re_locus == b.re_locus)
                    .count();
                for pair in tss_links.chunk_by_mut(|a, b| a.re_locus == b.re_locus) {
                    let re_score = adjust(min_of(pair.iter().map(|l| &l.score)), n_re);
                    pair.iter_mut().for_each(|l| l.re_score = re_score);
                }
            });
    }

    ///
    /// Phase 2: `tss_score` for every TSS. Requires phase 1.
    ///
    pub fn adjust_tss_scores(&mut self) {
        self.links
            .par_chunk_by_mut(|a, b| a.gene_id == b.gene_id)
            .for_each(|gene_links| {
                let n_tss = gene_links
                    .chunk_by(|a, b| a.tss_id == b.tss_id)
                    .count();
                for tss_links in gene_links.chunk_by_mut(|a, b| a.tss_id == b.tss_id) {
                    let tss_score = adjust(min_of(tss_links.iter().map(|l| &l.re_score)), n_tss);
                    tss_links.iter_mut().for_each(|l| l.tss_score = tss_score);
                }
            });
    }

    ///
    /// Phase 3: `gene_score` for every gene. Requires phase 2.
    ///
    pub fn adjust_gene_scores(&mut self) {
        let n_gene = self.num_genes();
        self.links
            .par_chunk_by_mut(|a, b| a.gene_id == b.gene_id)
            .for_each(|gene_links| {
                let gene_score = adjust(min_of(gene_links.iter().map(|l| &l.tss_score)), n_gene);
                gene_links.iter_mut().for_each(|l| l.gene_score = gene_score);
            });
    }
}

///
/// Runs the three correction phases in order.
///
pub struct ScoreAdjuster;

impl ScoreAdjuster {
    pub fn run(arena: &mut LinkArena) {
        arena.adjust_re_scores();
        arena.adjust_tss_scores();
        arena.adjust_gene_scores();
        log::info!(
            "Adjusted scores for {} links over {} genes",
            arena.len(),
            arena.num_genes()
        );
    }

    ///
    /// Sort raw links into an arena and adjust them.
    ///
    pub fn adjust_links(links: Vec<RegulatoryLink>) -> LinkArena {
        let mut arena = LinkArena::new(links);
        ScoreAdjuster::run(&mut arena);
        arena
    }
}
