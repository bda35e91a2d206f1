use std::cmp::Ordering;

use fxhash::{FxHashMap, FxHashSet};

use cismap_core::models::RegulatoryLink;

///
/// Whether `a` beats `b` for a best flag: lower value first, then the
/// lexicographically smaller tie-break key.
///
fn better(a: (f64, &str), b: (f64, &str)) -> bool {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)) == Ordering::Less
}

///
/// Sets the best flags and group counts on adjusted links.
///
/// Works on links in any order, so it serves both freshly adjusted arenas
/// and re-imported tables.
///
pub struct LinkSelector;

impl LinkSelector {
    ///
    /// Flag and count everything.
    ///
    pub fn select(links: &mut [RegulatoryLink]) {
        LinkSelector::rederive_flags(links);
        LinkSelector::count(links);
    }

    ///
    /// Recompute `best_histone`, `best_re` and `best_tss` from `score` and
    /// `tss_score`, discarding any previous flags.
    ///
    pub fn rederive_flags(links: &mut [RegulatoryLink]) {
        // (gene, tss, re) -> best histone row
        let mut best_histone: FxHashMap<(&str, &str, &str), usize> = FxHashMap::default();
        // (tss, histone) -> best locus row
        let mut best_re: FxHashMap<(&str, &str), usize> = FxHashMap::default();
        // gene -> (tss_score, tss_id) of its best TSS
        let mut best_tss: FxHashMap<&str, (f64, &str)> = FxHashMap::default();

        for (i, link) in links.iter().enumerate() {
            best_histone
                .entry((link.gene_id.as_str(), link.tss_id.as_str(), link.re_locus.as_str()))
                .and_modify(|j| {
                    let other = &links[*j];
                    if better(
                        (link.score, link.histone.as_str()),
                        (other.score, other.histone.as_str()),
                    ) {
                        *j = i;
                    }
                })
                .or_insert(i);

            best_re
                .entry((link.tss_id.as_str(), link.histone.as_str()))
                .and_modify(|j| {
                    let other = &links[*j];
                    if better(
                        (link.score, link.re_locus.as_str()),
                        (other.score, other.re_locus.as_str()),
                    ) {
                        *j = i;
                    }
                })
                .or_insert(i);

            best_tss
                .entry(link.gene_id.as_str())
                .and_modify(|best| {
                    if better((link.tss_score, link.tss_id.as_str()), *best) {
                        *best = (link.tss_score, link.tss_id.as_str());
                    }
                })
                .or_insert((link.tss_score, link.tss_id.as_str()));
        }

        let histone_rows: FxHashSet<usize> = best_histone.into_values().collect();
        let re_rows: FxHashSet<usize> = best_re.into_values().collect();
        let winning_tss: FxHashMap<String, String> = best_tss
            .into_iter()
            .map(|(gene, (_, tss))| (gene.to_string(), tss.to_string()))
            .collect();

        for (i, link) in links.iter_mut().enumerate() {
            link.best_histone = histone_rows.contains(&i);
            link.best_re = re_rows.contains(&i);
            link.best_tss = winning_tss
                .get(&link.gene_id)
                .is_some_and(|tss| *tss == link.tss_id);
        }
    }

    ///
    /// Fill `loci_per_tss`, `tsses_per_gene`, `num_tsses` and `num_genes`.
    ///
    pub fn count(links: &mut [RegulatoryLink]) {
        let mut loci: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        let mut tsses: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        for link in links.iter() {
            loci.entry(link.tss_id.clone())
                .or_default()
                .insert(link.re_locus.clone());
            tsses
                .entry(link.gene_id.clone())
                .or_default()
                .insert(link.tss_id.clone());
        }

        let num_tsses = loci.len();
        let num_genes = tsses.len();
        for link in links.iter_mut() {
            link.loci_per_tss = loci.get(&link.tss_id).map_or(0, |s| s.len());
            link.tsses_per_gene = tsses.get(&link.gene_id).map_or(0, |s| s.len());
            link.num_tsses = num_tsses;
            link.num_genes = num_genes;
        }
    }
}
