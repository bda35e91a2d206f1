use std::cmp::Ordering;

use fxhash::FxHashMap;

use cismap_core::errors::{CisMapError, Result};
use cismap_core::models::RegulatoryLink;

use crate::filter::{LinkFilter, LinkOrder, by_tss_id};

///
/// The finished, immutable set of adjusted and flagged links, with the
/// tabular views and the filter/sort/limit surface over it.
///
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    links: Vec<RegulatoryLink>,
    pub have_tss_info: bool,
}

///
/// Keep one link per group key, the least under `cmp`.
///
fn best_per_group<'a, K, C>(
    links: &'a [RegulatoryLink],
    key: K,
    cmp: C,
) -> Vec<&'a RegulatoryLink>
where
    K: Fn(&'a RegulatoryLink) -> &'a str,
    C: Fn(&RegulatoryLink, &RegulatoryLink) -> Ordering,
{
    let mut best: FxHashMap<&'a str, &'a RegulatoryLink> = FxHashMap::default();
    for link in links {
        best.entry(key(link))
            .and_modify(|current| {
                if cmp(link, *current) == Ordering::Less {
                    *current = link;
                }
            })
            .or_insert(link);
    }
    best.into_values().collect()
}

impl ResultTable {
    pub fn new(links: Vec<RegulatoryLink>, have_tss_info: bool) -> Self {
        ResultTable {
            links,
            have_tss_info,
        }
    }

    pub fn links(&self) -> &[RegulatoryLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    ///
    /// Links passing `filter`, evaluated lazily against the whole table on
    /// every call.
    ///
    pub fn filter<'a>(
        &'a self,
        filter: &'a LinkFilter,
    ) -> impl Iterator<Item = &'a RegulatoryLink> + 'a {
        filter.apply(&self.links)
    }

    pub fn sort<'a, I>(links: I, order: LinkOrder) -> Vec<&'a RegulatoryLink>
    where
        I: IntoIterator<Item = &'a RegulatoryLink>,
    {
        let mut sorted: Vec<&RegulatoryLink> = links.into_iter().collect();
        sorted.sort_by(|a, b| order.compare(a, b));
        sorted
    }

    ///
    /// Keep the first `top_n` links; `top_n` must be at least 1.
    ///
    pub fn limit(mut links: Vec<&RegulatoryLink>, top_n: usize) -> Result<Vec<&RegulatoryLink>> {
        if top_n < 1 {
            return Err(CisMapError::InvalidArgument(
                "the result count must be at least 1".to_string(),
            ));
        }
        links.truncate(top_n);
        Ok(links)
    }

    ///
    /// One row per gene: the best link of its best TSS, ordered by
    /// `gene_score`.
    ///
    pub fn gene_targets(&self) -> Vec<&RegulatoryLink> {
        let best = best_per_group(
            &self.links,
            |l| l.gene_id.as_str(),
            |a, b| {
                a.tss_score
                    .total_cmp(&b.tss_score)
                    .then_with(|| a.tss_id.cmp(&b.tss_id))
                    .then_with(|| a.score.total_cmp(&b.score))
                    .then_with(|| by_tss_id(a, b))
            },
        );
        ResultTable::sort(best, LinkOrder::GeneScore)
    }

    ///
    /// One row per TSS: its best link, ordered by `tss_score`.
    ///
    pub fn tss_targets(&self) -> Result<Vec<&RegulatoryLink>> {
        self.require_tss_info("tss_targets")?;
        let best = best_per_group(
            &self.links,
            |l| l.tss_id.as_str(),
            |a, b| LinkOrder::Score.compare(a, b),
        );
        Ok(ResultTable::sort(best, LinkOrder::TssScore))
    }

    ///
    /// All links grouped by gene; groups by increasing `gene_score`.
    ///
    pub fn gene_elements(&self) -> Vec<&RegulatoryLink> {
        let mut rows: Vec<&RegulatoryLink> = self.links.iter().collect();
        rows.sort_by(|a, b| {
            a.gene_score
                .total_cmp(&b.gene_score)
                .then_with(|| a.gene_id.cmp(&b.gene_id))
                .then_with(|| LinkOrder::Score.compare(a, b))
        });
        rows
    }

    ///
    /// All links grouped by TSS; groups by increasing `tss_score`.
    ///
    pub fn tss_elements(&self) -> Result<Vec<&RegulatoryLink>> {
        self.require_tss_info("tss_elements")?;
        let mut rows: Vec<&RegulatoryLink> = self.links.iter().collect();
        rows.sort_by(|a, b| {
            a.tss_score
                .total_cmp(&b.tss_score)
                .then_with(|| a.tss_id.cmp(&b.tss_id))
                .then_with(|| LinkOrder::Score.compare(a, b))
        });
        Ok(rows)
    }

    ///
    /// Every link, in the default order.
    ///
    pub fn comprehensive(&self) -> Vec<&RegulatoryLink> {
        ResultTable::sort(&self.links, LinkOrder::GeneScore)
    }

    fn require_tss_info(&self, view: &str) -> Result<()> {
        if self.have_tss_info {
            Ok(())
        } else {
            Err(CisMapError::MissingAnnotation(format!(
                "{} needs an annotation with TSS information",
                view
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cismap_core::models::Strand;
    use pretty_assertions::assert_eq;
    use rstest::*;

    use crate::adjust::ScoreAdjuster;
    use crate::filter::FilterSpec;
    use crate::select::LinkSelector;

    fn link(gene: &str, tss: &str, re: &str, histone: &str, score: f64) -> RegulatoryLink {
        RegulatoryLink::new(
            gene,
            None,
            tss,
            "chr1:1000-1001",
            Strand::Forward,
            re,
            -10,
            histone,
            0.5,
            score,
        )
    }

    #[fixture]
    fn table() -> ResultTable {
        let mut arena = ScoreAdjuster::adjust_links(vec![
            link("G1", "T1", "chr1:10-20", "H3K27ac", 0.01),
            link("G1", "T1", "chr1:30-40", "H3K27ac", 0.3),
            link("G1", "T2", "chr1:30-40", "H3K27ac", 0.002),
            link("G2", "T3", "chr1:50-60", "H3K27ac", 0.2),
            link("G2", "T3", "chr1:50-60", "H3K4me1", 0.1),
            link("G3", "T4", "chr1:70-80", "H3K27ac", 0.0001),
        ]);
        LinkSelector::select(arena.links_mut());
        ResultTable::new(arena.into_links(), true)
    }

    fn keys<'a>(rows: &[&'a RegulatoryLink]) -> Vec<(&'a str, &'a str, &'a str)> {
        rows.iter()
            .map(|l| (l.tss_id.as_str(), l.re_locus.as_str(), l.histone.as_str()))
            .collect()
    }

    #[rstest]
    fn test_gene_targets_one_row_per_gene(table: ResultTable) {
        let rows = table.gene_targets();
        assert_eq!(
            keys(&rows),
            vec![
                ("T4", "chr1:70-80", "H3K27ac"),
                ("T2", "chr1:30-40", "H3K27ac"),
                ("T3", "chr1:50-60", "H3K4me1"),
            ]
        );
        assert!(rows.windows(2).all(|w| w[0].gene_score <= w[1].gene_score));
        assert!(rows.iter().all(|l| l.best_tss));
    }

    #[rstest]
    fn test_tss_targets_one_row_per_tss(table: ResultTable) {
        let rows = table.tss_targets().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.windows(2).all(|w| w[0].tss_score <= w[1].tss_score));
        let t1 = rows.iter().find(|l| l.tss_id == "T1").unwrap();
        assert_eq!(t1.re_locus, "chr1:10-20");
    }

    #[rstest]
    fn test_tss_views_need_tss_info(table: ResultTable) {
        let table = ResultTable::new(table.links().to_vec(), false);
        assert!(matches!(
            table.tss_targets(),
            Err(CisMapError::MissingAnnotation(_))
        ));
        assert!(table.tss_elements().is_err());
        assert_eq!(table.gene_targets().len(), 3);
    }

    #[rstest]
    fn test_elements_grouped(table: ResultTable) {
        let genes: Vec<&str> = table
            .gene_elements()
            .iter()
            .map(|l| l.gene_id.as_str())
            .collect();
        assert_eq!(genes, vec!["G3", "G1", "G1", "G1", "G2", "G2"]);

        let rows = table.tss_elements().unwrap();
        let tsses: Vec<&str> = rows.iter().map(|l| l.tss_id.as_str()).collect();
        assert_eq!(tsses, vec!["T4", "T2", "T1", "T1", "T3", "T3"]);
        // within T3, by score
        assert_eq!(rows[4].histone, "H3K4me1");
    }

    #[rstest]
    fn test_comprehensive_sorted_by_gene_score_then_score(table: ResultTable) {
        let rows = table.comprehensive();
        assert_eq!(rows.len(), table.len());
        for w in rows.windows(2) {
            assert_eq!(
                LinkOrder::GeneScore.compare(w[0], w[1]),
                Ordering::Less
            );
        }
    }

    #[rstest]
    fn test_filter_sort_limit(table: ResultTable) {
        let (filter, _) = FilterSpec {
            best_tss: true,
            ..Default::default()
        }
        .compile();

        let sorted = ResultTable::sort(table.filter(&filter), LinkOrder::Score);
        let rows = ResultTable::limit(sorted, 2).unwrap();
        assert_eq!(
            keys(&rows),
            vec![
                ("T4", "chr1:70-80", "H3K27ac"),
                ("T2", "chr1:30-40", "H3K27ac"),
            ]
        );

        // the table itself is untouched
        assert_eq!(table.filter(&filter).count(), 4);
        assert_eq!(table.len(), 6);
    }

    #[rstest]
    fn test_limit_zero_is_invalid(table: ResultTable) {
        let rows = table.comprehensive();
        assert!(matches!(
            ResultTable::limit(rows, 0),
            Err(CisMapError::InvalidArgument(_))
        ));
    }

    #[rstest]
    fn test_limit_larger_than_input(table: ResultTable) {
        let rows = table.comprehensive();
        assert_eq!(ResultTable::limit(rows, 100).unwrap().len(), 6);
    }
}
