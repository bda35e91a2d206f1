use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;

use cismap_core::models::RegulatoryLink;
use cismap_links::export::{Trailer, View, read_links_tsv, write_rows};
use cismap_links::filter::{FilterSpec, LinkOrder};
use cismap_links::table::ResultTable;

use super::cli::DEFAULT_ORDER;
use crate::predict::handlers::command_line;

///
/// Load a saved filter form from JSON.
///
pub fn read_filter_spec(path: &Path) -> Result<FilterSpec> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse filter spec {}", path.display()))?;
    Ok(spec)
}

///
/// Overlay the command line entries onto `spec`. Flags only ever switch
/// the best-link filters on.
///
pub fn apply_overrides(mut spec: FilterSpec, matches: &ArgMatches) -> FilterSpec {
    let text = |name: &str| matches.get_one::<String>(name).cloned();

    spec.best_tss |= matches.get_flag("best-tss");
    spec.best_re |= matches.get_flag("best-re");

    let overrides = [
        (&mut spec.gene_id, text("gene-id")),
        (&mut spec.gene_name, text("gene-name")),
        (&mut spec.tss_id, text("tss-id")),
        (&mut spec.re_locus, text("re-locus")),
        (&mut spec.absolute_distance_ge, text("abs-distance-ge")),
        (&mut spec.absolute_distance_le, text("abs-distance-le")),
        (&mut spec.distance_ge, text("distance-ge")),
        (&mut spec.distance_le, text("distance-le")),
        (&mut spec.correlation_sign, text("sign")),
        (&mut spec.score, text("max-score")),
        (&mut spec.gene_score, text("max-gene-score")),
    ];
    for (field, value) in overrides {
        if value.is_some() {
            *field = value;
        }
    }
    spec
}

///
/// Keep the first `top_n` rows. An invalid count is reported and the rows
/// are returned unlimited, like any other rejected filter entry.
///
pub fn limit_rows(rows: Vec<&RegulatoryLink>, top_n: Option<usize>) -> Vec<&RegulatoryLink> {
    let Some(top_n) = top_n else {
        return rows;
    };
    match ResultTable::limit(rows.clone(), top_n) {
        Ok(limited) => limited,
        Err(e) => {
            tracing::warn!("Ignoring result count: {}", e);
            rows
        }
    }
}

pub fn run_filter(matches: &ArgMatches) -> Result<()> {
    let links_path = matches
        .get_one::<String>("links")
        .ok_or_else(|| anyhow!("A links table is required"))?;

    let spec = match matches.get_one::<String>("filter-spec") {
        Some(path) => read_filter_spec(Path::new(path))?,
        None => FilterSpec::default(),
    };
    let spec = apply_overrides(spec, matches);

    let order = match matches.get_one::<String>("sort") {
        Some(order) => LinkOrder::from_str(order)?,
        None => DEFAULT_ORDER,
    };
    let top_n = matches.get_one::<usize>("top").copied();

    let (table, trailer) = read_links_tsv(Path::new(links_path))
        .with_context(|| format!("Failed to read links table {}", links_path))?;

    let (filter, diagnostics) = spec.compile();
    for diagnostic in diagnostics.iter() {
        tracing::warn!("Ignoring filter entry: {}", diagnostic);
    }

    let rows = limit_rows(ResultTable::sort(table.filter(&filter), order), top_n);
    tracing::info!(
        kept = rows.len(),
        total = table.len(),
        order = %order,
        "Filtered links"
    );

    let trailer = Trailer::new(&command_line(), trailer.params);
    match matches.get_one::<String>("output") {
        Some(output) => {
            let file = File::create(output)
                .with_context(|| format!("Failed to create {}", output))?;
            let mut out = BufWriter::new(file);
            write_rows(&mut out, View::Links, &rows, &trailer)?;
            out.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            write_rows(&mut out, View::Links, &rows, &trailer)?;
            out.flush()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write;

    use crate::filter::cli::create_filter_cli;

    #[rstest]
    fn test_overrides_replace_saved_entries() {
        let saved = FilterSpec {
            gene_id: Some("G1".to_string()),
            score: Some("0.5".to_string()),
            ..Default::default()
        };
        let matches = create_filter_cli().get_matches_from([
            "filter",
            "--links",
            "links.tsv",
            "--gene-id",
            "G2",
            "--sign",
            "-",
            "--best-re",
        ]);

        let spec = apply_overrides(saved, &matches);

        assert_eq!(spec.gene_id.as_deref(), Some("G2"));
        assert_eq!(spec.score.as_deref(), Some("0.5"));
        assert_eq!(spec.correlation_sign.as_deref(), Some("-"));
        assert!(spec.best_re);
        assert!(!spec.best_tss);
    }

    #[rstest]
    fn test_negative_distance_bounds_parse() {
        let matches = create_filter_cli().get_matches_from([
            "filter",
            "--links",
            "links.tsv",
            "--distance-ge",
            "-500",
            "--distance-le",
            "0",
        ]);

        let spec = apply_overrides(FilterSpec::default(), &matches);
        let (filter, diagnostics) = spec.compile();

        assert!(diagnostics.is_empty());
        assert_eq!(filter.distance, Some((-500.0, 0.0)));
    }

    #[rstest]
    fn test_read_filter_spec() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"best_tss": true, "gene_name": "^abc", "absolute_distance_le": "1000"}}"#
        )
        .unwrap();

        let spec = read_filter_spec(file.path()).unwrap();

        assert!(spec.best_tss);
        assert!(!spec.best_re);
        assert_eq!(spec.gene_name.as_deref(), Some("^abc"));
        assert_eq!(spec.absolute_distance_le.as_deref(), Some("1000"));
        assert_eq!(spec.gene_id, None);
    }

    fn link(tss_id: &str, score: f64) -> RegulatoryLink {
        RegulatoryLink::new(
            "G1",
            None,
            tss_id,
            "chr1:100-101",
            cismap_core::models::Strand::Forward,
            "chr1:10-20",
            -80,
            "H3K27ac",
            0.5,
            score,
        )
    }

    #[rstest]
    #[case(None, 3)]
    #[case(Some(2), 2)]
    #[case(Some(10), 3)]
    #[case(Some(0), 3)]
    fn test_limit_rows(#[case] top_n: Option<usize>, #[case] expected: usize) {
        let links = vec![link("T1", 0.01), link("T2", 0.02), link("T3", 0.03)];
        let rows: Vec<&RegulatoryLink> = links.iter().collect();

        let kept = limit_rows(rows, top_n);

        assert_eq!(kept.len(), expected);
        assert_eq!(kept[0].tss_id, "T1");
    }
}
