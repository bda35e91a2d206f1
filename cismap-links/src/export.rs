//! TSV rendering of the result views, and re-import of the links view.

use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use cismap_core::errors::{CisMapError, Result};
use cismap_core::models::{RegulatoryLink, Strand};
use cismap_core::utils::get_dynamic_reader;

use crate::table::ResultTable;

pub const GENE_COLUMNS: [&str; 10] = [
    "Gene_ID",
    "Gene_Name",
    "TSS_ID",
    "Strand",
    "RE_Locus",
    "Distance",
    "Histone",
    "Correlation_Sign",
    "Score",
    "Gene_Score",
];

pub const TSS_COLUMNS: [&str; 10] = [
    "Gene_ID",
    "Gene_Name",
    "TSS_ID",
    "Strand",
    "RE_Locus",
    "Distance",
    "Histone",
    "Correlation_Sign",
    "Score",
    "TSS_Score",
];

pub const LINK_COLUMNS: [&str; 20] = [
    "TSS_ID",
    "TSS_Locus",
    "Strand",
    "RE_Locus",
    "Correlation",
    "Score",
    "RE_Score",
    "Best_RE",
    "TSS_Score",
    "Best_TSS",
    "Gene_Score",
    "Distance",
    "Histone",
    "Best_Histone",
    "Gene_ID",
    "Gene_Name",
    "Loci_per_TSS",
    "Num_TSSes",
    "TSSes_per_Gene",
    "Num_Genes",
];

pub const TSS_INFO_PARAM: &str = "have_tss_info";

///
/// The `#` lines closing every table.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    pub command: String,
    pub params: Vec<(String, String)>,
}

impl Trailer {
    pub fn new(command: &str, params: Vec<(String, String)>) -> Self {
        Trailer {
            command: command.to_string(),
            params,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "# cismap {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "# command: {}", self.command)?;
        for (key, value) in self.params.iter() {
            writeln!(out, "# {}: {}", key, value)?;
        }
        Ok(())
    }

    ///
    /// Collect `# key: value` lines, skipping the version line.
    ///
    fn push_line(&mut self, line: &str) {
        let Some(body) = line.strip_prefix('#').map(str::trim) else {
            return;
        };
        if let Some((key, value)) = body.split_once(": ") {
            if key == "command" {
                self.command = value.to_string();
            } else {
                self.params.push((key.to_string(), value.to_string()));
            }
        }
    }
}

///
/// The five output tables.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    GeneTargets,
    TssTargets,
    GeneElements,
    TssElements,
    Links,
}

fn flag(value: bool) -> &'static str {
    if value { "T" } else { "F" }
}

impl View {
    pub fn file_name(&self) -> &'static str {
        match self {
            View::GeneTargets => "gene_targets.tsv",
            View::TssTargets => "tss_targets.tsv",
            View::GeneElements => "gene_elements.tsv",
            View::TssElements => "tss_elements.tsv",
            View::Links => "links.tsv",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            View::GeneTargets | View::GeneElements => &GENE_COLUMNS,
            View::TssTargets | View::TssElements => &TSS_COLUMNS,
            View::Links => &LINK_COLUMNS,
        }
    }

    ///
    /// Rows of this view, in output order.
    ///
    pub fn rows<'a>(&self, table: &'a ResultTable) -> Result<Vec<&'a RegulatoryLink>> {
        match self {
            View::GeneTargets => Ok(table.gene_targets()),
            View::TssTargets => table.tss_targets(),
            View::GeneElements => Ok(table.gene_elements()),
            View::TssElements => table.tss_elements(),
            View::Links => Ok(table.comprehensive()),
        }
    }

    fn write_row<W: Write>(&self, out: &mut W, l: &RegulatoryLink) -> std::io::Result<()> {
        match self {
            View::GeneTargets | View::GeneElements => writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.3e}\t{:.3e}",
                l.gene_id,
                l.display_gene_name(),
                l.tss_id,
                l.strand,
                l.re_locus,
                l.distance,
                l.histone,
                l.correlation_sign(),
                l.score,
                l.gene_score
            ),
            View::TssTargets | View::TssElements => writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.3e}\t{:.3e}",
                l.gene_id,
                l.display_gene_name(),
                l.tss_id,
                l.strand,
                l.re_locus,
                l.distance,
                l.histone,
                l.correlation_sign(),
                l.score,
                l.tss_score
            ),
            View::Links => writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{:e}\t{:e}\t{}\t{:e}\t{}\t{:e}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                l.tss_id,
                l.tss_locus,
                l.strand,
                l.re_locus,
                l.correlation,
                l.score,
                l.re_score,
                flag(l.best_re),
                l.tss_score,
                flag(l.best_tss),
                l.gene_score,
                l.distance,
                l.histone,
                flag(l.best_histone),
                l.gene_id,
                l.display_gene_name(),
                l.loci_per_tss,
                l.num_tsses,
                l.tsses_per_gene,
                l.num_genes
            ),
        }
    }
}

///
/// Write `rows` as one table: header, rows, trailer.
///
pub fn write_rows<W: Write>(
    out: &mut W,
    view: View,
    rows: &[&RegulatoryLink],
    trailer: &Trailer,
) -> std::io::Result<()> {
    writeln!(out, "{}", view.columns().join("\t"))?;
    for link in rows {
        view.write_row(out, link)?;
    }
    trailer.write(out)
}

pub fn write_view<W: Write>(
    out: &mut W,
    view: View,
    table: &ResultTable,
    trailer: &Trailer,
) -> Result<()> {
    let rows = view.rows(table)?;
    write_rows(out, view, &rows, trailer)?;
    Ok(())
}

///
/// Views written for a table: the TSS views only with TSS information.
///
pub fn views_for(table: &ResultTable) -> Vec<View> {
    let mut views = vec![View::Links, View::GeneTargets, View::GeneElements];
    if table.have_tss_info {
        views.extend([View::TssTargets, View::TssElements]);
    }
    views
}

fn render_to(path: &Path, view: View, table: &ResultTable, trailer: &Trailer) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_view(&mut writer, view, table, trailer)?;
    writer.flush()?;
    Ok(())
}

///
/// Write every view of `table` into `dir`.
///
/// Each table is rendered to a hidden temporary file first; the final
/// names appear only once all views rendered, so a failure leaves no
/// output behind.
///
pub fn write_outputs(table: &ResultTable, dir: &Path, trailer: &Trailer) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    for view in views_for(table) {
        let target = dir.join(view.file_name());
        let tmp = dir.join(format!(".{}.tmp", view.file_name()));
        staged.push((tmp.clone(), target));

        if let Err(e) = render_to(&tmp, view, table, trailer) {
            for (tmp, _) in staged.iter() {
                let _ = fs::remove_file(tmp);
            }
            return Err(e);
        }
    }

    let written = commit(&staged)?;
    for target in written.iter() {
        log::info!("Wrote {}", target.display());
    }

    Ok(written)
}

///
/// Move staged files onto their targets. If one move fails, targets
/// already moved and the remaining staged files are removed.
///
fn commit(staged: &[(PathBuf, PathBuf)]) -> std::io::Result<Vec<PathBuf>> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (index, (tmp, target)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, target) {
            for done in written.iter() {
                let _ = fs::remove_file(done);
            }
            for (tmp, _) in staged[index..].iter() {
                let _ = fs::remove_file(tmp);
            }
            return Err(e);
        }
        written.push(target.clone());
    }
    Ok(written)
}

fn parse_field<T: std::str::FromStr>(value: &str, column: &str, line_no: usize) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        CisMapError::Parse(format!(
            "links line {}: invalid {} '{}'",
            line_no, column, value
        ))
    })
}

fn parse_flag(value: &str, column: &str, line_no: usize) -> Result<bool> {
    match value.trim() {
        "T" => Ok(true),
        "F" => Ok(false),
        other => Err(CisMapError::Parse(format!(
            "links line {}: invalid {} '{}', expected T or F",
            line_no, column, other
        ))),
    }
}

fn parse_link_row(fields: &[&str], line_no: usize) -> Result<RegulatoryLink> {
    if fields.len() != LINK_COLUMNS.len() {
        return Err(CisMapError::Parse(format!(
            "links line {} has {} columns, expected {}",
            line_no,
            fields.len(),
            LINK_COLUMNS.len()
        )));
    }

    let gene_name = match fields[15].trim() {
        "" | "." => None,
        name => Some(name.to_string()),
    };

    Ok(RegulatoryLink {
        tss_id: fields[0].to_string(),
        tss_locus: fields[1].to_string(),
        strand: Strand::try_from(fields[2].trim())?,
        re_locus: fields[3].to_string(),
        correlation: parse_field(fields[4], "Correlation", line_no)?,
        score: parse_field(fields[5], "Score", line_no)?,
        re_score: parse_field(fields[6], "RE_Score", line_no)?,
        best_re: parse_flag(fields[7], "Best_RE", line_no)?,
        tss_score: parse_field(fields[8], "TSS_Score", line_no)?,
        best_tss: parse_flag(fields[9], "Best_TSS", line_no)?,
        gene_score: parse_field(fields[10], "Gene_Score", line_no)?,
        distance: parse_field(fields[11], "Distance", line_no)?,
        histone: fields[12].to_string(),
        best_histone: parse_flag(fields[13], "Best_Histone", line_no)?,
        gene_id: fields[14].to_string(),
        gene_name,
        loci_per_tss: parse_field(fields[16], "Loci_per_TSS", line_no)?,
        num_tsses: parse_field(fields[17], "Num_TSSes", line_no)?,
        tsses_per_gene: parse_field(fields[18], "TSSes_per_Gene", line_no)?,
        num_genes: parse_field(fields[19], "Num_Genes", line_no)?,
    })
}

///
/// Parse a links view back into a [ResultTable] and its trailer.
///
/// Whether the table carries TSS information is taken from the trailer
/// when recorded there, else inferred from TSS ids differing from gene ids.
///
pub fn read_links_from<R: BufRead>(reader: R) -> Result<(ResultTable, Trailer)> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(CisMapError::Parse("links file is empty".to_string())),
    };
    let columns: Vec<&str> = header.trim_end().split('\t').collect();
    if columns != LINK_COLUMNS {
        return Err(CisMapError::Parse(format!(
            "not a links table, header is: {}",
            header.trim_end()
        )));
    }

    let mut links = Vec::new();
    let mut trailer = Trailer::default();
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.starts_with('#') {
            trailer.push_line(&line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        links.push(parse_link_row(&fields, index + 2)?);
    }

    let have_tss_info = match trailer.get(TSS_INFO_PARAM) {
        Some(value) => value == "true",
        None => links.iter().any(|l| l.tss_id != l.gene_id),
    };

    Ok((ResultTable::new(links, have_tss_info), trailer))
}

pub fn read_links_tsv(path: &Path) -> Result<(ResultTable, Trailer)> {
    let reader = get_dynamic_reader(path)?;
    read_links_from(reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    fn table() -> ResultTable {
        let mut a = RegulatoryLink::new(
            "G1",
            Some("ALPHA"),
            "T1",
            "chr1:1000-1001",
            Strand::Forward,
            "chr1:10-20",
            -980,
            "H3K27ac",
            0.8125,
            0.000123456,
        );
        a.best_re = true;
        a.best_tss = true;
        a.best_histone = true;
        a.loci_per_tss = 1;
        a.tsses_per_gene = 1;
        a.num_tsses = 1;
        a.num_genes = 1;
        ResultTable::new(vec![a], true)
    }

    fn trailer() -> Trailer {
        Trailer::new(
            "cismap predict --loci peaks.bed",
            vec![
                ("histones".to_string(), "H3K27ac".to_string()),
                (TSS_INFO_PARAM.to_string(), "true".to_string()),
            ],
        )
    }

    fn render(view: View) -> String {
        let mut out = Vec::new();
        write_view(&mut out, view, &table(), &trailer()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[rstest]
    fn test_gene_targets_layout() {
        let text = render(View::GeneTargets);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], GENE_COLUMNS.join("\t"));
        assert_eq!(
            lines[1],
            "G1\tALPHA\tT1\t+\tchr1:10-20\t-980\tH3K27ac\t+\t1.235e-4\t1.235e-4"
        );
        assert_eq!(lines[2], format!("# cismap {}", env!("CARGO_PKG_VERSION")));
        assert_eq!(lines[3], "# command: cismap predict --loci peaks.bed");
        assert_eq!(lines[4], "# histones: H3K27ac");
    }

    #[rstest]
    fn test_tss_targets_layout() {
        let text = render(View::TssTargets);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], TSS_COLUMNS.join("\t"));
        assert_eq!(
            lines[1],
            "G1\tALPHA\tT1\t+\tchr1:10-20\t-980\tH3K27ac\t+\t1.235e-4\t1.235e-4"
        );
    }

    #[rstest]
    fn test_links_layout() {
        let text = render(View::Links);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "T1\tchr1:1000-1001\t+\tchr1:10-20\t0.8125\t1.23456e-4\t1.23456e-4\tT\t1.23456e-4\tT\t1.23456e-4\t-980\tH3K27ac\tT\tG1\tALPHA\t1\t1\t1\t1"
        );
    }

    #[rstest]
    fn test_links_read_back() {
        let text = render(View::Links);
        let (read, trailer_read) = read_links_from(text.as_bytes()).unwrap();

        assert_eq!(read.links(), table().links());
        assert!(read.have_tss_info);
        assert_eq!(trailer_read, trailer());
    }

    #[rstest]
    fn test_read_rejects_other_tables() {
        let text = render(View::GeneTargets);
        assert!(matches!(
            read_links_from(text.as_bytes()),
            Err(CisMapError::Parse(_))
        ));
    }

    #[rstest]
    fn test_read_rejects_bad_flag() {
        let text = render(View::Links).replace("\tT\tG1", "\tyes\tG1");
        assert!(read_links_from(text.as_bytes()).is_err());
    }

    #[rstest]
    fn test_write_outputs_creates_all_views() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_outputs(&table(), dir.path(), &trailer()).unwrap();

        assert_eq!(written.len(), 5);
        for path in written {
            assert!(path.exists());
        }
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[rstest]
    fn test_write_outputs_without_tss_info() {
        let dir = tempfile::tempdir().unwrap();
        let table = ResultTable::new(table().links().to_vec(), false);
        let written = write_outputs(&table, dir.path(), &trailer()).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["links.tsv", "gene_targets.tsv", "gene_elements.tsv"]);
    }

    #[rstest]
    fn test_tss_columns_follow_gene_columns() {
        assert_eq!(&TSS_COLUMNS[..9], &GENE_COLUMNS[..9]);
        assert_eq!(TSS_COLUMNS[9], "TSS_Score");
    }

    #[rstest]
    fn test_write_outputs_rolls_back_failed_rename() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be replaced by a file
        let blocked = dir.path().join("tss_elements.tsv");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "x").unwrap();

        assert!(write_outputs(&table(), dir.path(), &trailer()).is_err());

        for name in ["links.tsv", "gene_targets.tsv", "gene_elements.tsv", "tss_targets.tsv"] {
            assert!(!dir.path().join(name).exists(), "{} left behind", name);
        }
        assert!(blocked.join("keep").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
