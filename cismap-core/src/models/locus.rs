use std::fmt::{self, Display};
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CisMapError, Result};
use crate::utils::{get_dynamic_reader, is_skippable_line};

///
/// A regulatory element: a half-open genomic interval `[start, end)`,
/// usually a ChIP-seq peak. Named `chr:start-end` in every table.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locus {
    pub chr: String,
    pub start: u32,
    pub end: u32,
}

impl Locus {
    pub fn new(chr: &str, start: u32, end: u32) -> Self {
        Locus {
            chr: chr.to_string(),
            start,
            end,
        }
    }

    pub fn width(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    ///
    /// The key under which the locus is looked up in signal matrices.
    ///
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chr, self.start, self.end)
    }
}

impl FromStr for Locus {
    type Err = CisMapError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || CisMapError::Parse(format!("Invalid locus name '{}', expected chr:start-end", s));

        let (chr, range) = s.rsplit_once(':').ok_or_else(bad)?;
        let (start, end) = range.split_once('-').ok_or_else(bad)?;
        let start: u32 = start.trim().parse().map_err(|_| bad())?;
        let end: u32 = end.trim().parse().map_err(|_| bad())?;

        if chr.is_empty() || end < start {
            return Err(bad());
        }

        Ok(Locus::new(chr, start, end))
    }
}

///
/// Parse one BED line into a [Locus]. Only the first three columns are used.
///
pub fn parse_bed_locus(line: &str) -> Result<Locus> {
    let mut fields = line.split('\t');

    let chr = fields
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CisMapError::Parse(format!("Missing chromosome in line: {}", line)))?;
    let start = fields
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| CisMapError::Parse(format!("Invalid start in line: {}", line)))?;
    let end = fields
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| CisMapError::Parse(format!("Invalid end in line: {}", line)))?;

    if end < start {
        return Err(CisMapError::Parse(format!(
            "End precedes start in line: {}",
            line
        )));
    }

    Ok(Locus::new(chr, start, end))
}

///
/// Read all loci from a (optionally gzipped) BED file. Duplicate
/// intervals are kept once, in first-seen order.
///
/// # Arguments
///
/// - path: path to the BED file
///
pub fn read_loci(path: &Path) -> Result<Vec<Locus>> {
    let reader = get_dynamic_reader(path)?;
    let mut seen = std::collections::HashSet::new();
    let mut loci = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if is_skippable_line(&line) {
            continue;
        }
        let locus = parse_bed_locus(&line)?;
        if seen.insert(locus.clone()) {
            loci.push(locus);
        }
    }

    Ok(loci)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_name_round_trip() {
        let locus = Locus::new("chr1", 1000, 1500);
        assert_eq!(locus.name(), "chr1:1000-1500");
        assert_eq!(Locus::from_str("chr1:1000-1500").unwrap(), locus);
    }

    #[rstest]
    #[case("chr1")]
    #[case("chr1:100")]
    #[case("chr1:200-100")]
    #[case(":1-2")]
    #[case("chr1:a-b")]
    fn test_bad_names_rejected(#[case] name: &str) {
        assert!(Locus::from_str(name).is_err());
    }

    #[rstest]
    fn test_parse_bed_line_ignores_extra_columns() {
        let locus = parse_bed_locus("chr2\t5\t50\tpeak1\t900\t.").unwrap();
        assert_eq!(locus, Locus::new("chr2", 5, 50));
        assert_eq!(locus.width(), 45);
    }

    #[rstest]
    fn test_read_loci_skips_headers_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.bed");
        std::fs::write(
            &path,
            "track name=peaks\nchr1\t10\t20\n# note\nchr1\t10\t20\nchr2\t0\t5\n",
        )
        .unwrap();

        let loci = read_loci(&path).unwrap();
        assert_eq!(
            loci,
            vec![Locus::new("chr1", 10, 20), Locus::new("chr2", 0, 5)]
        );
    }

    #[rstest]
    fn test_read_loci_reports_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.bed");
        std::fs::write(&path, "chr1\tten\t20\n").unwrap();

        assert!(matches!(read_loci(&path), Err(CisMapError::Parse(_))));
    }
}
