use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CisMapError, Result};
use crate::models::locus::Locus;
use crate::models::strand::Strand;
use crate::utils::{get_dynamic_reader, is_skippable_line};

///
/// A transcription start site and the gene it belongs to.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tss {
    pub id: String,
    pub gene_id: String,
    pub gene_name: Option<String>,
    pub chr: String,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
}

impl Tss {
    ///
    /// Strand-aware position of the TSS: `start` on `+`, `end - 1` on `-`.
    ///
    pub fn directional_start(&self) -> u32 {
        match self.strand {
            Strand::Forward => self.start,
            Strand::Reverse => self.end.saturating_sub(1).max(self.start),
        }
    }

    pub fn locus(&self) -> Locus {
        Locus::new(&self.chr, self.start, self.end)
    }

    ///
    /// Signed distance from this TSS to a regulatory element.
    ///
    /// Zero when the TSS falls inside the element, otherwise the distance
    /// to the nearest element boundary; negative values mean the element
    /// lies upstream of the TSS with respect to transcription direction.
    /// Elements on another chromosome have no distance.
    ///
    pub fn distance_to(&self, re: &Locus) -> Option<i64> {
        if re.chr != self.chr {
            return None;
        }

        let pos = self.directional_start() as i64;
        let d_start = pos - re.start as i64;
        let d_end = pos - re.end as i64;

        if d_start.signum() != d_end.signum() {
            return Some(0);
        }

        let raw = d_start.signum() * d_start.abs().min(d_end.abs());
        Some(match self.strand {
            Strand::Forward => -raw,
            Strand::Reverse => raw,
        })
    }
}

///
/// The TSS annotation of a genome.
///
/// When the annotation carries no separate TSS records every gene is its
/// own single TSS and `have_tss_info` is false.
///
#[derive(Clone, Debug, Default)]
pub struct TssAnnotation {
    pub tsses: Vec<Tss>,
    pub have_tss_info: bool,
}

impl TssAnnotation {
    pub fn len(&self) -> usize {
        self.tsses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tsses.is_empty()
    }

    ///
    /// Parse a BED6+ annotation:
    /// `chr start end name score strand [gene_id [gene_name]]`.
    ///
    /// The presence of a 7th column on the first record decides whether
    /// the file carries TSS information; every record must then agree.
    ///
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut tsses = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut have_tss_info: Option<bool> = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if is_skippable_line(&line) {
                continue;
            }
            let line_no = index + 1;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 6 {
                return Err(CisMapError::Parse(format!(
                    "Annotation line {} has {} columns, expected at least 6",
                    line_no,
                    fields.len()
                )));
            }

            let locus = crate::models::locus::parse_bed_locus(&line)?;
            let id = fields[3].trim().to_string();
            if id.is_empty() {
                return Err(CisMapError::Parse(format!(
                    "Annotation line {} has an empty name",
                    line_no
                )));
            }
            let strand = Strand::try_from(fields[5].trim())?;

            let with_tss = fields.len() >= 7;
            match have_tss_info {
                None => have_tss_info = Some(with_tss),
                Some(expected) if expected != with_tss => {
                    return Err(CisMapError::Parse(format!(
                        "Annotation line {} disagrees with earlier lines on the gene_id column",
                        line_no
                    )));
                }
                _ => {}
            }

            let (gene_id, gene_name) = if with_tss {
                let gene_id = fields[6].trim().to_string();
                if gene_id.is_empty() {
                    return Err(CisMapError::Parse(format!(
                        "Annotation line {} has an empty gene_id",
                        line_no
                    )));
                }
                let gene_name = fields
                    .get(7)
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty() && *n != ".")
                    .map(str::to_string);
                (gene_id, gene_name)
            } else {
                (id.clone(), None)
            };

            if !seen_ids.insert(id.clone()) {
                return Err(CisMapError::Parse(format!(
                    "Duplicate TSS id '{}' on annotation line {}",
                    id, line_no
                )));
            }

            tsses.push(Tss {
                id,
                gene_id,
                gene_name,
                chr: locus.chr,
                start: locus.start,
                end: locus.end,
                strand,
            });
        }

        Ok(TssAnnotation {
            tsses,
            have_tss_info: have_tss_info.unwrap_or(false),
        })
    }
}

impl TryFrom<&Path> for TssAnnotation {
    type Error = CisMapError;

    ///
    /// Load a [TssAnnotation] from a (optionally gzipped) BED file.
    ///
    /// # Arguments:
    /// - value: path to the annotation file on disk.
    fn try_from(value: &Path) -> Result<Self> {
        let reader = get_dynamic_reader(value)?;
        TssAnnotation::from_reader(reader)
    }
}

impl TryFrom<&str> for TssAnnotation {
    type Error = CisMapError;

    fn try_from(value: &str) -> Result<Self> {
        TssAnnotation::try_from(Path::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    fn tss(strand: Strand, start: u32, end: u32) -> Tss {
        Tss {
            id: "t1".to_string(),
            gene_id: "g1".to_string(),
            gene_name: None,
            chr: "chr1".to_string(),
            start,
            end,
            strand,
        }
    }

    #[rstest]
    fn test_directional_start() {
        assert_eq!(tss(Strand::Forward, 100, 101).directional_start(), 100);
        assert_eq!(tss(Strand::Reverse, 100, 200).directional_start(), 199);
    }

    #[rstest]
    // element left of a + TSS is upstream
    #[case(Strand::Forward, 1000, 1001, 100, 200, -800)]
    // element right of a + TSS is downstream
    #[case(Strand::Forward, 1000, 1001, 1500, 1600, 500)]
    // element right of a - TSS is upstream
    #[case(Strand::Reverse, 999, 1000, 1500, 1600, -501)]
    // element left of a - TSS is downstream
    #[case(Strand::Reverse, 999, 1000, 100, 200, 799)]
    // TSS inside the element
    #[case(Strand::Forward, 150, 151, 100, 200, 0)]
    fn test_distance_to(
        #[case] strand: Strand,
        #[case] tss_start: u32,
        #[case] tss_end: u32,
        #[case] re_start: u32,
        #[case] re_end: u32,
        #[case] expected: i64,
    ) {
        let t = tss(strand, tss_start, tss_end);
        let re = Locus::new("chr1", re_start, re_end);
        assert_eq!(t.distance_to(&re), Some(expected));
    }

    #[rstest]
    fn test_distance_to_other_chromosome() {
        let t = tss(Strand::Forward, 10, 11);
        assert_eq!(t.distance_to(&Locus::new("chr2", 10, 20)), None);
    }

    #[rstest]
    fn test_annotation_with_tss_info() {
        let data = "chr1\t100\t101\tT1\t0\t+\tG1\tALPHA\nchr1\t500\t501\tT2\t0\t-\tG1\t.\n";
        let annotation = TssAnnotation::from_reader(data.as_bytes()).unwrap();

        assert!(annotation.have_tss_info);
        assert_eq!(annotation.len(), 2);
        assert_eq!(annotation.tsses[0].gene_name.as_deref(), Some("ALPHA"));
        assert_eq!(annotation.tsses[1].gene_id, "G1");
        assert_eq!(annotation.tsses[1].gene_name, None);
    }

    #[rstest]
    fn test_annotation_without_tss_info_uses_gene_as_tss() {
        let data = "chr1\t100\t101\tG1\t0\t+\nchr2\t5\t6\tG2\t0\t-\n";
        let annotation = TssAnnotation::from_reader(data.as_bytes()).unwrap();

        assert!(!annotation.have_tss_info);
        assert_eq!(annotation.tsses[0].id, "G1");
        assert_eq!(annotation.tsses[0].gene_id, "G1");
    }

    #[rstest]
    #[case("chr1\t100\t101\tT1\t0\n")]
    #[case("chr1\t100\t101\tT1\t0\t*\n")]
    #[case("chr1\t100\t101\tT1\t0\t+\tG1\nchr1\t5\t6\tT2\t0\t+\n")]
    #[case("chr1\t100\t101\tT1\t0\t+\nchr1\t5\t6\tT1\t0\t+\n")]
    fn test_malformed_annotation(#[case] data: &str) {
        assert!(TssAnnotation::from_reader(data.as_bytes()).is_err());
    }
}
