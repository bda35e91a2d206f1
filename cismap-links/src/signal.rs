//! Per-tissue signal lookups.
//!
//! Histone signal at each locus and expression at each TSS are read from
//! TSV matrices (`<key>\t<tissue>...`) and aligned to a common tissue order.

use std::io::BufRead;
use std::path::Path;

use fxhash::FxHashMap;

use cismap_core::errors::{CisMapError, Result};
use cismap_core::utils::get_dynamic_reader;

use crate::config::PipelineConfig;

///
/// Histone levels and expression for the tissues where both are known,
/// in the same tissue order.
///
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSignals {
    pub histone: Vec<f64>,
    pub expression: Vec<f64>,
}

impl AlignedSignals {
    pub fn len(&self) -> usize {
        self.histone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histone.is_empty()
    }
}

///
/// Source of tissue-aligned histone and expression vectors.
///
/// Both lookups return one value per entry of [SignalProvider::tissues];
/// missing observations are `NaN`.
///
pub trait SignalProvider: Sync {
    fn tissues(&self) -> &[String];

    fn histone_levels(&self, histone: &str, locus: &str) -> Option<&[f64]>;

    fn expression(&self, tss_id: &str) -> Option<&[f64]>;

    ///
    /// Pair up the two series, keeping only tissues where both values are
    /// finite. `None` when either series is unknown.
    ///
    fn signals(&self, histone: &str, locus: &str, tss_id: &str) -> Option<AlignedSignals> {
        let levels = self.histone_levels(histone, locus)?;
        let expression = self.expression(tss_id)?;
        Some(align(levels, expression))
    }
}

pub fn align(levels: &[f64], expression: &[f64]) -> AlignedSignals {
    let (histone, expression) = levels
        .iter()
        .zip(expression.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    AlignedSignals {
        histone,
        expression,
    }
}

///
/// A keyed matrix of per-tissue values, stored row-major.
///
#[derive(Debug, Clone)]
pub struct SignalMatrix {
    pub tissues: Vec<String>,
    rows: FxHashMap<String, usize>,
    values: Vec<f64>,
}

fn parse_cell(cell: &str) -> std::result::Result<f64, ()> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| ())
}

impl SignalMatrix {
    ///
    /// Read a matrix from TSV. The header names the key column and then the
    /// tissues; `NA`, `NaN` and empty cells are missing values.
    ///
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();

        let header = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    if !line.trim().is_empty() && !line.starts_with('#') {
                        break line;
                    }
                }
                None => {
                    return Err(CisMapError::Parse("Empty signal matrix".to_string()));
                }
            }
        };

        let tissues: Vec<String> = header
            .split('\t')
            .skip(1)
            .map(|t| t.trim().to_string())
            .collect();
        if tissues.is_empty() {
            return Err(CisMapError::Parse(
                "Signal matrix header must name at least one tissue".to_string(),
            ));
        }

        let mut rows = FxHashMap::default();
        let mut values = Vec::new();

        for (index, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = index + 2;
            let mut fields = line.split('\t');
            let key = fields.next().unwrap_or_default().trim().to_string();
            let cells: Vec<&str> = fields.collect();

            if cells.len() != tissues.len() {
                return Err(CisMapError::Parse(format!(
                    "Signal matrix line {} has {} values, expected {}",
                    line_no,
                    cells.len(),
                    tissues.len()
                )));
            }

            let row = values.len() / tissues.len();
            for cell in cells {
                let value = parse_cell(cell).map_err(|_| {
                    CisMapError::Parse(format!(
                        "Signal matrix line {}: '{}' is not a number",
                        line_no, cell
                    ))
                })?;
                values.push(value);
            }

            if rows.insert(key.clone(), row).is_some() {
                return Err(CisMapError::Parse(format!(
                    "Signal matrix key '{}' appears more than once",
                    key
                )));
            }
        }

        Ok(SignalMatrix {
            tissues,
            rows,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        let n = self.tissues.len();
        self.rows
            .get(key)
            .map(|&row| &self.values[row * n..(row + 1) * n])
    }

    ///
    /// Reorder columns to `tissues`. Tissues this matrix lacks become `NaN`.
    ///
    pub fn select_tissues(&self, tissues: &[String]) -> SignalMatrix {
        let positions: Vec<Option<usize>> = tissues
            .iter()
            .map(|t| self.tissues.iter().position(|own| own == t))
            .collect();

        let n_rows = self.rows.len();
        let n_own = self.tissues.len();
        let mut values = Vec::with_capacity(n_rows * tissues.len());
        for row in 0..n_rows {
            let own = &self.values[row * n_own..(row + 1) * n_own];
            values.extend(positions.iter().map(|p| p.map_or(f64::NAN, |i| own[i])));
        }

        SignalMatrix {
            tissues: tissues.to_vec(),
            rows: self.rows.clone(),
            values,
        }
    }
}

impl TryFrom<&Path> for SignalMatrix {
    type Error = CisMapError;

    fn try_from(path: &Path) -> Result<Self> {
        let reader = get_dynamic_reader(path)?;
        SignalMatrix::from_reader(reader)
    }
}

///
/// [SignalProvider] over one expression matrix and one matrix per histone
/// mark, all aligned to the expression tissues minus any omitted ones.
///
#[derive(Debug, Clone)]
pub struct TissueMatrixProvider {
    tissues: Vec<String>,
    expression: SignalMatrix,
    histones: FxHashMap<String, SignalMatrix>,
}

impl TissueMatrixProvider {
    pub fn new(
        expression: SignalMatrix,
        histones: Vec<(String, SignalMatrix)>,
        omitted_tissues: &[String],
    ) -> Result<Self> {
        let tissues: Vec<String> = expression
            .tissues
            .iter()
            .filter(|t| !omitted_tissues.contains(t))
            .cloned()
            .collect();
        if tissues.is_empty() {
            return Err(CisMapError::InvalidArgument(
                "no tissues left after omitting the requested ones".to_string(),
            ));
        }

        let mut aligned = FxHashMap::default();
        for (name, matrix) in histones {
            let missing: Vec<&str> = tissues
                .iter()
                .filter(|t| !matrix.tissues.contains(t))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                log::warn!(
                    "{}: no signal for tissue(s) {}; treated as missing",
                    name,
                    missing.join(",")
                );
            }
            aligned.insert(name, matrix.select_tissues(&tissues));
        }

        Ok(TissueMatrixProvider {
            expression: expression.select_tissues(&tissues),
            tissues,
            histones: aligned,
        })
    }

    ///
    /// Load the expression and histone matrices named by a [PipelineConfig].
    ///
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let expression = SignalMatrix::try_from(Path::new(&config.expression))?;
        log::info!(
            "Loaded expression for {} TSSes in {} tissues",
            expression.len(),
            expression.tissues.len()
        );

        let mut histones = Vec::with_capacity(config.histones.len());
        for histone in config.histones.iter() {
            let matrix = SignalMatrix::try_from(Path::new(&histone.matrix))?;
            log::info!("Loaded {} signal for {} loci", histone.name, matrix.len());
            histones.push((histone.name.clone(), matrix));
        }

        TissueMatrixProvider::new(expression, histones, &config.omitted_tissues)
    }
}

impl SignalProvider for TissueMatrixProvider {
    fn tissues(&self) -> &[String] {
        &self.tissues
    }

    fn histone_levels(&self, histone: &str, locus: &str) -> Option<&[f64]> {
        self.histones.get(histone)?.get(locus)
    }

    fn expression(&self, tss_id: &str) -> Option<&[f64]> {
        self.expression.get(tss_id)
    }
}
