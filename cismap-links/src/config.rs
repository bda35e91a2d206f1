use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cismap_core::models::{CorrelationSign, RegulatoryLink};

use crate::errors::{LinkError, LinkResult};

pub const MIN_FEATURE_COUNT: usize = 3;

fn default_min_feature_count() -> usize {
    MIN_FEATURE_COUNT
}

///
/// One histone mark: its name, its signal matrix and how far from a TSS
/// its loci may lie to be considered.
///
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct HistoneConfig {
    pub name: String,
    pub max_link_distance: u32,
    pub matrix: String,
}

///
/// Filters applied to raw links before score adjustment. Every count and
/// correction denominator is computed on the links that pass.
///
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
pub struct UpstreamFilter {
    pub max_score: Option<f64>,
    pub min_abs_correlation: Option<f64>,
    pub link_sign: Option<CorrelationSign>,
    pub min_link_distance: Option<u32>,
}

impl UpstreamFilter {
    pub fn is_empty(&self) -> bool {
        self == &UpstreamFilter::default()
    }

    pub fn passes(&self, link: &RegulatoryLink) -> bool {
        if self.max_score.is_some_and(|max| link.score > max) {
            return false;
        }
        if self
            .min_abs_correlation
            .is_some_and(|min| link.correlation.abs() < min)
        {
            return false;
        }
        if self
            .link_sign
            .is_some_and(|sign| link.correlation_sign() != sign)
        {
            return false;
        }
        if self
            .min_link_distance
            .is_some_and(|min| link.abs_distance() < min as u64)
        {
            return false;
        }
        true
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct PipelineConfig {
    pub histones: Vec<HistoneConfig>,
    pub expression: String,
    #[serde(default)]
    pub omitted_tissues: Vec<String>,
    #[serde(default = "default_min_feature_count")]
    pub min_feature_count: usize,
    #[serde(default)]
    pub min_max_expression: f64,
    #[serde(default)]
    pub require_expression_change: bool,
    #[serde(default)]
    pub upstream: UpstreamFilter,
}

impl PipelineConfig {
    ///
    /// Check the config for values the pipeline cannot run with.
    /// A `min_feature_count` below the correlation minimum is raised to it.
    ///
    pub fn validate(mut self) -> LinkResult<Self> {
        if self.histones.is_empty() {
            return Err(LinkError::InvalidConfig(
                "at least one histone mark must be configured".to_string(),
            ));
        }

        let mut names: Vec<&str> = self.histones.iter().map(|h| h.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(LinkError::InvalidConfig(format!(
                "histone mark '{}' is configured twice",
                pair[0]
            )));
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err(LinkError::InvalidConfig(
                "histone mark names must not be empty".to_string(),
            ));
        }

        if self.min_feature_count < MIN_FEATURE_COUNT {
            log::warn!(
                "min_feature_count {} is below {}, using {}",
                self.min_feature_count,
                MIN_FEATURE_COUNT,
                MIN_FEATURE_COUNT
            );
            self.min_feature_count = MIN_FEATURE_COUNT;
        }

        if !self.min_max_expression.is_finite() || self.min_max_expression < 0.0 {
            return Err(LinkError::InvalidConfig(format!(
                "min_max_expression must be a non-negative number, got {}",
                self.min_max_expression
            )));
        }

        if let Some(max_score) = self
            .upstream
            .max_score
            .filter(|s| !(*s > 0.0 && *s <= 1.0))
        {
            return Err(LinkError::InvalidConfig(format!(
                "upstream.max_score must be in (0, 1], got {}",
                max_score
            )));
        }
        if let Some(min_abs) = self
            .upstream
            .min_abs_correlation
            .filter(|m| !(0.0..=1.0).contains(m))
        {
            return Err(LinkError::InvalidConfig(format!(
                "upstream.min_abs_correlation must be in [0, 1], got {}",
                min_abs
            )));
        }

        Ok(self)
    }

    ///
    /// Make relative matrix paths relative to `base` (the config's directory).
    ///
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &str| -> String {
            let path = PathBuf::from(p);
            if path.is_absolute() {
                p.to_string()
            } else {
                base.join(path).to_string_lossy().into_owned()
            }
        };
        self.expression = resolve(&self.expression);
        for histone in self.histones.iter_mut() {
            histone.matrix = resolve(&histone.matrix);
        }
    }

    ///
    /// Parameters echoed into the trailer of every output table.
    ///
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "histones".to_string(),
            self.histones
                .iter()
                .map(|h| h.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )];
        params.push((
            "max_link_distances".to_string(),
            self.histones
                .iter()
                .map(|h| h.max_link_distance.to_string())
                .collect::<Vec<_>>()
                .join(","),
        ));
        params.push(("expression".to_string(), self.expression.clone()));
        if !self.omitted_tissues.is_empty() {
            params.push(("omitted_tissues".to_string(), self.omitted_tissues.join(",")));
        }
        params.push((
            "min_feature_count".to_string(),
            self.min_feature_count.to_string(),
        ));
        params.push((
            "min_max_expression".to_string(),
            self.min_max_expression.to_string(),
        ));
        params.push((
            "require_expression_change".to_string(),
            self.require_expression_change.to_string(),
        ));

        let upstream = &self.upstream;
        if let Some(v) = upstream.max_score {
            params.push(("max_score".to_string(), v.to_string()));
        }
        if let Some(v) = upstream.min_abs_correlation {
            params.push(("min_abs_correlation".to_string(), v.to_string()));
        }
        if let Some(v) = upstream.link_sign {
            params.push(("link_sign".to_string(), v.to_string()));
        }
        if let Some(v) = upstream.min_link_distance {
            params.push(("min_link_distance".to_string(), v.to_string()));
        }

        params
    }
}

impl TryFrom<&Path> for PipelineConfig {
    type Error = LinkError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        let mut config: PipelineConfig = toml::from_str(&toml_str)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()
    }
}

impl TryFrom<&str> for PipelineConfig {
    type Error = LinkError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        PipelineConfig::try_from(Path::new(path))
    }
}
