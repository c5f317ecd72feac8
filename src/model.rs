//! SoC regression models.
//!
//! A model artifact is a JSON document naming its input columns and one
//! estimator. Loading validates the column schema up front so a drifted
//! artifact fails at startup rather than on the first prediction.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sample::{FeatureRow, FEATURE_NAMES};

pub const FORMAT_VERSION: u32 = 1;

/// Anything that maps feature rows to SoC estimates, one output per row.
pub trait SocModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub features: Vec<String>,
    pub estimator: Estimator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    Forest {
        trees: Vec<Tree>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl Tree {
    fn validate(&self, idx: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("tree {} has no nodes", idx);
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                threshold,
            } = *node
            {
                if feature >= FEATURE_NAMES.len() {
                    bail!("tree {} node {}: feature index {} out of range", idx, i, feature);
                }
                if !threshold.is_finite() {
                    bail!("tree {} node {}: non-finite threshold", idx, i);
                }
                // Children strictly after the parent rules out cycles.
                for child in [left, right] {
                    if child <= i || child >= self.nodes.len() {
                        bail!("tree {} node {}: bad child index {}", idx, i, child);
                    }
                }
            }
        }
        Ok(())
    }

    /// Walks from the root; `x[feature] <= threshold` goes left.
    pub fn eval(&self, row: &FeatureRow) -> Result<f64> {
        let mut i = 0;
        loop {
            let node = self
                .nodes
                .get(i)
                .ok_or_else(|| anyhow!("tree node {} missing", i))?;
            match *node {
                Node::Leaf { value } => return Ok(value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row
                        .get(feature)
                        .ok_or_else(|| anyhow!("feature index {} out of range", feature))?;
                    let next = if *x <= threshold { left } else { right };
                    if next <= i {
                        bail!("tree node {} points backwards to {}", i, next);
                    }
                    i = next;
                }
            }
        }
    }
}

impl Estimator {
    fn validate(&self) -> Result<()> {
        match self {
            Estimator::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != FEATURE_NAMES.len() {
                    bail!(
                        "linear estimator has {} coefficients, expected {}",
                        coefficients.len(),
                        FEATURE_NAMES.len()
                    );
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    bail!("linear estimator has non-finite parameters");
                }
                Ok(())
            }
            Estimator::Forest { trees } => {
                if trees.is_empty() {
                    bail!("forest estimator has no trees");
                }
                for (i, t) in trees.iter().enumerate() {
                    t.validate(i)?;
                }
                Ok(())
            }
        }
    }

    fn predict_one(&self, row: &FeatureRow) -> Result<f64> {
        match self {
            Estimator::Linear {
                intercept,
                coefficients,
            } => Ok(intercept + coefficients.iter().zip(row).map(|(c, x)| c * x).sum::<f64>()),
            Estimator::Forest { trees } => {
                if trees.is_empty() {
                    bail!("forest estimator has no trees");
                }
                let mut sum = 0.0;
                for t in trees {
                    sum += t.eval(row)?;
                }
                Ok(sum / trees.len() as f64)
            }
        }
    }
}

impl SocModel for Estimator {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        rows.iter().map(|r| self.predict_one(r)).collect()
    }
}

impl ModelArtifact {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            bail!(
                "unsupported model format_version {} (expected {})",
                self.format_version,
                FORMAT_VERSION
            );
        }
        if self.features.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(anyhow!(
                "model feature schema mismatch: expected {:?}, found {:?}",
                FEATURE_NAMES,
                self.features
            ));
        }
        self.estimator.validate()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let artifact: ModelArtifact =
            serde_json::from_str(text).context("model artifact is not valid JSON")?;
        artifact.validate()?;
        Ok(artifact)
    }
}

/// Reads and validates a model artifact, returning its estimator.
pub fn load_model(path: &Path) -> Result<Estimator> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading model artifact {}", path.display()))?;
    let artifact = ModelArtifact::from_json(&text)
        .with_context(|| format!("loading model artifact {}", path.display()))?;
    Ok(artifact.estimator)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR: &str = r#"{
        "format_version": 1,
        "features": ["Voltage", "Current", "Temp"],
        "estimator": {"kind": "linear", "intercept": -370.0, "coefficients": [110.0, 2.0, 0.1]}
    }"#;

    const FOREST: &str = r#"{
        "format_version": 1,
        "features": ["Voltage", "Current", "Temp"],
        "estimator": {"kind": "forest", "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 3.7, "left": 1, "right": 2},
                {"value": 20.0},
                {"value": 80.0}
            ]},
            {"nodes": [{"value": 50.0}]}
        ]}
    }"#;

    #[test]
    fn test_linear_predict() {
        let est = ModelArtifact::from_json(LINEAR).unwrap().estimator;
        let out = est.predict(&[[4.0, 1.0, 10.0]]).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0] - (-370.0 + 440.0 + 2.0 + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_forest_mean_of_trees() {
        let est = ModelArtifact::from_json(FOREST).unwrap().estimator;
        let out = est.predict(&[[3.7, 0.0, 0.0], [3.9, 0.0, 0.0]]).unwrap();
        assert_eq!(out, vec![35.0, 65.0]);
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let bad = LINEAR.replace("\"Temp\"", "\"Temperature\"");
        let err = ModelArtifact::from_json(&bad).unwrap_err();
        assert!(err.to_string().contains("schema mismatch"));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let bad = LINEAR.replace("\"format_version\": 1", "\"format_version\": 2");
        assert!(ModelArtifact::from_json(&bad).is_err());
    }

    #[test]
    fn test_coefficient_count_checked() {
        let bad = LINEAR.replace("[110.0, 2.0, 0.1]", "[110.0, 2.0]");
        assert!(ModelArtifact::from_json(&bad).is_err());
    }

    #[test]
    fn test_cyclic_tree_rejected() {
        let bad = FOREST.replace("\"left\": 1", "\"left\": 0");
        assert!(ModelArtifact::from_json(&bad).is_err());
    }

    #[test]
    fn test_child_out_of_range_rejected() {
        let bad = FOREST.replace("\"right\": 2", "\"right\": 9");
        assert!(ModelArtifact::from_json(&bad).is_err());
    }

    #[test]
    fn test_empty_forest_rejected() {
        let bad = r#"{"format_version": 1, "features": ["Voltage", "Current", "Temp"],
            "estimator": {"kind": "forest", "trees": []}}"#;
        assert!(ModelArtifact::from_json(bad).is_err());
    }

    #[test]
    fn test_load_model_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, LINEAR).unwrap();
        let est = load_model(&path).unwrap();
        assert!(matches!(est, Estimator::Linear { .. }));
        assert!(load_model(&dir.path().join("missing.json")).is_err());
    }
}
