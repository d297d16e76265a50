//! Connector configuration file
//!
//! JSON with three sections:
//!
//! ```json
//! {
//!   "information": { "name": "car", "id": "{...}", "type": "ISL" },
//!   "cosimulation": { "session": "sess1", "connect_timeout": 0,
//!                     "start_time": 0.0, "end_time": 10.0,
//!                     "step_size": 0.1, "step_tolerance": 1e-6 },
//!   "variables": [
//!     { "id": "speed", "causality": "output",
//!       "type": { "kind": "Real", "size": 1, "initial_value": "0" } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use isl_core::{Causality, IslError, IslResult, SignalType};

/// Extension of configuration files written by `save`
pub const CONFIG_EXTENSION: &str = "json";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorFile {
    pub information: Information,
    #[serde(default)]
    pub cosimulation: Cosimulation,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Information {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub type_tag: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cosimulation {
    pub session: String,
    /// Seconds, 0 waits forever
    pub connect_timeout: i32,
    pub start_time: f64,
    pub end_time: f64,
    /// 0 selects the default, -1 event mode
    pub step_size: f64,
    /// 0 selects the settings default
    pub step_tolerance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub connect_id: String,
    pub causality: Causality,
    #[serde(default)]
    pub step_size: f64,
    #[serde(default)]
    pub store: bool,
    /// Seconds, `<= 0` waits forever
    #[serde(default)]
    pub sync_timeout: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo_depth: Option<usize>,
    #[serde(rename = "type")]
    pub kind: VariableType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableType {
    pub kind: SignalType,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub initial_value: String,
}

fn default_size() -> usize {
    1
}

impl ConnectorFile {
    pub fn read(path: impl AsRef<Path>) -> IslResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| IslError::LoadError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| IslError::LoadError(format!("{}: {}", path.display(), e)))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> IslResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IslError::SaveError(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| IslError::SaveError(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document() {
        let doc: ConnectorFile = serde_json::from_str(
            r#"{
                "information": { "name": "car" },
                "variables": [
                    { "id": "speed", "causality": "output", "type": { "kind": "Real" } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.information.name, "car");
        assert_eq!(doc.cosimulation.step_size, 0.0);
        assert_eq!(doc.variables[0].kind.size, 1);
        assert_eq!(doc.variables[0].causality, Causality::Output);
        assert!(doc.variables[0].fifo_depth.is_none());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ConnectorFile::read("/nonexistent/isl/model.json"),
            Err(IslError::LoadError(_))
        ));
    }

    #[test]
    fn test_malformed_file() {
        let path = std::env::temp_dir().join(format!("isl_bad_{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ConnectorFile::read(&path), Err(IslError::LoadError(_))));
        let _ = std::fs::remove_file(&path);
    }
}
