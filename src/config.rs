/// Runtime configuration: where the model artifacts live, how long a run may take,
/// and per-mission overrides of the compiled-in model bindings.
///
/// Example `config.json`:
///
/// ```json
/// {
///   "model_dir": "/opt/exo-triage/models",
///   "inference_timeout_secs": 10,
///   "intra_threads": 4,
///   "missions": {
///     "tess": {
///       "model_path": "TESS_lightGBM_model_v2.onnx",
///       "output_names": ["probabilities"],
///       "decision_rule": { "kind": "argmax", "candidate_class": 1 }
///     }
///   }
/// }
/// ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::decision::LabelDecisionRule;
use crate::error::Result;
use crate::mission::{Mission, MissionConfig};

pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
/// The classifiers are small tree ensembles; a couple of threads is plenty.
pub const DEFAULT_INTRA_THREADS: usize = 2;

/// Replaces parts of a mission's compiled-in model binding. Unset fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionOverride
{
    pub model_path: Option<PathBuf>,
    pub input_name: Option<String>,
    pub output_names: Option<Vec<String>>,
    pub decision_rule: Option<LabelDecisionRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig
{
    /// Directory relative model paths are resolved against.
    /// Defaults to the `models` directory next to the crate manifest.
    pub model_dir: Option<PathBuf>,
    /// Seconds before a model run is reported as failed.
    /// Unset means the default; 0 disables the limit.
    pub inference_timeout_secs: Option<u64>,
    /// Threads the engine may use within one model run. Unset or 0 means the default.
    pub intra_threads: Option<usize>,
    pub missions: BTreeMap<Mission, MissionOverride>,
}

pub fn default_model_dir() -> PathBuf
{
    Path::new(env!("CARGO_MANIFEST_DIR")).join("models")
}

impl AppConfig
{
    pub fn load(path: &Path) -> Result<AppConfig>
    {
        info!("Reading configuration from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        AppConfig::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<AppConfig>
    {
        Ok(serde_json::from_str(json)?)
    }

    pub fn model_dir(&self) -> PathBuf
    {
        self.model_dir.clone().unwrap_or_else(default_model_dir)
    }

    pub fn inference_timeout(&self) -> Option<Duration>
    {
        match self.inference_timeout_secs
        {
            None => Some(Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS)),
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    pub fn intra_threads(&self) -> usize
    {
        match self.intra_threads
        {
            None | Some(0) => DEFAULT_INTRA_THREADS,
            Some(threads) => threads,
        }
    }

    /// The effective, validated configuration of every mission.
    pub fn mission_configs(&self) -> Result<Vec<MissionConfig>>
    {
        let model_dir = self.model_dir();
        Mission::ALL.iter()
            .map(|mission| {
                let mut config = MissionConfig::builtin(*mission);
                if let Some(overrides) = self.missions.get(mission)
                {
                    apply_override(&mut config, overrides);
                }
                if config.model_path.is_relative()
                {
                    config.model_path = model_dir.join(&config.model_path);
                }
                config.validate()?;
                Ok(config)
            })
            .collect()
    }
}

fn apply_override(config: &mut MissionConfig, overrides: &MissionOverride)
{
    if let Some(model_path) = &overrides.model_path
    {
        config.model_path = model_path.clone();
    }
    if let Some(input_name) = &overrides.input_name
    {
        config.input_name = input_name.clone();
    }
    if let Some(output_names) = &overrides.output_names
    {
        config.output_names = output_names.clone();
    }
    if let Some(rule) = overrides.decision_rule
    {
        config.decision_rule = rule;
    }
}
