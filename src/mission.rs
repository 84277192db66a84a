/// The three survey missions and the static tables that describe their forms.
/// Everything that differs between the Kepler, TESS and K2 panels lives here as data;
/// the prediction code itself is shared.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::decision::LabelDecisionRule;
use crate::error::{Error, Result};

/// Name of the single float tensor the exported classifiers take.
pub const DEFAULT_INPUT_NAME: &str = "float_input";

/// The output skl2onnx/onnxmltools classifiers report first: the predicted class.
pub const DEFAULT_OUTPUT_NAME: &str = "label";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mission
{
    Kepler,
    Tess,
    K2,
}

impl Mission
{
    pub const ALL: [Mission; 3] = [Mission::Kepler, Mission::Tess, Mission::K2];

    pub fn display_name(&self) -> &'static str
    {
        match self
        {
            Mission::Kepler => "KEPLER",
            Mission::Tess => "TESS",
            Mission::K2 => "K2",
        }
    }

    /// The number of features the mission's model was exported with.
    pub fn feature_count(&self) -> usize
    {
        self.field_table().len()
    }

    fn field_table(&self) -> &'static [(&'static str, &'static str)]
    {
        match self
        {
            Mission::Kepler => &KEPLER_FIELDS,
            Mission::Tess => &TESS_FIELDS,
            Mission::K2 => &K2_FIELDS,
        }
    }
}

impl Display for Mission
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.display_name())
    }
}

// (form field name, human-readable label), in the column order of the exported models.
const KEPLER_FIELDS: [(&str, &str); 7] = [
    ("koi_prad", "Planet Radius"),
    ("koi_period", "Orbital Period"),
    ("koi_score", "Disposition Score"),
    ("koi_teq", "Equilibrium Temp"),
    ("koi_depth_log", "Transit Depth (log ppm)"),
    ("koi_steff", "Stellar Temp"),
    ("koi_duration", "Transit Duration (hrs)"),
];

const TESS_FIELDS: [(&str, &str); 14] = [
    ("pl_pnum", "Number of Planets"),
    ("pl_tranmid", "Transit Midpoint"),
    ("pl_orbper", "Orbital Period"),
    ("pl_trandurh", "Transit Duration"),
    ("pl_trandep", "Transit Depth"),
    ("pl_rade", "Planet Radius"),
    ("pl_eqt", "Equilibrium Temp"),
    ("ra", "Right Ascension"),
    ("st_pmra", "Proper Motion RA"),
    ("st_pmdec", "Proper Motion Dec"),
    ("st_tmag", "TESS Magnitude"),
    ("st_dist", "Distance (parsecs)"),
    ("st_teff", "Effective Temperature"),
    ("st_rad", "Stellar Radius"),
];

const K2_FIELDS: [(&str, &str); 10] = [
    ("k2-trandep", "Transit Depth [%]"),
    ("k2-tranmid", "Transit Midpoint [days]"),
    ("k2-dec", "Declination"),
    ("k2-campaigns", "Campaigns Number"),
    ("k2-glat", "Galactic Latitude"),
    ("k2-disc-year", "Discovery Year"),
    ("k2-sy-pm", "System Proper Motion"),
    ("k2-elat", "Ecliptic Latitude"),
    ("k2-elon", "Ecliptic Longitude"),
    ("k2-sy-plx", "Parallax [mas]"),
];

/// One numeric input on a mission's form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec
{
    pub name: &'static str,
    pub label: &'static str,
    /// Granularity of the number input.
    pub step: f64,
    pub required: bool,
}

impl FieldSpec
{
    /// Zero rendered with as many decimals as the step has, e.g. "0.00" for 0.01 or 0.25.
    pub fn placeholder(&self) -> String
    {
        // f64's Display never uses exponent notation, so the digits after '.' are the step's decimals.
        let decimals = if self.step.is_finite() && self.step > 0.0
        {
            let step = self.step.to_string();
            step.split_once('.').map(|(_, fraction)| fraction.len()).unwrap_or(0)
        }
        else
        {
            0
        };
        format!("{:.*}", decimals, 0.0)
    }
}

/// Published performance of a mission's exported model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelStats
{
    pub f1_score: f64,
    pub precision: f64,
    pub recall: f64,
    pub reported_predictions: u64,
}

/// Everything needed to render one mission's form and run its model.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionConfig
{
    pub mission: Mission,
    pub title: &'static str,
    pub description: &'static str,
    /// In the exact order the model expects its input columns.
    pub fields: Vec<FieldSpec>,
    pub model_path: PathBuf,
    pub input_name: String,
    /// Output identifiers to look for, in order of preference.
    /// If none are present the first output the session reports is used.
    pub output_names: Vec<String>,
    pub decision_rule: LabelDecisionRule,
    pub stats: ModelStats,
}

impl MissionConfig
{
    /// The compiled-in configuration for a mission.
    /// The model path is relative; `AppConfig` resolves it against the model directory.
    pub fn builtin(mission: Mission) -> MissionConfig
    {
        let (title, description, model_file, step, stats) = match mission
        {
            Mission::Kepler => (
                "KEPLER Model",
                "Exoplanet detection using transit photometry data",
                "Kepler_KOI_rf_model.onnx",
                0.01,
                ModelStats { f1_score: 0.81, precision: 1.00, recall: 1.00, reported_predictions: 15234 },
            ),
            Mission::Tess => (
                "TESS Model",
                "Transiting Exoplanet Survey Satellite classification",
                "TESS_lightGBM_model.onnx",
                0.01,
                ModelStats { f1_score: 0.85, precision: 0.85, recall: 0.85, reported_predictions: 12891 },
            ),
            Mission::K2 => (
                "K2 Model",
                "K2 mission extended data analysis",
                "random_forest_K2_model.onnx",
                0.001,
                ModelStats { f1_score: 0.91, precision: 0.91, recall: 0.92, reported_predictions: 18742 },
            ),
        };

        let fields = mission.field_table()
            .iter()
            .map(|&(name, label)| FieldSpec { name, label, step, required: true })
            .collect();

        MissionConfig
        {
            mission,
            title,
            description,
            fields,
            model_path: PathBuf::from(model_file),
            input_name: DEFAULT_INPUT_NAME.to_string(),
            output_names: vec![DEFAULT_OUTPUT_NAME.to_string()],
            // The classifiers emit their class label (0 or 1) first.
            // Thresholding at 0.5 reads the same label correctly and also accepts a probability output.
            decision_rule: LabelDecisionRule::Threshold { value: 0.5 },
            stats,
        }
    }

    pub fn input_count(&self) -> usize
    {
        self.fields.len()
    }

    pub fn feature_order(&self) -> impl Iterator<Item = &'static str> + '_
    {
        self.fields.iter().map(|f| f.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec>
    {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> Result<()>
    {
        if self.fields.len() != self.mission.feature_count()
        {
            return Err(Error::Config(format!(
                "{} expects {} features, configured with {}",
                self.mission, self.mission.feature_count(), self.fields.len())));
        }
        for (i, field) in self.fields.iter().enumerate()
        {
            if self.fields[..i].iter().any(|f| f.name == field.name)
            {
                return Err(Error::Config(format!("{} lists field `{}` twice", self.mission, field.name)));
            }
        }
        if self.input_name.trim().is_empty()
        {
            return Err(Error::Config(format!("{} has an empty input name", self.mission)));
        }
        if self.model_path.as_os_str().is_empty()
        {
            return Err(Error::Config(format!("{} has no model path", self.mission)));
        }
        self.decision_rule.validate()
            .map_err(|reason| Error::Config(format!("{}: {}", self.mission, reason)))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn feature_counts_match_the_exported_models()
    {
        assert_eq!(Mission::Kepler.feature_count(), 7);
        assert_eq!(Mission::Tess.feature_count(), 14);
        assert_eq!(Mission::K2.feature_count(), 10);
    }

    #[test]
    fn builtin_configs_are_valid()
    {
        for mission in Mission::ALL
        {
            let config = MissionConfig::builtin(mission);
            config.validate().unwrap();
            assert_eq!(config.input_count(), mission.feature_count());
        }
    }

    #[test]
    fn kepler_feature_order()
    {
        let config = MissionConfig::builtin(Mission::Kepler);
        let order: Vec<&str> = config.feature_order().collect();
        assert_eq!(order, vec!["koi_prad", "koi_period", "koi_score", "koi_teq", "koi_depth_log", "koi_steff", "koi_duration"]);
    }

    #[test]
    fn placeholders_follow_step()
    {
        let kepler = MissionConfig::builtin(Mission::Kepler);
        assert_eq!(kepler.fields[0].placeholder(), "0.00");
        let k2 = MissionConfig::builtin(Mission::K2);
        assert_eq!(k2.field("k2-campaigns").unwrap().placeholder(), "0.000");
    }

    #[test]
    fn placeholders_for_uneven_steps()
    {
        let field = |step| FieldSpec { name: "x", label: "X", step, required: true };
        assert_eq!(field(0.25).placeholder(), "0.00");
        assert_eq!(field(0.5).placeholder(), "0.0");
        assert_eq!(field(2.5).placeholder(), "0.0");
        assert_eq!(field(1.0).placeholder(), "0");
        assert_eq!(field(0.0).placeholder(), "0");
    }

    #[test]
    fn duplicate_fields_are_rejected()
    {
        let mut config = MissionConfig::builtin(Mission::Kepler);
        config.fields[1] = config.fields[0].clone();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn mission_serializes_lowercase()
    {
        assert_eq!(serde_json::to_string(&Mission::K2).unwrap(), "\"k2\"");
        let mission: Mission = serde_json::from_str("\"tess\"").unwrap();
        assert_eq!(mission, Mission::Tess);
        assert_eq!(Mission::Tess.to_string(), "TESS");
    }
}
