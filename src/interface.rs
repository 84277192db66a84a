/// This module contains structs that are returned by the various Tauri commands.
/// They are serialized as JSON objects to be received by the front-end.
/// Their definitions should be kept in sync with the front-end's types.
/// That INCLUDES the names of the various fields, which become the JSON keys.

use serde::Serialize;

use crate::decision::{Label, LabelDecisionRule};
use crate::mission::{FieldSpec, Mission, MissionConfig, ModelStats};
use crate::panel::{PanelFailure, PanelPhase};
use crate::preprocessing::FormValues;

/// One numeric input as the form should render it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldDescriptor
{
    pub name: String,
    pub label: String,
    pub step: f64,
    pub placeholder: String,
    pub required: bool,
}

impl From<&FieldSpec> for FieldDescriptor
{
    fn from(field: &FieldSpec) -> Self
    {
        FieldDescriptor
        {
            name: field.name.to_string(),
            label: field.label.to_string(),
            step: field.step,
            placeholder: field.placeholder(),
            required: field.required,
        }
    }
}

/// Everything the front-end needs to draw a mission's tab.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissionDescriptor
{
    pub mission: Mission,
    pub name: String,
    pub title: String,
    pub description: String,
    pub fields: Vec<FieldDescriptor>,
    pub decision_rule: LabelDecisionRule,
    pub stats: ModelStats,
}

impl From<&MissionConfig> for MissionDescriptor
{
    fn from(config: &MissionConfig) -> Self
    {
        MissionDescriptor
        {
            mission: config.mission,
            name: config.mission.display_name().to_string(),
            title: config.title.to_string(),
            description: config.description.to_string(),
            fields: config.fields.iter().map(FieldDescriptor::from).collect(),
            decision_rule: config.decision_rule,
            stats: config.stats,
        }
    }
}

/// The state of one mission's panel.
/// `result` is None until the first successful prediction, and survives later failures.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PanelView
{
    pub mission: Mission,
    pub phase: PanelPhase,
    pub loading: bool,
    pub result: Option<Label>,
    pub last_failure: Option<PanelFailure>,
    pub values: FormValues,
    pub predictions: u64,
}

/// Published figures for a mission's model, plus how many predictions it has made this session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelPerformance
{
    pub mission: Mission,
    pub name: String,
    #[serde(flatten)]
    pub stats: ModelStats,
    pub session_predictions: u64,
}
