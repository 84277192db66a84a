/// Turning a model's raw output into one of the two classification labels.
///
/// The mapping is pinned per model artifact in configuration. It is never guessed from
/// the shape of the output at call time: a class-label output and a probability output
/// can look identical (a single number), but they need different rules.

use std::fmt::{self, Display, Formatter};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::{NamedOutput, OutputValue};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label
{
    #[serde(rename = "CANDIDATE")]
    Candidate,
    #[serde(rename = "NOT CANDIDATE")]
    NotCandidate,
}

impl Label
{
    pub fn as_str(&self) -> &'static str
    {
        match self
        {
            Label::Candidate => "CANDIDATE",
            Label::NotCandidate => "NOT CANDIDATE",
        }
    }

    fn from_bool(is_candidate: bool) -> Label
    {
        if is_candidate { Label::Candidate } else { Label::NotCandidate }
    }
}

impl Display for Label
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

/// How a model's output maps onto `Label`.
/// Serialized as e.g. `{"kind": "threshold", "value": 0.5}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelDecisionRule
{
    /// The first element is a score; CANDIDATE when it is at least `value`.
    Threshold { value: f64 },
    /// The first element is a class index; CANDIDATE when it equals `value`.
    Equals { value: f64 },
    /// The output is a per-class vector; CANDIDATE when its largest element is at `candidate_class`.
    Argmax { candidate_class: usize },
}

impl LabelDecisionRule
{
    pub fn validate(&self) -> std::result::Result<(), String>
    {
        match self
        {
            LabelDecisionRule::Threshold { value } | LabelDecisionRule::Equals { value } if !value.is_finite() =>
                Err(format!("decision value {} is not finite", value)),
            _ => Ok(()),
        }
    }

    pub fn decide(&self, output: &OutputValue) -> Result<Label>
    {
        match *self
        {
            LabelDecisionRule::Threshold { value } =>
            {
                let score = first_finite(output)?;
                Ok(Label::from_bool(score >= value))
            },
            LabelDecisionRule::Equals { value } =>
            {
                let class = first_finite(output)?;
                Ok(Label::from_bool(class == value))
            },
            LabelDecisionRule::Argmax { candidate_class } =>
            {
                let values = output.values().ok_or_else(|| not_numeric(output))?;
                if candidate_class >= values.len()
                {
                    return Err(Error::OutputShape(format!(
                        "candidate class {} is out of range for an output of {} elements",
                        candidate_class, values.len())));
                }
                if values.iter().any(|v| !v.is_finite())
                {
                    return Err(Error::OutputShape("output contains a non-finite value".to_string()));
                }
                // First maximum wins on ties.
                let mut best = 0;
                for (i, v) in values.iter().enumerate()
                {
                    if *v > values[best]
                    {
                        best = i;
                    }
                }
                Ok(Label::from_bool(best == candidate_class))
            },
        }
    }
}

fn not_numeric(output: &OutputValue) -> Error
{
    match output
    {
        OutputValue::NonNumeric(kind) => Error::OutputShape(format!("output is not a numeric tensor ({})", kind)),
        _ => Error::OutputShape("output is not numeric".to_string()),
    }
}

fn first_finite(output: &OutputValue) -> Result<f64>
{
    if let OutputValue::NonNumeric(_) = output
    {
        return Err(not_numeric(output));
    }
    let first = output.first_scalar().ok_or_else(|| Error::OutputShape("output is empty".to_string()))?;
    if !first.is_finite()
    {
        return Err(Error::OutputShape(format!("output value {} is not finite", first)));
    }
    Ok(first)
}

/// Picks the output to classify from.
/// The first of `declared` that the model produced wins; otherwise the first output in the
/// order the session reported them. None only when there are no outputs at all.
pub fn select_output<'a>(outputs: &'a [NamedOutput], declared: &[String]) -> Option<&'a NamedOutput>
{
    declared.iter()
        .find_map(|name| outputs.iter().find(|o| &o.name == name))
        .or_else(|| outputs.first())
}

/// Selects the output and applies the rule.
pub fn normalize(outputs: &[NamedOutput], declared: &[String], rule: &LabelDecisionRule) -> Result<Label>
{
    let output = select_output(outputs, declared)
        .ok_or_else(|| Error::OutputShape("model produced no outputs".to_string()))?;
    debug!("Classifying from output {:?}", output.name);
    rule.decide(&output.value)
}
