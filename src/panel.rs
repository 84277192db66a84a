/// Per-mission form state: the values the user has entered, whether a prediction is
/// running, and the last result. All three mission panels are this one type, differing
/// only in the `MissionConfig` they hold.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::error;
use serde::Serialize;

use crate::decision::Label;
use crate::engine::InferenceBackend;
use crate::error::{Error, Result};
use crate::interface::PanelView;
use crate::invoker::ModelInvoker;
use crate::mission::{Mission, MissionConfig};
use crate::preprocessing::FormValues;

/// Idle -> Submitting -> Idle. A panel only enters Submitting from Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelPhase
{
    Idle,
    Submitting,
}

/// What the panel remembers about its most recent failed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelFailure
{
    pub category: &'static str,
    pub message: String,
    pub field: Option<String>,
}

impl From<&Error> for PanelFailure
{
    fn from(error: &Error) -> Self
    {
        PanelFailure
        {
            category: error.category(),
            message: error.to_string(),
            field: error.field().map(str::to_string),
        }
    }
}

struct PanelInner
{
    values: FormValues,
    phase: PanelPhase,
    result: Option<Label>,
    last_failure: Option<PanelFailure>,
    predictions: u64,
}

pub struct FormPanel
{
    config: MissionConfig,
    inner: Mutex<PanelInner>,
}

impl FormPanel
{
    pub fn new(config: MissionConfig) -> Self
    {
        FormPanel
        {
            config,
            inner: Mutex::new(PanelInner
            {
                values: FormValues::new(),
                phase: PanelPhase::Idle,
                result: None,
                last_failure: None,
                predictions: 0,
            }),
        }
    }

    pub fn mission(&self) -> Mission
    {
        self.config.mission
    }

    pub fn config(&self) -> &MissionConfig
    {
        &self.config
    }

    // The lock is never held across an await, and every critical section leaves the
    // state consistent, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, PanelInner>
    {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_field(&self, name: &str) -> Result<()>
    {
        match self.config.field(name)
        {
            Some(_) => Ok(()),
            None => Err(Error::UnknownField { mission: self.config.mission, field: name.to_string() }),
        }
    }

    /// Patches one entry of the draft form.
    pub fn update_field(&self, name: &str, raw: &str) -> Result<()>
    {
        self.check_field(name)?;
        let mut inner = self.lock();
        inner.values = inner.values.with_field(name, raw);
        Ok(())
    }

    pub fn values(&self) -> FormValues
    {
        self.lock().values.clone()
    }

    pub fn is_submitting(&self) -> bool
    {
        self.lock().phase == PanelPhase::Submitting
    }

    pub fn snapshot(&self) -> PanelView
    {
        let inner = self.lock();
        PanelView
        {
            mission: self.config.mission,
            phase: inner.phase,
            loading: inner.phase == PanelPhase::Submitting,
            result: inner.result,
            last_failure: inner.last_failure.clone(),
            values: inner.values.clone(),
            predictions: inner.predictions,
        }
    }

    /// Runs a prediction on the current draft.
    pub async fn submit<B: InferenceBackend>(&self, invoker: &ModelInvoker<B>) -> Result<Label>
    {
        self.submit_inner(invoker, None).await
    }

    /// Replaces the draft with `values` and runs a prediction on it.
    /// The draft is kept whatever the outcome, so nothing needs retyping after a failure.
    pub async fn submit_values<B: InferenceBackend>(&self, invoker: &ModelInvoker<B>, values: FormValues) -> Result<Label>
    {
        for (name, _) in values.iter()
        {
            self.check_field(name)?;
        }
        self.submit_inner(invoker, Some(values)).await
    }

    async fn submit_inner<B: InferenceBackend>(&self, invoker: &ModelInvoker<B>, replacement: Option<FormValues>) -> Result<Label>
    {
        let values = {
            let mut inner = self.lock();
            if inner.phase == PanelPhase::Submitting
            {
                return Err(Error::SubmissionInFlight(self.config.mission));
            }
            if let Some(replacement) = replacement
            {
                inner.values = replacement;
            }
            inner.phase = PanelPhase::Submitting;
            inner.values.clone()
        };
        let mut guard = SubmittingGuard { panel: self, finished: false };

        let outcome = invoker.predict(&self.config, &values).await;

        let mut inner = self.lock();
        inner.phase = PanelPhase::Idle;
        guard.finished = true;
        match &outcome
        {
            Ok(label) =>
            {
                inner.result = Some(*label);
                inner.last_failure = None;
                inner.predictions += 1;
            },
            Err(e) =>
            {
                // The previous result stays on display.
                error!("{} prediction failed: {}", self.config.mission, e);
                inner.last_failure = Some(PanelFailure::from(e));
            },
        }
        outcome
    }
}

/// Returns the panel to Idle if a submission is dropped before it completes.
struct SubmittingGuard<'a>
{
    panel: &'a FormPanel,
    finished: bool,
}

impl Drop for SubmittingGuard<'_>
{
    fn drop(&mut self)
    {
        if !self.finished
        {
            self.panel.lock().phase = PanelPhase::Idle;
        }
    }
}

/// One panel per configured mission.
pub struct PanelSet
{
    panels: BTreeMap<Mission, FormPanel>,
}

impl PanelSet
{
    pub fn new(configs: impl IntoIterator<Item = MissionConfig>) -> Self
    {
        let panels = configs.into_iter()
            .map(|config| (config.mission, FormPanel::new(config)))
            .collect();
        PanelSet { panels }
    }

    pub fn get(&self, mission: Mission) -> Result<&FormPanel>
    {
        self.panels.get(&mission)
            .ok_or_else(|| Error::Config(format!("{} is not configured", mission)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormPanel>
    {
        self.panels.values()
    }
}
