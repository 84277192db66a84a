use uuid::Uuid;

use crate::config::AppConfig;
use crate::engine::InferenceBackend;
use crate::error::Result;
use crate::events::Notification;
use crate::interface::{MissionDescriptor, ModelPerformance, PanelView};
use crate::invoker::ModelInvoker;
use crate::mission::Mission;
use crate::panel::PanelSet;
use crate::preprocessing::FormValues;

/// Managed by Tauri: the shared invoker (and so the session cache) plus one panel per mission.
/// Both synchronize internally, so the state needs no outer lock.
pub struct PredictorState<B: InferenceBackend>
{
    pub invoker: ModelInvoker<B>,
    pub panels: PanelSet,
}

impl<B: InferenceBackend> PredictorState<B>
{
    pub fn new(backend: B, config: &AppConfig) -> Result<Self>
    {
        let missions = config.mission_configs()?;
        Ok(PredictorState
        {
            invoker: ModelInvoker::new(backend).with_inference_timeout(config.inference_timeout()),
            panels: PanelSet::new(missions),
        })
    }

    pub fn missions(&self) -> Vec<MissionDescriptor>
    {
        self.panels.iter().map(|panel| MissionDescriptor::from(panel.config())).collect()
    }

    pub fn statistics(&self) -> Vec<ModelPerformance>
    {
        self.panels.iter().map(|panel| ModelPerformance
        {
            mission: panel.mission(),
            name: panel.mission().display_name().to_string(),
            stats: panel.config().stats,
            session_predictions: panel.snapshot().predictions,
        }).collect()
    }

    pub fn panel_view(&self, mission: Mission) -> Result<PanelView>
    {
        Ok(self.panels.get(mission)?.snapshot())
    }

    pub fn update_field(&self, mission: Mission, field: &str, value: &str) -> Result<PanelView>
    {
        let panel = self.panels.get(mission)?;
        panel.update_field(field, value)?;
        Ok(panel.snapshot())
    }

    /// Submits `values` on the mission's panel.
    ///
    /// Prediction failures are recovered here: they are reported through `notify` and recorded
    /// on the panel, and the returned view still holds the last good result.
    /// Only a mission with no panel is an error.
    pub async fn run_prediction<F>(&self, mission: Mission, values: FormValues, mut notify: F) -> Result<PanelView>
    where
        F: FnMut(&Notification) + Send,
    {
        let panel = self.panels.get(mission)?;
        let submission_id = Uuid::new_v4();

        if !self.invoker.is_loaded(mission) && !panel.is_submitting()
        {
            notify(&Notification::loading_model(submission_id, mission));
        }

        let outcome = panel.submit_values(&self.invoker, values).await;
        notify(&Notification::from_outcome(submission_id, mission, &outcome));

        Ok(panel.snapshot())
    }
}
