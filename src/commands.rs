use log::{error, info};
use tauri::Manager;

use crate::error::Result;
use crate::events::Event;
use crate::interface::{MissionDescriptor, ModelPerformance, PanelView};
use crate::mission::Mission;
use crate::onnx::OrtBackend;
use crate::preprocessing::FormValues;
use crate::state::PredictorState;

pub type DesktopState = PredictorState<OrtBackend>;

/// The missions the front-end should render a form for, with their fields.
#[tauri::command]
pub async fn list_missions(state: tauri::State<'_, DesktopState>) -> Result<Vec<MissionDescriptor>>
{
    Ok(state.missions())
}

#[tauri::command]
pub async fn panel_state(mission: Mission, state: tauri::State<'_, DesktopState>) -> Result<PanelView>
{
    state.panel_view(mission)
}

/// Records one keystroke's worth of edits to a mission's draft.
/// Nothing is parsed until submission, so any text is accepted for a known field.
#[tauri::command]
pub async fn update_field(
        mission: Mission,
        field: String,
        value: String,
        state: tauri::State<'_, DesktopState>,
    ) -> Result<PanelView>
{
    state.update_field(mission, &field, &value)
}

/// Submits a form and waits for the prediction.
///
/// Progress and the outcome are also emitted as `prediction-notification` events, and the
/// final panel state as `panel-updated`, so other views of the same panel stay current.
/// A failed prediction is not an error here; it is reported in the returned `PanelView`.
#[tauri::command]
pub async fn run_prediction(
        mission: Mission,
        values: FormValues,
        state: tauri::State<'_, DesktopState>,
        app_handle: tauri::AppHandle,
    ) -> Result<PanelView>
{
    info!("Running {} prediction", mission);
    let view = state.run_prediction(mission, values, |notification| {
        let emit_result = app_handle.emit_all(Event::PredictionNotification.event_name(), notification.clone());
        if emit_result.is_err()
        {
            error!("Error emitting {}: {:?}", Event::PredictionNotification.event_name(), emit_result);
        }
    }).await?;

    let emit_result = app_handle.emit_all(Event::PanelUpdated.event_name(), view.clone());
    if emit_result.is_err()
    {
        error!("Error emitting {}: {:?}", Event::PanelUpdated.event_name(), emit_result);
    }

    Ok(view)
}

/// Published performance figures for each mission's model.
#[tauri::command]
pub async fn model_statistics(state: tauri::State<'_, DesktopState>) -> Result<Vec<ModelPerformance>>
{
    Ok(state.statistics())
}
