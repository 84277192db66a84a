/// Events emitted to the front-end, and their payloads.

use serde::Serialize;
use uuid::Uuid;

use crate::decision::Label;
use crate::error::Error;
use crate::junk_drawer;
use crate::mission::Mission;

pub enum Event
{
    /// Payload: `Notification`.
    PredictionNotification,
    /// Payload: `interface::PanelView`.
    PanelUpdated,
}

impl Event
{
    pub fn event_name(&self) -> &str
    {
        match self
        {
            Event::PredictionNotification => "prediction-notification",
            Event::PanelUpdated => "panel-updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel
{
    Info,
    Success,
    Error,
}

/// A transient message about one submission, shown as a toast by the front-end.
/// All notifications for the same submission share a `submission_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification
{
    pub submission_id: String,
    pub mission: Mission,
    pub level: NotificationLevel,
    pub category: Option<&'static str>,
    pub message: String,
    pub timestamp: String,
}

impl Notification
{
    fn new(submission_id: Uuid, mission: Mission, level: NotificationLevel, category: Option<&'static str>, message: String) -> Self
    {
        Notification
        {
            submission_id: submission_id.to_string(),
            mission,
            level,
            category,
            message,
            timestamp: junk_drawer::now_string(),
        }
    }

    pub fn loading_model(submission_id: Uuid, mission: Mission) -> Self
    {
        Notification::new(submission_id, mission, NotificationLevel::Info, None, format!("Loading {} model...", mission))
    }

    pub fn from_outcome(submission_id: Uuid, mission: Mission, outcome: &Result<Label, Error>) -> Self
    {
        match outcome
        {
            Ok(label) => Notification::new(
                submission_id,
                mission,
                NotificationLevel::Success,
                None,
                format!("{} Model Prediction: {}", mission, label)),
            Err(e) => Notification::new(
                submission_id,
                mission,
                NotificationLevel::Error,
                Some(e.category()),
                format!("Failed to run {} prediction: {}", mission, e)),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn success_message()
    {
        let id = Uuid::new_v4();
        let notification = Notification::from_outcome(id, Mission::Kepler, &Ok(Label::Candidate));
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(notification.message, "KEPLER Model Prediction: CANDIDATE");
        assert_eq!(notification.submission_id, id.to_string());
        assert_eq!(notification.category, None);
    }

    #[test]
    fn failure_carries_category()
    {
        let error = Error::InvalidInput { field: "k2-campaigns".to_string(), reason: "\"abc\" is not a number".to_string() };
        let notification = Notification::from_outcome(Uuid::new_v4(), Mission::K2, &Err(error));
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.category, Some("invalid-input"));
        assert!(notification.message.starts_with("Failed to run K2 prediction"));
        assert!(notification.message.contains("k2-campaigns"));
    }

    #[test]
    fn notification_serialization()
    {
        let notification = Notification::loading_model(Uuid::new_v4(), Mission::Tess);
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["level"], "info");
        assert_eq!(json["mission"], "tess");
        assert_eq!(json["message"], "Loading TESS model...");
        assert_eq!(Event::PredictionNotification.event_name(), "prediction-notification");
    }
}
