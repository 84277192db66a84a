use std::path::PathBuf;

use crate::mission::Mission;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load model {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Invalid value for field `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model output is unusable: {0}")]
    OutputShape(String),
    #[error("A {0} prediction is already running")]
    SubmissionInFlight(Mission),
    #[error("Field `{field}` does not belong to the {mission} form")]
    UnknownField { mission: Mission, field: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "desktop")]
    #[error(transparent)]
    Tauri(#[from] tauri::Error),
}

impl Error {
    /// A stable, machine-readable name for the kind of failure.
    /// The front-end keys its notification styling on this.
    pub fn category(&self) -> &'static str {
        match self {
            Error::ModelLoad { .. } => "model-load",
            Error::InvalidInput { .. } => "invalid-input",
            Error::Inference(_) => "inference",
            Error::OutputShape(_) => "output-shape",
            Error::SubmissionInFlight(_) => "submission-in-flight",
            Error::UnknownField { .. } => "unknown-field",
            Error::Config(_) => "config",
            Error::Io(_) | Error::Json(_) => "io",
            #[cfg(feature = "desktop")]
            Error::Tauri(_) => "io",
        }
    }

    /// The offending field, for input errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::InvalidInput { field, .. } | Error::UnknownField { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
      S: serde::ser::Serializer,
    {
      serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
