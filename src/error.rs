use crate::rules::FieldError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("{}", .0.message)]
    Validation(FieldError),

    #[error("{0}")]
    Authorization(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Persistence(String),
}

impl PlacementError {
    pub fn code(&self) -> &'static str {
        match self {
            PlacementError::Validation(_) => "validation_failed",
            PlacementError::Authorization(_) => "forbidden",
            PlacementError::NotFound { .. } => "not_found",
            PlacementError::Conflict(_) => "conflict",
            PlacementError::Persistence(_) => "db_failed",
        }
    }

    pub fn placement_not_found(id: &str) -> Self {
        PlacementError::NotFound {
            entity: "placement",
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for PlacementError {
    fn from(e: rusqlite::Error) -> Self {
        PlacementError::Persistence(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

/// One-shot message for the user, produced by the last operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            code: None,
            message: message.into(),
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            code: Some(code),
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        self.level == FlashLevel::Error
    }
}
