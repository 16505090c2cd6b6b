//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A tmux session as listed by `GET /api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    /// Session name
    pub name: String,
    /// Always empty in listings; fetch `/api/sessions/{session}/windows` instead
    pub windows: Vec<WindowSummary>,
}

impl SessionSummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            windows: Vec::new(),
        }
    }
}

/// A window inside a tmux session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WindowSummary {
    /// tmux window index
    pub index: u32,
    /// Window name
    pub name: String,
}

/// Body carrying a (possibly required) name.
///
/// Used for session creation and for both rename endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NameRequest {
    #[serde(default)]
    pub name: Option<String>,
}

impl NameRequest {
    /// The name, treating missing, null and empty the same way.
    pub fn required_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Body of `POST /api/sessions/{session}/windows`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateWindowRequest {
    /// Optional window name; tmux picks one when absent
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedSession {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_names_are_missing() {
        let req: NameRequest = serde_json::from_str(r#"{"name":""}"#).unwrap();
        assert_eq!(req.required_name(), None);
        let req: NameRequest = serde_json::from_str(r#"{"name":null}"#).unwrap();
        assert_eq!(req.required_name(), None);
        let req: NameRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.required_name(), None);
        let req: NameRequest = serde_json::from_str(r#"{"name":"work"}"#).unwrap();
        assert_eq!(req.required_name(), Some("work"));
    }

    #[test]
    fn session_summary_serializes_empty_windows() {
        let json = serde_json::to_value(SessionSummary::named("main")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "main", "windows": []}));
    }
}
