use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    Blocked,
    Error,
}

impl QueryStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Blocked => "blocked",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "success" => Some(Self::Success),
            "blocked" => Some(Self::Blocked),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One execution attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryLogEntry {
    pub logged_at_utc: String,
    pub tool_name: String,
    pub status: QueryStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    pub raw_sql: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_sql: Option<String>,

    /// Violation codes when blocked; the error text when execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_codes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    pub execution_ms: u64,
}

#[must_use]
pub fn json_schema() -> Value {
    let schema = schemars::schema_for!(QueryLogEntry);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated query log schema: {error}");
        }
    }
}
