use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ResolvedPolicy;
use crate::tools::{ExecuteResponse, ToolError};
use crate::utils::time::utc_now;

pub const TOOL_ENVELOPE_SCHEMA_VERSION: &str = "govquery.tool-envelope.v1";

pub type ToolEnvelopeMeta = BTreeMap<String, Value>;

/// Why a tool call produced no usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCode {
    /// The governance validator rejected the SQL. Not a runtime fault.
    SqlValidationFailed,
    QueryExecutionFailed,
    ToolTransportFailed,
}

impl ToolErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SqlValidationFailed => "sql_validation_failed",
            Self::QueryExecutionFailed => "query_execution_failed",
            Self::ToolTransportFailed => "tool_transport_failed",
        }
    }

    #[must_use]
    pub const fn is_governance_rejection(self) -> bool {
        matches!(self, Self::SqlValidationFailed)
    }
}

impl Display for ToolErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolWarningCode {
    /// Rows were dropped at the execution row cap.
    ResultTruncated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelopeWarning {
    pub code: ToolWarningCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelopeError {
    pub code: ToolErrorCode,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// What every CLI tool operation prints: one JSON document on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub ok: bool,
    pub tool: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: ToolEnvelopeMeta,
    pub warnings: Vec<ToolEnvelopeWarning>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolEnvelopeError>,
}

impl ToolEnvelope {
    /// Success envelope carrying `data` serialized as JSON.
    pub fn success<T: Serialize + ?Sized>(tool: &str, data: &T) -> Result<Self> {
        let data = serde_json::to_value(data)
            .with_context(|| format!("failed to encode `{tool}` result"))?;
        Ok(Self::with_outcome(tool, true, Some(data), None))
    }

    /// Governance rejection. `rejection` is the validator or orchestrator
    /// payload that names the violations.
    pub fn rejected<T: Serialize + ?Sized>(
        tool: &str,
        message: &str,
        rejection: &T,
    ) -> Result<Self> {
        let details = serde_json::to_value(rejection)
            .with_context(|| format!("failed to encode `{tool}` rejection"))?;
        Ok(Self::failed(
            tool,
            ToolErrorCode::SqlValidationFailed,
            message,
            Some(details),
        ))
    }

    #[must_use]
    pub fn from_tool_error(tool: &str, error: &ToolError) -> Self {
        let (code, details) = match error {
            ToolError::Execution(cause) => {
                (ToolErrorCode::QueryExecutionFailed, json!({ "cause": cause }))
            }
            ToolError::Transport {
                tool: upstream,
                message,
            } => (
                ToolErrorCode::ToolTransportFailed,
                json!({ "upstream_tool": upstream, "cause": message }),
            ),
        };
        Self::failed(tool, code, &error.to_string(), Some(details))
    }

    #[must_use]
    pub fn failed(
        tool: &str,
        code: ToolErrorCode,
        message: &str,
        details: Option<Value>,
    ) -> Self {
        Self::with_outcome(
            tool,
            false,
            None,
            Some(ToolEnvelopeError {
                code,
                message: message.to_string(),
                details,
            }),
        )
    }

    fn with_outcome(
        tool: &str,
        ok: bool,
        data: Option<Value>,
        error: Option<ToolEnvelopeError>,
    ) -> Self {
        Self {
            ok,
            tool: tool.to_string(),
            generated_at_utc: utc_now(),
            data,
            meta: ToolEnvelopeMeta::from([(
                "schema_version".to_string(),
                json!(TOOL_ENVELOPE_SCHEMA_VERSION),
            )]),
            warnings: Vec::new(),
            error,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }

    /// Records which policy governed the call.
    #[must_use]
    pub fn with_policy(self, resolved: &ResolvedPolicy) -> Self {
        self.with_meta(
            "policy",
            json!({
                "source": resolved.source.to_string(),
                "max_limit": resolved.policy.max_limit(),
                "enforce_limit": resolved.policy.enforce_limit(),
            }),
        )
    }

    /// Adds a `result_truncated` warning when the execution hit its row cap.
    #[must_use]
    pub fn with_truncation_check(mut self, response: &ExecuteResponse) -> Self {
        if response.truncated() {
            self.warnings.push(ToolEnvelopeWarning {
                code: ToolWarningCode::ResultTruncated,
                message: format!(
                    "result stopped at the {}-row cap; more rows matched",
                    response.rows().len()
                ),
            });
        }
        self
    }

    #[must_use]
    pub fn error_code(&self) -> Option<ToolErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }

    #[must_use]
    pub fn into_failure(self) -> anyhow::Error {
        anyhow::Error::new(ToolEnvelopeCommandFailure { envelope: self })
    }
}

/// A failed tool call that still has an envelope to print.
#[derive(Debug, Clone)]
pub struct ToolEnvelopeCommandFailure {
    envelope: ToolEnvelope,
}

impl ToolEnvelopeCommandFailure {
    #[must_use]
    pub fn envelope(&self) -> &ToolEnvelope {
        &self.envelope
    }

    #[must_use]
    pub fn error_code(&self) -> Option<ToolErrorCode> {
        self.envelope.error_code()
    }
}

impl Display for ToolEnvelopeCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.envelope.error {
            Some(error) => write!(
                f,
                "`{}` failed with {}: {}",
                self.envelope.tool, error.code, error.message
            ),
            None => write!(f, "`{}` failed", self.envelope.tool),
        }
    }
}

impl std::error::Error for ToolEnvelopeCommandFailure {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ToolEnvelope, ToolErrorCode, ToolWarningCode};
    use crate::config::{PolicySource, ResolvedPolicy};
    use crate::governance::Policy;
    use crate::tools::{ExecuteResponse, ExecuteSuccess, ToolError};

    fn success(truncated: bool) -> ExecuteResponse {
        ExecuteResponse::Success(ExecuteSuccess {
            ok: true,
            row_count: 2,
            rows: vec![json!({"sale_id": 1}), json!({"sale_id": 2})],
            sql: "SELECT sale_id FROM fact_sales".to_string(),
            truncated,
        })
    }

    #[test]
    fn truncated_results_carry_a_warning() {
        let envelope = ToolEnvelope::success("query.execute", &success(true))
            .expect("envelope builds")
            .with_truncation_check(&success(true));

        assert_eq!(envelope.warnings.len(), 1);
        assert_eq!(envelope.warnings[0].code, ToolWarningCode::ResultTruncated);
        assert!(envelope.warnings[0].message.contains("2-row cap"));

        let encoded = serde_json::to_value(&envelope).expect("envelope serializes");
        assert_eq!(encoded["warnings"][0]["code"], "result_truncated");
        assert_eq!(encoded["data"]["truncated"], true);
    }

    #[test]
    fn complete_results_have_no_warning_or_flag() {
        let envelope = ToolEnvelope::success("query.execute", &success(false))
            .expect("envelope builds")
            .with_truncation_check(&success(false));

        assert!(envelope.warnings.is_empty());
        let encoded = serde_json::to_value(&envelope).expect("envelope serializes");
        assert!(encoded["data"].get("truncated").is_none());
    }

    #[test]
    fn transport_errors_map_to_their_own_code() {
        let envelope = ToolEnvelope::from_tool_error(
            "agent.ask",
            &ToolError::Transport {
                tool: "query.execute".to_string(),
                message: "connection refused".to_string(),
            },
        );

        assert_eq!(envelope.error_code(), Some(ToolErrorCode::ToolTransportFailed));
        let details = envelope
            .error
            .as_ref()
            .and_then(|error| error.details.clone())
            .expect("details present");
        assert_eq!(details["upstream_tool"], "query.execute");
        assert!(!ToolErrorCode::ToolTransportFailed.is_governance_rejection());
    }

    #[test]
    fn policy_meta_names_its_source() {
        let resolved = ResolvedPolicy {
            policy: Policy::new(["fact_sales"], 50, false).expect("policy builds"),
            source: PolicySource::Default,
        };
        let envelope = ToolEnvelope::success("sql.validate", &json!({}))
            .expect("envelope builds")
            .with_policy(&resolved);

        assert_eq!(
            envelope.meta["policy"],
            json!({"source": "default", "max_limit": 50, "enforce_limit": false})
        );
    }
}
