pub mod query_log;
pub mod tool_envelope;

pub use query_log::{QueryLogEntry, QueryStatus, json_schema};
pub use tool_envelope::{
    TOOL_ENVELOPE_SCHEMA_VERSION, ToolEnvelope, ToolEnvelopeCommandFailure, ToolEnvelopeError,
    ToolEnvelopeMeta, ToolEnvelopeWarning, ToolErrorCode, ToolWarningCode,
};
