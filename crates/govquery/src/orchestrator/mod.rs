use serde::Serialize;

use crate::planner::{Plan, plan_question};
use crate::semantic::{Dimension, Metric};
use crate::tools::{ExecuteResponse, GovernedTools, ToolError};

pub const BLOCKED_STAGE: &str = "validate";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedAnswer {
    pub ok: bool,
    pub stage: &'static str,
    pub metric: Metric,
    pub dimensions: Vec<Dimension>,
    pub sql: String,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedAnswer {
    pub ok: bool,
    pub metric: Metric,
    pub dimensions: Vec<Dimension>,
    pub generated_sql: String,
    pub executed_sql: String,
    pub result: ExecuteResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Blocked(BlockedAnswer),
    Executed(ExecutedAnswer),
}

impl Answer {
    #[must_use]
    pub fn ok(&self) -> bool {
        match self {
            Self::Blocked(_) => false,
            Self::Executed(executed) => executed.ok,
        }
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        match self {
            Self::Blocked(blocked) => blocked.metric,
            Self::Executed(executed) => executed.metric,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        match self {
            Self::Blocked(blocked) => &blocked.dimensions,
            Self::Executed(executed) => &executed.dimensions,
        }
    }

    #[must_use]
    pub fn generated_sql(&self) -> &str {
        match self {
            Self::Blocked(blocked) => &blocked.sql,
            Self::Executed(executed) => &executed.generated_sql,
        }
    }

    #[must_use]
    pub fn executed_sql(&self) -> Option<&str> {
        match self {
            Self::Blocked(_) => None,
            Self::Executed(executed) => Some(&executed.executed_sql),
        }
    }
}

/// Plans `question`, validates the plan's SQL and executes it only when the
/// validator accepts it.
///
/// At most two collaborator calls are made, in order, and neither is
/// retried: a blocked plan returns `Ok(Answer::Blocked)` without touching the
/// execute capability, and a failing call is returned unchanged as `Err`.
pub fn answer_question<T>(tools: &T, question: &str) -> Result<Answer, ToolError>
where
    T: GovernedTools + ?Sized,
{
    let plan = plan_question(question);
    tracing::debug!(
        metric = plan.metric.as_str(),
        dimensions = ?plan.dimensions,
        sql = %plan.sql,
        "planned question"
    );

    let validation = tools.validate(&plan.sql)?;
    if !validation.is_valid {
        tracing::debug!(violations = ?validation.violations, "plan blocked by governance");
        return Ok(blocked(plan, validation.violation_codes()));
    }

    let safe_sql = validation
        .sanitized_sql
        .filter(|sql| !sql.trim().is_empty())
        .unwrap_or_else(|| plan.sql.clone());
    let result = tools.execute(&safe_sql, Some(question))?;
    let executed_sql = result.sql().map_or(safe_sql, ToString::to_string);

    Ok(Answer::Executed(ExecutedAnswer {
        ok: result.ok(),
        metric: plan.metric,
        dimensions: plan.dimensions,
        generated_sql: plan.sql,
        executed_sql,
        result,
    }))
}

fn blocked(plan: Plan, violations: Vec<String>) -> Answer {
    Answer::Blocked(BlockedAnswer {
        ok: false,
        stage: BLOCKED_STAGE,
        metric: plan.metric,
        dimensions: plan.dimensions,
        sql: plan.sql,
        violations,
    })
}
