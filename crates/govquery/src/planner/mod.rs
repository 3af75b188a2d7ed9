pub mod analyzer;
pub mod builder;

use serde::{Deserialize, Serialize};

use crate::semantic::{Dimension, Metric};

pub use analyzer::{normalize_question, pick_dimensions, pick_metric};
pub use builder::build_sql;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub metric: Metric,
    pub dimensions: Vec<Dimension>,
    pub sql: String,
}

impl Plan {
    #[must_use]
    pub fn new(metric: Metric, dimensions: Vec<Dimension>) -> Self {
        let sql = build_sql(metric, &dimensions);
        Self {
            metric,
            dimensions,
            sql,
        }
    }
}

/// Turns a free-text question into a plan. Never fails: unrecognized text
/// plans the default metric with no grouping.
#[must_use]
pub fn plan_question(question: &str) -> Plan {
    let normalized = normalize_question(question);
    Plan::new(pick_metric(&normalized), pick_dimensions(&normalized))
}
