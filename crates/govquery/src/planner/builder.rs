use std::collections::BTreeSet;

use crate::semantic::{Dimension, DimensionDefinition, FACT_ALIAS, FACT_TABLE, Metric};

/// Renders the star-schema query for `metric` grouped by `dimensions`.
///
/// Output is a pure function of its inputs. No LIMIT is emitted; row bounds
/// are applied by the governance validator.
#[must_use]
pub fn build_sql(metric: Metric, dimensions: &[Dimension]) -> String {
    let metric_select = format!(
        "{} AS {}",
        metric.definition().sql_expression,
        metric.as_str()
    );

    let mut group_columns = Vec::new();
    let mut seen_dimensions = BTreeSet::new();
    let mut joins: Vec<DimensionDefinition> = Vec::new();
    let mut seen_aliases = BTreeSet::new();
    for dimension in dimensions {
        if !seen_dimensions.insert(*dimension) {
            continue;
        }
        let definition = dimension.definition();
        group_columns.push(definition.column);
        if seen_aliases.insert(definition.alias) {
            joins.push(definition);
        }
    }

    let mut select_list = group_columns.clone();
    select_list.push(metric_select.as_str());

    let mut sql = format!(
        "SELECT {} FROM {FACT_TABLE} {FACT_ALIAS}",
        select_list.join(", ")
    );
    for join in &joins {
        sql.push_str(&format!(
            " JOIN {} {} ON {}",
            join.table, join.alias, join.join_condition
        ));
    }
    if !group_columns.is_empty() {
        sql.push_str(&format!(
            " GROUP BY {} ORDER BY {} DESC",
            group_columns.join(", "),
            metric.as_str()
        ));
    }

    sql
}
