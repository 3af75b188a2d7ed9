use crate::semantic::{Dimension, Metric};

/// Collapses whitespace runs to one space, trims and lowercases.
#[must_use]
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First matching rule wins; anything unrecognized is total sales.
#[must_use]
pub fn pick_metric(normalized: &str) -> Metric {
    let has = |needle: &str| normalized.contains(needle);

    if has("order") && (has("count") || has("number") || has("how many")) {
        Metric::TotalOrders
    } else if has("avg") || has("average") {
        Metric::AvgOrderValue
    } else if has("quantity") || has("units") {
        Metric::TotalQuantity
    } else {
        Metric::TotalSales
    }
}

const DIMENSION_TRIGGERS: &[(Dimension, &[&str])] = &[
    (Dimension::Region, &["region", "city", "location"]),
    (Dimension::Product, &["product"]),
    (Dimension::Category, &["category"]),
    (Dimension::Date, &["date", "day"]),
    (Dimension::Month, &["month"]),
    (Dimension::Year, &["year"]),
];

/// Every triggered dimension, once each, in trigger-table order.
#[must_use]
pub fn pick_dimensions(normalized: &str) -> Vec<Dimension> {
    let mut dimensions = DIMENSION_TRIGGERS
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|trigger| normalized.contains(trigger)))
        .map(|(dimension, _)| *dimension)
        .collect::<Vec<_>>();

    if dimensions.is_empty() && normalized.contains(" by ") && normalized.contains("region") {
        dimensions.push(Dimension::Region);
    }

    dimensions
}
