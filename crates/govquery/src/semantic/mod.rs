use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};

pub const FACT_TABLE: &str = "fact_sales";
pub const FACT_ALIAS: &str = "f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalSales,
    TotalOrders,
    AvgOrderValue,
    TotalQuantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    Product,
    Category,
    Date,
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricDefinition {
    pub metric_name: &'static str,
    pub description: &'static str,
    pub sql_expression: &'static str,
    pub default_table: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionDefinition {
    pub dimension_name: &'static str,
    pub column: &'static str,
    pub table: &'static str,
    pub alias: &'static str,
    pub join_condition: &'static str,
}

impl Metric {
    pub const ALL: [Self; 4] = [
        Self::TotalSales,
        Self::TotalOrders,
        Self::AvgOrderValue,
        Self::TotalQuantity,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TotalSales => "total_sales",
            Self::TotalOrders => "total_orders",
            Self::AvgOrderValue => "avg_order_value",
            Self::TotalQuantity => "total_quantity",
        }
    }

    #[must_use]
    pub const fn definition(self) -> MetricDefinition {
        let (sql_expression, description) = match self {
            Self::TotalSales => ("SUM(f.total_amount)", "Total sales amount"),
            Self::TotalOrders => ("COUNT(DISTINCT f.order_id)", "Number of distinct orders"),
            Self::AvgOrderValue => ("AVG(f.total_amount)", "Average order value"),
            Self::TotalQuantity => ("SUM(f.quantity)", "Total units sold"),
        };
        MetricDefinition {
            metric_name: self.as_str(),
            description,
            sql_expression,
            default_table: FACT_TABLE,
        }
    }
}

impl Dimension {
    pub const ALL: [Self; 6] = [
        Self::Region,
        Self::Product,
        Self::Category,
        Self::Date,
        Self::Month,
        Self::Year,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Product => "product",
            Self::Category => "category",
            Self::Date => "date",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    #[must_use]
    pub const fn definition(self) -> DimensionDefinition {
        let (column, table, alias, join_condition) = match self {
            Self::Region => (
                "r.region_name",
                "dim_region",
                "r",
                "f.region_id = r.region_id",
            ),
            Self::Product => (
                "p.product_name",
                "dim_product",
                "p",
                "f.product_id = p.product_id",
            ),
            Self::Category => (
                "p.product_category",
                "dim_product",
                "p",
                "f.product_id = p.product_id",
            ),
            Self::Date => ("d.date_value", "dim_date", "d", "f.date_id = d.date_id"),
            Self::Month => ("d.month", "dim_date", "d", "f.date_id = d.date_id"),
            Self::Year => ("d.year", "dim_date", "d", "f.date_id = d.date_id"),
        };
        DimensionDefinition {
            dimension_name: self.as_str(),
            column,
            table,
            alias,
            join_condition,
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == value)
            .ok_or_else(|| Error::msg(format!("unknown metric `{value}`")))
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == value)
            .ok_or_else(|| Error::msg(format!("unknown dimension `{value}`")))
    }
}

#[must_use]
pub fn metric_catalog() -> Vec<MetricDefinition> {
    Metric::ALL.into_iter().map(Metric::definition).collect()
}

#[must_use]
pub fn dimension_catalog() -> Vec<DimensionDefinition> {
    Dimension::ALL.into_iter().map(Dimension::definition).collect()
}

#[cfg(test)]
mod tests {
    use super::{Dimension, Metric, metric_catalog};

    #[test]
    fn metric_names_parse_back() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>().ok(), Some(metric));
        }
        assert!("gross_margin".parse::<Metric>().is_err());
    }

    #[test]
    fn product_and_category_share_join_target() {
        let product = Dimension::Product.definition();
        let category = Dimension::Category.definition();
        assert_eq!(product.alias, category.alias);
        assert_eq!(product.join_condition, category.join_condition);
        assert_ne!(product.column, category.column);
    }

    #[test]
    fn catalog_lists_every_metric_against_fact_table() {
        let catalog = metric_catalog();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.iter().all(|entry| entry.default_table == "fact_sales"));
        assert_eq!(catalog[1].sql_expression, "COUNT(DISTINCT f.order_id)");
    }
}
