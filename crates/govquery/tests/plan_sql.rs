use govquery::planner::plan_question;
use govquery::semantic::{Dimension, Metric};

#[test]
fn region_sales_plan_matches_reference_sql() {
    let plan = plan_question("Total sales by region");

    assert_eq!(plan.metric, Metric::TotalSales);
    assert_eq!(plan.dimensions, vec![Dimension::Region]);
    insta::assert_snapshot!(
        plan.sql,
        @"SELECT r.region_name, SUM(f.total_amount) AS total_sales FROM fact_sales f JOIN dim_region r ON f.region_id = r.region_id GROUP BY r.region_name ORDER BY total_sales DESC"
    );
}

#[test]
fn product_and_month_join_in_trigger_order() {
    let plan = plan_question("total quantity by product and month");

    assert_eq!(plan.metric, Metric::TotalQuantity);
    assert_eq!(plan.dimensions, vec![Dimension::Product, Dimension::Month]);
    insta::assert_snapshot!(
        plan.sql,
        @"SELECT p.product_name, d.month, SUM(f.quantity) AS total_quantity FROM fact_sales f JOIN dim_product p ON f.product_id = p.product_id JOIN dim_date d ON f.date_id = d.date_id GROUP BY p.product_name, d.month ORDER BY total_quantity DESC"
    );
}

#[test]
fn unrecognized_question_plans_grand_total_sales() {
    let plan = plan_question("tell me something interesting");

    assert_eq!(plan.metric, Metric::TotalSales);
    assert!(plan.dimensions.is_empty());
    insta::assert_snapshot!(plan.sql, @"SELECT SUM(f.total_amount) AS total_sales FROM fact_sales f");
}

#[test]
fn metric_precedence_follows_rule_order() {
    assert_eq!(plan_question("how many orders").metric, Metric::TotalOrders);
    assert_eq!(
        plan_question("average order count").metric,
        Metric::TotalOrders
    );
    assert_eq!(
        plan_question("Average order value by category").metric,
        Metric::AvgOrderValue
    );
    assert_eq!(plan_question("units sold").metric, Metric::TotalQuantity);
    assert_eq!(plan_question("orders by city").metric, Metric::TotalSales);
}

#[test]
fn planning_ignores_case_and_whitespace() {
    let spaced = plan_question("  TOTAL   sales\tby\nREGION ");
    let plain = plan_question("total sales by region");
    assert_eq!(spaced, plain);
}

#[test]
fn plan_serializes_with_snake_case_names() {
    let plan = plan_question("avg order value by year and category");
    let encoded = serde_json::to_value(&plan).expect("plan serializes");

    assert_eq!(encoded["metric"], "avg_order_value");
    assert_eq!(encoded["dimensions"], serde_json::json!(["category", "year"]));
}
