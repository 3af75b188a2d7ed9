use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Error, Result, anyhow};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OpenFlags, params};
use serde::Serialize;
use serde_json::{Value, json};

use crate::models::{QueryLogEntry, QueryStatus};
use crate::semantic::{dimension_catalog, metric_catalog};
use crate::utils::time::utc_now;

pub const MART_SCHEMA_VERSION: &str = "govquery.mart.v1";
pub const QUERY_LOG_TABLE: &str = "query_log";
pub const SCHEMA_META_TABLE: &str = "govquery_schema_meta";
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_millis(3_000);
const PROGRESS_HANDLER_OPS: i32 = 1_000;

const CREATE_DIM_REGION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dim_region (
    region_id INTEGER PRIMARY KEY,
    region_name TEXT NOT NULL UNIQUE
);
"#;

const CREATE_DIM_PRODUCT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dim_product (
    product_id INTEGER PRIMARY KEY,
    product_name TEXT NOT NULL UNIQUE,
    product_category TEXT NOT NULL,
    unit_price REAL NOT NULL
);
"#;

const CREATE_DIM_DATE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dim_date (
    date_id INTEGER PRIMARY KEY,
    date_value TEXT NOT NULL UNIQUE,
    month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    year INTEGER NOT NULL
);
"#;

const CREATE_FACT_SALES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fact_sales (
    sale_id INTEGER PRIMARY KEY,
    order_id INTEGER NOT NULL,
    date_id INTEGER NOT NULL REFERENCES dim_date (date_id),
    region_id INTEGER NOT NULL REFERENCES dim_region (region_id),
    product_id INTEGER NOT NULL REFERENCES dim_product (product_id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    total_amount REAL NOT NULL
);
"#;

const CREATE_INDEX_FACT_DIMENSIONS_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fact_sales_dimensions
ON fact_sales (region_id, product_id, date_id);
"#;

const CREATE_SEMANTIC_METRICS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS semantic_metrics (
    metric_name TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    sql_expression TEXT NOT NULL,
    default_table TEXT NOT NULL
);
"#;

const CREATE_SEMANTIC_DIMENSIONS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS semantic_dimensions (
    dimension_name TEXT PRIMARY KEY,
    column_expression TEXT NOT NULL,
    table_name TEXT NOT NULL
);
"#;

const CREATE_SEMANTIC_JOINS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS semantic_joins (
    table_name TEXT PRIMARY KEY,
    table_alias TEXT NOT NULL,
    join_condition TEXT NOT NULL
);
"#;

const CREATE_QUERY_LOG_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS query_log (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    logged_at_utc TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    status TEXT NOT NULL,
    question TEXT,
    raw_sql TEXT NOT NULL,
    validated_sql TEXT,
    violation_codes_json TEXT,
    row_count INTEGER,
    execution_ms INTEGER NOT NULL,
    CHECK (status IN ('success', 'blocked', 'error'))
);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS govquery_schema_meta (
    schema_version TEXT PRIMARY KEY,
    applied_at_utc TEXT NOT NULL
);
"#;

const DEMO_REGIONS: &[&str] = &["North", "South", "East", "West"];

const DEMO_PRODUCTS: &[(&str, &str, f64)] = &[
    ("Laptop", "Electronics", 1_200.0),
    ("Headphones", "Electronics", 150.0),
    ("Desk", "Furniture", 300.0),
    ("Chair", "Furniture", 120.0),
    ("Notebook", "Stationery", 5.0),
];

const DEMO_DAYS: u32 = 90;
const DEMO_SALE_LINES: u32 = 240;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_DIM_REGION_SQL,
        CREATE_DIM_PRODUCT_SQL,
        CREATE_DIM_DATE_SQL,
        CREATE_FACT_SALES_SQL,
        CREATE_INDEX_FACT_DIMENSIONS_SQL,
        CREATE_SEMANTIC_METRICS_SQL,
        CREATE_SEMANTIC_DIMENSIONS_SQL,
        CREATE_SEMANTIC_JOINS_SQL,
        CREATE_QUERY_LOG_SQL,
        CREATE_META_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}

pub fn open_sqlite_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create sqlite parent directory: {}",
                parent.display()
            )
        })?;
    }

    Connection::open(path)
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

/// Opens an existing mart without write access; used for governed execution.
pub fn open_read_only_connection(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open sqlite mart read-only: {}", path.display()))
}

pub fn ensure_mart_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create mart schema")?;

    let exists: bool = connection
        .query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1)"),
            params![MART_SCHEMA_VERSION],
            |row| row.get(0),
        )
        .context("failed to read mart schema meta")?;
    if exists {
        return Ok(());
    }

    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![MART_SCHEMA_VERSION, utc_now()],
        )
        .context("failed to write mart schema meta row")?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SeedStats {
    pub regions: usize,
    pub products: usize,
    pub dates: usize,
    pub sale_lines: usize,
}

/// Loads the semantic catalog and a deterministic demo dataset. Re-running
/// leaves existing rows untouched.
pub fn seed_demo_mart(connection: &mut Connection) -> Result<SeedStats> {
    ensure_mart_schema(connection)?;

    let tx = connection
        .transaction()
        .context("failed to start seed transaction")?;

    for metric in metric_catalog() {
        tx.execute(
            "INSERT OR IGNORE INTO semantic_metrics \
             (metric_name, description, sql_expression, default_table) VALUES (?1, ?2, ?3, ?4)",
            params![
                metric.metric_name,
                metric.description,
                metric.sql_expression,
                metric.default_table
            ],
        )
        .context("failed to seed semantic_metrics")?;
    }
    for dimension in dimension_catalog() {
        tx.execute(
            "INSERT OR IGNORE INTO semantic_dimensions \
             (dimension_name, column_expression, table_name) VALUES (?1, ?2, ?3)",
            params![dimension.dimension_name, dimension.column, dimension.table],
        )
        .context("failed to seed semantic_dimensions")?;
        tx.execute(
            "INSERT OR IGNORE INTO semantic_joins \
             (table_name, table_alias, join_condition) VALUES (?1, ?2, ?3)",
            params![dimension.table, dimension.alias, dimension.join_condition],
        )
        .context("failed to seed semantic_joins")?;
    }

    let mut stats = SeedStats::default();
    for (index, name) in DEMO_REGIONS.iter().enumerate() {
        stats.regions += tx
            .execute(
                "INSERT OR IGNORE INTO dim_region (region_id, region_name) VALUES (?1, ?2)",
                params![index as i64 + 1, name],
            )
            .context("failed to seed dim_region")?;
    }
    for (index, (name, category, unit_price)) in DEMO_PRODUCTS.iter().enumerate() {
        stats.products += tx
            .execute(
                "INSERT OR IGNORE INTO dim_product \
                 (product_id, product_name, product_category, unit_price) VALUES (?1, ?2, ?3, ?4)",
                params![index as i64 + 1, name, category, unit_price],
            )
            .context("failed to seed dim_product")?;
    }
    for day in 0..DEMO_DAYS {
        let (year, month, day_of_month) = demo_calendar_day(day);
        stats.dates += tx
            .execute(
                "INSERT OR IGNORE INTO dim_date (date_id, date_value, month, year) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    i64::from(day) + 1,
                    format!("{year:04}-{month:02}-{day_of_month:02}"),
                    month,
                    year
                ],
            )
            .context("failed to seed dim_date")?;
    }

    let existing_lines: i64 = tx
        .query_row("SELECT COUNT(*) FROM fact_sales", [], |row| row.get(0))
        .context("failed to count fact_sales rows")?;
    if existing_lines == 0 {
        for line in 0..DEMO_SALE_LINES {
            let product_index = ((line * 3) as usize) % DEMO_PRODUCTS.len();
            let quantity = line % 5 + 1;
            let unit_price = DEMO_PRODUCTS[product_index].2;
            stats.sale_lines += tx
                .execute(
                    "INSERT INTO fact_sales \
                     (sale_id, order_id, date_id, region_id, product_id, quantity, total_amount) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        i64::from(line) + 1,
                        i64::from(line / 2) + 1,
                        i64::from((line * 7) % DEMO_DAYS) + 1,
                        (line as usize % DEMO_REGIONS.len()) as i64 + 1,
                        product_index as i64 + 1,
                        quantity,
                        f64::from(quantity) * unit_price
                    ],
                )
                .context("failed to seed fact_sales")?;
        }
    }

    tx.commit().context("failed to commit seed transaction")?;
    Ok(stats)
}

/// Calendar for the demo window, starting 2025-11-01.
fn demo_calendar_day(offset: u32) -> (i32, u32, u32) {
    const MONTHS: &[(i32, u32, u32)] = &[(2025, 11, 30), (2025, 12, 31), (2026, 1, 31)];
    let mut remaining = offset;
    for (year, month, length) in MONTHS {
        if remaining < *length {
            return (*year, *month, remaining + 1);
        }
        remaining -= length;
    }
    (2026, 2, remaining + 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryExecutionResult {
    pub column_names: Vec<String>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub truncated: bool,
}

/// Runs one statement, returning at most `row_cap` rows as JSON objects.
/// The statement is interrupted once `timeout` elapses.
pub fn execute_read_only_query(
    connection: &Connection,
    sql: &str,
    row_cap: usize,
    timeout: Duration,
) -> Result<QueryExecutionResult> {
    let deadline = Instant::now() + timeout;
    connection.progress_handler(
        PROGRESS_HANDLER_OPS,
        Some(move || Instant::now() >= deadline),
    );

    let result = collect_rows(connection, sql, row_cap).map_err(|error| {
        if is_interrupted(&error) {
            anyhow!(
                "statement timeout of {} ms exceeded",
                timeout.as_millis()
            )
        } else {
            error
        }
    });

    connection.progress_handler(0, None::<fn() -> bool>);
    result
}

fn collect_rows(
    connection: &Connection,
    sql: &str,
    row_cap: usize,
) -> Result<QueryExecutionResult> {
    let mut statement = connection
        .prepare(sql)
        .map_err(|error| Error::new(error).context("failed to prepare query"))?;
    if !statement.readonly() {
        return Err(anyhow!("refusing to execute a statement that writes"));
    }
    let column_names = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement
        .query([])
        .map_err(|error| Error::new(error).context("failed to execute query"))?;
    let mut result_rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows
        .next()
        .map_err(|error| Error::new(error).context("failed to fetch query row"))?
    {
        if result_rows.len() >= row_cap {
            truncated = true;
            break;
        }

        let mut record = serde_json::Map::new();
        for (index, column_name) in column_names.iter().enumerate() {
            let value = row
                .get::<usize, SqlValue>(index)
                .map_err(|error| Error::new(error).context("failed to decode query column"))?;
            record.insert(column_name.clone(), json_value_from_sql(value));
        }
        result_rows.push(Value::Object(record));
    }

    Ok(QueryExecutionResult {
        column_names,
        row_count: result_rows.len(),
        rows: result_rows,
        truncated,
    })
}

fn is_interrupted(error: &Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::OperationInterrupted
        )
    })
}

fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

pub fn insert_query_log(connection: &Connection, entry: &QueryLogEntry) -> Result<i64> {
    let violation_codes_json = entry
        .violation_codes
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("failed to encode violation codes")?;
    let row_count = entry
        .row_count
        .map(i64::try_from)
        .transpose()
        .context("row_count exceeds sqlite INTEGER range")?;
    let execution_ms =
        i64::try_from(entry.execution_ms).context("execution_ms exceeds sqlite INTEGER range")?;

    connection
        .execute(
            &format!(
                "INSERT INTO {QUERY_LOG_TABLE} \
                 (logged_at_utc, tool_name, status, question, raw_sql, validated_sql, \
                  violation_codes_json, row_count, execution_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                entry.logged_at_utc,
                entry.tool_name,
                entry.status.as_str(),
                entry.question,
                entry.raw_sql,
                entry.validated_sql,
                violation_codes_json,
                row_count,
                execution_ms
            ],
        )
        .context("failed to insert query log row")?;

    Ok(connection.last_insert_rowid())
}

/// Most recent entries first.
pub fn recent_query_logs(connection: &Connection, limit: usize) -> Result<Vec<QueryLogEntry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut statement = connection
        .prepare(&format!(
            "SELECT logged_at_utc, tool_name, status, question, raw_sql, validated_sql, \
                    violation_codes_json, row_count, execution_ms \
             FROM {QUERY_LOG_TABLE} ORDER BY log_id DESC LIMIT ?1"
        ))
        .context("failed to prepare query log read")?;

    let raw_rows = statement
        .query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<i64>>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })
        .context("failed to read query log rows")?;

    let mut entries = Vec::new();
    for raw in raw_rows {
        let (
            logged_at_utc,
            tool_name,
            status,
            question,
            raw_sql,
            validated_sql,
            violation_codes_json,
            row_count,
            execution_ms,
        ) = raw.context("failed to decode query log row")?;

        let status = QueryStatus::from_key(&status)
            .ok_or_else(|| anyhow!("unknown query log status `{status}`"))?;
        let violation_codes = violation_codes_json
            .map(|encoded| serde_json::from_str::<Vec<String>>(&encoded))
            .transpose()
            .context("failed to decode violation codes")?;

        entries.push(QueryLogEntry {
            logged_at_utc,
            tool_name,
            status,
            question,
            raw_sql,
            validated_sql,
            violation_codes,
            row_count: row_count.map(|count| u64::try_from(count).unwrap_or(0)),
            execution_ms: u64::try_from(execution_ms).unwrap_or(0),
        });
    }

    Ok(entries)
}
