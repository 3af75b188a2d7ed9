use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LIMIT: u64 = 500;

pub const DEFAULT_ALLOWED_TABLES: &[&str] = &[
    "fact_sales",
    "dim_date",
    "dim_region",
    "dim_product",
    "semantic_metrics",
    "semantic_dimensions",
    "semantic_joins",
];

/// Table-scoped SQL policy. Immutable once constructed; share it by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    allowed_tables: BTreeSet<String>,
    max_limit: u64,
    enforce_limit: bool,
}

/// On-disk policy override, accepted as YAML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    pub allowed_tables: Vec<String>,

    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    #[serde(default = "default_enforce_limit")]
    pub enforce_limit: bool,
}

fn default_max_limit() -> u64 {
    DEFAULT_MAX_LIMIT
}

fn default_enforce_limit() -> bool {
    true
}

impl Policy {
    pub fn new<I, S>(allowed_tables: I, max_limit: u64, enforce_limit: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if max_limit == 0 {
            bail!("max_limit must be greater than zero");
        }

        let mut tables = BTreeSet::new();
        for table in allowed_tables {
            let name = table.as_ref().trim().to_lowercase();
            if name.is_empty() {
                bail!("allowed table names must not be blank");
            }
            if !tables.insert(name.clone()) {
                bail!("duplicate allowed table: {name}");
            }
        }

        Ok(Self {
            allowed_tables: tables,
            max_limit,
            enforce_limit,
        })
    }

    pub fn from_file(file: PolicyFile) -> Result<Self> {
        Self::new(file.allowed_tables, file.max_limit, file.enforce_limit)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file: {}", path.display()))?;
        let file = serde_yaml::from_str::<PolicyFile>(&raw)
            .with_context(|| format!("failed to parse policy file: {}", path.display()))?;
        Self::from_file(file).with_context(|| format!("invalid policy file: {}", path.display()))
    }

    #[must_use]
    pub fn allowed_tables(&self) -> &BTreeSet<String> {
        &self.allowed_tables
    }

    #[must_use]
    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    #[must_use]
    pub fn enforce_limit(&self) -> bool {
        self.enforce_limit
    }

    #[must_use]
    pub fn allows_table(&self, table: &str) -> bool {
        self.allowed_tables.contains(&table.to_lowercase())
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allowed_tables: DEFAULT_ALLOWED_TABLES
                .iter()
                .map(|table| (*table).to_string())
                .collect(),
            max_limit: DEFAULT_MAX_LIMIT,
            enforce_limit: true,
        }
    }
}
