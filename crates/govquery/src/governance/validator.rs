use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::policy::Policy;

pub const DISALLOWED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "GRANT", "REVOKE", "COPY",
    "CALL", "DO",
];

pub const DISALLOWED_FUNCTIONS: &[&str] = &["pg_sleep"];

const EMPTY_SQL: &str = "empty_sql";
const MULTIPLE_STATEMENTS: &str = "multiple_statements_not_allowed";
const ONLY_SELECT: &str = "only_select_allowed";
const KEYWORD_PREFIX: &str = "disallowed_keyword:";
const FUNCTION_PREFIX: &str = "disallowed_function:";
const TABLE_PREFIX: &str = "table_not_allowed:";

/// One governance rule breach. Serializes as its string code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Violation {
    EmptySql,
    MultipleStatements,
    OnlySelectAllowed,
    DisallowedKeyword(String),
    DisallowedFunction(String),
    TableNotAllowed(String),
}

impl Violation {
    #[must_use]
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySql => f.write_str(EMPTY_SQL),
            Self::MultipleStatements => f.write_str(MULTIPLE_STATEMENTS),
            Self::OnlySelectAllowed => f.write_str(ONLY_SELECT),
            Self::DisallowedKeyword(keyword) => write!(f, "{KEYWORD_PREFIX}{keyword}"),
            Self::DisallowedFunction(function) => write!(f, "{FUNCTION_PREFIX}{function}"),
            Self::TableNotAllowed(table) => write!(f, "{TABLE_PREFIX}{table}"),
        }
    }
}

impl TryFrom<String> for Violation {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        match code.as_str() {
            EMPTY_SQL => return Ok(Self::EmptySql),
            MULTIPLE_STATEMENTS => return Ok(Self::MultipleStatements),
            ONLY_SELECT => return Ok(Self::OnlySelectAllowed),
            _ => {}
        }
        if let Some(keyword) = code.strip_prefix(KEYWORD_PREFIX) {
            return Ok(Self::DisallowedKeyword(keyword.to_string()));
        }
        if let Some(function) = code.strip_prefix(FUNCTION_PREFIX) {
            return Ok(Self::DisallowedFunction(function.to_string()));
        }
        if let Some(table) = code.strip_prefix(TABLE_PREFIX) {
            return Ok(Self::TableNotAllowed(table.to_string()));
        }
        Err(format!("unknown violation code `{code}`"))
    }
}

impl From<Violation> for String {
    fn from(violation: Violation) -> Self {
        violation.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    pub sanitized_sql: Option<String>,
}

impl ValidationResult {
    fn rejected(violations: Vec<Violation>) -> Self {
        Self {
            is_valid: false,
            violations,
            sanitized_sql: None,
        }
    }

    #[must_use]
    pub fn violation_codes(&self) -> Vec<String> {
        self.violations.iter().map(Violation::code).collect()
    }
}

/// Statically inspects `sql` against `policy`.
///
/// Total over all inputs: malformed or hostile text produces a rejected
/// result, never an error. The inspection is lexical; subqueries, CTEs and
/// derived tables are not parsed.
#[must_use]
pub fn validate(sql: &str, policy: &Policy) -> ValidationResult {
    if sql.trim().is_empty() {
        return ValidationResult::rejected(vec![Violation::EmptySql]);
    }

    let stripped = strip_sql_comments(sql);

    if has_multiple_statements(&stripped) {
        return ValidationResult::rejected(vec![Violation::MultipleStatements]);
    }

    let mut violations = Vec::new();

    let select_only = starts_with_select(&stripped);
    if !select_only {
        violations.push(Violation::OnlySelectAllowed);
    }

    if let Some(keyword) = first_disallowed_keyword(&stripped) {
        violations.push(Violation::DisallowedKeyword(keyword.to_string()));
    }

    for (function, pattern) in function_regexes() {
        if pattern.is_match(&stripped) {
            violations.push(Violation::DisallowedFunction((*function).to_string()));
        }
    }

    for table in extract_table_names(&stripped) {
        if !policy.allows_table(&table) {
            violations.push(Violation::TableNotAllowed(table));
        }
    }

    if !violations.is_empty() {
        return ValidationResult::rejected(violations);
    }

    let sanitized = if policy.enforce_limit() && select_only {
        enforce_limit(&stripped, policy.max_limit())
    } else {
        stripped
    };

    ValidationResult {
        is_valid: true,
        violations,
        sanitized_sql: Some(sanitized),
    }
}

/// Removes `--` line comments, then `/* */` block comments, and trims.
#[must_use]
pub fn strip_sql_comments(sql: &str) -> String {
    let without_line = line_comment_regex().replace_all(sql, "");
    let without_block = block_comment_regex().replace_all(&without_line, "");
    without_block.trim().to_string()
}

/// Identifiers following `FROM`/`JOIN`, schema qualifier dropped, lowercased.
#[must_use]
pub fn extract_table_names(sql: &str) -> Vec<String> {
    table_reference_regex()
        .captures_iter(sql)
        .filter_map(|captures| captures.get(1))
        .map(|matched| {
            let name = matched.as_str();
            name.rsplit('.').next().unwrap_or(name).to_lowercase()
        })
        .collect()
}

fn has_multiple_statements(sql: &str) -> bool {
    sql.split(';')
        .filter(|fragment| !fragment.trim().is_empty())
        .count()
        > 1
}

fn starts_with_select(sql: &str) -> bool {
    strip_trailing_semicolons(sql)
        .to_uppercase()
        .starts_with("SELECT")
}

fn first_disallowed_keyword(sql: &str) -> Option<&'static str> {
    keyword_regexes()
        .iter()
        .find(|(_, pattern)| pattern.is_match(sql))
        .map(|(keyword, _)| *keyword)
}

fn enforce_limit(sql: &str, max_limit: u64) -> String {
    let statement = strip_trailing_semicolons(sql);
    let Some(captures) = limit_regex().captures(statement) else {
        return format!("{statement} LIMIT {max_limit}");
    };

    // Digits too long for u64 are certainly above the bound.
    let within_bound = captures
        .get(1)
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .is_some_and(|current| current <= max_limit);
    if within_bound {
        return statement.to_string();
    }

    limit_regex()
        .replace_all(statement, format!("LIMIT {max_limit}").as_str())
        .into_owned()
}

/// Drops every trailing `;`, including runs separated by whitespace.
fn strip_trailing_semicolons(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .trim_start()
}

fn keyword_regexes() -> &'static [(&'static str, Regex)] {
    static CATALOG: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CATALOG.get_or_init(|| whole_word_catalog(DISALLOWED_KEYWORDS))
}

fn function_regexes() -> &'static [(&'static str, Regex)] {
    static CATALOG: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CATALOG.get_or_init(|| whole_word_catalog(DISALLOWED_FUNCTIONS))
}

fn whole_word_catalog(words: &[&'static str]) -> Vec<(&'static str, Regex)> {
    words
        .iter()
        .map(|word| {
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
                .expect("whole-word regex should compile");
            (*word, pattern)
        })
        .collect()
}

fn line_comment_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?m)--.*$").expect("line comment regex should compile"))
}

fn block_comment_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex should compile")
    })
}

fn table_reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN)\s+([a-zA-Z_][\w.]*)")
            .expect("table reference regex should compile")
    })
}

fn limit_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)\b").expect("limit regex should compile"))
}
