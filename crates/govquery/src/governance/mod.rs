pub mod policy;
pub mod validator;

pub use policy::{DEFAULT_ALLOWED_TABLES, DEFAULT_MAX_LIMIT, Policy, PolicyFile};
pub use validator::{
    DISALLOWED_FUNCTIONS, DISALLOWED_KEYWORDS, ValidationResult, Violation, extract_table_names,
    strip_sql_comments, validate,
};
