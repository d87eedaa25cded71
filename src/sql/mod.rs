//! SQL handling for generated statements: extraction from model output,
//! formatting, and the allow-list validator guarding the database.

pub mod extract;
pub mod format;
pub mod validator;

pub use extract::extract_sql;
pub use format::normalize_sql;
pub use validator::{
    SqlRejection, SqlValidator, ValidatedSql, APPROVED_TABLES, DANGEROUS_KEYWORDS, MAX_SQL_LENGTH,
};
