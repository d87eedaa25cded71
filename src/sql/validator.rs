//! AST-level SQL validation.
//!
//! The single security boundary between generated text and the database:
//! only SELECT statements over approved tables, one statement at a time,
//! without unions, subqueries, or comments.
//!
//! Structural checks (statement count, relations, nested queries) run on the
//! `sqlparser` AST; lexical checks (first keyword, dangerous keywords, UNION,
//! comments) run on tokenizer output so string literals and quoted
//! identifiers never trigger a false positive.

use serde::Serialize;
use sqlparser::ast::{Expr, ObjectName, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};
use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

/// Maximum accepted SQL length (characters).
pub const MAX_SQL_LENGTH: usize = 5000;

/// Tables and views generated SQL may read.
pub const APPROVED_TABLES: &[&str] = &[
    "view_general_inventory",
    "items",
    "users",
    "transactions",
    "item_categories",
    "vendors",
    "roles",
];

/// Keywords that must never appear as standalone tokens in generated SQL.
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    // DDL
    "DROP", "CREATE", "ALTER", "TRUNCATE", "RENAME", "INDEX", "VIEW", "TRIGGER", "PROCEDURE",
    "FUNCTION", "EVENT",
    // DML mutation
    "DELETE", "UPDATE", "INSERT", "REPLACE", "MERGE",
    // Privileges and execution
    "GRANT", "REVOKE", "EXEC", "EXECUTE", "CALL",
    // File exfiltration
    "LOAD_FILE", "OUTFILE", "DUMPFILE", "INTO",
];

static APPROVED: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| APPROVED_TABLES.iter().copied().collect());

static DANGEROUS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| DANGEROUS_KEYWORDS.iter().copied().collect());

/// Why a candidate statement was refused.
///
/// The display text is fed back to the generator as corrective feedback.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SqlRejection {
    /// Blank input
    #[error("Empty SQL query")]
    Empty,

    /// Tokenizer or parser failure
    #[error("SQL parse error: {0}")]
    ParseError(String),

    /// Parsed to zero statements
    #[error("No SQL statements found")]
    NoStatement,

    /// More than one statement
    #[error("Multi-statement queries are forbidden")]
    MultiStatement(usize),

    /// Statement is not a read query
    #[error("Only SELECT/WITH queries allowed, got: {0}")]
    NotSelect(String),

    /// Dangerous keyword present
    #[error("Forbidden keyword: {0}")]
    ForbiddenKeyword(String),

    /// UNION present
    #[error("UNION queries are forbidden")]
    Union,

    /// Nested query present
    #[error("Subqueries are not allowed (prevents nested injection)")]
    Subquery,

    /// No relation referenced
    #[error("No tables found in query")]
    NoTables,

    /// Relation outside the allow-list
    #[error("Unauthorized table: {0}")]
    UnauthorizedTable(String),

    /// Line or block comment present
    #[error("SQL comments are not allowed")]
    Comment,

    /// Longer than `MAX_SQL_LENGTH`
    #[error("Query exceeds maximum length ({MAX_SQL_LENGTH} chars)")]
    TooLong(usize),
}

/// SQL that passed every validator rule.
///
/// Only constructible by [`SqlValidator::validate`]; the only SQL form the
/// executor accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    /// Borrow the statement text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the owned statement text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for ValidatedSql {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collects relations and counts queries in one AST walk.
#[derive(Default)]
struct StatementInspector {
    queries: usize,
    relations: Vec<String>,
    /// First file-access construct found (`SELECT ... INTO`, `LOAD_FILE()`)
    forbidden: Option<String>,
}

impl Visitor for StatementInspector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.queries += 1;
        if let SetExpr::Select(select) = query.body.as_ref() {
            if select.into.is_some() {
                self.forbidden.get_or_insert_with(|| "INTO".to_string());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if let Expr::Function(function) = expr {
            let is_load_file = function
                .name
                .0
                .last()
                .is_some_and(|ident| ident.value.eq_ignore_ascii_case("LOAD_FILE"));
            if is_load_file {
                self.forbidden.get_or_insert_with(|| "LOAD_FILE".to_string());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let name = relation
            .0
            .iter()
            .map(|ident| ident.value.as_str())
            .collect::<Vec<_>>()
            .join(".");
        self.relations.push(name);
        ControlFlow::Continue(())
    }
}

/// Strict allow-list SQL validator.
pub struct SqlValidator;

impl SqlValidator {
    /// Validate SQL query for security.
    ///
    /// # Arguments
    ///
    /// * `sql` - Candidate SQL from the generator
    ///
    /// # Returns
    ///
    /// `ValidatedSql` safe to hand to the executor
    ///
    /// # Errors
    ///
    /// Returns the first `SqlRejection` encountered, checks in order:
    /// empty, parse/statement count, leading keyword, dangerous keywords,
    /// UNION, file access (`SELECT ... INTO`, `LOAD_FILE()`), subqueries,
    /// table allow-list, comments, length.
    ///
    /// # Examples
    ///
    /// ```
    /// use inventory_nlq::sql::{SqlRejection, SqlValidator};
    ///
    /// assert!(SqlValidator::validate("SELECT * FROM view_general_inventory;").is_ok());
    /// assert_eq!(
    ///     SqlValidator::validate("SELECT * FROM users UNION SELECT password FROM admin;"),
    ///     Err(SqlRejection::Union)
    /// );
    /// ```
    pub fn validate(sql: &str) -> Result<ValidatedSql, SqlRejection> {
        let result = Self::check(sql);
        if let Err(reason) = &result {
            warn!(%reason, "SQL rejected");
        }
        result.map(|_| ValidatedSql(sql.trim().to_string()))
    }

    fn check(sql: &str) -> Result<(), SqlRejection> {
        if sql.trim().is_empty() {
            return Err(SqlRejection::Empty);
        }

        let dialect = MySqlDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .with_unescape(false)
            .tokenize()
            .map_err(|e| SqlRejection::ParseError(e.to_string()))?;

        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| SqlRejection::ParseError(e.to_string()))?;
        let statement = match statements.as_slice() {
            [] => return Err(SqlRejection::NoStatement),
            [single] => single,
            many => return Err(SqlRejection::MultiStatement(many.len())),
        };

        Self::check_leading_keyword(&tokens)?;
        if !matches!(statement, Statement::Query(_)) {
            return Err(SqlRejection::NotSelect(statement_kind(statement)));
        }

        Self::check_dangerous_keywords(&tokens)?;

        if tokens.iter().any(|t| is_word(t, "UNION")) {
            return Err(SqlRejection::Union);
        }

        let mut inspector = StatementInspector::default();
        let _ = statement.visit(&mut inspector);

        if let Some(keyword) = inspector.forbidden {
            return Err(SqlRejection::ForbiddenKeyword(keyword));
        }
        if inspector.queries > 1 {
            return Err(SqlRejection::Subquery);
        }

        Self::check_tables(&inspector.relations)?;

        let has_comment_token = tokens.iter().any(|t| {
            matches!(
                t,
                Token::Whitespace(Whitespace::SingleLineComment { .. })
                    | Token::Whitespace(Whitespace::MultiLineComment(_))
            )
        });
        if has_comment_token || sql.contains("--") || sql.contains("/*") {
            return Err(SqlRejection::Comment);
        }

        let length = sql.chars().count();
        if length > MAX_SQL_LENGTH {
            return Err(SqlRejection::TooLong(length));
        }

        Ok(())
    }

    fn check_leading_keyword(tokens: &[Token]) -> Result<(), SqlRejection> {
        let first = tokens
            .iter()
            .find(|t| !matches!(t, Token::Whitespace(_)))
            .ok_or(SqlRejection::NoStatement)?;

        match first {
            Token::Word(word) if word.quote_style.is_none() => {
                let upper = word.value.to_ascii_uppercase();
                if upper == "SELECT" || upper == "WITH" {
                    Ok(())
                } else if DANGEROUS.contains(upper.as_str()) {
                    Err(SqlRejection::ForbiddenKeyword(upper))
                } else {
                    Err(SqlRejection::NotSelect(word.value.clone()))
                }
            }
            other => Err(SqlRejection::NotSelect(other.to_string())),
        }
    }

    /// Reject dangerous keywords standing alone: preceded by whitespace or the
    /// start of input, followed by whitespace, `;`, or the end of input.
    fn check_dangerous_keywords(tokens: &[Token]) -> Result<(), SqlRejection> {
        for (idx, token) in tokens.iter().enumerate() {
            let Some(upper) = bare_word_upper(token) else {
                continue;
            };
            if !DANGEROUS.contains(upper.as_str()) {
                continue;
            }

            let bounded_before = idx == 0 || matches!(tokens[idx - 1], Token::Whitespace(_));
            let bounded_after = matches!(
                tokens.get(idx + 1),
                None | Some(Token::Whitespace(_)) | Some(Token::SemiColon) | Some(Token::EOF)
            );

            if bounded_before && bounded_after {
                return Err(SqlRejection::ForbiddenKeyword(upper));
            }
        }
        Ok(())
    }

    fn check_tables(relations: &[String]) -> Result<(), SqlRejection> {
        if relations.is_empty() {
            return Err(SqlRejection::NoTables);
        }
        for relation in relations {
            if !APPROVED.contains(relation.to_lowercase().as_str()) {
                return Err(SqlRejection::UnauthorizedTable(relation.clone()));
            }
        }
        Ok(())
    }

    /// Extract every relation referenced by a single parsed statement.
    ///
    /// Joined and aliased references are reported by their real name.
    pub fn referenced_tables(sql: &str) -> Result<Vec<String>, SqlRejection> {
        let statements = Parser::parse_sql(&MySqlDialect {}, sql)
            .map_err(|e| SqlRejection::ParseError(e.to_string()))?;
        let mut inspector = StatementInspector::default();
        for statement in &statements {
            let _ = statement.visit(&mut inspector);
        }
        Ok(inspector.relations)
    }
}

fn bare_word_upper(token: &Token) -> Option<String> {
    match token {
        Token::Word(Word { value, quote_style: None, .. }) => Some(value.to_ascii_uppercase()),
        _ => None,
    }
}

fn is_word(token: &Token, keyword: &str) -> bool {
    bare_word_upper(token).is_some_and(|w| w == keyword)
}

fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}
