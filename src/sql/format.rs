//! SQL formatting for logs and downstream comparison.

use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};

/// Keywords written in uppercase by the formatter.
///
/// Everything else, including table and column names, keeps its case.
const UPPERCASE_KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE",
    "BETWEEN", "AS", "ON", "JOIN", "INNER", "LEFT", "RIGHT", "OUTER", "CROSS", "GROUP", "BY",
    "ORDER", "HAVING", "LIMIT", "OFFSET", "ASC", "DESC", "CASE", "WHEN", "THEN", "ELSE", "END",
    "WITH", "COUNT", "SUM", "AVG", "MIN", "MAX", "INTERVAL", "DAY", "CURDATE", "NOW",
];

/// Uppercased keywords that are called like functions.
const FUNCTION_KEYWORDS: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX", "CURDATE", "NOW"];

/// Keywords that start a new line.
const CLAUSE_STARTS: &[&str] = &["FROM", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT"];

/// Keywords that start a join clause on a new line.
const JOIN_STARTS: &[&str] = &["JOIN", "INNER", "LEFT", "RIGHT", "CROSS"];

/// Keywords that continue a join phrase already on its own line.
const JOIN_MODIFIERS: &[&str] = &["INNER", "LEFT", "RIGHT", "OUTER", "CROSS", "NATURAL"];

fn bare_upper(token: &Token) -> Option<String> {
    match token {
        Token::Word(Word { value, quote_style: None, .. }) => Some(value.to_ascii_uppercase()),
        _ => None,
    }
}

/// Normalize SQL formatting.
///
/// Uppercases common keywords, collapses whitespace, and starts each major
/// clause on its own line with `AND`/`OR` indented under `WHERE`. Literals,
/// quoted identifiers, and comments are written back verbatim.
///
/// Returns the trimmed input unchanged if it cannot be tokenized.
///
/// # Examples
///
/// ```
/// use inventory_nlq::sql::normalize_sql;
///
/// let sql = "select item_name from items   where status = 'available' and location like '%B2%';";
/// assert_eq!(
///     normalize_sql(sql),
///     "SELECT item_name\nFROM items\nWHERE status = 'available'\n  AND location LIKE '%B2%';"
/// );
/// ```
pub fn normalize_sql(sql: &str) -> String {
    let dialect = MySqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).with_unescape(false).tokenize() {
        Ok(tokens) => tokens,
        Err(_) => return sql.trim().to_string(),
    };

    let significant: Vec<&Token> = tokens
        .iter()
        .filter(|t| {
            !matches!(
                t,
                Token::Whitespace(Whitespace::Space)
                    | Token::Whitespace(Whitespace::Newline)
                    | Token::Whitespace(Whitespace::Tab)
            )
        })
        .collect();

    let mut out = String::with_capacity(sql.len());
    let mut prev_word: Option<String> = None;
    let mut prev_token: Option<&Token> = None;
    let mut in_where = false;

    for (idx, token) in significant.iter().enumerate() {
        let upper = bare_upper(token);
        let next = significant.get(idx + 1).copied();
        let next_is_paren = matches!(next, Some(Token::LParen));

        let line_break = match upper.as_deref() {
            Some(word) if CLAUSE_STARTS.contains(&word) => Some(""),
            Some(word)
                if JOIN_STARTS.contains(&word)
                    && !next_is_paren
                    && !prev_word
                        .as_deref()
                        .is_some_and(|p| JOIN_MODIFIERS.contains(&p)) =>
            {
                Some("")
            }
            Some("AND") | Some("OR") if in_where => Some("  "),
            _ => None,
        };

        if let Some(word) = upper.as_deref() {
            if word == "WHERE" || word == "HAVING" {
                in_where = true;
            } else if CLAUSE_STARTS.contains(&word) {
                in_where = false;
            }
        }

        if !out.is_empty() {
            if let Some(indent) = line_break {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(indent);
            } else if needs_space(&out, prev_token, token) {
                out.push(' ');
            }
        }

        match (&upper, token) {
            (Some(word), _) if UPPERCASE_KEYWORDS.contains(&word.as_str()) => out.push_str(word),
            (_, Token::Whitespace(Whitespace::SingleLineComment { prefix, comment })) => {
                out.push_str(prefix);
                out.push_str(comment.trim_end());
                out.push('\n');
            }
            _ => out.push_str(&token.to_string()),
        }

        prev_word = upper;
        prev_token = Some(*token);
    }

    out.trim().to_string()
}

fn needs_space(out: &str, prev: Option<&Token>, token: &Token) -> bool {
    if out.ends_with(['\n', ' ']) || matches!(prev, Some(Token::LParen) | Some(Token::Period)) {
        return false;
    }
    match token {
        Token::Comma | Token::SemiColon | Token::RParen | Token::Period => false,
        Token::LParen => !prev.is_some_and(is_callable),
        _ => true,
    }
}

/// Word directly followed by `(` without a space: function names and quoted identifiers.
fn is_callable(token: &Token) -> bool {
    match token {
        Token::Word(Word { quote_style: Some(_), .. }) => true,
        Token::Word(Word { value, quote_style: None, .. }) => {
            let upper = value.to_ascii_uppercase();
            FUNCTION_KEYWORDS.contains(&upper.as_str())
                || !UPPERCASE_KEYWORDS.contains(&upper.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uppercases_keywords_and_breaks_clauses() {
        let sql = "select location, item_name from view_general_inventory where item_name like '%Monitor%' or category_name like '%Monitor%';";
        assert_eq!(
            normalize_sql(sql),
            "SELECT location, item_name\nFROM view_general_inventory\nWHERE item_name LIKE '%Monitor%'\n  OR category_name LIKE '%Monitor%';"
        );
    }

    #[test]
    fn test_function_calls_keep_parentheses_tight() {
        let sql = "select count(*) as total from items";
        assert_eq!(normalize_sql(sql), "SELECT COUNT(*) AS total\nFROM items");
    }

    #[test]
    fn test_joins_start_new_lines() {
        let sql = "select i.item_name from items i left join item_categories c on c.id = i.category_id";
        assert_eq!(
            normalize_sql(sql),
            "SELECT i.item_name\nFROM items i\nLEFT JOIN item_categories c ON c.id = i.category_id"
        );
    }

    #[test]
    fn test_literals_and_identifier_case_preserved() {
        let sql = "SELECT `Item Name` FROM Items WHERE note = 'it''s where'";
        assert_eq!(
            normalize_sql(sql),
            "SELECT `Item Name`\nFROM Items\nWHERE note = 'it''s where'"
        );
    }

    #[test]
    fn test_comments_survive_formatting() {
        let out = normalize_sql("SELECT * FROM items -- trailing\nWHERE 1 = 1");
        assert!(out.contains("-- trailing"));
        let out = normalize_sql("SELECT * /* note */ FROM items");
        assert!(out.contains("/* note */"));
    }

    #[test]
    fn test_where_indent_resets_after_group_by() {
        let sql = "select a from items where x = 1 and y = 2 group by a having count(*) > 1 and a > 0";
        assert_eq!(
            normalize_sql(sql),
            "SELECT a\nFROM items\nWHERE x = 1\n  AND y = 2\nGROUP BY a\nHAVING COUNT(*) > 1\n  AND a > 0"
        );
    }
}
