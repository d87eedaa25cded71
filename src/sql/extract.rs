//! Pull a SQL statement out of free-form model output.

use crate::sql::format::normalize_sql;
use regex::Regex;
use std::sync::LazyLock;

static SQL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(SELECT|WITH)\s[\s\S]*?(?:;|$)").expect("SQL block regex is valid")
});

/// Extract the first SQL statement from a model reply.
///
/// Strips markdown code fences, takes the shortest `SELECT`/`WITH` block up
/// to the first `;` (or end of text), terminates it with `;` and normalizes
/// formatting. When no block is found but the text still mentions `SELECT`,
/// the fence-stripped text is returned as-is and left to the validator.
///
/// # Returns
///
/// `None` when the reply holds nothing resembling SQL
pub fn extract_sql(text: &str) -> Option<String> {
    let text = text.replace("```sql", "").replace("```", "");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(found) = SQL_BLOCK.find(text) {
        let mut sql = found.as_str().trim().to_string();
        if !sql.ends_with(';') {
            sql.push(';');
        }
        return Some(normalize_sql(&sql));
    }

    if text.to_uppercase().contains("SELECT") {
        return Some(text.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fences_and_chatter() {
        let reply = "Here is the query:\n```sql\nselect count(*) from items;\n```\nHope it helps!";
        assert_eq!(
            extract_sql(reply).as_deref(),
            Some("SELECT COUNT(*)\nFROM items;")
        );
    }

    #[test]
    fn test_appends_missing_terminator() {
        assert_eq!(
            extract_sql("SELECT item_name FROM items").as_deref(),
            Some("SELECT item_name\nFROM items;")
        );
    }

    #[test]
    fn test_stops_at_first_statement() {
        let sql = extract_sql("SELECT * FROM items; DELETE FROM items;").unwrap();
        assert!(!sql.contains("DELETE"));
    }

    #[test]
    fn test_with_block_extracted() {
        let sql = extract_sql("WITH t AS (SELECT 1) SELECT * FROM t").unwrap();
        assert!(sql.starts_with("WITH"));
        assert!(sql.ends_with(';'));
    }

    #[test]
    fn test_no_sql() {
        assert_eq!(extract_sql(""), None);
        assert_eq!(extract_sql("```sql\n```"), None);
        assert_eq!(extract_sql("I cannot answer that."), None);
    }

    #[test]
    fn test_select_without_whitespace_falls_back_to_raw_text() {
        assert_eq!(extract_sql("SELECT*FROM items").as_deref(), Some("SELECT*FROM items"));
    }
}
