//! Prompt construction for translation and SQL generation.

use crate::llm::client::ChatMessage;
use crate::llm::enhancer::QueryEnhancer;
use crate::types::QueryMetadata;

/// Column used for date-range filtering.
pub const TIME_COLUMN: &str = "created_at";

/// Build the translation conversation.
///
/// # Arguments
///
/// * `query` - Sanitized (and annotated) user query
/// * `gloss` - `word->stem` morphology gloss, may be empty
pub fn translation_messages(query: &str, gloss: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You are a translation engine. Your ONLY job is to translate Turkish inventory queries to English.\n\
         \n\
         RULES:\n\
         1. Output ONLY the translated text. No \"Here is the translation\".\n\
         2. Treat 'hibe' as 'donated'.\n\
         3. Treat 'zimmetli' as 'lent'.\n\
         4. Treat 'boşta' as 'available'.\n\
         \n\
         Morphology: {}",
        gloss
    );

    vec![
        ChatMessage::system(system),
        ChatMessage::user("monitörler nerede"),
        ChatMessage::assistant("Where are the monitors?"),
        ChatMessage::user("ahmetin eşyaları"),
        ChatMessage::assistant("What items does Ahmet have?"),
        ChatMessage::user(query),
    ]
}

/// Clean a translation reply.
///
/// Drops a leading `Translation:` label some models emit despite the rules.
///
/// # Returns
///
/// `None` when nothing usable is left
pub fn clean_translation(reply: &str) -> Option<String> {
    let reply = reply.trim();
    let cleaned = if reply.to_lowercase().contains("translation:") {
        reply.rsplit(':').next().unwrap_or(reply).trim()
    } else {
        reply
    };
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn generation_system_prompt(schema: &str, metadata: &QueryMetadata) -> String {
    let mut prompt = format!(
        "You are a MySQL expert. Output ONLY valid SQL query. No explanations.\n\
         \n\
         DATABASE SCHEMA:\n\
         {}\n\
         \n\
         RULES:\n\
         1. USE `view_general_inventory` for ALL general queries (items, holders, status).\n   \
            - Columns: item_name, category_name, location, status, current_holder.\n\
         2. DO NOT JOIN `users` if using `view_general_inventory`.\n\
         3. For 'available' items: status = 'available'.\n\
         4. For 'donated' items: status = 'donated'.\n\
         5. Use LIKE '%term%' for fuzzy search on names.",
        schema
    );

    if let Some(period) = metadata.time_period.as_ref().filter(|_| metadata.has_time_filter) {
        prompt.push_str(&format!(
            "\n6. IMPORTANT: Filter results by date range: {} to {}.\n   \
             - Use {} column for filtering.\n   \
             - Format: WHERE {}",
            period.start_date,
            period.end_date,
            TIME_COLUMN,
            QueryEnhancer::build_time_filter(period, TIME_COLUMN)
        ));
    }

    if let Some(info) = metadata
        .statistical_info
        .as_ref()
        .filter(|_| metadata.has_statistical_intent)
    {
        prompt.push_str(&format!(
            "\n7. IMPORTANT: Use {} aggregation function.\n   \
             - For COUNT: Use COUNT(*) to count rows.\n   \
             - For SUM/AVG/MAX/MIN: Apply to relevant numeric columns.\n   \
             - Include GROUP BY if needed for meaningful aggregation.",
            info.aggregation
        ));
    }

    prompt
}

/// Build the SQL generation conversation for one attempt.
///
/// # Arguments
///
/// * `schema` - Schema description (`Table 't': col (type), ...` lines)
/// * `question` - English question
/// * `metadata` - Enhancement metadata; adds date and aggregation rules and examples
/// * `history` - Failures from earlier attempts of the same run
pub fn generation_messages(
    schema: &str,
    question: &str,
    metadata: &QueryMetadata,
    history: &[String],
) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::system(generation_system_prompt(schema, metadata)),
        ChatMessage::user("Where are the monitors?"),
        ChatMessage::assistant(
            "SELECT location, item_name, status FROM view_general_inventory WHERE item_name LIKE '%Monitor%' OR category_name LIKE '%Monitor%';",
        ),
        ChatMessage::user("What items does Ahmet have?"),
        ChatMessage::assistant(
            "SELECT item_name, location FROM view_general_inventory WHERE current_holder LIKE '%Ahmet%';",
        ),
    ];

    if metadata.has_time_filter {
        messages.push(ChatMessage::user("Show me items added this week"));
        messages.push(ChatMessage::assistant(
            "SELECT item_name, category_name, created_at FROM view_general_inventory WHERE created_at >= CURDATE() - INTERVAL WEEKDAY(CURDATE()) DAY;",
        ));
    }

    if metadata.has_statistical_intent {
        messages.push(ChatMessage::user("How many monitors do we have?"));
        messages.push(ChatMessage::assistant(
            "SELECT COUNT(*) as total_monitors FROM view_general_inventory WHERE item_name LIKE '%Monitor%';",
        ));
    }

    messages.push(ChatMessage::user(format!(
        "Generate SQL for: {}\nAvoid Errors: {}",
        question,
        history.join("; ")
    )));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::Role;
    use crate::llm::enhancer::QueryEnhancer;
    use chrono::NaiveDate;

    fn metadata(query: &str) -> QueryMetadata {
        QueryEnhancer::enhance_at(query, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()).1
    }

    #[test]
    fn test_translation_conversation_shape() {
        let messages = translation_messages("kaç monitör var?", "monitör->monitör");
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Morphology: monitör->monitör"));
        assert!(messages[0].content.contains("'zimmetli' as 'lent'"));
        assert_eq!(messages[5].content, "kaç monitör var?");
    }

    #[test]
    fn test_clean_translation() {
        assert_eq!(
            clean_translation("Translation: Where are the monitors?").as_deref(),
            Some("Where are the monitors?")
        );
        assert_eq!(clean_translation("  How many?  ").as_deref(), Some("How many?"));
        assert_eq!(clean_translation("   "), None);
        assert_eq!(clean_translation("Translation:"), None);
    }

    #[test]
    fn test_plain_generation_prompt() {
        let messages = generation_messages("Table 'items': id (int)", "Where?", &metadata("nerede"), &[]);
        assert_eq!(messages.len(), 6);
        let system = &messages[0].content;
        assert!(system.contains("Table 'items': id (int)"));
        assert!(!system.contains("6. IMPORTANT"));
        assert!(!system.contains("7. IMPORTANT"));
        assert_eq!(messages[5].content, "Generate SQL for: Where?\nAvoid Errors: ");
    }

    #[test]
    fn test_time_and_stat_rules_added_when_flagged() {
        let meta = metadata("bu hafta kaç tane laptop eklendi");
        let messages = generation_messages("", "How many laptops this week?", &meta, &[]);
        let system = &messages[0].content;
        assert!(system.contains("WHERE created_at BETWEEN '2024-03-11' AND '2024-03-14 23:59:59'"));
        assert!(system.contains("Use COUNT aggregation function"));
        // base few-shots + time example + stat example + final turn
        assert_eq!(messages.len(), 10);
    }

    #[test]
    fn test_history_is_fed_back() {
        let history = vec!["Empty SQL".to_string(), "Security: UNION queries are forbidden".to_string()];
        let messages = generation_messages("", "q", &QueryMetadata::default(), &history);
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last
            .content
            .ends_with("Avoid Errors: Empty SQL; Security: UNION queries are forbidden"));
    }
}
