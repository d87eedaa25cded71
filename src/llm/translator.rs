//! Turkish to English query translation.

use crate::llm::client::{ChatBackend, ChatRequest};
use crate::llm::morphology::{gloss, Morphology};
use crate::llm::prompts::{clean_translation, translation_messages};
use crate::types::{NlqError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Sampling temperature for translation.
pub const TRANSLATION_TEMPERATURE: f32 = 0.1;

/// Translates user queries to English before SQL generation.
#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn ChatBackend>,
    morphology: Arc<dyn Morphology>,
    model: String,
}

impl Translator {
    /// Create new translator.
    ///
    /// # Arguments
    ///
    /// * `backend` - Chat backend
    /// * `morphology` - Stemmer used for the prompt gloss
    /// * `model` - Translation model identifier
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        morphology: Arc<dyn Morphology>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            morphology,
            model: model.into(),
        }
    }

    /// Translate a query.
    ///
    /// # Errors
    ///
    /// Returns `NlqError::TranslationFailure` if the reply is empty, or the
    /// backend error if the call itself failed
    pub async fn translate(&self, query: &str) -> Result<String> {
        let gloss = gloss(query, self.morphology.as_ref());
        debug!(gloss = %gloss, "Morphology gloss");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: translation_messages(query, &gloss),
            temperature: TRANSLATION_TEMPERATURE,
        };

        let reply = self.backend.chat(&request).await?;
        let translated = clean_translation(&reply)
            .ok_or_else(|| NlqError::TranslationFailure("empty translation".to_string()))?;

        info!(original = %query, translated = %translated, "Query translated");
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::Role;
    use crate::llm::morphology::SuffixStemmer;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: String,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatBackend for Scripted {
        async fn chat(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    fn translator(reply: &str) -> (Translator, Arc<Scripted>) {
        let backend = Arc::new(Scripted {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let t = Translator::new(backend.clone(), Arc::new(SuffixStemmer), "llama3.2:latest");
        (t, backend)
    }

    #[tokio::test]
    async fn test_translate_sends_gloss_and_strips_label() {
        let (t, backend) = translator("Translation: Where are the monitors?");
        let out = t.translate("monitörler nerede").await.unwrap();
        assert_eq!(out, "Where are the monitors?");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "llama3.2:latest");
        assert_eq!(seen[0].messages[0].role, Role::System);
        assert!(seen[0].messages[0].content.contains("monitörler->monitör"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_translation_failure() {
        let (t, _) = translator("   ");
        let err = t.translate("monitörler nerede").await.unwrap_err();
        assert!(matches!(err, NlqError::TranslationFailure(_)));
    }
}
