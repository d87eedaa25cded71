//! Morphological glossing for the translation prompt.
//!
//! Turkish is agglutinative: "monitörler", "odasındaki" and "eşyaları" reach
//! the translator as single tokens. A `word->stem` gloss next to the query
//! helps small models translate them.

/// Best-effort stemmer.
pub trait Morphology: Send + Sync {
    /// Best-guess stem of a single token.
    ///
    /// # Returns
    ///
    /// `None` when the token cannot be analyzed; it is left out of the gloss
    fn stem(&self, word: &str) -> Option<String>;
}

/// Turkish suffixes stripped by [`SuffixStemmer`], longest first.
const SUFFIXES: &[&str] = &[
    "lerindeki", "larındaki", "lerinde", "larında", "ndaki", "ndeki", "ların", "lerin", "daki",
    "deki", "taki", "teki", "ları", "leri", "ndan", "nden", "nın", "nin", "nun", "nün", "lar",
    "ler", "dan", "den", "tan", "ten", "nda", "nde", "sı", "si", "su", "sü", "ın", "in", "un",
    "ün", "da", "de", "ta", "te", "ya", "ye",
];

/// Minimum stem length left after stripping (characters).
const MIN_STEM: usize = 3;

/// Rule-based stemmer that peels common Turkish inflectional suffixes.
///
/// Handles plural, possessive, genitive and locative/ablative endings. It
/// does not apply vowel harmony or consonant mutation rules, so it works as
/// a hint for the translator rather than as a dictionary analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixStemmer;

impl Morphology for SuffixStemmer {
    fn stem(&self, word: &str) -> Option<String> {
        if !word.chars().any(char::is_alphabetic) {
            return None;
        }

        let mut stem = word.to_lowercase();
        // Up to three layers, e.g. oda+sı+nda+ki
        for _ in 0..3 {
            let stripped = SUFFIXES.iter().find_map(|suffix| {
                let rest = stem.strip_suffix(suffix)?;
                (rest.chars().count() >= MIN_STEM).then(|| rest.to_string())
            });
            match stripped {
                Some(rest) => stem = rest,
                None => break,
            }
        }
        Some(stem)
    }
}

/// Build the `word->stem` gloss for a query.
///
/// Punctuation is removed before analysis; tokens the analyzer cannot handle
/// are skipped.
///
/// # Examples
///
/// ```
/// use inventory_nlq::llm::morphology::{gloss, SuffixStemmer};
///
/// assert_eq!(gloss("monitörler nerede?", &SuffixStemmer), "monitörler->monitör, nerede?->nere");
/// ```
pub fn gloss(text: &str, morphology: &dyn Morphology) -> String {
    text.split_whitespace()
        .filter_map(|word| {
            let clean: String = word
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if clean.is_empty() {
                return None;
            }
            morphology.stem(&clean).map(|stem| format!("{}->{}", word, stem))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_inventory_words() {
        let stemmer = SuffixStemmer;
        assert_eq!(stemmer.stem("monitörler").as_deref(), Some("monitör"));
        assert_eq!(stemmer.stem("eşyaları").as_deref(), Some("eşya"));
        assert_eq!(stemmer.stem("ahmetin").as_deref(), Some("ahmet"));
        assert_eq!(stemmer.stem("odasındaki").as_deref(), Some("oda"));
        assert_eq!(stemmer.stem("Laptop").as_deref(), Some("laptop"));
    }

    #[test]
    fn test_short_words_kept_whole() {
        let stemmer = SuffixStemmer;
        assert_eq!(stemmer.stem("kaç").as_deref(), Some("kaç"));
        assert_eq!(stemmer.stem("var").as_deref(), Some("var"));
    }

    #[test]
    fn test_non_words_have_no_stem() {
        assert_eq!(SuffixStemmer.stem("212"), None);
    }

    struct Failing;

    impl Morphology for Failing {
        fn stem(&self, word: &str) -> Option<String> {
            (word != "bozuk").then(|| word.to_uppercase())
        }
    }

    #[test]
    fn test_gloss_skips_failed_and_empty_tokens() {
        assert_eq!(gloss("iyi bozuk ?! kötü", &Failing), "iyi->IYI, kötü->KÖTÜ");
        assert_eq!(gloss("", &SuffixStemmer), "");
    }
}
