//! Input guard: rejects malicious or degenerate natural-language input
//! before any model sees it.

pub mod patterns;
pub mod sanitizer;

pub use patterns::{find_blocked, PatternClass, PatternMatch};
pub use sanitizer::{is_safe, sanitize, InputRejection, SanitizedQuery, MAX_LENGTH, MIN_LENGTH};
