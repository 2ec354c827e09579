//! Rough token estimates for prompt-size logging.
//!
//! ~4 characters per token holds well enough for German and English text
//! across providers, without shipping a tokenizer.

pub struct TokenCounter;

impl TokenCounter {
    pub fn estimate_tokens(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() + 3) / 4
    }

    /// System and user message plus ~4 tokens of wrapper per message.
    pub fn estimate_prompt_tokens(system: &str, user: &str) -> usize {
        let messages = [system, user];
        messages
            .iter()
            .filter(|m| !m.is_empty())
            .map(|m| Self::estimate_tokens(m) + 4)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(TokenCounter::estimate_tokens(""), 0);
        assert_eq!(TokenCounter::estimate_tokens("abcd"), 1);
        assert_eq!(TokenCounter::estimate_tokens("abcde"), 2);
        // Umlauts count as one character each.
        assert_eq!(TokenCounter::estimate_tokens("Größe"), 2);
    }

    #[test]
    fn test_estimate_prompt_tokens_skips_empty_system() {
        assert_eq!(TokenCounter::estimate_prompt_tokens("", "abcd"), 5);
        assert_eq!(TokenCounter::estimate_prompt_tokens("abcd", "abcd"), 10);
    }
}
