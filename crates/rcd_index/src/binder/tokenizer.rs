//! Free-text tokenization.
//!
//! Mirrors the default tokenizer of the search engine so that prefix terms
//! built from user input line up with the indexed terms: split on anything
//! that is not alphanumeric, lowercase, drop over-long tokens.

/// Byte length from which the engine's default tokenizer drops a token.
pub const MAX_TOKEN_LENGTH: usize = 40;

/// Splits `text` into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && token.len() < MAX_TOKEN_LENGTH)
        .map(str::to_lowercase)
        .collect()
}

/// Joins the text values of searchable fields into one free-text value.
///
/// Words are split on whitespace and de-duplicated keeping first
/// occurrence order.
pub fn join_search_text<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let mut words: Vec<&str> = Vec::new();
    for value in values {
        for word in value.split_whitespace() {
            if !words.contains(&word) {
                words.push(word);
            }
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_basic() {
        assert_eq!(tokenize("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn tokenize_with_punctuation() {
        assert_eq!(
            tokenize("geo.countries, RU-EN!"),
            vec!["geo", "countries", "ru", "en"]
        );
    }

    #[test]
    fn tokenize_drops_long_tokens() {
        let long = "x".repeat(MAX_TOKEN_LENGTH + 1);
        assert_eq!(tokenize(&format!("short {long}")), vec!["short"]);
    }

    #[test]
    fn tokenize_drops_tokens_at_the_limit() {
        let at_limit = "x".repeat(MAX_TOKEN_LENGTH);
        let below = "y".repeat(MAX_TOKEN_LENGTH - 1);
        assert_eq!(tokenize(&format!("{at_limit} {below}")), vec![below]);
    }

    #[test]
    fn tokenize_unicode() {
        assert_eq!(tokenize("Москва Tver"), vec!["москва", "tver"]);
    }

    #[test]
    fn join_deduplicates_words() {
        let joined = join_search_text(["alpha beta", "beta gamma", ""]);
        assert_eq!(joined, "alpha beta gamma");
    }
}
