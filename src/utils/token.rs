// src/utils/token.rs

use rand::{Rng, distributions::Alphanumeric, thread_rng};

/// Generates a random alphanumeric token string.
///
/// `thread_rng` is a CSPRNG, so the result is unguessable; uniqueness is
/// still re-checked against the store before a token is persisted.
pub fn generate_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length() {
        assert_eq!(generate_token(32).len(), 32);
        assert_eq!(generate_token(8).len(), 8);
    }

    #[test]
    fn tokens_are_alphanumeric() {
        let token = generate_token(64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(generate_token(32), generate_token(32));
    }
}
