//! Random secret strings (routing tokens, correlation keys, session secrets).

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a per-identity routing token (the probe path segment).
pub const PATH_TOKEN_LEN: usize = 10;

/// Length of correlation API keys and session secrets.
pub const SECRET_LEN: usize = 64;

/// Generate a lowercase alphanumeric string from the OS-seeded thread RNG.
pub fn secure_random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn new_path_token() -> String {
    secure_random_string(PATH_TOKEN_LEN)
}

pub fn new_secret() -> String {
    secure_random_string(SECRET_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string_alphabet_and_length() {
        let s = secure_random_string(128);
        assert_eq!(s.len(), 128);
        assert!(s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_path_tokens_are_lowercase_and_distinct() {
        let a = new_path_token();
        let b = new_path_token();
        assert_eq!(a.len(), PATH_TOKEN_LEN);
        assert_eq!(a, a.to_lowercase());
        assert_ne!(a, b);
    }
}
