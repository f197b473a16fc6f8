//! Random identifiers and secrets.

use rand::Rng;
use rand::distr::Alphanumeric;
use townsquare_protocol::{PlayerId, SessionToken};

/// Length of generated player ids.
const PLAYER_ID_LEN: usize = 12;

/// Generates an unguessable session token: 16 random bytes as 32
/// lowercase hex characters.
pub fn generate_session_token() -> SessionToken {
    let bytes: [u8; 16] = rand::rng().random();
    SessionToken::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

/// Generates a fresh player id.
pub fn generate_player_id() -> PlayerId {
    let id: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PLAYER_ID_LEN)
        .map(char::from)
        .collect();
    PlayerId::new(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_token_is_32_hex_chars() {
        let token = generate_session_token();
        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_session_token_is_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn test_generate_player_id_is_alphanumeric() {
        let id = generate_player_id();
        assert_eq!(id.as_str().len(), PLAYER_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
