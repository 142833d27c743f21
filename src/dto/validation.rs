//! Validation helpers for client-supplied names.

use validator::ValidationError;

/// Longest accepted player name, in characters.
const MAX_PLAYER_NAME_CHARS: usize = 32;
/// Longest accepted session name, in characters.
const MAX_GAME_NAME_CHARS: usize = 64;

/// Validates that a player name is non-blank and reasonably short.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    validate_name(name, MAX_PLAYER_NAME_CHARS, "player_name")
}

/// Validates that a session name is non-blank and reasonably short.
pub fn validate_game_name(name: &str) -> Result<(), ValidationError> {
    validate_name(name, MAX_GAME_NAME_CHARS, "game_name")
}

fn validate_name(name: &str, max_chars: usize, code: &'static str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new(code);
        err.message = Some("name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > max_chars {
        let mut err = ValidationError::new(code);
        err.message = Some(format!("name must not exceed {max_chars} characters").into());
        return Err(err);
    }

    Ok(())
}
