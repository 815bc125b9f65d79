//! Collision-checked generation of short, human-enterable session codes.

use rand::{Rng, rng, seq::SliceRandom};
use tracing::debug;

use crate::{
    dao::session_store::SessionStore,
    dto::validation::{CODE_DIGITS, CODE_LETTERS, CODE_SYMBOLS},
    error::ServiceError,
};

const DIGIT_COUNT: usize = 3;
const LETTER_COUNT: usize = 3;
const SYMBOL_COUNT: usize = 1;

/// Compose one candidate code: 3 digits, 3 letters, 1 symbol, shuffled.
///
/// Codes double as a weak admission token, so every draw and the shuffle use
/// the thread-local CSPRNG rather than a seeded generator.
fn compose_code() -> String {
    let mut rng = rng();
    let mut chars = Vec::with_capacity(DIGIT_COUNT + LETTER_COUNT + SYMBOL_COUNT);

    for _ in 0..DIGIT_COUNT {
        chars.push(CODE_DIGITS[rng.random_range(0..CODE_DIGITS.len())]);
    }
    for _ in 0..LETTER_COUNT {
        chars.push(CODE_LETTERS[rng.random_range(0..CODE_LETTERS.len())]);
    }
    for _ in 0..SYMBOL_COUNT {
        chars.push(CODE_SYMBOLS[rng.random_range(0..CODE_SYMBOLS.len())]);
    }

    chars.shuffle(&mut rng);
    String::from_utf8(chars).unwrap_or_default()
}

/// Generate a session code that no existing row carries, retrying on
/// collisions inside a bounded loop.
///
/// The store pre-check keeps collisions rare; the uniqueness constraint on
/// the insert remains the final arbiter when two generators race. After
/// `budget` collisions the attempt fails with
/// [`ServiceError::GenerationExhausted`] instead of retrying forever.
pub async fn generate_code(
    store: &dyn SessionStore,
    budget: usize,
) -> Result<String, ServiceError> {
    for attempt in 0..budget {
        let candidate = compose_code();
        match store.find_session(candidate.clone()).await? {
            None => return Ok(candidate),
            Some(_) => debug!(attempt, %candidate, "session code collision; retrying"),
        }
    }

    Err(ServiceError::GenerationExhausted { attempts: budget })
}
