//! Transfer Access Code generation.
//!
//! A TAC looks like `TAC-7K2QX9DM-4HZP`: a constant prefix followed by an 8- and a
//! 4-character group drawn from `A-Z0-9` with a cryptographically secure RNG.
//! Uniqueness is not decided here. [`issue_unique`] hands each candidate to an
//! insert callback and retries when the store reports a collision, so the
//! store's UNIQUE constraint is the final arbiter even under concurrent
//! requests.

use crate::errors::{Error, Result};
use rand::{CryptoRng, Rng, rngs::OsRng};
use std::future::Future;
use tracing::warn;

/// Alphabet for the random groups.
pub const TAC_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the first random group.
pub const FIRST_GROUP_LEN: usize = 8;

/// Length of the second random group.
pub const SECOND_GROUP_LEN: usize = 4;

/// Outcome of offering one candidate code to the store.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The store accepted the code.
    Accepted(T),
    /// The code is already taken; try another.
    Collision,
}

/// Generates one candidate code with the given RNG.
#[must_use]
pub fn generate_tac<R>(prefix: &str, rng: &mut R) -> String
where
    R: Rng + CryptoRng,
{
    let mut tac = String::with_capacity(prefix.len() + FIRST_GROUP_LEN + SECOND_GROUP_LEN + 2);
    tac.push_str(prefix);
    tac.push('-');
    push_group(&mut tac, FIRST_GROUP_LEN, rng);
    tac.push('-');
    push_group(&mut tac, SECOND_GROUP_LEN, rng);
    tac
}

fn push_group<R>(out: &mut String, len: usize, rng: &mut R)
where
    R: Rng + CryptoRng,
{
    for _ in 0..len {
        let idx = rng.gen_range(0..TAC_ALPHABET.len());
        out.push(char::from(TAC_ALPHABET[idx]));
    }
}

/// Normalises user input: surrounding whitespace removed, uppercased.
#[must_use]
pub fn normalize(tac: &str) -> String {
    tac.trim().to_ascii_uppercase()
}

/// Checks that `tac` has the `<prefix>-XXXXXXXX-XXXX` shape.
#[must_use]
pub fn is_well_formed(prefix: &str, tac: &str) -> bool {
    let Some(rest) = tac
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };
    let mut groups = rest.split('-');
    let valid_group = |group: Option<&str>, len: usize| {
        group.is_some_and(|g| g.len() == len && g.bytes().all(|b| TAC_ALPHABET.contains(&b)))
    };
    valid_group(groups.next(), FIRST_GROUP_LEN)
        && valid_group(groups.next(), SECOND_GROUP_LEN)
        && groups.next().is_none()
}

/// Masks the random part of a code for logging (`TAC-7K2Q****-****`).
#[must_use]
pub fn mask(tac: &str) -> String {
    let mut seen_dash = 0;
    let mut kept = 0;
    tac.chars()
        .map(|c| {
            if c == '-' {
                seen_dash += 1;
                return c;
            }
            if seen_dash == 0 {
                return c;
            }
            kept += 1;
            if kept <= 4 { c } else { '*' }
        })
        .collect()
}

/// Generates codes from the operating system RNG until `try_insert` accepts one.
///
/// Fails with [`Error::TokenGenerationExhausted`] after `max_attempts` collisions.
/// Errors returned by `try_insert` abort immediately.
pub async fn issue_unique<T, F, Fut>(prefix: &str, max_attempts: u32, try_insert: F) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    issue_unique_with(&mut OsRng, prefix, max_attempts, try_insert).await
}

/// [`issue_unique`] with a caller-supplied RNG.
pub async fn issue_unique_with<R, T, F, Fut>(
    rng: &mut R,
    prefix: &str,
    max_attempts: u32,
    mut try_insert: F,
) -> Result<T>
where
    R: Rng + CryptoRng,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    for attempt in 1..=max_attempts {
        let candidate = generate_tac(prefix, rng);
        match try_insert(candidate).await? {
            Attempt::Accepted(value) => return Ok(value),
            Attempt::Collision => {
                warn!(attempt, max_attempts, "TAC collision, regenerating");
            }
        }
    }
    Err(Error::TokenGenerationExhausted {
        attempts: max_attempts,
    })
}
