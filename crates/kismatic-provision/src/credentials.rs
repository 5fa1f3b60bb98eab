//! Admin password generation
//!
//! Passwords come from a [`PasswordSource`] driven by strength requirements,
//! then get re-checked here: the source is not trusted to honour "no
//! punctuation". After [`MAX_PASSWORD_ATTEMPTS`] consecutive failures the
//! generator degrades to [`SENTINEL_PASSWORD`] instead of looping forever.

use kismatic_provision_common::defaults::{
    MAX_PASSWORD_ATTEMPTS, MIN_PASSWORD_LENGTH, SENTINEL_PASSWORD,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const PUNCTUATION: &[u8] = b"!@#$%^&*()-_=+[]{};:,.?";

/// Strength requirements handed to a password source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRequirements {
    pub min_length: usize,
    /// Minimum number of uppercase letters
    pub uppercase: usize,
    /// Minimum number of digits
    pub digits: usize,
    /// Minimum number of punctuation characters; `None` disables punctuation
    pub punctuation: Option<usize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordSourceError {
    #[error("minimum password length must be positive")]
    ZeroLength,
}

/// Something that produces candidate passwords for given requirements.
pub trait PasswordSource {
    fn generate<R: Rng + ?Sized>(
        &mut self,
        requirements: &PasswordRequirements,
        rng: &mut R,
    ) -> Result<String, PasswordSourceError>;
}

/// Character-class password source: the required counts of each class,
/// padded with lowercase letters and shuffled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharsetSource;

impl PasswordSource for CharsetSource {
    fn generate<R: Rng + ?Sized>(
        &mut self,
        requirements: &PasswordRequirements,
        rng: &mut R,
    ) -> Result<String, PasswordSourceError> {
        if requirements.min_length == 0 {
            return Err(PasswordSourceError::ZeroLength);
        }

        let mut chars = Vec::with_capacity(requirements.min_length);
        let mut pick = |set: &[u8], n: usize, out: &mut Vec<u8>| {
            for _ in 0..n {
                out.push(set[rng.gen_range(0..set.len())]);
            }
        };
        pick(UPPERCASE, requirements.uppercase, &mut chars);
        pick(DIGITS, requirements.digits, &mut chars);
        if let Some(n) = requirements.punctuation {
            pick(PUNCTUATION, n, &mut chars);
        }
        let padding = requirements.min_length.saturating_sub(chars.len());
        pick(LOWERCASE, padding, &mut chars);

        chars.shuffle(rng);
        Ok(chars.into_iter().map(char::from).collect())
    }
}

/// The admin credential written into the plan
#[derive(Clone, PartialEq, Eq)]
pub enum AdminPassword {
    Generated(String),
    /// Generation was exhausted; the fixed weak value is used
    Sentinel,
}

impl AdminPassword {
    pub fn as_str(&self) -> &str {
        match self {
            AdminPassword::Generated(p) => p,
            AdminPassword::Sentinel => SENTINEL_PASSWORD,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, AdminPassword::Sentinel)
    }
}

impl fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminPassword::Generated(_) => f.write_str("AdminPassword::Generated(<redacted>)"),
            AdminPassword::Sentinel => f.write_str("AdminPassword::Sentinel"),
        }
    }
}

/// Whether a candidate is acceptable as an admin password
pub fn is_valid_password(candidate: &str) -> bool {
    candidate.len() >= MIN_PASSWORD_LENGTH && candidate.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Admin password generator with an injectable random source.
pub struct CredentialGenerator<R = StdRng, S = CharsetSource> {
    rng: R,
    source: S,
    max_attempts: u32,
}

impl CredentialGenerator<StdRng, CharsetSource> {
    /// Generator seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy(), CharsetSource)
    }

    /// Deterministic generator for a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed), CharsetSource)
    }
}

impl<R: Rng, S: PasswordSource> CredentialGenerator<R, S> {
    pub fn new(rng: R, source: S) -> Self {
        Self {
            rng,
            source,
            max_attempts: MAX_PASSWORD_ATTEMPTS,
        }
    }

    /// Produce an alphanumeric admin password of at least 16 characters.
    ///
    /// Never fails: after the attempt limit the sentinel is returned and a
    /// warning is logged.
    pub fn generate(&mut self) -> AdminPassword {
        for attempt in 1..=self.max_attempts {
            let requirements = PasswordRequirements {
                min_length: MIN_PASSWORD_LENGTH,
                uppercase: self.rng.gen_range(0..6),
                digits: self.rng.gen_range(0..6),
                punctuation: None,
            };

            match self.source.generate(&requirements, &mut self.rng) {
                Ok(candidate) if is_valid_password(&candidate) => {
                    return AdminPassword::Generated(candidate);
                }
                Ok(_) => debug!(attempt, "Generated password failed validation, retrying"),
                Err(e) => debug!(attempt, error = %e, "Password generation failed, retrying"),
            }
        }

        warn!(
            attempts = self.max_attempts,
            "Password generation exhausted; falling back to the fixed sentinel password. \
             Change the admin password before using this cluster"
        );
        AdminPassword::Sentinel
    }
}
