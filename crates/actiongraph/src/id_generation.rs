//! Hash-based ID generation for actions.
//!
//! IDs have the form `{prefix}-{hash}` (e.g. `act-4f2k`), where the hash is a
//! base36 rendering of a SHA256 digest over the title, a timestamp, a
//! per-generator sequence number and a collision nonce. The hash length adapts
//! to the number of stored actions (4-6 characters) and grows further when
//! every nonce at the current length collides.
//!
//! Family structure lives in edges, so IDs carry no hierarchy.
//!
//! # Example
//!
//! ```
//! use actiongraph::id_generation::IdGenerator;
//!
//! let mut generator = IdGenerator::new("act");
//! let id = generator.generate("Plan the offsite", 0).unwrap();
//! assert!(id.as_str().starts_with("act-"));
//! ```

use crate::domain::ActionId;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const MAX_ID_HASH_LENGTH: usize = 8;

/// Errors that can occur during ID generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Unable to generate a unique ID after exhausting all nonces and length increases
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Total hashes tried
        attempts: u32,
    },

    /// Invalid length parameter
    #[error("Length must be between 1 and 12")]
    InvalidLength,
}

/// Hash-based ID generator with collision detection.
///
/// Every generated or registered ID is remembered, so IDs of deleted actions
/// are not handed out again for the lifetime of the generator.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    existing_ids: HashSet<String>,
    sequence: u64,
}

impl IdGenerator {
    /// Create a new ID generator for the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            existing_ids: HashSet::new(),
            sequence: 0,
        }
    }

    /// The prefix used for generated IDs
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register an existing ID to prevent collisions
    pub fn register_id(&mut self, id: &ActionId) {
        self.existing_ids.insert(id.as_str().to_string());
    }

    /// Returns `true` if `id` has been generated or registered.
    pub fn is_reserved(&self, id: &ActionId) -> bool {
        self.existing_ids.contains(id.as_str())
    }

    /// Reserve every ID `other` has generated or registered.
    ///
    /// Used when a store is rebuilt from disk, so IDs handed out after the
    /// last save stay taken even though their actions were discarded.
    pub fn absorb(&mut self, other: &IdGenerator) {
        self.existing_ids.extend(other.existing_ids.iter().cloned());
        self.sequence = self.sequence.max(other.sequence);
    }

    /// Generate a new unique ID.
    ///
    /// `stored_count` is the current number of actions and selects the
    /// starting hash length.
    ///
    /// # Errors
    ///
    /// Returns an error if every nonce collides at every length up to the
    /// maximum.
    pub fn generate(
        &mut self,
        title: &str,
        stored_count: usize,
    ) -> Result<ActionId, IdGenerationError> {
        self.sequence = self.sequence.wrapping_add(1);
        let mut attempts = 0;

        for length in adaptive_length(stored_count)..=MAX_ID_HASH_LENGTH {
            for nonce in 0..MAX_NONCE {
                attempts += 1;
                let id = self.hash_id(title, nonce, length)?;
                if self.existing_ids.insert(id.clone()) {
                    if nonce > 0 {
                        debug!(nonce, length, "Generated unique ID after collision retries");
                    }
                    return Ok(ActionId::new(id));
                }
            }
            warn!(
                length,
                max_nonce = MAX_NONCE,
                "All nonces exhausted, increasing ID length"
            );
        }

        Err(IdGenerationError::CollisionExhausted { attempts })
    }

    fn hash_id(&self, title: &str, nonce: u32, length: usize) -> Result<String, IdGenerationError> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let content = format!("{title}|{timestamp}|{}|{nonce}", self.sequence);

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash_bytes = hasher.finalize();

        let hash_str = encode_base36(&hash_bytes[..8], length)?;
        Ok(format!("{}-{}", self.prefix, hash_str))
    }
}

/// Starting hash length for a store of the given size.
///
/// - 0-500 actions: 4 chars
/// - 501-1,500: 5 chars
/// - 1,500+: 6 chars
fn adaptive_length(stored_count: usize) -> usize {
    match stored_count {
        0..=500 => 4,
        501..=1500 => 5,
        _ => 6,
    }
}

/// Encode up to 8 bytes as a fixed-length base36 string.
///
/// Lengths above 12 are rejected because a `u64` has at most 13 base36 digits
/// and the leading digit carries almost no entropy.
fn encode_base36(bytes: &[u8], length: usize) -> Result<String, IdGenerationError> {
    if length == 0 || length > 12 {
        return Err(IdGenerationError::InvalidLength);
    }

    let mut num: u64 = 0;
    for &byte in bytes.iter().take(8) {
        num = (num << 8) | u64::from(byte);
    }

    let mut result = Vec::with_capacity(length);
    while result.len() < length {
        // remainder < 36, so the cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        let remainder = (num % 36) as usize;
        result.push(char::from(BASE36_CHARS[remainder]));
        num /= 36;
    }
    result.reverse();

    Ok(result.into_iter().collect())
}
