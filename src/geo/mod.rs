// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Location Secrets
//!
//! A recovery secret is a set of exactly [`REQUIRED_LOCATIONS`] geohashes.
//! This module validates the selection and reduces it to a
//! [`CanonicalSecretDigest`]:
//!
//! 1. Each geohash is hashed on its own (Keccak-256 of its UTF-8 bytes).
//! 2. The per-location digests are sorted ascending as raw bytes.
//! 3. The sorted digests are concatenated and hashed once more.
//!
//! Sorting on the digest (not on selection order) makes the result
//! independent of the order in which the locations were picked.

use std::collections::HashSet;
use std::fmt;

use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

pub mod selection;

pub use selection::LocationSelection;

/// Number of distinct locations that make up one recovery secret.
pub const REQUIRED_LOCATIONS: usize = 5;

/// Geohash base-32 alphabet (no `a`, `i`, `l`, `o`).
const GEOHASH_ALPHABET: &str = "0123456789bcdefghjkmnpqrstuvwxyz";

/// A single secret location, identified by its geohash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationSecret(String);

impl LocationSecret {
    /// Parse and normalize a geohash identifier.
    pub fn new(geohash: impl AsRef<str>) -> Result<Self, GeoSecretError> {
        let normalized = geohash.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(GeoSecretError::Malformed("empty geohash".to_string()));
        }
        if let Some(c) = normalized.chars().find(|c| !GEOHASH_ALPHABET.contains(*c)) {
            return Err(GeoSecretError::Malformed(format!(
                "`{normalized}` contains `{c}`, which is not a geohash character"
            )));
        }
        Ok(Self(normalized))
    }

    /// The normalized geohash.
    pub fn geohash(&self) -> &str {
        &self.0
    }

    fn digest(&self) -> B256 {
        keccak256(self.0.as_bytes())
    }
}

// Location secrets are not printed in full.
impl fmt::Debug for LocationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocationSecret").field(&"<redacted>").finish()
    }
}

impl TryFrom<String> for LocationSecret {
    type Error = GeoSecretError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for LocationSecret {
    type Error = GeoSecretError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LocationSecret> for String {
    fn from(value: LocationSecret) -> Self {
        value.0
    }
}

/// Order-independent digest of a complete location set.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanonicalSecretDigest(B256);

impl CanonicalSecretDigest {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    pub fn into_inner(self) -> B256 {
        self.0
    }
}

impl fmt::Debug for CanonicalSecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CanonicalSecretDigest")
            .field(&"<redacted>")
            .finish()
    }
}

/// Reduce exactly [`REQUIRED_LOCATIONS`] distinct locations to their canonical digest.
pub fn canonicalize(locations: &[LocationSecret]) -> Result<CanonicalSecretDigest, GeoSecretError> {
    if locations.len() != REQUIRED_LOCATIONS {
        return Err(GeoSecretError::WrongCount {
            expected: REQUIRED_LOCATIONS,
            actual: locations.len(),
        });
    }

    let mut seen = HashSet::with_capacity(locations.len());
    for location in locations {
        if !seen.insert(location.geohash()) {
            return Err(GeoSecretError::Duplicate);
        }
    }

    let mut digests: Vec<B256> = locations.iter().map(LocationSecret::digest).collect();
    digests.sort_unstable();

    let mut concatenated = Vec::with_capacity(digests.len() * 32);
    for digest in &digests {
        concatenated.extend_from_slice(digest.as_slice());
    }

    Ok(CanonicalSecretDigest(keccak256(&concatenated)))
}

/// Parse raw geohash strings and canonicalize them.
pub fn canonicalize_geohashes<S: AsRef<str>>(
    geohashes: &[S],
) -> Result<CanonicalSecretDigest, GeoSecretError> {
    let locations = geohashes
        .iter()
        .map(LocationSecret::new)
        .collect::<Result<Vec<_>, _>>()?;
    canonicalize(&locations)
}

/// Invalid location input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoSecretError {
    #[error("exactly {expected} locations are required, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("the same location was selected more than once")]
    Duplicate,

    #[error("location is not selected")]
    NotSelected,

    #[error("malformed geohash: {0}")]
    Malformed(String),
}
