// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Incremental location selection with duplicate and capacity checks.

use super::{canonicalize, CanonicalSecretDigest, GeoSecretError, LocationSecret, REQUIRED_LOCATIONS};

/// Locations picked so far, in selection order.
///
/// Rejected operations leave the selection unchanged.
#[derive(Debug, Clone, Default)]
pub struct LocationSelection {
    locations: Vec<LocationSecret>,
}

impl LocationSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a location. Fails on duplicates and once the selection is full.
    pub fn select(&mut self, location: LocationSecret) -> Result<(), GeoSecretError> {
        if self.locations.len() >= REQUIRED_LOCATIONS {
            return Err(GeoSecretError::WrongCount {
                expected: REQUIRED_LOCATIONS,
                actual: self.locations.len() + 1,
            });
        }
        if self.locations.contains(&location) {
            return Err(GeoSecretError::Duplicate);
        }
        self.locations.push(location);
        Ok(())
    }

    /// Remove a previously selected location.
    pub fn remove(&mut self, location: &LocationSecret) -> Result<(), GeoSecretError> {
        let index = self
            .locations
            .iter()
            .position(|l| l == location)
            .ok_or(GeoSecretError::NotSelected)?;
        self.locations.remove(index);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.locations.len() == REQUIRED_LOCATIONS
    }

    pub fn locations(&self) -> &[LocationSecret] {
        &self.locations
    }

    /// Canonical digest of a complete selection.
    pub fn digest(&self) -> Result<CanonicalSecretDigest, GeoSecretError> {
        canonicalize(&self.locations)
    }

    /// Hand over the selected locations; requires a complete selection.
    pub fn into_secrets(self) -> Result<Vec<LocationSecret>, GeoSecretError> {
        if !self.is_complete() {
            return Err(GeoSecretError::WrongCount {
                expected: REQUIRED_LOCATIONS,
                actual: self.locations.len(),
            });
        }
        Ok(self.locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(g: &str) -> LocationSecret {
        LocationSecret::new(g).unwrap()
    }

    #[test]
    fn duplicate_selection_leaves_state_untouched() {
        let mut selection = LocationSelection::new();
        selection.select(loc("u33db")).unwrap();
        selection.select(loc("u33dc")).unwrap();

        assert_eq!(selection.select(loc("u33db")), Err(GeoSecretError::Duplicate));
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.locations()[1].geohash(), "u33dc");
    }

    #[test]
    fn selection_is_capped() {
        let mut selection = LocationSelection::new();
        for g in ["u33db", "u33dc", "u33dd", "u33de", "u33df"] {
            selection.select(loc(g)).unwrap();
        }
        assert!(selection.is_complete());
        assert!(matches!(
            selection.select(loc("u33dg")),
            Err(GeoSecretError::WrongCount { actual: 6, .. })
        ));
        assert_eq!(selection.len(), 5);
    }

    #[test]
    fn remove_and_complete() {
        let mut selection = LocationSelection::new();
        for g in ["u33db", "u33dc", "u33dd", "u33de", "u33dg"] {
            selection.select(loc(g)).unwrap();
        }
        assert_eq!(selection.remove(&loc("u33dz")), Err(GeoSecretError::NotSelected));
        selection.remove(&loc("u33dg")).unwrap();
        assert!(selection.clone().into_secrets().is_err());

        selection.select(loc("u33df")).unwrap();
        let digest = selection.digest().unwrap();
        let secrets = selection.into_secrets().unwrap();
        assert_eq!(canonicalize(&secrets).unwrap(), digest);
    }
}
