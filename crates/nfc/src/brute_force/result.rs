// Recovery outcome

use crate::error::{NfcError, Result};
use crate::keys::TagKeyMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BruteForceResult {
    pub keys: TagKeyMap,
    pub total_attempts: usize,
    pub phase_one_attempts: usize,
    pub phase_two_attempts: usize,
    pub was_aborted: bool,
}

impl BruteForceResult {
    pub fn complete_sectors(&self) -> usize {
        self.keys.values().filter(|k| k.is_complete()).count()
    }

    pub fn partial_sectors(&self) -> usize {
        self.keys.values().filter(|k| k.is_partial()).count()
    }

    pub fn empty_sectors(&self) -> usize {
        self.keys.values().filter(|k| k.is_empty()).count()
    }

    /// True once at least one sector has both keys
    pub fn is_authenticated(&self) -> bool {
        self.complete_sectors() > 0
    }

    /// Key map, or `NotAuthenticated` when no sector is complete
    pub fn into_authenticated(self) -> Result<TagKeyMap> {
        if self.is_authenticated() {
            Ok(self.keys)
        } else {
            Err(NfcError::NotAuthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{SectorKey, SectorKeys};

    #[test]
    fn test_counts_and_authentication() {
        let mut result = BruteForceResult::default();
        result.keys.insert(0, SectorKeys::both(SectorKey::DEFAULT, SectorKey::DEFAULT));
        result.keys.insert(
            1,
            SectorKeys {
                key_a: Some(SectorKey::DEFAULT),
                key_b: None,
            },
        );
        result.keys.insert(2, SectorKeys::default());

        assert_eq!(result.complete_sectors(), 1);
        assert_eq!(result.partial_sectors(), 1);
        assert_eq!(result.empty_sectors(), 1);
        assert_eq!(result.into_authenticated().unwrap().len(), 3);
    }

    #[test]
    fn test_partial_only_is_not_authenticated() {
        let mut result = BruteForceResult::default();
        result.keys.insert(
            0,
            SectorKeys {
                key_a: None,
                key_b: Some(SectorKey::DEFAULT),
            },
        );
        assert_eq!(result.into_authenticated(), Err(NfcError::NotAuthenticated));
    }
}
