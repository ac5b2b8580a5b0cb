// Well-known MIFARE Classic keys

use crate::keys::SectorKey;

/// Keys most cards in the field still use
pub const STANDARD_KEYS: [SectorKey; 4] = [
    SectorKey::new([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
    SectorKey::new([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]),
    SectorKey::new([0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7]),
    SectorKey::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
];

/// Full dictionary, standard keys first
pub const DICTIONARY: [SectorKey; 13] = [
    SectorKey::new([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
    SectorKey::new([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]),
    SectorKey::new([0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7]),
    SectorKey::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
    SectorKey::new([0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5]),
    SectorKey::new([0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD]),
    SectorKey::new([0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A]),
    SectorKey::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
    SectorKey::new([0x71, 0x4C, 0x5C, 0x88, 0x6E, 0x97]),
    SectorKey::new([0x58, 0x7E, 0xE5, 0xF9, 0x35, 0x0F]),
    SectorKey::new([0xA0, 0x47, 0x8C, 0xC3, 0x90, 0x91]),
    SectorKey::new([0x53, 0x3C, 0xB6, 0xC7, 0x23, 0xF6]),
    SectorKey::new([0x8F, 0xD0, 0xA4, 0xF2, 0x56, 0xE9]),
];

/// Append keys not already present, keeping first-seen order
pub fn extend_unique(list: &mut Vec<SectorKey>, keys: impl IntoIterator<Item = SectorKey>) {
    for key in keys {
        if !list.contains(&key) {
            list.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_keys_lead_dictionary() {
        assert_eq!(&DICTIONARY[..STANDARD_KEYS.len()], &STANDARD_KEYS);
    }

    #[test]
    fn test_dictionary_has_no_duplicates() {
        let mut unique = Vec::new();
        extend_unique(&mut unique, DICTIONARY);
        assert_eq!(unique.len(), DICTIONARY.len());
    }
}
