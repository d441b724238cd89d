// KfdVault - Collection par defaut
//
// Conteneurs integres utilises au premier demarrage, apres un echec de
// chargement ou apres une remise a zero usine. Valeurs de demonstration
// uniquement : aucune cle reelle.

use crate::container::entry::{KeyContainer, KeyEntry};

/// Identifiant d'algorithme AES-256 (TIA-102)
pub const ALGO_AES256: u8 = 0x84;

/// Retourne la collection integree (un conteneur de demonstration).
pub fn default_containers() -> Vec<KeyContainer> {
    let patrol = KeyContainer {
        label: "DEMO - AES256 Patrol".into(),
        agency: "Demo Agency".into(),
        band: "700/800".into(),
        default_algorithm: "AES256".into(),
        locked: false,
        keys: vec![
            KeyEntry::new(1, 1, ALGO_AES256, demo_key(0x00))
                .with_label("TG 1 - PATROL")
                .with_selected(true),
            KeyEntry::new(1, 2, ALGO_AES256, demo_key(0x10))
                .with_label("TG 2 - TAC")
                .with_selected(false),
        ],
    };
    vec![patrol]
}

/// Motif de 32 octets croissants a partir de `seed`.
fn demo_key(seed: u8) -> Vec<u8> {
    (0..32u8).map(|i| seed.wrapping_add(i.wrapping_mul(0x11))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let defaults = default_containers();
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].is_valid_for_keyload());
        assert_eq!(defaults[0].keys[0].key_bytes.len(), 32);
        assert_eq!(defaults[0].transmittable_count(), 1);
    }
}
