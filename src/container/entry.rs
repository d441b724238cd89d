// KfdVault - Structures KeyEntry et KeyContainer
// Represente une cle et un conteneur de cles (agence/profil)
//
// Ce module definit les types de donnees fondamentaux :
// - `KeyEntry`         : une cle (adressage keyset/key, algorithme, octets, libelle)
// - `KeyContainer`     : un ensemble ordonne de cles avec ses metadonnees
// - `ContainerSummary` : vue resumee pour les listes de l'interface
//
// # Validite pour le keyload
// Un conteneur est valide si sa liste de cles n'est pas vide ET si au
// moins une cle possede des octets non vides.
//
// # Ordre des cles
// L'ordre est significatif (la numerotation des slots en derive) et est
// conserve par la serialisation.

use crate::constants::MAX_FIELD_LEN;
use zeroize::Zeroize;

/// Une cle cryptographique a charger dans une radio.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEntry {
    /// Keyset logique dans la radio cible
    pub keyset_id: u16,
    /// Identifiant de la cle dans le keyset
    pub key_id: u16,
    /// Algorithme (interprete par la radio, pas par KfdVault)
    pub algorithm_id: u8,
    /// Materiel de cle brut (<= 255 octets)
    pub key_bytes: Vec<u8>,
    /// Libelle affiche
    pub label: String,
    /// Incluse dans la prochaine session keyload
    pub selected: bool,
}

impl KeyEntry {
    /// Cree une cle selectionnee sans libelle.
    pub fn new(keyset_id: u16, key_id: u16, algorithm_id: u8, key_bytes: Vec<u8>) -> Self {
        Self {
            keyset_id,
            key_id,
            algorithm_id,
            key_bytes,
            label: String::new(),
            selected: true,
        }
    }

    /// Cree une cle a partir d'une saisie hexadecimale (espaces toleres).
    pub fn from_hex(
        keyset_id: u16,
        key_id: u16,
        algorithm_id: u8,
        key_hex: &str,
    ) -> Result<Self, hex::FromHexError> {
        let compact: String = key_hex.chars().filter(|c| !c.is_whitespace()).collect();
        let key_bytes = hex::decode(compact)?;
        Ok(Self::new(keyset_id, key_id, algorithm_id, key_bytes))
    }

    /// Definit le libelle (style builder).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Definit la selection (style builder).
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Materiel de cle en hexadecimal majuscule.
    pub fn key_hex(&self) -> String {
        hex::encode_upper(&self.key_bytes)
    }

    /// Retourne true si la cle porte du materiel.
    pub fn has_material(&self) -> bool {
        !self.key_bytes.is_empty()
    }

    /// Retourne true si la cle sera transmise en session.
    pub fn is_transmittable(&self) -> bool {
        self.selected && self.has_material()
    }

    /// Retourne true si la longueur tient dans un prefixe u8.
    pub fn fits_format(&self) -> bool {
        self.key_bytes.len() <= MAX_FIELD_LEN && self.label.len() <= MAX_FIELD_LEN
    }
}

impl Zeroize for KeyEntry {
    fn zeroize(&mut self) {
        self.key_bytes.zeroize();
    }
}

impl Drop for KeyEntry {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

/// Un conteneur de cles (une agence ou un profil).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyContainer {
    /// Libelle ("BSO - Patrol AES256")
    pub label: String,
    /// Agence ("Broward SO")
    pub agency: String,
    /// Bande ("700/800", "VHF")
    pub band: String,
    /// Algorithme par defaut ("AES256")
    pub default_algorithm: String,
    /// Verrou administratif (stocke et rapporte uniquement)
    pub locked: bool,
    /// Cles dans l'ordre des slots
    pub keys: Vec<KeyEntry>,
}

impl KeyContainer {
    /// Cree un conteneur vide avec un libelle.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Ajoute une cle (style builder).
    pub fn with_key(mut self, key: KeyEntry) -> Self {
        self.keys.push(key);
        self
    }

    /// Valide pour le keyload : au moins une cle, dont une avec du materiel.
    pub fn is_valid_for_keyload(&self) -> bool {
        !self.keys.is_empty() && self.keys.iter().any(KeyEntry::has_material)
    }

    /// Nombre de cles qui seront transmises (selectionnees et non vides).
    pub fn transmittable_count(&self) -> usize {
        self.keys.iter().filter(|k| k.is_transmittable()).count()
    }

    /// Resume pour l'affichage en liste.
    pub fn summary(&self) -> ContainerSummary {
        ContainerSummary {
            label: self.label.clone(),
            agency: self.agency.clone(),
            band: self.band.clone(),
            locked: self.locked,
            key_count: self.keys.len(),
            selected_count: self.transmittable_count(),
            valid_for_keyload: self.is_valid_for_keyload(),
        }
    }
}

/// Vue resumee d'un conteneur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub label: String,
    pub agency: String,
    pub band: String,
    pub locked: bool,
    pub key_count: usize,
    pub selected_count: usize,
    pub valid_for_keyload: bool,
}
