// KfdVault - Types d'erreur centralises
//
// Ce module definit une enumeration par couche et l'enumeration
// globale `KvError` (avec l'alias `KvResult<T>`) qui les agrege.
//
// # Categories d'erreurs
// - `CodecError`   : padding invalide, TLV tronque ou mal forme, chiffre mal forme
// - `StoreError`   : fichier trop court, I/O, erreur de codec remontee
// - `ModelError`   : index hors bornes, capacite depassee
// - `KeyloadError` : conteneur non valide, session deja en cours
// - `LinkError`    : echec d'une ligne du lien trois fils
// - `Config`       : erreur de parsing de la configuration
//
// Aucune erreur n'est fatale pour le processus : chaque variante laisse
// le systeme dans un etat defini (Idle, ou "modifie mais operationnel").

use std::path::PathBuf;
use thiserror::Error;

/// Erreurs de (de)serialisation et de (de)chiffrement d'un conteneur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Chiffre vide ou de longueur non multiple de 16
    #[error("malformed ciphertext (length {0})")]
    Malformed(usize),
    /// Padding PKCS#7 invalide (mauvaise phrase de passe ou corruption)
    #[error("invalid PKCS#7 padding")]
    BadPadding,
    /// Un prefixe de longueur depasse la fin du tampon
    #[error("record truncated while reading {0}")]
    Truncated(&'static str),
    /// Octets residuels apres la fin de l'enregistrement
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
    /// Chaine non UTF-8
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    /// Champ trop long pour son prefixe de longueur
    #[error("field {field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    /// Trop de cles (ou de conteneurs) pour un compteur u8
    #[error("too many items: {0}")]
    TooManyItems(usize),
    /// Magic de l'enregistrement collection incorrect
    #[error("invalid collection magic")]
    BadMagic,
    /// Version de format inconnue
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    /// Cle de chiffrement ou IV de mauvaise taille
    #[error("invalid key or IV length")]
    InvalidKeyLength,
}

/// Erreurs de la couche fichier.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Fichier plus court que l'IV
    #[error("container file too small ({len} bytes)")]
    TooSmall { len: usize },
    /// Fichier absent
    #[error("container file not found: {0}")]
    NotFound(PathBuf),
    /// Echec de decodage ou de dechiffrement
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    /// Erreur d'I/O du backend
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Erreurs du modele de conteneurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Index de conteneur ou de cle hors bornes
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    /// Capacite du format depassee (conteneurs, cles ou octets de cle)
    #[error("capacity exceeded: {0}")]
    Capacity(&'static str),
}

/// Erreurs d'une ligne du lien trois fils.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Ecriture impossible sur une ligne
    #[error("link line {line} failed: {reason}")]
    Line { line: &'static str, reason: String },
}

/// Refus de demarrage d'une session keyload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyloadError {
    /// Conteneur sans cle exploitable
    #[error("container is not valid for keyload")]
    NotValid,
    /// Une session est deja en cours
    #[error("a keyload session is already active")]
    Busy,
}

/// Enumeration de toutes les erreurs possibles dans KfdVault.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("[Codec] {0}")]
    Codec(#[from] CodecError),
    #[error("[Storage] {0}")]
    Storage(#[from] StoreError),
    #[error("[Model] {0}")]
    Model(#[from] ModelError),
    #[error("[Keyload] {0}")]
    Keyload(#[from] KeyloadError),
    #[error("[Link] {0}")]
    Link(#[from] LinkError),
    #[error("[Config] {0}")]
    Config(String),
}

impl From<std::io::Error> for KvError {
    fn from(e: std::io::Error) -> Self {
        KvError::Storage(StoreError::Io(e))
    }
}

/// Type Result specialise pour KfdVault.
pub type KvResult<T> = Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let e = KvError::from(ModelError::OutOfRange { index: 3, len: 1 });
        assert_eq!(e.to_string(), "[Model] index 3 out of range (len 1)");
    }

    #[test]
    fn test_codec_into_store() {
        let e: StoreError = CodecError::BadPadding.into();
        assert!(matches!(e, StoreError::Codec(CodecError::BadPadding)));
    }

    #[test]
    fn test_io_into_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let e: KvError = io.into();
        assert!(e.to_string().starts_with("[Storage]"));
    }
}
