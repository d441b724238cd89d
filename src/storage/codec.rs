// KfdVault - Codec de conteneur (serialisation + AES-256-CBC)
//
// Ce module relie le format binaire (`format`) et le chiffrement
// (`crypto::cipher`). Il ne fait aucune I/O.
//
// # Chiffrement
// 1. Serialisation du ContainerRecord
// 2. IV aleatoire de 16 octets (CSPRNG), nouveau a chaque appel
// 3. Padding PKCS#7 puis AES-256-CBC
//
// # Dechiffrement
// 1. Chiffre vide ou non aligne sur 16 -> `CodecError::Malformed`
// 2. AES-256-CBC puis verification du padding -> `CodecError::BadPadding`
// 3. Parsing borne du clair -> `CodecError::Truncated`
//
// Le format n'est pas authentifie : une mauvaise phrase de passe est
// detectee par le padding ou par le parsing, sans garantie cryptographique.

use crate::constants::{AES_IV_SIZE, AES_KEY_SIZE};
use crate::container::entry::KeyContainer;
use crate::crypto::cipher;
use crate::error::CodecError;
use crate::storage::format::{self, ContainerRecord};
use zeroize::Zeroizing;

/// Resultat d'un chiffrement : IV et chiffre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub iv: [u8; AES_IV_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Representation fichier : `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AES_IV_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

/// Chiffre un tampon clair quelconque avec un IV neuf.
pub fn seal(plaintext: &[u8], key: &[u8; AES_KEY_SIZE]) -> Result<EncryptedBlob, CodecError> {
    let iv = cipher::random_iv();
    let ciphertext = cipher::encrypt_cbc(key, &iv, plaintext)?;
    Ok(EncryptedBlob { iv, ciphertext })
}

/// Dechiffre un tampon ; le clair est efface a la liberation.
pub fn open(
    iv: &[u8; AES_IV_SIZE],
    ciphertext: &[u8],
    key: &[u8; AES_KEY_SIZE],
) -> Result<Zeroizing<Vec<u8>>, CodecError> {
    cipher::decrypt_cbc(key, iv, ciphertext).map(Zeroizing::new)
}

/// Serialise puis chiffre un ContainerRecord.
pub fn encrypt(record: &ContainerRecord, key: &[u8; AES_KEY_SIZE]) -> Result<EncryptedBlob, CodecError> {
    let plaintext = Zeroizing::new(format::encode_record(record)?);
    seal(&plaintext, key)
}

/// Dechiffre puis deserialise un ContainerRecord.
pub fn decrypt(
    iv: &[u8; AES_IV_SIZE],
    ciphertext: &[u8],
    key: &[u8; AES_KEY_SIZE],
) -> Result<ContainerRecord, CodecError> {
    let plaintext = open(iv, ciphertext, key)?;
    format::decode_record(&plaintext)
}

/// Chiffre une collection complete avec son index actif.
pub fn encrypt_collection(
    containers: &[KeyContainer],
    active: Option<usize>,
    key: &[u8; AES_KEY_SIZE],
) -> Result<EncryptedBlob, CodecError> {
    let plaintext = Zeroizing::new(format::encode_collection(containers, active)?);
    seal(&plaintext, key)
}

/// Dechiffre une collection complete.
pub fn decrypt_collection(
    iv: &[u8; AES_IV_SIZE],
    ciphertext: &[u8],
    key: &[u8; AES_KEY_SIZE],
) -> Result<(Vec<KeyContainer>, Option<usize>), CodecError> {
    let plaintext = open(iv, ciphertext, key)?;
    format::decode_collection(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::entry::KeyEntry;

    const KEY: [u8; 32] = [0x5A; 32];

    fn make_record() -> ContainerRecord {
        ContainerRecord::from(
            &KeyContainer::new("Patrol").with_key(KeyEntry::new(1, 1, 0xAA, vec![7; 16])),
        )
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let record = make_record();
        let blob = encrypt(&record, &KEY).unwrap();
        assert_eq!(blob.ciphertext.len() % 16, 0);
        assert_eq!(decrypt(&blob.iv, &blob.ciphertext, &KEY).unwrap(), record);
    }

    #[test]
    fn test_plaintext_roundtrip_through_cipher() {
        let plain = format::encode_record(&make_record()).unwrap();
        let blob = seal(&plain, &KEY).unwrap();
        assert_eq!(*open(&blob.iv, &blob.ciphertext, &KEY).unwrap(), plain);
    }

    #[test]
    fn test_iv_unique_per_call() {
        let record = make_record();
        let a = encrypt(&record, &KEY).unwrap();
        let b = encrypt(&record, &KEY).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_malformed_ciphertext() {
        assert_eq!(
            decrypt(&[0; 16], &[], &KEY),
            Err(CodecError::Malformed(0))
        );
        assert_eq!(
            decrypt(&[0; 16], &[1; 20], &KEY),
            Err(CodecError::Malformed(20))
        );
    }

    #[test]
    fn test_wrong_key_never_returns_original() {
        let record = make_record();
        let blob = encrypt(&record, &KEY).unwrap();
        let wrong = [0xA5u8; 32];
        match decrypt(&blob.iv, &blob.ciphertext, &wrong) {
            Ok(decoded) => assert_ne!(decoded, record),
            Err(e) => assert!(matches!(
                e,
                CodecError::BadPadding | CodecError::Truncated(_) | CodecError::UnsupportedVersion(_)
            )),
        }
    }

    #[test]
    fn test_tamper_detection_is_probabilistic() {
        // Sans MAC : chaque octet modifie est detecte ou produit un
        // enregistrement different, jamais l'original a l'identique.
        let record = make_record();
        let blob = encrypt(&record, &KEY).unwrap();
        let mut detected = 0;
        for i in 0..blob.ciphertext.len() {
            let mut ct = blob.ciphertext.clone();
            ct[i] ^= 0x01;
            match decrypt(&blob.iv, &ct, &KEY) {
                Err(_) => detected += 1,
                Ok(decoded) => assert_ne!(decoded, record),
            }
        }
        assert!(detected > 0);
    }

    #[test]
    fn test_collection_roundtrip() {
        let containers = vec![KeyContainer::new("A"), KeyContainer::new("B")];
        let blob = encrypt_collection(&containers, Some(0), &KEY).unwrap();
        let (decoded, active) = decrypt_collection(&blob.iv, &blob.ciphertext, &KEY).unwrap();
        assert_eq!(decoded, containers);
        assert_eq!(active, Some(0));
    }

    #[test]
    fn test_blob_to_bytes_prefixes_iv() {
        let blob = EncryptedBlob {
            iv: [9; 16],
            ciphertext: vec![1, 2, 3],
        };
        let bytes = blob.to_bytes();
        assert_eq!(&bytes[..16], &[9; 16]);
        assert_eq!(&bytes[16..], &[1, 2, 3]);
    }
}
