// KfdVault - Derivation de cle PBKDF2-HMAC-SHA256
// Reference : RFC 8018 (PBKDF2), RFC 2104 (HMAC)
//
// Ce module transforme une phrase de passe en cle AES-256 :
//   T_i = U_1 xor U_2 xor ... xor U_c
//   U_1 = HMAC(P, S || INT_32_BE(i)), U_j = HMAC(P, U_{j-1})
// Les blocs T_i sont concatenes puis tronques a 32 octets.
//
// # Sel
// Le sel est une constante applicative documentee, non secrete. Il evite
// la reutilisation de tables precalculees entre deploiements ; l'unicite
// par fichier est assuree par l'IV aleatoire, pas par le sel.
//
// # Phrase de passe vide
// Acceptee : la derivation ne peut pas echouer. La politique de robustesse
// des phrases de passe releve de l'appelant.
//
// # Effacement
// La cle derivee est retournee dans un `Zeroizing` et effacee a la
// liberation. L'effacement de l'etat HMAC intermediaire depend de la crate
// `pbkdf2` : best-effort uniquement.

use crate::constants::{AES_KEY_SIZE, DEFAULT_KDF_SALT, DEFAULT_PBKDF2_ITERATIONS};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Cle AES-256 derivee, effacee a la destruction.
pub type DerivedKey = Zeroizing<[u8; AES_KEY_SIZE]>;

/// Derive une cle de 32 octets via PBKDF2-HMAC-SHA256.
///
/// * `passphrase` - La phrase de passe (peut etre vide)
/// * `salt` - Le sel applicatif
/// * `iterations` - Nombre d'iterations (0 est traite comme 1)
pub fn derive(passphrase: &str, salt: &[u8], iterations: u32) -> DerivedKey {
    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt,
        iterations.max(1),
        &mut key[..],
    );
    key
}

/// Parametres de derivation partages par tout le store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: DEFAULT_KDF_SALT.as_bytes().to_vec(),
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Cree des parametres avec un sel et un nombre d'iterations explicites.
    pub fn new(salt: impl Into<Vec<u8>>, iterations: u32) -> Self {
        Self {
            salt: salt.into(),
            iterations,
        }
    }

    /// Derive la cle pour une phrase de passe.
    pub fn derive(&self, passphrase: &str) -> DerivedKey {
        derive(passphrase, &self.salt, self.iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_rfc_vector_c1() {
        // P="password", S="salt", c=1, dkLen=32
        let dk = derive("password", b"salt", 1);
        let expected = hex::decode(
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b",
        )
        .unwrap();
        assert_eq!(dk.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_pbkdf2_rfc_vector_c2() {
        // P="password", S="salt", c=2, dkLen=32
        let dk = derive("password", b"salt", 2);
        let expected = hex::decode(
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43",
        )
        .unwrap();
        assert_eq!(dk.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_pbkdf2_rfc_vector_c4096() {
        let dk = derive("password", b"salt", 4096);
        let expected = hex::decode(
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a",
        )
        .unwrap();
        assert_eq!(dk.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_zero_iterations_is_one() {
        assert_eq!(*derive("password", b"salt", 0), *derive("password", b"salt", 1));
    }

    #[test]
    fn test_empty_passphrase_accepted() {
        let dk = derive("", b"salt", 2);
        assert_eq!(dk.len(), 32);
        assert_ne!(*dk, [0u8; 32]);
    }

    #[test]
    fn test_different_passphrases() {
        let params = KdfParams::new(b"salt".to_vec(), 10);
        assert_ne!(*params.derive("pass1"), *params.derive("pass2"));
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.iterations, DEFAULT_PBKDF2_ITERATIONS);
        assert_eq!(params.salt, DEFAULT_KDF_SALT.as_bytes());
    }
}
