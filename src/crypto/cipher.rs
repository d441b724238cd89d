// KfdVault - AES-256-CBC avec padding PKCS#7 explicite
// Reference : FIPS 197 (AES), NIST SP 800-38A (CBC), RFC 5652 §6.3 (PKCS#7)
//
// Ce module chiffre/dechiffre un tampon avec AES-256 en mode CBC.
// Le padding PKCS#7 est applique et verifie ici (et non par la crate
// `cbc`) afin de distinguer un chiffre mal forme d'un padding invalide.
//
// # Securite
// - L'IV est genere par le CSPRNG de l'OS (`rand::rngs::OsRng`) a chaque
//   appel : ne jamais reutiliser un IV avec la meme cle.
// - Format confidentialite seule, sans MAC : une mauvaise cle ou une
//   corruption n'est detectee que par le padding ou le parsing. Un octet
//   modifie dans le dernier bloc produit un padding valide avec une
//   probabilite d'environ 1/256 ; dans un bloc anterieur la modification
//   ne touche que deux blocs de clair et peut passer le parsing.
// - Les tampons de clair intermediaires (avec padding) sont effaces a
//   la liberation ; le clair retourne est a proteger par l'appelant.

use crate::constants::{AES_BLOCK_SIZE, AES_IV_SIZE, AES_KEY_SIZE};
use crate::error::CodecError;
use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Genere un IV aleatoire de 16 octets.
pub fn random_iv() -> [u8; AES_IV_SIZE] {
    let mut iv = [0u8; AES_IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Complete `data` a un multiple de 16 octets (1..=16 octets de padding).
pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = AES_BLOCK_SIZE - (data.len() % AES_BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Verifie et retire le padding PKCS#7.
pub fn pkcs7_unpad(data: &[u8]) -> Result<&[u8], CodecError> {
    let p = *data.last().ok_or(CodecError::BadPadding)? as usize;
    if p == 0 || p > AES_BLOCK_SIZE || p > data.len() {
        return Err(CodecError::BadPadding);
    }
    let (body, pad) = data.split_at(data.len() - p);
    if pad.iter().any(|&b| b as usize != p) {
        return Err(CodecError::BadPadding);
    }
    Ok(body)
}

/// Chiffre `plaintext` (padde PKCS#7) avec AES-256-CBC.
pub fn encrypt_cbc(
    key: &[u8; AES_KEY_SIZE],
    iv: &[u8; AES_IV_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let padded = Zeroizing::new(pkcs7_pad(plaintext));
    let enc = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| CodecError::InvalidKeyLength)?;
    Ok(enc.encrypt_padded_vec_mut::<NoPadding>(padded.as_slice()))
}

/// Dechiffre un chiffre AES-256-CBC et retire le padding PKCS#7.
pub fn decrypt_cbc(
    key: &[u8; AES_KEY_SIZE],
    iv: &[u8; AES_IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CodecError> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CodecError::Malformed(ciphertext.len()));
    }
    let dec = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| CodecError::InvalidKeyLength)?;
    let padded = Zeroizing::new(
        dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| CodecError::Malformed(ciphertext.len()))?,
    );
    Ok(pkcs7_unpad(padded.as_slice())?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn test_pad_full_block_when_aligned() {
        let padded = pkcs7_pad(&[0u8; 16]);
        assert_eq!(padded.len(), 32);
        assert!(padded[16..].iter().all(|&b| b == 16));
    }

    #[test]
    fn test_pad_partial() {
        let padded = pkcs7_pad(b"abc");
        assert_eq!(padded.len(), 16);
        assert_eq!(padded[15], 13);
        assert_eq!(pkcs7_unpad(&padded).unwrap(), b"abc");
    }

    #[test]
    fn test_unpad_rejects_zero_and_oversize() {
        let mut block = [0u8; 16];
        assert_eq!(pkcs7_unpad(&block), Err(CodecError::BadPadding));
        block[15] = 17;
        assert_eq!(pkcs7_unpad(&block), Err(CodecError::BadPadding));
        assert_eq!(pkcs7_unpad(&[]), Err(CodecError::BadPadding));
    }

    #[test]
    fn test_unpad_rejects_inconsistent_bytes() {
        let mut block = [3u8; 16];
        block[14] = 9;
        assert_eq!(pkcs7_unpad(&block), Err(CodecError::BadPadding));
    }

    #[test]
    fn test_nist_sp800_38a_first_block() {
        // F.2.5 CBC-AES256.Encrypt, bloc 1 (le second bloc produit est le padding)
        let key: [u8; 32] = hex::decode(
            "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
        )
        .unwrap()
        .try_into()
        .unwrap();
        let iv: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let pt = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let ct = encrypt_cbc(&key, &iv, &pt).unwrap();
        assert_eq!(hex::encode(&ct[..16]), "f58c4c04d6e5f1ba779eabfb5f7bfbd6");
        assert_eq!(decrypt_cbc(&key, &iv, &ct).unwrap(), pt);
    }

    #[test]
    fn test_roundtrip() {
        let iv = random_iv();
        let ct = encrypt_cbc(&KEY, &iv, b"key container payload").unwrap();
        assert_eq!(ct.len() % 16, 0);
        assert_eq!(decrypt_cbc(&KEY, &iv, &ct).unwrap(), b"key container payload");
    }

    #[test]
    fn test_decrypt_malformed_length() {
        let iv = [0u8; 16];
        assert_eq!(decrypt_cbc(&KEY, &iv, &[]), Err(CodecError::Malformed(0)));
        assert_eq!(decrypt_cbc(&KEY, &iv, &[0u8; 17]), Err(CodecError::Malformed(17)));
    }

    #[test]
    fn test_random_iv_differs() {
        assert_ne!(random_iv(), random_iv());
    }
}
