// KfdVault - Module crypto
// Derivation de cle PBKDF2 et chiffrement AES-256-CBC
//
// Ce module regroupe les primitives cryptographiques de KfdVault,
// construites sur les crates RustCrypto (`aes`, `cbc`, `pbkdf2`, `sha2`).
//
// # Sous-modules
// - `kdf`    : derivation PBKDF2-HMAC-SHA256 d'une phrase de passe en cle AES-256
// - `cipher` : chiffrement/dechiffrement AES-256-CBC, padding PKCS#7, IV aleatoire
//
// # Securite
// - Les cles derivees sont effacees a la liberation (`zeroize`)
// - L'IV provient du CSPRNG de l'OS, jamais d'un generateur deterministe
// - Aucune authentification (pas de MAC) : voir `cipher`

/// Chiffrement et dechiffrement AES-256-CBC avec padding PKCS#7.
pub mod cipher;
/// Derivation de cle PBKDF2-HMAC-SHA256 conforme RFC 8018.
pub mod kdf;
