// KfdVault - Module storage
// Persistance chiffree des conteneurs
//
// # Sous-modules
// - `format`  : enregistrement TLV d'un conteneur, bloc d'extension,
//               enregistrement de collection
// - `codec`   : serialisation + AES-256-CBC/PKCS#7, sans I/O
// - `backend` : trait FileBackend (disque, memoire)
// - `vault`   : ContainerStore, fichiers .kfc, fichier collection,
//               scan de repertoire, ecriture atomique (tmp + rename)
//
// # Format d'un fichier conteneur
// ```text
// [IV 16B][AES-256-CBC(PKCS7(record))]
// ```
//
// # Securite
// - Cle derivee par PBKDF2-HMAC-SHA256 depuis la phrase de passe
// - IV aleatoire a chaque ecriture
// - Pas de MAC : l'integrite repose sur le padding et le parsing borne

/// Backends de fichiers.
pub mod backend;
/// Chiffrement et dechiffrement des enregistrements.
pub mod codec;
/// Format binaire des enregistrements.
pub mod format;
/// Store de conteneurs sur backend.
pub mod vault;
