// KfdVault - Arbre de modules (crate library)
//
// Ce fichier constitue le point d'entree de la crate library de KfdVault.
// Il re-exporte tous les modules pour le binaire et les tests.
//
// # Modules
// - `app`       : orchestrateur (modele + moteur keyload, boucle cooperative)
// - `config`    : lecture/ecriture de la configuration utilisateur
// - `constants` : constantes globales (formats, tailles, delais)
// - `container` : conteneurs de cles, modele, sauvegarde differee
// - `crypto`    : PBKDF2-HMAC-SHA256, AES-256-CBC + PKCS#7
// - `error`     : types d'erreur centralises (KvError, KvResult)
// - `keyload`   : lien trois fils, trames, machine a etats de session
// - `storage`   : format TLV, codec chiffre, backends, store de fichiers

/// Orchestrateur principal de l'application.
pub mod app;
/// Configuration utilisateur et parseur de fichiers.
pub mod config;
/// Constantes globales de l'application.
pub mod constants;
/// Conteneurs de cles et modele de collection.
pub mod container;
/// Primitives cryptographiques.
pub mod crypto;
/// Types d'erreur centralises.
pub mod error;
/// Session keyload sur lien trois fils.
pub mod keyload;
/// Persistance chiffree des conteneurs.
pub mod storage;
