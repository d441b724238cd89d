// KfdVault - Module container
// Conteneurs de cles en memoire
//
// # Sous-modules
// - `entry`    : KeyEntry, KeyContainer, ContainerSummary
// - `defaults` : collection integree (premier lancement, factory reset)
// - `clock`    : sources de temps pour la sauvegarde differee
// - `model`    : ContainerModel, CRUD, index actif, persistance differee

/// Horloges monotones (reelle et manuelle).
pub mod clock;
/// Conteneurs integres.
pub mod defaults;
/// Types KeyEntry et KeyContainer.
pub mod entry;
/// Modele de la collection.
pub mod model;
