// KfdVault - Module keyload
// Transmission des cles d'un conteneur vers une radio
//
// # Sous-modules
// - `link`   : lien trois fils (data, clock, enable), cadrage bit/octet MSB
//              en premier, delais reglables
// - `frame`  : marqueurs de session et trames de cle
// - `engine` : machine a etats de session (Idle, SessionStart, SendingKeys,
//              SessionEnd, Error), une cle par tick
//
// Le moteur ne fait aucune I/O fichier : une session n'est jamais
// ralentie par une sauvegarde.

/// Moteur de session keyload.
pub mod engine;
/// Construction des trames.
pub mod frame;
/// Lien trois fils et cadrage.
pub mod link;
