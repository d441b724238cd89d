// KfdVault - Module config
// Lecture/ecriture de la configuration utilisateur
//
// La configuration vit dans `config.txt` du repertoire de donnees,
// au format cle-valeur avec sections.
//
// # Sous-modules
// - `parser`   : parseur cle-valeur avec sections, commentaires et
//                guillemets ; accesseurs types et serialisation deterministe
// - `settings` : structure Settings (stockage, securite, autosave, lien,
//                log) avec valeurs par defaut et bornes
//
// # Utilisation
// ```rust,ignore
// let settings = Settings::load(&path)?;
// // Les valeurs manquantes utilisent les defauts
// ```

/// Parseur de fichiers de configuration au format cle-valeur avec sections.
pub mod parser;
/// Structure de configuration et valeurs par defaut.
pub mod settings;
