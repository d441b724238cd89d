// KfdVault - Structure de configuration et valeurs par defaut
//
// `Settings` centralise les parametres : chemins de stockage, derivation
// de cle, fenetres de sauvegarde differee, delais du lien et niveau de log.
//
// # Chargement
// `Settings::load(path)` lit le fichier et applique les valeurs parsees.
// Fichier absent : valeurs par defaut. Cles manquantes : defaut conserve.
// Valeurs hors bornes : clampees (ex: pbkdf2_iterations >= 10000).
//
// # Repertoire de donnees
// `$KFDVAULT_HOME`, sinon `$HOME/.kfdvault`, sinon `./.kfdvault`.
// La cle `[storage] data_dir` du fichier a priorite. Le fichier de
// configuration lui-meme est cherche dans `config_path(data_dir)`.
//
// # Phrase de passe
// Jamais stockee ici : la CLI la recoit par argument ou variable d'environnement.

use crate::config::parser::{self, ParsedConfig};
use crate::constants::*;
use crate::container::model::AutosavePolicy;
use crate::crypto::kdf::KdfParams;
use crate::error::KvResult;
use crate::keyload::link::LinkTiming;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration complete de l'application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    // storage
    pub data_dir: PathBuf,
    pub collection_file: String,
    pub container_extension: String,
    // security
    pub pbkdf2_iterations: u32,
    pub salt: String,
    // autosave
    pub settle_window_ms: u64,
    pub min_interval_ms: u64,
    // link
    pub bit_settle_us: u32,
    pub enable_settle_us: u32,
    // general
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            collection_file: COLLECTION_FILENAME.to_string(),
            container_extension: CONTAINER_EXTENSION.to_string(),
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            salt: DEFAULT_KDF_SALT.to_string(),
            settle_window_ms: DEFAULT_SETTLE_WINDOW_MS,
            min_interval_ms: DEFAULT_MIN_SAVE_INTERVAL_MS,
            bit_settle_us: DEFAULT_BIT_SETTLE_US,
            enable_settle_us: DEFAULT_ENABLE_SETTLE_US,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    /// Charge la configuration depuis un fichier. Un fichier absent donne
    /// les defauts ; un fichier illisible ou mal forme est une erreur.
    pub fn load(path: &Path) -> KvResult<Self> {
        let mut settings = Settings::default();
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                return Ok(settings);
            }
            Err(e) => return Err(e.into()),
        };

        let config = parser::parse_config(&text)?;
        settings.apply_parsed(&config);
        Ok(settings)
    }

    /// Applique les valeurs parsees sur les parametres.
    fn apply_parsed(&mut self, config: &ParsedConfig) {
        let get = |section: &str, key: &str| parser::get(config, section, key);

        if let Some(v) = get("storage", "data_dir").filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("storage", "collection_file").filter(|v| !v.is_empty()) {
            self.collection_file = v.to_string();
        }
        if let Some(v) = get("storage", "container_extension") {
            let ext = v.trim_start_matches('.');
            if !ext.is_empty() {
                self.container_extension = ext.to_string();
            }
        }

        if let Some(v) = get("security", "pbkdf2_iterations").and_then(parser::parse_u32) {
            if v < MIN_PBKDF2_ITERATIONS {
                warn!(value = v, min = MIN_PBKDF2_ITERATIONS, "pbkdf2_iterations clamped");
            }
            self.pbkdf2_iterations = v.max(MIN_PBKDF2_ITERATIONS);
        }
        if let Some(v) = get("security", "salt").filter(|v| !v.is_empty()) {
            self.salt = v.to_string();
        }

        if let Some(v) = get("autosave", "settle_window_ms").and_then(parser::parse_u64) {
            self.settle_window_ms = v.min(60_000);
        }
        if let Some(v) = get("autosave", "min_interval_ms").and_then(parser::parse_u64) {
            self.min_interval_ms = v.min(600_000);
        }

        if let Some(v) = get("link", "bit_settle_us").and_then(parser::parse_u32) {
            self.bit_settle_us = v.clamp(1, 10_000);
        }
        if let Some(v) = get("link", "enable_settle_us").and_then(parser::parse_u32) {
            self.enable_settle_us = v.min(1_000_000);
        }

        if let Some(v) = get("general", "log_level").filter(|v| !v.is_empty()) {
            self.log_level = v.to_lowercase();
        }
    }

    /// Ecrit le fichier de configuration commente par defaut.
    pub fn save_default(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, default_config_text())
    }

    /// Parametres de derivation de cle.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.salt.as_bytes().to_vec(), self.pbkdf2_iterations)
    }

    /// Politique de sauvegarde differee.
    pub fn autosave_policy(&self) -> AutosavePolicy {
        AutosavePolicy {
            settle_window_ms: self.settle_window_ms,
            min_interval_ms: self.min_interval_ms,
        }
    }

    /// Delais du lien keyload.
    pub fn link_timing(&self) -> LinkTiming {
        LinkTiming {
            bit_settle_us: self.bit_settle_us,
            enable_settle_us: self.enable_settle_us,
        }
    }
}

/// Chemin du fichier de configuration d'un repertoire de donnees.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILENAME)
}

/// Repertoire de donnees par defaut.
pub fn default_data_dir() -> PathBuf {
    resolve_data_dir(
        std::env::var_os(HOME_ENV_VAR).map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn resolve_data_dir(kfd_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    kfd_home
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| {
            home.filter(|p| !p.as_os_str().is_empty())
                .map(|h| h.join(APP_DIR_NAME))
        })
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

/// Texte par defaut du fichier de configuration.
fn default_config_text() -> String {
    r#"# KfdVault Configuration
# La phrase de passe n'est jamais stockee ici :
# utiliser --passphrase ou KFDVAULT_PASSPHRASE.

[general]
# trace | debug | info | warn | error (RUST_LOG a priorite)
log_level = info

[storage]
# Vide = repertoire courant de KfdVault ($KFDVAULT_HOME ou ~/.kfdvault)
data_dir = ""
collection_file = containers.kfv
container_extension = kfc

[security]
# Minimum 10000
pbkdf2_iterations = 10000
salt = KFDVAULT-CONTAINER-SALT-V1

[autosave]
settle_window_ms = 1000
min_interval_ms = 3000

[link]
bit_settle_us = 5
enable_settle_us = 50
"#
    .to_string()
}
