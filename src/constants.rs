// KfdVault - Constantes globales
//
// Ce module centralise toutes les constantes de l'application :
// - Format des fichiers conteneurs (suffixes, magic, versions)
// - Tailles cryptographiques (AES, IV, PBKDF2)
// - Politique de sauvegarde differee (fenetres de debounce)
// - Trames et temporisations du lien trois fils
// - Noms de fichiers et repertoires
//
// Les constantes sont utilisees par les modules storage, crypto,
// container, keyload et config pour garantir la coherence des valeurs.

/// Suffixe des fichiers conteneurs individuels (scan de repertoire)
pub const CONTAINER_EXTENSION: &str = "kfc";

/// Nom du fichier collection (tous les conteneurs + index actif)
pub const COLLECTION_FILENAME: &str = "containers.kfv";

/// Magic de l'enregistrement collection : "KFDv1"
pub const COLLECTION_MAGIC: &[u8; 5] = b"KFDv1";

/// Version du format collection
pub const COLLECTION_FORMAT_VERSION: u8 = 1;

/// Valeur de l'index actif serialisee quand aucun conteneur n'est actif
pub const NO_ACTIVE_INDEX: u8 = 0xFF;

/// Marqueur du bloc d'extension (metadonnees) apres la liste de cles
pub const RECORD_EXTENSION_TAG: u8 = 0xE1;

/// Version du bloc d'extension
pub const RECORD_EXTENSION_VERSION: u8 = 1;

/// Longueur max d'un champ prefixe par un u8 (chaines, octets de cle)
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Nombre max de cles par conteneur (compteur u8)
pub const MAX_KEYS_PER_CONTAINER: usize = u8::MAX as usize;

/// Nombre max de conteneurs par collection (compteur u8, 0xFF reserve)
pub const MAX_CONTAINERS: usize = (u8::MAX - 1) as usize;

/// Taille max d'un ContainerRecord dans la collection (prefixe u16)
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

/// Sel PBKDF2 applicatif par defaut (public, non secret)
pub const DEFAULT_KDF_SALT: &str = "KFDVAULT-CONTAINER-SALT-V1";

/// Iterations PBKDF2 par defaut
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 10_000;

/// Iterations PBKDF2 minimales acceptees depuis la configuration
pub const MIN_PBKDF2_ITERATIONS: u32 = 10_000;

/// Taille cle AES-256 (octets)
pub const AES_KEY_SIZE: usize = 32;

/// Taille d'un bloc AES (octets)
pub const AES_BLOCK_SIZE: usize = 16;

/// Taille IV AES-CBC (octets)
pub const AES_IV_SIZE: usize = 16;

/// Fenetre de stabilisation avant sauvegarde auto (ms)
pub const DEFAULT_SETTLE_WINDOW_MS: u64 = 1_000;

/// Intervalle minimal entre deux sauvegardes auto (ms)
pub const DEFAULT_MIN_SAVE_INTERVAL_MS: u64 = 3_000;

/// Trame de debut de session keyload
pub const SESSION_START_FRAME: [u8; 2] = [0xAA, 0x55];

/// Trame de fin de session keyload
pub const SESSION_END_FRAME: [u8; 2] = [0x55, 0xAA];

/// Taille de l'en-tete d'une trame de cle
pub const KEY_FRAME_HEADER_SIZE: usize = 6;

/// Delai autour de chaque front d'horloge (us)
pub const DEFAULT_BIT_SETTLE_US: u32 = 5;

/// Delai apres activation/avant desactivation de la ligne enable (us)
pub const DEFAULT_ENABLE_SETTLE_US: u32 = 50;

/// Nom du dossier application dans le repertoire utilisateur
pub const APP_DIR_NAME: &str = ".kfdvault";

/// Variable d'environnement pour le repertoire de donnees
pub const HOME_ENV_VAR: &str = "KFDVAULT_HOME";

/// Variable d'environnement pour la phrase de passe
pub const PASSPHRASE_ENV_VAR: &str = "KFDVAULT_PASSPHRASE";

/// Nom du fichier de configuration
pub const CONFIG_FILENAME: &str = "config.txt";

/// Niveau de log par defaut
pub const DEFAULT_LOG_LEVEL: &str = "info";
