// KfdVault - Lecture/ecriture des fichiers conteneurs chiffres
// Sauvegarde et chargement des conteneurs (ContainerStore)
//
// Ce module fait le lien entre le codec et le backend de fichiers.
// Il porte l'etape phrase de passe -> cle (PBKDF2, sel du store).
//
// # Format d'un fichier conteneur (.kfc)
// ```text
// [iv]          16 octets aleatoires
// [ciphertext]  AES-256-CBC(PKCS7(ContainerRecord))
// ```
// Le fichier collection (containers.kfv) a la meme enveloppe autour
// d'un enregistrement collection (voir `format`).
//
// # Ecriture atomique
// Ecriture dans `<cible>.tmp`, flush, puis rename sur la cible. En cas
// d'echec a n'importe quelle etape, la cible d'origine est intacte et le
// temporaire est supprime si possible.
//
// # Scan
// Un fichier illisible ne stoppe pas le scan : il est journalise, ignore,
// et compte dans le `ScanReport`.
//
// # Politique de reessai
// Aucune : les reessais sont decides par le modele (debounce/save_now).

use crate::constants::{AES_IV_SIZE, COLLECTION_FILENAME, CONTAINER_EXTENSION};
use crate::container::entry::KeyContainer;
use crate::crypto::kdf::KdfParams;
use crate::error::StoreError;
use crate::storage::backend::FileBackend;
use crate::storage::codec;
use crate::storage::format::ContainerRecord;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bilan d'un chargement de repertoire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Fichiers conteneurs rencontres
    pub files_seen: usize,
    /// Conteneurs charges avec succes
    pub loaded: usize,
    /// Fichiers ignores (I/O ou decodage)
    pub failed: usize,
}

/// Persistance des conteneurs sur un backend de fichiers.
#[derive(Debug)]
pub struct ContainerStore<B: FileBackend> {
    backend: B,
    kdf: KdfParams,
    extension: String,
    collection_path: PathBuf,
}

impl<B: FileBackend> ContainerStore<B> {
    /// Cree un store avec les parametres par defaut.
    pub fn new(backend: B, kdf: KdfParams) -> Self {
        Self {
            backend,
            kdf,
            extension: CONTAINER_EXTENSION.to_string(),
            collection_path: PathBuf::from(COLLECTION_FILENAME),
        }
    }

    /// Change le suffixe des fichiers conteneurs (sans le point).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Change le nom du fichier collection.
    pub fn with_collection_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.collection_path = path.into();
        self
    }

    /// Acces au backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Suffixe des fichiers conteneurs.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Chemin du fichier collection.
    pub fn collection_path(&self) -> &Path {
        &self.collection_path
    }

    /// Chiffre et ecrit un conteneur de maniere atomique.
    pub fn save(&self, path: &Path, passphrase: &str, container: &KeyContainer) -> Result<(), StoreError> {
        let key = self.kdf.derive(passphrase);
        let blob = codec::encrypt(&ContainerRecord::from(container), &key)?;
        self.write_atomic(path, &blob.to_bytes())?;
        debug!(path = %path.display(), keys = container.keys.len(), "container saved");
        Ok(())
    }

    /// Lit et dechiffre un conteneur.
    pub fn load(&self, path: &Path, passphrase: &str) -> Result<KeyContainer, StoreError> {
        let (iv, ciphertext) = self.read_envelope(path)?;
        let key = self.kdf.derive(passphrase);
        let record = codec::decrypt(&iv, ciphertext.as_slice(), &key)?;
        Ok(KeyContainer::from(record))
    }

    /// Liste les fichiers conteneurs d'un repertoire (suffixe du store).
    pub fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let files = self.backend.list(dir)?;
        Ok(files
            .into_iter()
            .filter(|p| p.extension().map_or(false, |e| e == self.extension.as_str()))
            .collect())
    }

    /// Charge tous les conteneurs d'un repertoire ; les echecs sont ignores.
    pub fn load_dir(
        &self,
        dir: &Path,
        passphrase: &str,
    ) -> Result<(Vec<(PathBuf, KeyContainer)>, ScanReport), StoreError> {
        let files = self.scan(dir)?;
        let mut report = ScanReport {
            files_seen: files.len(),
            ..ScanReport::default()
        };
        let mut containers = Vec::with_capacity(files.len());

        for path in files {
            match self.load(&path, passphrase) {
                Ok(c) => {
                    containers.push((path, c));
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable container");
                    report.failed += 1;
                }
            }
        }

        info!(
            seen = report.files_seen,
            loaded = report.loaded,
            failed = report.failed,
            "container directory scanned"
        );
        Ok((containers, report))
    }

    /// Ecrit la collection complete (et l'index actif) de maniere atomique.
    pub fn save_collection(
        &self,
        passphrase: &str,
        containers: &[KeyContainer],
        active: Option<usize>,
    ) -> Result<(), StoreError> {
        let key = self.kdf.derive(passphrase);
        let blob = codec::encrypt_collection(containers, active, &key)?;
        self.write_atomic(&self.collection_path, &blob.to_bytes())
    }

    /// Lit la collection complete.
    pub fn load_collection(
        &self,
        passphrase: &str,
    ) -> Result<(Vec<KeyContainer>, Option<usize>), StoreError> {
        let (iv, ciphertext) = self.read_envelope(&self.collection_path)?;
        let key = self.kdf.derive(passphrase);
        Ok(codec::decrypt_collection(&iv, &ciphertext, &key)?)
    }

    /// Retourne true si le fichier collection existe.
    pub fn collection_exists(&self) -> bool {
        self.backend.exists(&self.collection_path)
    }

    /// Supprime le fichier collection et tous les conteneurs du repertoire.
    /// Retourne le nombre de fichiers supprimes.
    pub fn purge(&self, dir: &Path) -> Result<usize, StoreError> {
        let mut removed = 0;
        if self.collection_exists() {
            self.backend.remove(&self.collection_path)?;
            removed += 1;
        }
        for path in self.scan(dir)? {
            self.backend.remove(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Lit un fichier et separe l'IV du chiffre.
    fn read_envelope(&self, path: &Path) -> Result<([u8; AES_IV_SIZE], Vec<u8>), StoreError> {
        let data = self.backend.read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            _ => StoreError::Io(e),
        })?;
        if data.len() < AES_IV_SIZE {
            return Err(StoreError::TooSmall { len: data.len() });
        }
        let mut iv = [0u8; AES_IV_SIZE];
        iv.copy_from_slice(&data[..AES_IV_SIZE]);
        Ok((iv, data[AES_IV_SIZE..].to_vec()))
    }

    /// Ecriture atomique : fichier temporaire + rename.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let tmp_path = temp_path_for(path);
        let result = self
            .backend
            .write(&tmp_path, data)
            .and_then(|_| self.backend.rename(&tmp_path, path));
        if let Err(e) = result {
            if self.backend.exists(&tmp_path) {
                let _ = self.backend.remove(&tmp_path);
            }
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

/// `dir/name.kfc` -> `dir/name.kfc.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::entry::KeyEntry;
    use crate::error::CodecError;
    use crate::storage::backend::{DiskBackend, MemoryBackend};

    fn fast_kdf() -> KdfParams {
        KdfParams::new(b"test-salt".to_vec(), 2)
    }

    fn patrol() -> KeyContainer {
        KeyContainer::new("Patrol").with_key(KeyEntry::new(1, 1, 0xAA, vec![0x3C; 16]))
    }

    #[test]
    fn test_patrol_scenario_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContainerStore::new(DiskBackend::new(dir.path()), fast_kdf());
        let path = Path::new("patrol.kfc");

        store.save(path, "test", &patrol()).unwrap();
        assert!(dir.path().join("patrol.kfc").is_file());
        assert!(!dir.path().join("patrol.kfc.tmp").exists());

        assert_eq!(store.load(path, "test").unwrap(), patrol());

        match store.load(path, "wrong") {
            Err(StoreError::Codec(e)) => assert!(matches!(
                e,
                CodecError::BadPadding | CodecError::Truncated(_) | CodecError::UnsupportedVersion(_)
            )),
            Ok(c) => assert_ne!(c, patrol()),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_load_too_small() {
        let store = ContainerStore::new(MemoryBackend::new(), fast_kdf());
        store.backend().put("short.kfc", vec![0; 15]);
        assert!(matches!(
            store.load(Path::new("short.kfc"), "x"),
            Err(StoreError::TooSmall { len: 15 })
        ));
    }

    #[test]
    fn test_load_missing() {
        let store = ContainerStore::new(MemoryBackend::new(), fast_kdf());
        assert!(matches!(
            store.load(Path::new("nope.kfc"), "x"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_write_keeps_original() {
        let store = ContainerStore::new(MemoryBackend::new(), fast_kdf());
        let path = Path::new("a.kfc");
        store.save(path, "pw", &patrol()).unwrap();

        store.backend().set_fail_writes(true);
        let mut changed = patrol();
        changed.label = "Changed".into();
        assert!(store.save(path, "pw", &changed).is_err());
        store.backend().set_fail_writes(false);

        assert_eq!(store.load(path, "pw").unwrap(), patrol());
        assert_eq!(store.backend().paths(), vec![PathBuf::from("a.kfc")]);
    }

    #[test]
    fn test_scan_filters_extension() {
        let store = ContainerStore::new(MemoryBackend::new(), fast_kdf());
        store.backend().put("a.kfc", vec![]);
        store.backend().put("notes.txt", vec![]);
        store.backend().put("b.kfc", vec![]);
        assert_eq!(
            store.scan(Path::new("")).unwrap(),
            vec![PathBuf::from("a.kfc"), PathBuf::from("b.kfc")]
        );
    }

    #[test]
    fn test_load_dir_skips_failures() {
        let store = ContainerStore::new(MemoryBackend::new(), fast_kdf());
        store.save(Path::new("1.kfc"), "pw", &patrol()).unwrap();
        store.save(Path::new("2.kfc"), "pw", &KeyContainer::new("Tac")).unwrap();
        store.backend().put("3.kfc", vec![1, 2, 3]);

        let (loaded, report) = store.load_dir(Path::new(""), "pw").unwrap();
        assert_eq!(
            report,
            ScanReport {
                files_seen: 3,
                loaded: 2,
                failed: 1
            }
        );
        assert_eq!(loaded[0].1, patrol());
        assert_eq!(loaded[1].1.label, "Tac");
    }

    #[test]
    fn test_collection_roundtrip_and_purge() {
        let store = ContainerStore::new(MemoryBackend::new(), fast_kdf());
        let containers = vec![patrol(), KeyContainer::new("B")];
        store.save_collection("pw", &containers, Some(1)).unwrap();
        assert!(store.collection_exists());
        assert_eq!(store.load_collection("pw").unwrap(), (containers, Some(1)));

        store.save(Path::new("x.kfc"), "pw", &patrol()).unwrap();
        assert_eq!(store.purge(Path::new("")).unwrap(), 2);
        assert!(store.backend().paths().is_empty());
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(temp_path_for(Path::new("d/a.kfc")), PathBuf::from("d/a.kfc.tmp"));
    }
}
