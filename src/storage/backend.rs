// KfdVault - Backends de stockage
// Abstraction minimale du systeme de fichiers
//
// Le store ne manipule jamais `std::fs` directement : il passe par le
// trait `FileBackend`, choisi a la construction.
//
// # Implementations
// - `DiskBackend`   : systeme de fichiers de l'OS, racine = repertoire de donnees
// - `MemoryBackend` : fichiers en memoire (tests, fonctionnement RAM seule),
//                     avec injection d'echecs d'ecriture
//
// # Atomicite
// `rename` doit remplacer la cible de maniere atomique. C'est le cas de
// `std::fs::rename` sur un meme volume POSIX et sur NTFS. Sur un systeme
// sans rename atomique, une coupure d'alimentation peut laisser un
// fichier partiel : risque residuel documente.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Operations de fichiers necessaires au store (chemins relatifs a la racine).
pub trait FileBackend {
    /// Lit le fichier entier.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Ecrit (cree ou tronque) le fichier puis force l'ecriture sur le support.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    /// Retourne true si le fichier existe.
    fn exists(&self, path: &Path) -> bool;
    /// Supprime le fichier.
    fn remove(&self, path: &Path) -> io::Result<()>;
    /// Renomme `from` en `to`, en remplacant `to` s'il existe.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Liste les fichiers du repertoire (non recursif), tries par nom.
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Backend sur le systeme de fichiers de l'OS.
#[derive(Debug, Clone)]
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    /// Cree un backend enracine dans `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repertoire racine.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl FileBackend for DiskBackend {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&full)?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let full = self.resolve(dir);
        let mut files = Vec::new();
        // Repertoire absent = aucun fichier (premier lancement)
        if !full.is_dir() {
            return Ok(files);
        }
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(dir.join(entry.file_name()));
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Backend en memoire.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
    fail_writes: Cell<bool>,
    write_count: Cell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active ou desactive l'echec de toutes les ecritures.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Nombre d'ecritures reussies depuis la creation.
    pub fn write_count(&self) -> usize {
        self.write_count.get()
    }

    /// Noms des fichiers presents.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }

    /// Remplace le contenu brut d'un fichier (tests de corruption).
    pub fn put(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.files.borrow_mut().insert(path.into(), data);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

impl FileBackend for MemoryBackend {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if self.fail_writes.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated write failure"));
        }
        self.files.borrow_mut().insert(path.to_path_buf(), data.to_vec());
        self.write_count.set(self.write_count.get() + 1);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut files = self.files.borrow_mut();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|p| p.parent().unwrap_or(Path::new("")) == dir)
            .cloned()
            .collect())
    }
}
