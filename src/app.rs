// KfdVault - Orchestrateur principal
// Relie la configuration, le modele de conteneurs et le moteur keyload
//
// # Architecture
// Une seule instance `App`, construite au demarrage et passee par
// reference aux collaborateurs (CLI). Pas d'etat global : le modele
// et le moteur sont des champs de l'App.
//
// L'application est mono-thread et cooperative : `run_keyload` appelle
// `engine.tick()` et `model.service()` dans la meme boucle. Le moteur
// ne declenche jamais d'I/O fichier ; seule la sauvegarde differee
// du modele peut en faire, entre deux ticks.
//
// # Cycle de vie
// 1. `App::open()` : repertoire de donnees, store, chargement du modele
// 2. commandes (CRUD, import/export, keyload)
// 3. `App::close()` : sauvegarde finale si des modifications restent

use crate::config::settings::Settings;
use crate::container::clock::MonotonicClock;
use crate::container::entry::KeyContainer;
use crate::container::model::{ContainerModel, LoadSource};
use crate::error::{KvError, KvResult, ModelError};
use crate::keyload::engine::{KeyloadEngine, SessionOutcome};
use crate::keyload::link::TraceLink;
use crate::storage::backend::DiskBackend;
use crate::storage::vault::{ContainerStore, ScanReport};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resultat d'une session keyload pilotee par l'App.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyloadReport {
    /// Libelle du conteneur transmis
    pub container: String,
    pub outcome: SessionOutcome,
    /// (cles emises, cles selectionnees)
    pub progress: (u32, u32),
    /// Nombre de ticks jusqu'au retour a Idle
    pub ticks: usize,
    /// Octets vus sur le lien
    pub wire_bytes: Vec<u8>,
}

/// Application principale KfdVault.
pub struct App {
    settings: Settings,
    model: ContainerModel<DiskBackend>,
    engine: KeyloadEngine<TraceLink>,
}

impl App {
    /// Ouvre le repertoire de donnees et charge la collection. Echoue si
    /// le fichier collection existe mais ne se dechiffre pas, pour qu'une
    /// mauvaise phrase de passe ne l'ecrase jamais.
    pub fn open(settings: Settings, passphrase: impl Into<String>) -> KvResult<Self> {
        let app = Self::open_lenient(settings, passphrase)?;
        if app.model.load_source() == Some(LoadSource::Unreadable) {
            return Err(KvError::Config(
                "collection file could not be decrypted (wrong passphrase?)".into(),
            ));
        }
        Ok(app)
    }

    /// Comme `open`, mais continue sur les conteneurs integres si la
    /// collection est illisible (factory reset).
    pub fn open_lenient(settings: Settings, passphrase: impl Into<String>) -> KvResult<Self> {
        fs::create_dir_all(&settings.data_dir)?;

        let store = ContainerStore::new(
            DiskBackend::new(settings.data_dir.clone()),
            settings.kdf_params(),
        )
        .with_extension(settings.container_extension.clone())
        .with_collection_path(settings.collection_file.clone());

        let mut model = ContainerModel::new(
            store,
            passphrase,
            settings.autosave_policy(),
            Box::new(MonotonicClock::new()),
        );
        let from_storage = model.load();
        info!(
            data_dir = %settings.data_dir.display(),
            containers = model.len(),
            from_storage,
            "KfdVault ready"
        );

        let engine = KeyloadEngine::new(TraceLink::new(settings.link_timing()));
        Ok(Self {
            settings,
            model,
            engine,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model(&self) -> &ContainerModel<DiskBackend> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ContainerModel<DiskBackend> {
        &mut self.model
    }

    pub fn engine(&self) -> &KeyloadEngine<TraceLink> {
        &self.engine
    }

    /// Sauvegarde immediate (action utilisateur).
    pub fn save(&mut self) -> KvResult<()> {
        Ok(self.model.save_now()?)
    }

    /// Exporte un conteneur dans un fichier individuel chiffre.
    pub fn export(&self, index: usize, path: &Path) -> KvResult<PathBuf> {
        let container = self.model.get(index)?;
        let target = absolute(path)?;
        self.model
            .store()
            .save(&target, self.model.passphrase(), container)?;
        info!(path = %target.display(), label = %container.label, "container exported");
        Ok(target)
    }

    /// Importe un fichier conteneur et l'ajoute en fin de collection.
    pub fn import(&mut self, path: &Path) -> KvResult<usize> {
        let source = absolute(path)?;
        let container = self
            .model
            .store()
            .load(&source, self.model.passphrase())?;
        let label = container.label.clone();
        let index = self.model.add(container)?;
        info!(path = %source.display(), label = %label, index, "container imported");
        Ok(index)
    }

    /// Liste les fichiers conteneurs lisibles du repertoire de donnees.
    pub fn scan(&self) -> KvResult<(Vec<(PathBuf, KeyContainer)>, ScanReport)> {
        Ok(self
            .model
            .store()
            .load_dir(Path::new(""), self.model.passphrase())?)
    }

    /// Transmet un conteneur (l'actif par defaut) et pilote la session
    /// jusqu'a son retour a Idle.
    pub fn run_keyload(&mut self, index: Option<usize>) -> KvResult<KeyloadReport> {
        let container = match index.or(self.model.active_index()) {
            Some(i) => self.model.get(i)?.clone(),
            None => return Err(ModelError::OutOfRange { index: 0, len: 0 }.into()),
        };

        let bits_before = self.engine.link().bit_count();
        self.engine.begin_session(&container)?;

        let mut ticks = 0;
        let outcome = loop {
            ticks += 1;
            if let Some(outcome) = self.engine.tick() {
                break outcome;
            }
            self.model.service();
        };

        if let SessionOutcome::Failed(e) = &outcome {
            warn!(error = %e, "keyload session failed");
        }

        let wire_bytes = self
            .engine
            .link()
            .bytes()
            .split_off(bits_before / 8);
        Ok(KeyloadReport {
            container: container.label.clone(),
            outcome,
            progress: self.engine.progress(),
            ticks,
            wire_bytes,
        })
    }

    /// Efface l'etat disque et recharge les conteneurs integres.
    pub fn factory_reset(&mut self) -> KvResult<()> {
        if self.engine.cancel().is_some() {
            warn!("keyload session cancelled by factory reset");
        }
        Ok(self.model.factory_reset()?)
    }

    /// Sauvegarde finale si des modifications restent en attente.
    pub fn close(mut self) -> KvResult<()> {
        self.engine.cancel();
        if self.model.is_dirty() {
            self.model.save_now()?;
        }
        Ok(())
    }
}

/// Chemin absolu (relatif au repertoire courant) pour les fichiers utilisateur.
fn absolute(path: &Path) -> KvResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .map_err(KvError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SESSION_START_FRAME;
    use crate::container::entry::KeyEntry;

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            data_dir: dir.to_path_buf(),
            pbkdf2_iterations: 2,
            ..Settings::default()
        }
    }

    #[test]
    fn test_first_open_seeds_defaults_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(settings_in(dir.path()), "pw").unwrap();
        assert_eq!(app.model().len(), 1);
        assert!(dir.path().join("containers.kfv").is_file());
        app.close().unwrap();

        let reopened = App::open(settings_in(dir.path()), "pw").unwrap();
        assert_eq!(reopened.model().get(0).unwrap().label, "DEMO - AES256 Patrol");
    }

    #[test]
    fn test_close_persists_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::open(settings_in(dir.path()), "pw").unwrap();
        app.model_mut()
            .add(KeyContainer::new("Fire").with_key(KeyEntry::new(2, 1, 0x84, vec![9; 32])))
            .unwrap();
        assert!(app.model().is_dirty());
        app.close().unwrap();

        let reopened = App::open(settings_in(dir.path()), "pw").unwrap();
        assert_eq!(reopened.model().len(), 2);
        assert_eq!(reopened.model().get(1).unwrap().label, "Fire");
    }

    #[test]
    fn test_export_import_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::open(settings_in(dir.path()), "pw").unwrap();
        let file = dir.path().join("demo.kfc");
        app.export(0, &file).unwrap();

        let (found, report) = app.scan().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(found[0].1.label, "DEMO - AES256 Patrol");

        let index = app.import(&file).unwrap();
        assert_eq!(index, 1);
        assert_eq!(app.model().get(1).unwrap(), app.model().get(0).unwrap());
    }

    #[test]
    fn test_keyload_active_container() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::open(settings_in(dir.path()), "pw").unwrap();
        let report = app.run_keyload(None).unwrap();
        // Le conteneur de demonstration a une cle selectionnee sur deux
        assert_eq!(report.outcome, SessionOutcome::Completed { sent: 1 });
        assert_eq!(report.progress, (1, 1));
        assert_eq!(&report.wire_bytes[..2], &SESSION_START_FRAME);
        assert_eq!(report.wire_bytes.len(), 2 + 6 + 32 + 2);

        // Seconde session : seuls les nouveaux octets sont rapportes
        let again = app.run_keyload(Some(0)).unwrap();
        assert_eq!(again.wire_bytes, report.wire_bytes);
    }

    #[test]
    fn test_keyload_rejects_invalid_container() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::open(settings_in(dir.path()), "pw").unwrap();
        let idx = app.model_mut().add(KeyContainer::new("Empty")).unwrap();
        assert!(matches!(
            app.run_keyload(Some(idx)),
            Err(KvError::Keyload(_))
        ));
        assert!(matches!(app.run_keyload(Some(9)), Err(KvError::Model(_))));
    }

    #[test]
    fn test_wrong_passphrase_refused_and_file_kept() {
        let dir = tempfile::tempdir().unwrap();
        App::open(settings_in(dir.path()), "pw").unwrap().close().unwrap();
        let before = fs::read(dir.path().join("containers.kfv")).unwrap();

        assert!(matches!(
            App::open(settings_in(dir.path()), "wrong"),
            Err(KvError::Config(_))
        ));
        let lenient = App::open_lenient(settings_in(dir.path()), "wrong").unwrap();
        lenient.close().unwrap();
        assert_eq!(fs::read(dir.path().join("containers.kfv")).unwrap(), before);
    }

    #[test]
    fn test_factory_reset_removes_exports_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::open(settings_in(dir.path()), "pw").unwrap();
        app.model_mut().add(KeyContainer::new("Extra")).unwrap();
        app.save().unwrap();
        app.export(1, &dir.path().join("extra.kfc")).unwrap();

        app.factory_reset().unwrap();
        assert_eq!(app.model().len(), 1);
        assert!(!dir.path().join("extra.kfc").exists());
        assert!(dir.path().join("containers.kfv").is_file());
    }
}
