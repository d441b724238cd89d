// KfdVault - Modele de conteneurs en memoire
// Liste autoritaire des conteneurs, conteneur actif, sauvegarde differee
//
// Ce module detient la collection de conteneurs et l'index actif.
// Toutes les modifications passent par ses methodes, qui maintiennent
// les invariants et positionnent le flag `dirty`.
//
// # Index actif
// - `None` si et seulement si la collection est vide (apres `add`, le
//   premier conteneur devient actif)
// - Toujours un index valide sinon
// - `remove` et `move_container` le translatent pour qu'il designe le
//   meme conteneur logique (ou le voisin si c'est lui qui est supprime)
// Les index sont positionnels : l'appelant doit les re-resoudre apres
// toute mutation structurelle.
//
// # Sauvegarde differee
// Chaque mutation date `last_change`. `service()` n'ecrit que si
//   now - last_change  >= settle_window   (rafale d'editions terminee)
//   now - last_attempt >= min_interval    (frequence d'ecriture bornee)
// `save_now()` contourne les deux fenetres.
//
// # Echecs de stockage
// Une mutation reussit toujours en memoire. Si l'ecriture echoue, le
// modele continue en RAM seule et `dirty` reste positionne pour qu'un
// prochain `service()` ou `save_now()` reessaie.

use crate::constants::*;
use crate::container::clock::Clock;
use crate::container::defaults::default_containers;
use crate::container::entry::{ContainerSummary, KeyContainer, KeyEntry};
use crate::error::{ModelError, StoreError};
use crate::storage::backend::FileBackend;
use crate::storage::format::{key_record_len, record_len};
use crate::storage::vault::ContainerStore;
use std::path::Path;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Fenetres de la politique de sauvegarde differee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosavePolicy {
    pub settle_window_ms: u64,
    pub min_interval_ms: u64,
}

impl Default for AutosavePolicy {
    fn default() -> Self {
        Self {
            settle_window_ms: DEFAULT_SETTLE_WINDOW_MS,
            min_interval_ms: DEFAULT_MIN_SAVE_INTERVAL_MS,
        }
    }
}

/// Origine de la collection apres `load()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Fichier collection
    Collection,
    /// Scan des fichiers conteneurs individuels
    ContainerFiles,
    /// Conteneurs integres
    Defaults,
    /// Conteneurs integres en RAM : le fichier collection existe mais
    /// n'a pas pu etre dechiffre (il n'est pas ecrase)
    Unreadable,
}

/// Collection de conteneurs avec index actif et persistance differee.
pub struct ContainerModel<B: FileBackend> {
    containers: Vec<KeyContainer>,
    active: Option<usize>,
    store: ContainerStore<B>,
    passphrase: Zeroizing<String>,
    policy: AutosavePolicy,
    clock: Box<dyn Clock>,
    dirty: bool,
    last_change_ms: u64,
    last_attempt_ms: Option<u64>,
    load_source: Option<LoadSource>,
}

impl<B: FileBackend> ContainerModel<B> {
    /// Cree un modele vide. Appeler `load()` pour peupler la collection.
    pub fn new(
        store: ContainerStore<B>,
        passphrase: impl Into<String>,
        policy: AutosavePolicy,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            containers: Vec::new(),
            active: None,
            store,
            passphrase: Zeroizing::new(passphrase.into()),
            policy,
            clock,
            dirty: false,
            last_change_ms: 0,
            last_attempt_ms: None,
            load_source: None,
        }
    }

    // ----- lecture -----

    /// Nombre de conteneurs.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Retourne true si la collection est vide.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Resume de chaque conteneur, dans l'ordre.
    pub fn list(&self) -> Vec<ContainerSummary> {
        self.containers.iter().map(KeyContainer::summary).collect()
    }

    /// Conteneur a l'index donne.
    pub fn get(&self, index: usize) -> Result<&KeyContainer, ModelError> {
        self.containers.get(index).ok_or(ModelError::OutOfRange {
            index,
            len: self.containers.len(),
        })
    }

    /// Index du conteneur actif.
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Conteneur actif.
    pub fn get_active(&self) -> Option<&KeyContainer> {
        self.active.and_then(|i| self.containers.get(i))
    }

    /// Retourne true si des modifications ne sont pas encore persistees.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Origine de la collection lors du dernier `load()`.
    pub fn load_source(&self) -> Option<LoadSource> {
        self.load_source
    }

    /// Acces au store (export/import de fichiers individuels).
    pub fn store(&self) -> &ContainerStore<B> {
        &self.store
    }

    /// Phrase de passe courante.
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    // ----- mutations de conteneurs -----

    /// Ajoute un conteneur en fin de liste et retourne son index.
    /// Le premier conteneur ajoute devient actif.
    pub fn add(&mut self, container: KeyContainer) -> Result<usize, ModelError> {
        if self.containers.len() >= MAX_CONTAINERS {
            return Err(ModelError::Capacity("containers"));
        }
        check_container(&container)?;
        self.containers.push(container);
        let index = self.containers.len() - 1;
        if self.active.is_none() {
            self.active = Some(index);
        }
        self.mark_dirty();
        Ok(index)
    }

    /// Remplace le conteneur a l'index donne.
    pub fn update(&mut self, index: usize, container: KeyContainer) -> Result<(), ModelError> {
        self.check_index(index)?;
        check_container(&container)?;
        self.containers[index] = container;
        self.mark_dirty();
        Ok(())
    }

    /// Supprime le conteneur a l'index donne et re-ancre l'index actif.
    pub fn remove(&mut self, index: usize) -> Result<KeyContainer, ModelError> {
        self.check_index(index)?;
        let removed = self.containers.remove(index);
        let len = self.containers.len();
        self.active = match self.active {
            _ if len == 0 => None,
            Some(a) if a == index => Some(index.min(len - 1)),
            Some(a) if a > index => Some(a - 1),
            other => other,
        };
        self.mark_dirty();
        Ok(removed)
    }

    /// Deplace un conteneur ; l'index actif suit le meme conteneur logique.
    pub fn move_container(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let container = self.containers.remove(from);
        self.containers.insert(to, container);

        self.active = self.active.map(|a| {
            if a == from {
                to
            } else if from < a && a <= to {
                a - 1
            } else if to <= a && a < from {
                a + 1
            } else {
                a
            }
        });
        self.mark_dirty();
        Ok(())
    }

    /// Change le conteneur actif (persiste avec la collection).
    pub fn set_active(&mut self, index: usize) -> Result<(), ModelError> {
        self.check_index(index)?;
        self.active = Some(index);
        self.mark_dirty();
        Ok(())
    }

    // ----- mutations de cles -----

    /// Ajoute une cle en fin de conteneur et retourne son index.
    pub fn add_key(&mut self, container_index: usize, key: KeyEntry) -> Result<usize, ModelError> {
        self.check_index(container_index)?;
        check_key(&key)?;
        let container = &mut self.containers[container_index];
        if container.keys.len() >= MAX_KEYS_PER_CONTAINER {
            return Err(ModelError::Capacity("keys"));
        }
        check_record_len(record_len(container) + key_record_len(&key))?;
        container.keys.push(key);
        let index = container.keys.len() - 1;
        self.mark_dirty();
        Ok(index)
    }

    /// Remplace une cle.
    pub fn update_key(
        &mut self,
        container_index: usize,
        key_index: usize,
        key: KeyEntry,
    ) -> Result<(), ModelError> {
        self.check_key_index(container_index, key_index)?;
        check_key(&key)?;
        let container = &mut self.containers[container_index];
        check_record_len(
            record_len(container) - key_record_len(&container.keys[key_index]) + key_record_len(&key),
        )?;
        container.keys[key_index] = key;
        self.mark_dirty();
        Ok(())
    }

    /// Supprime une cle.
    pub fn remove_key(&mut self, container_index: usize, key_index: usize) -> Result<KeyEntry, ModelError> {
        self.check_key_index(container_index, key_index)?;
        let removed = self.containers[container_index].keys.remove(key_index);
        self.mark_dirty();
        Ok(removed)
    }

    /// Inclut ou exclut une cle de la prochaine session keyload.
    pub fn set_key_selected(
        &mut self,
        container_index: usize,
        key_index: usize,
        selected: bool,
    ) -> Result<(), ModelError> {
        self.check_key_index(container_index, key_index)?;
        self.containers[container_index].keys[key_index].selected = selected;
        self.mark_dirty();
        Ok(())
    }

    /// Change la phrase de passe ; la collection sera re-chiffree au prochain save.
    pub fn change_passphrase(&mut self, passphrase: impl Into<String>) {
        self.passphrase = Zeroizing::new(passphrase.into());
        self.mark_dirty();
    }

    // ----- persistance -----

    /// Marque la collection comme modifiee et date la modification.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.last_change_ms = self.clock.now_ms();
    }

    /// Tick de sauvegarde differee. Retourne true si une sauvegarde a reussi.
    pub fn service(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let now = self.clock.now_ms();
        if now.saturating_sub(self.last_change_ms) < self.policy.settle_window_ms {
            return false;
        }
        if let Some(last) = self.last_attempt_ms {
            if now.saturating_sub(last) < self.policy.min_interval_ms {
                return false;
            }
        }
        self.save_now().is_ok()
    }

    /// Sauvegarde immediate (action utilisateur), sans fenetres de debounce.
    pub fn save_now(&mut self) -> Result<(), StoreError> {
        self.last_attempt_ms = Some(self.clock.now_ms());
        match self
            .store
            .save_collection(&self.passphrase, &self.containers, self.active)
        {
            Ok(()) => {
                self.dirty = false;
                info!(
                    count = self.containers.len(),
                    active = ?self.active,
                    "containers saved"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    count = self.containers.len(),
                    "save failed; running from RAM only"
                );
                Err(e)
            }
        }
    }

    /// Charge la collection : fichier collection, sinon scan des fichiers
    /// conteneurs, sinon conteneurs integres. Retourne true si les donnees
    /// proviennent du stockage.
    pub fn load(&mut self) -> bool {
        if self.store.collection_exists() {
            match self.store.load_collection(&self.passphrase) {
                Ok((containers, active)) if !containers.is_empty() => {
                    self.install(containers, active, LoadSource::Collection);
                    return true;
                }
                Ok(_) => {
                    warn!("collection file holds zero containers; using defaults");
                    self.seed_defaults();
                    let _ = self.save_now();
                    return false;
                }
                Err(e) => {
                    // Le fichier n'est pas ecrase : une mauvaise phrase de passe
                    // ne doit pas detruire les donnees.
                    warn!(error = %e, "collection load failed; using defaults in RAM");
                    self.seed_defaults();
                    self.dirty = false;
                    self.load_source = Some(LoadSource::Unreadable);
                    return false;
                }
            }
        }

        match self.store.load_dir(Path::new(""), &self.passphrase) {
            Ok((found, _)) => {
                let containers = storable(found.into_iter().map(|(_, c)| c));
                if containers.is_empty() {
                    info!("no stored containers; seeding defaults");
                    self.seed_defaults();
                    let _ = self.save_now();
                    return false;
                }
                self.install(containers, Some(0), LoadSource::ContainerFiles);
                // Premier regroupement dans le fichier collection
                self.mark_dirty();
                let _ = self.save_now();
                true
            }
            Err(e) => {
                warn!(error = %e, "storage not readable; using defaults in RAM");
                self.seed_defaults();
                false
            }
        }
    }

    /// Efface tout l'etat disque, recharge les conteneurs integres et les persiste.
    pub fn factory_reset(&mut self) -> Result<(), StoreError> {
        warn!("factory reset requested");
        let removed = self.store.purge(Path::new(""))?;
        debug!(removed, "storage purged");
        self.seed_defaults();
        self.save_now()?;
        info!("factory reset complete (defaults written)");
        Ok(())
    }

    fn install(&mut self, containers: Vec<KeyContainer>, active: Option<usize>, source: LoadSource) {
        let len = containers.len();
        self.containers = containers;
        self.active = match active {
            Some(i) if i < len => Some(i),
            _ if len > 0 => Some(0),
            _ => None,
        };
        self.dirty = false;
        self.load_source = Some(source);
        info!(count = len, active = ?self.active, source = ?source, "containers loaded");
    }

    fn seed_defaults(&mut self) {
        self.containers = default_containers();
        self.active = if self.containers.is_empty() { None } else { Some(0) };
        self.load_source = Some(LoadSource::Defaults);
        self.mark_dirty();
        info!(count = self.containers.len(), "defaults loaded");
    }

    fn check_index(&self, index: usize) -> Result<(), ModelError> {
        self.get(index).map(|_| ())
    }

    fn check_key_index(&self, container_index: usize, key_index: usize) -> Result<(), ModelError> {
        let len = self.get(container_index)?.keys.len();
        if key_index >= len {
            return Err(ModelError::OutOfRange {
                index: key_index,
                len,
            });
        }
        Ok(())
    }
}

fn check_key(key: &KeyEntry) -> Result<(), ModelError> {
    if key.fits_format() {
        Ok(())
    } else {
        Err(ModelError::Capacity("key_bytes or label longer than 255 bytes"))
    }
}

fn check_container(container: &KeyContainer) -> Result<(), ModelError> {
    if container.keys.len() > MAX_KEYS_PER_CONTAINER {
        return Err(ModelError::Capacity("keys"));
    }
    let fields = [
        &container.label,
        &container.agency,
        &container.band,
        &container.default_algorithm,
    ];
    if fields.iter().any(|f| f.len() > MAX_FIELD_LEN) {
        return Err(ModelError::Capacity("text field longer than 255 bytes"));
    }
    container.keys.iter().try_for_each(check_key)?;
    check_record_len(record_len(container))
}

/// Un enregistrement doit tenir dans le prefixe u16 de la collection,
/// sinon plus aucune sauvegarde ne reussirait.
fn check_record_len(len: usize) -> Result<(), ModelError> {
    if len > MAX_RECORD_LEN {
        return Err(ModelError::Capacity("encoded container larger than 65535 bytes"));
    }
    Ok(())
}

/// Conteneurs scannes que la collection peut contenir, dans la limite
/// de `MAX_CONTAINERS`.
fn storable(scanned: impl Iterator<Item = KeyContainer>) -> Vec<KeyContainer> {
    let mut kept = Vec::new();
    for container in scanned {
        if let Err(e) = check_container(&container) {
            warn!(label = %container.label, error = %e, "scanned container skipped");
            continue;
        }
        if kept.len() == MAX_CONTAINERS {
            warn!(max = MAX_CONTAINERS, "too many container files; extra files ignored");
            break;
        }
        kept.push(container);
    }
    kept
}
