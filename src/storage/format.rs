// KfdVault - Serialisation/deserialisation binaire
// Format compact des conteneurs de cles (clair avant chiffrement)
//
// Ce module serialise un conteneur en ContainerRecord binaire et
// une collection complete en enregistrement collection.
//
// # Format d'un ContainerRecord (entiers big-endian)
// ```text
// [name_len]     u8
// [name]         name_len octets UTF-8 (libelle du conteneur)
// [desc_len]     u8
// [description]  desc_len octets UTF-8 (agence)
// [key_count]    u8
// Pour chaque cle :
//   [keyset_id]    u16
//   [key_id]       u16
//   [algorithm_id] u8
//   [key_len]      u8
//   [key_bytes]    key_len octets
// Extension optionnelle (metadonnees) :
//   [0xE1][version u8][band lp-str][default_algorithm lp-str][flags u8]
//   key_count x ([label lp-str][selected u8])
// ```
// Un enregistrement sans extension se decode avec des metadonnees vides
// et toutes les cles selectionnees.
//
// # Format de la collection
// ```text
// ["KFDv1"][version u8][active u8, 0xFF = aucun][count u8]
// count x ([record_len u16][ContainerRecord])
// ```
//
// # Robustesse
// Le clair dechiffre est atteignable par un attaquant ou une corruption :
// chaque prefixe de longueur est verifie contre la taille restante avant
// lecture, les chaines doivent etre UTF-8 et les octets residuels apres
// l'enregistrement sont refuses.
//
// # Taille
// Dans la collection, un enregistrement est prefixe par un u16 :
// `record_len()` permet au modele de refuser en amont un conteneur
// qui ne pourrait plus etre sauvegarde.

use crate::constants::*;
use crate::container::entry::{KeyContainer, KeyEntry};
use crate::error::CodecError;

/// Metadonnees d'affichage portees par le bloc d'extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordExtension {
    pub band: String,
    pub default_algorithm: String,
    pub locked: bool,
}

/// Contenu logique d'un fichier conteneur.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerRecord {
    pub name: String,
    pub description: String,
    pub keys: Vec<KeyEntry>,
    pub extension: Option<RecordExtension>,
}

impl From<&KeyContainer> for ContainerRecord {
    fn from(c: &KeyContainer) -> Self {
        Self {
            name: c.label.clone(),
            description: c.agency.clone(),
            keys: c.keys.clone(),
            extension: Some(RecordExtension {
                band: c.band.clone(),
                default_algorithm: c.default_algorithm.clone(),
                locked: c.locked,
            }),
        }
    }
}

impl From<ContainerRecord> for KeyContainer {
    fn from(r: ContainerRecord) -> Self {
        let ext = r.extension.unwrap_or_default();
        Self {
            label: r.name,
            agency: r.description,
            band: ext.band,
            default_algorithm: ext.default_algorithm,
            locked: ext.locked,
            keys: r.keys,
        }
    }
}

/// Lecteur borne sur un tampon ; chaque lecture verifie la taille restante.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::Truncated(field));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.bytes(1, field)?[0])
    }

    fn u16_be(&mut self, field: &'static str) -> Result<u16, CodecError> {
        let b = self.bytes(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn lp_bytes(&mut self, field: &'static str) -> Result<&'a [u8], CodecError> {
        let len = self.u8(field)? as usize;
        self.bytes(len, field)
    }

    fn lp_string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let bytes = self.lp_bytes(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
    }
}

fn push_lp(buf: &mut Vec<u8>, bytes: &[u8], field: &'static str) -> Result<(), CodecError> {
    if bytes.len() > MAX_FIELD_LEN {
        return Err(CodecError::FieldTooLong {
            field,
            len: bytes.len(),
            max: MAX_FIELD_LEN,
        });
    }
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Taille encodee d'une cle : champs fixes, octets de cle et, dans le
/// bloc d'extension, libelle et flag de selection.
pub fn key_record_len(key: &KeyEntry) -> usize {
    2 + 2 + 1 + 1 + key.key_bytes.len() + 1 + key.label.len() + 1
}

/// Taille de l'enregistrement produit par `encode_record` pour ce conteneur.
pub fn record_len(container: &KeyContainer) -> usize {
    let header = 1 + container.label.len() + 1 + container.agency.len() + 1;
    let extension = 2 + 1 + container.band.len() + 1 + container.default_algorithm.len() + 1;
    header + extension + container.keys.iter().map(key_record_len).sum::<usize>()
}

/// Serialise un ContainerRecord.
pub fn encode_record(record: &ContainerRecord) -> Result<Vec<u8>, CodecError> {
    if record.keys.len() > MAX_KEYS_PER_CONTAINER {
        return Err(CodecError::TooManyItems(record.keys.len()));
    }

    let mut buf = Vec::with_capacity(64 + record.keys.len() * 40);
    push_lp(&mut buf, record.name.as_bytes(), "name")?;
    push_lp(&mut buf, record.description.as_bytes(), "description")?;
    buf.push(record.keys.len() as u8);

    for key in &record.keys {
        buf.extend_from_slice(&key.keyset_id.to_be_bytes());
        buf.extend_from_slice(&key.key_id.to_be_bytes());
        buf.push(key.algorithm_id);
        push_lp(&mut buf, &key.key_bytes, "key_bytes")?;
    }

    if let Some(ext) = &record.extension {
        buf.push(RECORD_EXTENSION_TAG);
        buf.push(RECORD_EXTENSION_VERSION);
        push_lp(&mut buf, ext.band.as_bytes(), "band")?;
        push_lp(&mut buf, ext.default_algorithm.as_bytes(), "default_algorithm")?;
        buf.push(if ext.locked { 1 } else { 0 });
        for key in &record.keys {
            push_lp(&mut buf, key.label.as_bytes(), "key_label")?;
            buf.push(if key.selected { 1 } else { 0 });
        }
    }

    Ok(buf)
}

/// Deserialise un ContainerRecord ; le tampon doit etre consomme entierement.
pub fn decode_record(data: &[u8]) -> Result<ContainerRecord, CodecError> {
    let mut r = Reader::new(data);
    let record = read_record(&mut r)?;
    if r.remaining() != 0 {
        return Err(CodecError::TrailingBytes(r.remaining()));
    }
    Ok(record)
}

fn read_record(r: &mut Reader<'_>) -> Result<ContainerRecord, CodecError> {
    let name = r.lp_string("name")?;
    let description = r.lp_string("description")?;
    let count = r.u8("key_count")? as usize;

    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let keyset_id = r.u16_be("keyset_id")?;
        let key_id = r.u16_be("key_id")?;
        let algorithm_id = r.u8("algorithm_id")?;
        let key_bytes = r.lp_bytes("key_bytes")?.to_vec();
        keys.push(KeyEntry::new(keyset_id, key_id, algorithm_id, key_bytes));
    }

    let mut extension = None;
    if r.remaining() > 0 && r.data[r.pos] == RECORD_EXTENSION_TAG {
        r.u8("extension_tag")?;
        let version = r.u8("extension_version")?;
        if version != RECORD_EXTENSION_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let band = r.lp_string("band")?;
        let default_algorithm = r.lp_string("default_algorithm")?;
        let flags = r.u8("flags")?;
        for key in keys.iter_mut() {
            key.label = r.lp_string("key_label")?;
            key.selected = r.u8("key_selected")? != 0;
        }
        extension = Some(RecordExtension {
            band,
            default_algorithm,
            locked: flags & 1 != 0,
        });
    }

    Ok(ContainerRecord {
        name,
        description,
        keys,
        extension,
    })
}

/// Serialise une collection complete avec son index actif.
pub fn encode_collection(
    containers: &[KeyContainer],
    active: Option<usize>,
) -> Result<Vec<u8>, CodecError> {
    if containers.len() > MAX_CONTAINERS {
        return Err(CodecError::TooManyItems(containers.len()));
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(COLLECTION_MAGIC);
    buf.push(COLLECTION_FORMAT_VERSION);
    buf.push(match active {
        Some(i) if i < containers.len() => i as u8,
        _ => NO_ACTIVE_INDEX,
    });
    buf.push(containers.len() as u8);

    for container in containers {
        let record = encode_record(&ContainerRecord::from(container))?;
        let len = u16::try_from(record.len()).map_err(|_| CodecError::FieldTooLong {
            field: "record",
            len: record.len(),
            max: MAX_RECORD_LEN,
        })?;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&record);
    }

    Ok(buf)
}

/// Deserialise une collection. L'index actif est retourne tel quel
/// (la validation contre la taille est faite par le modele).
pub fn decode_collection(data: &[u8]) -> Result<(Vec<KeyContainer>, Option<usize>), CodecError> {
    let mut r = Reader::new(data);
    if r.bytes(COLLECTION_MAGIC.len(), "magic")? != COLLECTION_MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = r.u8("version")?;
    if version != COLLECTION_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let active = match r.u8("active")? {
        NO_ACTIVE_INDEX => None,
        i => Some(i as usize),
    };
    let count = r.u8("container_count")? as usize;

    let mut containers = Vec::with_capacity(count);
    for _ in 0..count {
        let len = r.u16_be("record_len")? as usize;
        let body = r.bytes(len, "record")?;
        containers.push(KeyContainer::from(decode_record(body)?));
    }
    if r.remaining() != 0 {
        return Err(CodecError::TrailingBytes(r.remaining()));
    }

    Ok((containers, active))
}
