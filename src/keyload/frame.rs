// KfdVault - Trames keyload
//
// Une session est encadree par deux marqueurs fixes ; chaque cle
// selectionnee part dans une trame :
//
// ```text
// [KEYSET u16 BE][KEY_ID u16 BE][ALGO u8][LEN u8][KEY_BYTES LEN]
// ```

use crate::constants::{KEY_FRAME_HEADER_SIZE, SESSION_END_FRAME, SESSION_START_FRAME};
use crate::container::entry::KeyEntry;
use zeroize::Zeroizing;

/// Marqueur de debut de session.
pub fn session_start() -> &'static [u8] {
    &SESSION_START_FRAME
}

/// Marqueur de fin de session.
pub fn session_end() -> &'static [u8] {
    &SESSION_END_FRAME
}

/// Construit la trame d'une cle. Retourne None si la cle ne tient pas
/// dans le prefixe de longueur 8 bits.
pub fn key_frame(key: &KeyEntry) -> Option<Zeroizing<Vec<u8>>> {
    let len = u8::try_from(key.key_bytes.len()).ok()?;
    let mut frame = Vec::with_capacity(KEY_FRAME_HEADER_SIZE + key.key_bytes.len());
    frame.extend_from_slice(&key.keyset_id.to_be_bytes());
    frame.extend_from_slice(&key.key_id.to_be_bytes());
    frame.push(key.algorithm_id);
    frame.push(len);
    frame.extend_from_slice(&key.key_bytes);
    Some(Zeroizing::new(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_frame_layout() {
        let key = KeyEntry::new(0x0102, 0x0304, 0x84, vec![0xDE, 0xAD]);
        let frame = key_frame(&key).unwrap();
        assert_eq!(
            frame.as_slice(),
            &[0x01, 0x02, 0x03, 0x04, 0x84, 0x02, 0xDE, 0xAD]
        );
    }

    #[test]
    fn test_key_frame_rejects_oversized() {
        let key = KeyEntry::new(1, 1, 0x84, vec![0; 256]);
        assert!(key_frame(&key).is_none());
    }

    #[test]
    fn test_session_markers_differ() {
        assert_ne!(session_start(), session_end());
    }
}
