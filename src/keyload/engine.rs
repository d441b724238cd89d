// KfdVault - Moteur de session keyload
//
// Machine a etats cooperative : chaque appel a `tick()` fait avancer la
// session d'une etape, et au plus une cle est traitee par tick.
//
// ```text
// Idle --begin_session--> SessionStart --tick--> SendingKeys --tick--> ...
//   ^                                                 |
//   |                                     curseur en fin | echec du lien
//   |                                                 v           v
//   +---------------tick------------------ SessionEnd        Error
//   +---------------tick-------------------------------------- +
// ```
//
// # Instantane
// `begin_session` clone le conteneur : les modifications du modele
// pendant la session n'ont aucun effet sur les trames emises.
//
// # Selection
// Seules les cles selectionnees et non vides sont transmises ; les
// autres sont sautees sans emission (un tick chacune).
//
// # Fin de session
// Le passage a Idle depuis SessionEnd ou Error retourne un
// `SessionOutcome`. `cancel()` desactive le lien, revient directement
// a Idle et retourne `Cancelled` (distinct d'un echec du lien).

use crate::container::entry::KeyContainer;
use crate::error::{KeyloadError, LinkError};
use crate::keyload::frame;
use crate::keyload::link::ThreeWireLink;
use tracing::{debug, error, info, warn};

/// Etat observable du moteur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SessionStart,
    SendingKeys,
    SessionEnd,
    Error,
}

/// Notification terminale d'une session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Toutes les cles selectionnees ont ete emises
    Completed { sent: u32 },
    /// Echec du lien, session abandonnee
    Failed(LinkError),
    /// Annulation externe par `cancel()`
    Cancelled,
}

/// Donnees privees d'une session en cours.
#[derive(Debug)]
struct Session {
    snapshot: KeyContainer,
    cursor: usize,
}

#[derive(Debug)]
enum Phase {
    Idle,
    SessionStart(Session),
    SendingKeys(Session),
    SessionEnd { sent: u32 },
    Error(LinkError),
}

/// Moteur keyload proprietaire de son lien.
pub struct KeyloadEngine<L: ThreeWireLink> {
    link: L,
    phase: Phase,
    sent: u32,
    total: u32,
}

impl<L: ThreeWireLink> KeyloadEngine<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            phase: Phase::Idle,
            sent: 0,
            total: 0,
        }
    }

    /// Demarre une session sur une copie du conteneur.
    pub fn begin_session(&mut self, container: &KeyContainer) -> Result<(), KeyloadError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(KeyloadError::Busy);
        }
        if !container.is_valid_for_keyload() {
            return Err(KeyloadError::NotValid);
        }

        self.sent = 0;
        self.total = container.transmittable_count() as u32;
        self.phase = Phase::SessionStart(Session {
            snapshot: container.clone(),
            cursor: 0,
        });
        info!(
            container = %container.label,
            keys = container.keys.len(),
            selected = self.total,
            "keyload session started"
        );
        Ok(())
    }

    /// Avance la session d'une etape. Retourne le resultat quand la
    /// session se termine (retour a Idle).
    pub fn tick(&mut self) -> Option<SessionOutcome> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let (next, outcome) = self.step(phase);
        self.phase = next;
        outcome
    }

    fn step(&mut self, phase: Phase) -> (Phase, Option<SessionOutcome>) {
        match phase {
            Phase::Idle => (Phase::Idle, None),
            Phase::SessionStart(session) => (self.start(session), None),
            Phase::SendingKeys(session) => (self.send_next(session), None),
            Phase::SessionEnd { sent } => {
                info!(sent, "keyload complete");
                (Phase::Idle, Some(SessionOutcome::Completed { sent }))
            }
            Phase::Error(e) => (Phase::Idle, Some(SessionOutcome::Failed(e))),
        }
    }

    fn start(&mut self, session: Session) -> Phase {
        let result = self
            .link
            .enable(true)
            .and_then(|_| self.link.send_frame(frame::session_start()));
        match result {
            Ok(()) => {
                debug!("session start frame sent");
                Phase::SendingKeys(Session { cursor: 0, ..session })
            }
            Err(e) => self.fail(e),
        }
    }

    fn send_next(&mut self, mut session: Session) -> Phase {
        let Some(key) = session.snapshot.keys.get(session.cursor) else {
            return match self.finish() {
                Ok(()) => Phase::SessionEnd { sent: self.sent },
                Err(e) => self.fail(e),
            };
        };

        if !key.is_transmittable() {
            debug!(slot = session.cursor, "key skipped (not selected or empty)");
            session.cursor += 1;
            return Phase::SendingKeys(session);
        }

        let sent = match frame::key_frame(key) {
            Some(bytes) => self.link.send_frame(&bytes),
            None => Err(LinkError::Line {
                line: "data",
                reason: format!("key frame too long ({} bytes)", key.key_bytes.len()),
            }),
        };
        match sent {
            Ok(()) => {
                self.sent += 1;
                debug!(
                    slot = session.cursor,
                    keyset = key.keyset_id,
                    key_id = key.key_id,
                    progress = self.sent,
                    total = self.total,
                    "key frame sent"
                );
                session.cursor += 1;
                Phase::SendingKeys(session)
            }
            Err(e) => self.fail(e),
        }
    }

    fn finish(&mut self) -> Result<(), LinkError> {
        self.link.send_frame(frame::session_end())?;
        self.link.enable(false)
    }

    fn fail(&mut self, e: LinkError) -> Phase {
        error!(error = %e, sent = self.sent, "keyload failed");
        if let Err(release) = self.link.enable(false) {
            warn!(error = %release, "enable line release failed");
        }
        Phase::Error(e)
    }

    /// Annule la session en cours. Retourne `Cancelled` si une session
    /// etait en cours, `None` sinon.
    pub fn cancel(&mut self) -> Option<SessionOutcome> {
        match self.phase {
            Phase::SessionStart(_) | Phase::SendingKeys(_) => {
                if let Err(e) = self.link.enable(false) {
                    warn!(error = %e, "enable line release failed on cancel");
                }
                self.phase = Phase::Idle;
                info!(sent = self.sent, total = self.total, "keyload cancelled");
                Some(SessionOutcome::Cancelled)
            }
            _ => None,
        }
    }

    /// Progression : (cles emises, cles selectionnees).
    pub fn progress(&self) -> (u32, u32) {
        (self.sent, self.total)
    }

    /// Etat courant.
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::SessionStart(_) => SessionState::SessionStart,
            Phase::SendingKeys(_) => SessionState::SendingKeys,
            Phase::SessionEnd { .. } => SessionState::SessionEnd,
            Phase::Error(_) => SessionState::Error,
        }
    }

    /// Lien sous-jacent.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Lien sous-jacent (mutable).
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::entry::KeyEntry;

    /// Lien de test : enregistre les octets et peut echouer apres N bits.
    #[derive(Default)]
    struct RecordingLink {
        data: bool,
        clock: bool,
        enabled: bool,
        enable_changes: Vec<bool>,
        bits: Vec<bool>,
        fail_after_bits: Option<usize>,
        fail_enable: bool,
    }

    impl RecordingLink {
        fn bytes(&self) -> Vec<u8> {
            self.bits
                .chunks_exact(8)
                .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
                .collect()
        }
    }

    impl ThreeWireLink for RecordingLink {
        fn set_data(&mut self, high: bool) -> Result<(), LinkError> {
            if self.fail_after_bits.map_or(false, |n| self.bits.len() >= n) {
                return Err(LinkError::Line {
                    line: "data",
                    reason: "stuck".into(),
                });
            }
            self.data = high;
            Ok(())
        }
        fn set_clock(&mut self, high: bool) -> Result<(), LinkError> {
            if high && !self.clock {
                self.bits.push(self.data);
            }
            self.clock = high;
            Ok(())
        }
        fn set_enable(&mut self, asserted: bool) -> Result<(), LinkError> {
            if asserted && self.fail_enable {
                return Err(LinkError::Line {
                    line: "enable",
                    reason: "not driven".into(),
                });
            }
            self.enabled = asserted;
            self.enable_changes.push(asserted);
            Ok(())
        }
        fn delay_us(&mut self, _us: u32) {}
    }

    fn three_keys() -> KeyContainer {
        KeyContainer::new("Patrol")
            .with_key(KeyEntry::new(1, 1, 0xAA, vec![0x11; 4]))
            .with_key(KeyEntry::new(1, 2, 0xAA, vec![0x22; 4]).with_selected(false))
            .with_key(KeyEntry::new(1, 3, 0xAA, vec![0x33; 4]))
    }

    fn run(engine: &mut KeyloadEngine<RecordingLink>) -> (SessionOutcome, usize) {
        for ticks in 1..100 {
            if let Some(outcome) = engine.tick() {
                return (outcome, ticks);
            }
        }
        panic!("session never finished");
    }

    #[test]
    fn test_validity_gating() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        let empty_key = KeyContainer::new("E").with_key(KeyEntry::new(1, 1, 0xAA, vec![]));
        assert_eq!(engine.begin_session(&empty_key), Err(KeyloadError::NotValid));
        assert_eq!(
            engine.begin_session(&KeyContainer::new("none")),
            Err(KeyloadError::NotValid)
        );
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(engine.begin_session(&three_keys()).is_ok());
        assert_eq!(engine.state(), SessionState::SessionStart);
    }

    #[test]
    fn test_busy_while_active() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        engine.begin_session(&three_keys()).unwrap();
        engine.tick();
        assert_eq!(engine.begin_session(&three_keys()), Err(KeyloadError::Busy));
        assert_eq!(engine.state(), SessionState::SendingKeys);
    }

    #[test]
    fn test_selected_only_transmission() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        engine.begin_session(&three_keys()).unwrap();
        assert_eq!(engine.progress(), (0, 2));

        let (outcome, ticks) = run(&mut engine);
        assert_eq!(outcome, SessionOutcome::Completed { sent: 2 });
        // start + 3 cles + fin de curseur + SessionEnd->Idle
        assert_eq!(ticks, 6);
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.progress(), (2, 2));

        let mut expected = vec![0xAA, 0x55];
        expected.extend_from_slice(&[0, 1, 0, 1, 0xAA, 4, 0x11, 0x11, 0x11, 0x11]);
        expected.extend_from_slice(&[0, 1, 0, 3, 0xAA, 4, 0x33, 0x33, 0x33, 0x33]);
        expected.extend_from_slice(&[0x55, 0xAA]);
        assert_eq!(engine.link().bytes(), expected);
        assert_eq!(engine.link().enable_changes, vec![true, false]);
    }

    #[test]
    fn test_session_uses_snapshot() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        let mut live = three_keys();
        engine.begin_session(&live).unwrap();
        live.keys.clear();
        live.label = "edited".into();
        let (outcome, _) = run(&mut engine);
        assert_eq!(outcome, SessionOutcome::Completed { sent: 2 });
    }

    #[test]
    fn test_link_failure_goes_error_then_idle() {
        let link = RecordingLink {
            fail_after_bits: Some(16 + 20),
            ..RecordingLink::default()
        };
        let mut engine = KeyloadEngine::new(link);
        engine.begin_session(&three_keys()).unwrap();
        engine.tick(); // SessionStart -> SendingKeys
        assert!(engine.tick().is_none());
        assert_eq!(engine.state(), SessionState::Error);
        assert!(!engine.link().enabled);

        match engine.tick() {
            Some(SessionOutcome::Failed(LinkError::Line { line, .. })) => assert_eq!(line, "data"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.progress(), (0, 2));

        // Pret pour une nouvelle session
        engine.link_mut().fail_after_bits = None;
        assert!(engine.begin_session(&three_keys()).is_ok());
    }

    #[test]
    fn test_cancel_deasserts_enable() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        engine.begin_session(&three_keys()).unwrap();
        engine.tick();
        engine.tick();
        assert!(engine.link().enabled);
        assert_eq!(engine.cancel(), Some(SessionOutcome::Cancelled));
        assert!(!engine.link().enabled);
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.progress(), (1, 2));
        assert!(engine.tick().is_none());
        assert_eq!(engine.cancel(), None);
    }

    #[test]
    fn test_cancel_before_first_tick() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        engine.begin_session(&three_keys()).unwrap();
        assert_eq!(engine.cancel(), Some(SessionOutcome::Cancelled));
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(engine.link().bits.is_empty());
        assert!(engine.begin_session(&three_keys()).is_ok());
    }

    #[test]
    fn test_enable_failure_at_start_goes_error_then_idle() {
        let link = RecordingLink {
            fail_enable: true,
            ..RecordingLink::default()
        };
        let mut engine = KeyloadEngine::new(link);
        engine.begin_session(&three_keys()).unwrap();

        assert!(engine.tick().is_none());
        assert_eq!(engine.state(), SessionState::Error);
        assert!(!engine.link().enabled);
        assert_eq!(engine.link().enable_changes, vec![false]);
        assert!(engine.link().bits.is_empty());

        match engine.tick() {
            Some(SessionOutcome::Failed(LinkError::Line { line, .. })) => assert_eq!(line, "enable"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.progress(), (0, 2));
    }

    #[test]
    fn test_idle_tick_is_noop() {
        let mut engine = KeyloadEngine::new(RecordingLink::default());
        assert!(engine.tick().is_none());
        assert!(engine.link().bits.is_empty());
    }
}
