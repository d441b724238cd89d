// KfdVault - Lien trois fils (data, clock, enable)
//
// Le lien est pilote bit par bit : chaque bit positionne la ligne data,
// puis la ligne clock passe a l'etat haut puis bas, avec un delai de
// stabilisation autour de chaque front. Les octets partent MSB en premier.
//
// # Trait
// `ThreeWireLink` expose les trois lignes et une attente en microsecondes.
// Le cadrage (`send_bit`, `send_byte`, `send_frame`) est fourni par defaut
// et ne depend que de ces primitives.
//
// # Implementations
// - `TraceLink` : aucune ligne physique, enregistre les bits emis et
//   trace chaque trame (utilise par la CLI)
//
// Les delais sont des parametres de `LinkTiming`, reglables par famille
// de radio ; ils n'influencent pas la correction du cadrage.

use crate::constants::{DEFAULT_BIT_SETTLE_US, DEFAULT_ENABLE_SETTLE_US};
use crate::error::LinkError;
use tracing::{debug, trace};

/// Delais de stabilisation du lien.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Attente autour de chaque front d'horloge
    pub bit_settle_us: u32,
    /// Attente apres changement de la ligne enable
    pub enable_settle_us: u32,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            bit_settle_us: DEFAULT_BIT_SETTLE_US,
            enable_settle_us: DEFAULT_ENABLE_SETTLE_US,
        }
    }
}

/// Lien serie a trois lignes.
pub trait ThreeWireLink {
    /// Positionne la ligne data.
    fn set_data(&mut self, high: bool) -> Result<(), LinkError>;

    /// Positionne la ligne clock.
    fn set_clock(&mut self, high: bool) -> Result<(), LinkError>;

    /// Positionne la ligne enable.
    fn set_enable(&mut self, asserted: bool) -> Result<(), LinkError>;

    /// Attente bloquante courte.
    fn delay_us(&mut self, us: u32);

    /// Delais utilises par le cadrage.
    fn timing(&self) -> LinkTiming {
        LinkTiming::default()
    }

    /// Emet un bit : data, attente, clock haut, attente, clock bas.
    fn send_bit(&mut self, bit: bool) -> Result<(), LinkError> {
        let settle = self.timing().bit_settle_us;
        self.set_data(bit)?;
        self.delay_us(settle);
        self.set_clock(true)?;
        self.delay_us(settle);
        self.set_clock(false)
    }

    /// Emet un octet, MSB en premier.
    fn send_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        (0..8)
            .rev()
            .try_for_each(|shift| self.send_bit((byte >> shift) & 1 == 1))
    }

    /// Emet une trame complete.
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        frame.iter().try_for_each(|&b| self.send_byte(b))
    }

    /// Active ou desactive le lien puis attend sa stabilisation.
    fn enable(&mut self, asserted: bool) -> Result<(), LinkError> {
        self.set_enable(asserted)?;
        let settle = self.timing().enable_settle_us;
        self.delay_us(settle);
        Ok(())
    }
}

/// Lien sans materiel : reconstruit les octets a partir des fronts d'horloge.
#[derive(Debug, Default)]
pub struct TraceLink {
    timing: LinkTiming,
    data: bool,
    clock: bool,
    enabled: bool,
    bits: Vec<bool>,
    waited_us: u64,
}

impl TraceLink {
    pub fn new(timing: LinkTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    /// Octets complets echantillonnes sur les fronts montants.
    pub fn bytes(&self) -> Vec<u8> {
        self.bits
            .chunks_exact(8)
            .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
            .collect()
    }

    /// Nombre de bits echantillonnes.
    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    /// Etat de la ligne enable.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Temps cumule passe en attente (microsecondes).
    pub fn waited_us(&self) -> u64 {
        self.waited_us
    }
}

impl ThreeWireLink for TraceLink {
    fn set_data(&mut self, high: bool) -> Result<(), LinkError> {
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
        debug!(asserted, "link enable");
        self.enabled = asserted;
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.waited_us += u64::from(us);
    }

    fn timing(&self) -> LinkTiming {
        self.timing
    }

    fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        trace!(frame = %hex::encode_upper(frame), "link frame");
        frame.iter().try_for_each(|&b| self.send_byte(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Enregistre chaque operation de ligne.
    #[derive(Default)]
    struct EdgeLog {
        ops: Vec<(&'static str, bool)>,
    }

    impl ThreeWireLink for EdgeLog {
        fn set_data(&mut self, high: bool) -> Result<(), LinkError> {
            self.ops.push(("data", high));
            Ok(())
        }
        fn set_clock(&mut self, high: bool) -> Result<(), LinkError> {
            self.ops.push(("clock", high));
            Ok(())
        }
        fn set_enable(&mut self, asserted: bool) -> Result<(), LinkError> {
            self.ops.push(("enable", asserted));
            Ok(())
        }
        fn delay_us(&mut self, _us: u32) {
            self.ops.push(("delay", true));
        }
    }

    #[test]
    fn test_send_bit_sequence() {
        let mut link = EdgeLog::default();
        link.send_bit(true).unwrap();
        assert_eq!(
            link.ops,
            vec![
                ("data", true),
                ("delay", true),
                ("clock", true),
                ("delay", true),
                ("clock", false),
            ]
        );
    }

    #[test]
    fn test_send_byte_msb_first() {
        let mut link = EdgeLog::default();
        link.send_byte(0b1000_0001).unwrap();
        let data: Vec<bool> = link
            .ops
            .iter()
            .filter(|(l, _)| *l == "data")
            .map(|&(_, v)| v)
            .collect();
        assert_eq!(data, vec![true, false, false, false, false, false, false, true]);
    }

    #[test]
    fn test_trace_link_reassembles_bytes() {
        let mut link = TraceLink::new(LinkTiming {
            bit_settle_us: 2,
            enable_settle_us: 10,
        });
        link.enable(true).unwrap();
        link.send_frame(&[0xAA, 0x55, 0x01]).unwrap();
        assert!(link.is_enabled());
        assert_eq!(link.bytes(), vec![0xAA, 0x55, 0x01]);
        assert_eq!(link.bit_count(), 24);
        // 24 bits x 2 attentes x 2 us + 10 us pour enable
        assert_eq!(link.waited_us(), 24 * 2 * 2 + 10);
    }

    #[test]
    fn test_default_timing() {
        let t = LinkTiming::default();
        assert_eq!(t.bit_settle_us, 5);
        assert_eq!(t.enable_settle_us, 50);
    }
}
