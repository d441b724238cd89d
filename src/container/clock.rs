// KfdVault - Horloges monotones
//
// Le modele lit le temps via le trait `Clock` pour dater les
// modifications et les sauvegardes (politique de debounce).
// - `MonotonicClock` : millisecondes ecoulees depuis la creation
// - `ManualClock`    : horloge pilotee a la main (tests, simulation)

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Source de temps monotone en millisecondes.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Horloge basee sur `Instant`, ancree a la creation.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.anchor.elapsed().as_millis().min(u64::MAX as u128) as u64
    }
}

/// Horloge manuelle partageable : les clones voient le meme temps.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Fixe le temps courant.
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    /// Avance le temps courant.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
