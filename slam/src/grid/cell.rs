use common::math::{LogOdds, Probability};
use serde::Deserialize;

/// The state kept for every cell of a map and how it is updated from observations.
pub trait GridCell: Clone + Send + Sync + 'static {
    /// Estimated probability that the cell is occupied.
    fn occupancy(&self) -> Probability;

    /// Integrates a single observation of the cell. `occupancy` is the inverse sensor model's
    /// belief that the cell is occupied, `quality` in `[0, 1]` scales how much it is trusted.
    fn observe(&mut self, occupancy: Probability, quality: f64);

    /// False until the cell received its first observation.
    fn is_known(&self) -> bool;
}

/// Selects which [`GridCell`] implementation the maps are built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum CellStrategy {
    #[default]
    LogOdds,
    Counting,
}

/// Bayesian occupancy estimate accumulated in log-odds form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogOddsCell {
    odds: LogOdds,
    known: bool,
}

impl LogOddsCell {
    /// Keeps cells from saturating so that they can be cleared again when the world changes.
    const LIMIT: f64 = 10.0;
}

impl Default for LogOddsCell {
    fn default() -> Self {
        Self {
            odds: Probability::UNKNOWN.log_odds(),
            known: false,
        }
    }
}

impl GridCell for LogOddsCell {
    fn occupancy(&self) -> Probability {
        self.odds.probability()
    }

    fn observe(&mut self, occupancy: Probability, quality: f64) {
        // certain beliefs have infinite log odds, scaling them by zero would poison the cell
        if quality <= 0.0 {
            return;
        }
        let update = LogOdds::new(occupancy.log_odds().value() * quality);
        self.odds = (self.odds + update).clamp(Self::LIMIT);
        self.known = true;
    }

    fn is_known(&self) -> bool {
        self.known
    }
}

/// Averages every observation of the cell, weighted by quality.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CountingCell {
    occupied: f64,
    observed: f64,
}

impl GridCell for CountingCell {
    fn occupancy(&self) -> Probability {
        if self.observed > 0.0 {
            Probability::new_unchecked(self.occupied / self.observed)
        } else {
            Probability::UNKNOWN
        }
    }

    fn observe(&mut self, occupancy: Probability, quality: f64) {
        self.occupied += occupancy.value() * quality;
        self.observed += quality;
    }

    fn is_known(&self) -> bool {
        self.observed > 0.0
    }
}
