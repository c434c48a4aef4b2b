use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::{DeliveryError, Result};

/// Chance that a parcel in transit is lost rather than delivered.
///
/// Clones share the value, so an admin update is seen by the scanner on its
/// next pass.
#[derive(Debug, Clone)]
pub struct LossProbability {
    bits: Arc<AtomicU64>,
}

impl LossProbability {
    pub fn new(probability: f64) -> Result<Self> {
        validate(probability)?;
        Ok(Self {
            bits: Arc::new(AtomicU64::new(probability.to_bits())),
        })
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Replaces the probability, rejecting values outside `0.0..=1.0`.
    pub fn set(&self, probability: f64) -> Result<()> {
        validate(probability)?;
        self.bits.store(probability.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Flips the weighted coin once.
    pub fn roll(&self) -> bool {
        rand::rng().random::<f64>() < self.get()
    }
}

impl Default for LossProbability {
    fn default() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(0.0f64.to_bits())),
        }
    }
}

fn validate(probability: f64) -> Result<()> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(DeliveryError::InvalidProbability(probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_values() {
        assert!(LossProbability::new(-0.1).is_err());
        assert!(LossProbability::new(1.5).is_err());
        assert!(LossProbability::new(f64::NAN).is_err());

        let loss = LossProbability::new(0.25).unwrap();
        assert!(loss.set(2.0).is_err());
        assert_eq!(loss.get(), 0.25);
    }

    #[test]
    fn extremes_are_deterministic() {
        let loss = LossProbability::default();
        assert!((0..100).all(|_| !loss.roll()));

        let shared = loss.clone();
        shared.set(1.0).unwrap();
        assert!((0..100).all(|_| loss.roll()));
    }
}
