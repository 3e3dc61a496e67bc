//! Adaptive KL penalty and learning-rate multiplier.
//!
//! After every policy update the measured KL is compared to the target:
//!
//! - `kl > 2 * kl_targ`: `beta = min(35, 1.5 * beta)`, and once `beta > 30`
//!   the learning-rate multiplier shrinks by 1.5x.
//! - `kl < kl_targ / 2`: `beta = max(1/35, beta / 1.5)`, and once
//!   `beta < 1/30` the multiplier grows by 1.5x.
//!
//! The multiplier is kept within `[0.1, 10]`.

use serde::{Deserialize, Serialize};

const BETA_MAX: f64 = 35.0;
const BETA_MIN: f64 = 1.0 / 35.0;
const LR_MULT_MIN: f64 = 0.1;
const LR_MULT_MAX: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlController {
    kl_targ: f64,
    beta: f64,
    lr_multiplier: f64,
}

impl KlController {
    pub fn new(kl_targ: f64, init_beta: f64) -> Self {
        Self {
            kl_targ,
            beta: init_beta,
            lr_multiplier: 1.0,
        }
    }

    pub fn kl_targ(&self) -> f64 {
        self.kl_targ
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn lr_multiplier(&self) -> f64 {
        self.lr_multiplier
    }

    /// Epoch loops stop once the KL exceeds this.
    pub fn early_stop_threshold(&self) -> f64 {
        4.0 * self.kl_targ
    }

    /// Adapt `beta` and the learning-rate multiplier to the observed KL.
    pub fn update(&mut self, kl: f64) {
        if kl > 2.0 * self.kl_targ {
            self.beta = (1.5 * self.beta).min(BETA_MAX);
            if self.beta > 30.0 && self.lr_multiplier > LR_MULT_MIN {
                self.lr_multiplier = (self.lr_multiplier / 1.5).max(LR_MULT_MIN);
            }
        } else if kl < self.kl_targ / 2.0 {
            self.beta = (self.beta / 1.5).max(BETA_MIN);
            if self.beta < 1.0 / 30.0 && self.lr_multiplier < LR_MULT_MAX {
                self.lr_multiplier = (self.lr_multiplier * 1.5).min(LR_MULT_MAX);
            }
        }
        tracing::debug!(
            kl,
            beta = self.beta,
            lr_multiplier = self.lr_multiplier,
            "KL controller updated"
        );
    }
}
