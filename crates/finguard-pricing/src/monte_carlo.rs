//! Monte Carlo pricing for European options
//!
//! Simulates terminal prices under geometric Brownian motion, splitting the
//! paths across blocking worker tasks. Each worker owns a seeded ChaCha RNG
//! so a fixed seed gives the same price regardless of scheduling.

use std::f64::consts::PI;

use futures::future::join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::instrument::Instrument;
use crate::valuation::{check_volatility, OptionTerms, Valuation};

/// Paths simulated between cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 1_000;

/// Default number of worker tasks
const DEFAULT_WORKERS: usize = 10;

/// Monte Carlo option pricer
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloPricer {
    /// Total simulated paths
    pub simulations: u64,
    /// Continuously compounded risk-free rate
    pub risk_free_rate: f64,
    /// Annualized volatility of the underlying
    pub volatility: f64,
    /// Blocking tasks the paths are split across
    pub workers: usize,
    /// Base RNG seed; random when unset
    pub seed: Option<u64>,
}

impl MonteCarloPricer {
    /// Create a pricer with the default worker count and a random seed
    pub fn new(simulations: u64, risk_free_rate: f64, volatility: f64) -> Self {
        Self {
            simulations,
            risk_free_rate,
            volatility,
            workers: DEFAULT_WORKERS,
            seed: None,
        }
    }

    /// Set the worker count
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Fix the RNG seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Price a European option.
    ///
    /// Workers poll `cancel` every 1000 paths; once it fires the run stops
    /// and [`Error::Cancelled`] is returned.
    pub async fn price(
        &self,
        cancel: &CancellationToken,
        instrument: &dyn Instrument,
        valuation: &Valuation,
    ) -> Result<f64> {
        check_volatility(self.volatility)?;
        if self.simulations == 0 {
            return Err(Error::InvalidInput(
                "simulations must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::InvalidInput("workers must be at least 1".to_string()));
        }

        let terms = OptionTerms::resolve(instrument, valuation)?;
        if terms.years == 0.0 {
            return Ok(terms.intrinsic());
        }

        let workers = (self.workers as u64).min(self.simulations);
        let per_worker = self.simulations / workers;
        let remainder = self.simulations % workers;
        let base_seed = self.seed.unwrap_or_else(rand::random);
        let path = PathModel::new(terms, self.risk_free_rate, self.volatility);

        debug!(
            instrument = %instrument.id(),
            simulations = self.simulations,
            workers = workers,
            "Starting Monte Carlo simulation"
        );

        let handles = (0..workers).map(|i| {
            let paths = per_worker + u64::from(i < remainder);
            let seed = base_seed.wrapping_add(i);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || path.simulate(paths, seed, &cancel))
        });

        let mut total_payoff = 0.0;
        let mut cancelled = false;
        for result in join_all(handles).await {
            match result {
                Ok(Some(sum)) => total_payoff += sum,
                Ok(None) => cancelled = true,
                Err(e) => return Err(Error::Task(e.to_string())),
            }
        }

        if cancelled || cancel.is_cancelled() {
            info!(instrument = %instrument.id(), "Monte Carlo simulation cancelled");
            return Err(Error::Cancelled);
        }

        let average = total_payoff / self.simulations as f64;
        Ok(average * (-self.risk_free_rate * terms.years).exp())
    }
}

/// Per-path constants of the GBM terminal price
#[derive(Debug, Clone, Copy)]
struct PathModel {
    terms: OptionTerms,
    drift: f64,
    diffusion: f64,
}

impl PathModel {
    fn new(terms: OptionTerms, rate: f64, volatility: f64) -> Self {
        Self {
            terms,
            drift: (rate - 0.5 * volatility * volatility) * terms.years,
            diffusion: volatility * terms.years.sqrt(),
        }
    }

    /// Sum of payoffs over `paths` paths, `None` if cancelled
    fn simulate(&self, paths: u64, seed: u64, cancel: &CancellationToken) -> Option<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut sum = 0.0;
        for j in 0..paths {
            if j % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return None;
            }
            let z = standard_normal(&mut rng);
            let terminal = self.terms.spot * (self.drift + self.diffusion * z).exp();
            sum += self.terms.kind.payoff(terminal, self.terms.strike);
        }
        Some(sum)
    }
}

/// Box-Muller draw from N(0, 1)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // 1 - [0, 1) keeps u1 away from ln(0)
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
