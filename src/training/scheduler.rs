//! Cosine learning-rate schedule with linear warm-up and warm restarts.
//!
//! Training is split into five segments at fixed fractions of the total step
//! count (`0.05`, `0.15`, `0.30`, `0.50`, then the remainder). At the start of
//! every segment the scheduler rescales its warm-up, hold and decay lengths by
//! the segment's width and restarts its local step counter, so the rate drops
//! back to the warm-up rate and climbs again.
//!
//! Within a segment of length `T` with `W` warm-up and `H` hold steps:
//!
//! ```text
//! step < W          : warmup_rate + (base_rate - warmup_rate) * step / W
//! W <= step <= W + H: base_rate
//! step > W + H      : 0.5 * base_rate * (1 + cos(pi * (step - W - H) / (T - W - H)))
//! ```
//!
//! and the result is floored at `min_rate`.

use crate::core::config::{ConfigError, SchedulerConfig};
use crate::core::constants::RESTART_POINTS;
use std::f64::consts::PI;
use tracing::debug;

/// Schedule-wide parameters. Step counts cover the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmRestartParams {
    /// Peak learning rate.
    pub base_rate: f64,
    /// Total optimization steps.
    pub total_steps: usize,
    /// Learning rate at the first warm-up step.
    pub warmup_rate: f64,
    /// Warm-up steps.
    pub warmup_steps: usize,
    /// Steps held at the peak after warm-up.
    pub hold_steps: usize,
    /// Lower bound of the learning rate.
    pub min_rate: f64,
}

impl Default for WarmRestartParams {
    fn default() -> Self {
        Self {
            base_rate: 1e-4,
            total_steps: 1,
            warmup_rate: 0.0,
            warmup_steps: 0,
            hold_steps: 0,
            min_rate: 0.0,
        }
    }
}

/// Lengths of the active segment, scaled from the schedule-wide values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Steps in the segment.
    pub total: f64,
    /// Warm-up steps.
    pub warmup: f64,
    /// Hold steps.
    pub hold: f64,
}

/// Stateful warm-restart scheduler, advanced once per optimization step.
#[derive(Debug, Clone)]
pub struct WarmRestartScheduler {
    params: WarmRestartParams,
    restart_steps: Vec<usize>,
    widths: Vec<f64>,
    segment: Segment,
    segment_index: usize,
    local_step: usize,
    global_step: usize,
    history: Vec<f64>,
}

impl WarmRestartScheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSchedule`] if `total_steps` is zero or
    /// smaller than `warmup_steps`, if `base_rate` is below `warmup_rate`
    /// while warm-up is enabled, or if a rate is negative or not finite.
    pub fn new(params: WarmRestartParams) -> Result<Self, ConfigError> {
        validate(&params)?;

        // Starts that truncate to the same step leave the earlier segment
        // empty; only the last one of them runs.
        let mut restart_steps = Vec::with_capacity(RESTART_POINTS.len() + 1);
        let mut widths = Vec::with_capacity(RESTART_POINTS.len() + 1);
        let mut start = 0.0;
        for end in RESTART_POINTS.into_iter().chain(std::iter::once(1.0)) {
            let step = (start * params.total_steps as f64) as usize;
            if restart_steps.last() == Some(&step) {
                restart_steps.pop();
                widths.pop();
            }
            restart_steps.push(step);
            widths.push(end - start);
            start = end;
        }

        Ok(Self {
            params,
            restart_steps,
            widths,
            segment: Segment {
                total: params.total_steps as f64,
                warmup: params.warmup_steps as f64,
                hold: params.hold_steps as f64,
            },
            segment_index: 0,
            local_step: 0,
            global_step: 0,
            history: Vec::new(),
        })
    }

    /// Derives the schedule from training parameters and the training set size.
    ///
    /// Steps are counted in batches: `epochs * samples / batch_size` in total,
    /// warm-up over the first `warmup_fraction` of the epochs, a hold of
    /// `samples` steps, and rates relative to `learning_rate`.
    pub fn from_training(config: &SchedulerConfig, samples: usize) -> Result<Self, ConfigError> {
        if config.batch_size == 0 {
            return Err(ConfigError::schedule("batch_size must be greater than 0"));
        }
        let warmup_epochs = (config.epochs as f64 * config.warmup_fraction) as usize;
        Self::new(WarmRestartParams {
            base_rate: config.learning_rate,
            total_steps: config.epochs * samples / config.batch_size,
            warmup_rate: config.learning_rate * config.warmup_factor,
            warmup_steps: warmup_epochs * samples / config.batch_size,
            hold_steps: samples,
            min_rate: config.learning_rate * config.min_factor,
        })
    }

    /// Returns the learning rate for the upcoming step and advances.
    pub fn next_step(&mut self) -> f64 {
        if self.restart_steps.get(self.segment_index) == Some(&self.global_step) {
            if let Some(width) = self.widths.get(self.segment_index) {
                self.segment = Segment {
                    total: self.params.total_steps as f64 * width,
                    warmup: self.params.warmup_steps as f64 * width,
                    hold: self.params.hold_steps as f64 * width,
                };
                self.local_step = 0;
                self.segment_index += 1;
            }
        }

        let rate = self.rate_at(self.local_step as f64);
        debug!(
            "Step {} (segment {}, local {}): learning rate {:e}",
            self.global_step, self.segment_index, self.local_step, rate
        );
        self.history.push(rate);
        self.local_step += 1;
        self.global_step += 1;
        rate
    }

    fn rate_at(&self, step: f64) -> f64 {
        let WarmRestartParams {
            base_rate,
            warmup_rate,
            min_rate,
            ..
        } = self.params;
        let Segment {
            total,
            warmup,
            hold,
        } = self.segment;

        let decay_steps = total - warmup - hold;
        let progress = if decay_steps > 0.0 {
            ((step - warmup - hold) / decay_steps).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let mut rate = 0.5 * base_rate * (1.0 + (PI * progress).cos());

        if hold > 0.0 && step <= warmup + hold {
            rate = base_rate;
        }
        if warmup > 0.0 && step < warmup {
            let slope = (base_rate - warmup_rate) / warmup;
            rate = slope * step + warmup_rate;
        }
        rate.max(min_rate)
    }

    /// Steps taken so far.
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Steps taken within the current segment.
    pub fn local_step(&self) -> usize {
        self.local_step
    }

    /// Number of segments started so far.
    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    /// The active segment.
    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Global steps at which a new segment starts.
    ///
    /// Runs shorter than twenty steps have fewer than five distinct starts.
    pub fn restart_steps(&self) -> &[usize] {
        &self.restart_steps
    }

    /// Every rate returned so far, in order.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Schedule parameters.
    pub fn params(&self) -> &WarmRestartParams {
        &self.params
    }
}

fn validate(params: &WarmRestartParams) -> Result<(), ConfigError> {
    for (name, rate) in [
        ("base_rate", params.base_rate),
        ("warmup_rate", params.warmup_rate),
        ("min_rate", params.min_rate),
    ] {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::schedule(format!(
                "{name} must be a non-negative finite number, got {rate}"
            )));
        }
    }
    if params.total_steps == 0 {
        return Err(ConfigError::schedule("total_steps must be greater than 0"));
    }
    if params.total_steps < params.warmup_steps {
        return Err(ConfigError::schedule(format!(
            "total_steps ({}) must be larger or equal to warmup_steps ({})",
            params.total_steps, params.warmup_steps
        )));
    }
    if params.warmup_steps > 0 && params.base_rate < params.warmup_rate {
        return Err(ConfigError::schedule(format!(
            "base_rate ({}) must be larger or equal to warmup_rate ({})",
            params.base_rate, params.warmup_rate
        )));
    }
    Ok(())
}
