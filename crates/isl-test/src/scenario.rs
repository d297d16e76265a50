//! Threaded producer/consumer scenarios
//!
//! One producer publishes a real signal every step while any number of
//! consumers read it back at the same simulated times, each from its own
//! thread and connector, all sharing one hub.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use isl_core::{Causality, IslError, IslResult, Settings, SignalType, Value};
use isl_session::{Connector, Hub};

/// Identifier of the exchanged signal
pub const SIGNAL: &str = "signal";

// ============================================================================
// PARTICIPANTS
// ============================================================================

/// Declare an owner participant with a single real IO
///
/// The participant is left unchecked; `create` checks it.
pub fn participant(
    hub: &Arc<Hub>,
    name: &str,
    io: &str,
    causality: Causality,
    end_time: f64,
    step: f64,
) -> IslResult<Connector> {
    let mut connector = Connector::new(hub, true);
    connector.new_model(name)?;
    connector.set_end_time(end_time)?;
    connector.set_step_size(step)?;
    connector.new_io(io, causality, SignalType::Real, 1)?;
    Ok(connector)
}

/// Value published at step `k`
pub fn sample(k: usize) -> f64 {
    k as f64 * 0.5 + 1.0
}

// ============================================================================
// SCENARIO
// ============================================================================

/// Configuration for a producer/consumer scenario
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Number of consumers
    pub consumers: usize,

    /// Number of published steps
    pub steps: usize,

    /// Simulated step size
    pub step_size: f64,

    /// FIFO depth of the produced signal
    pub fifo_depth: usize,

    /// Per-IO synchronization timeout in seconds
    pub sync_timeout: i32,

    /// Upper bound of the random pause between two steps
    pub jitter: Option<Duration>,

    /// Seed for the pauses
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            consumers: 2,
            steps: 50,
            step_size: 0.1,
            fifo_depth: 8,
            sync_timeout: 5,
            jitter: None,
            seed: 7,
        }
    }
}

impl ScenarioConfig {
    /// One consumer, a handful of steps
    pub fn minimal() -> Self {
        Self {
            consumers: 1,
            steps: 10,
            ..Self::default()
        }
    }

    pub fn standard() -> Self {
        Self::default()
    }

    /// Every reader slot in use, a shallow FIFO and random pauses
    pub fn stress() -> Self {
        Self {
            consumers: 4,
            steps: 300,
            fifo_depth: 4,
            jitter: Some(Duration::from_micros(300)),
            ..Self::default()
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = Some(jitter);
        self
    }

    fn end_time(&self) -> f64 {
        (self.steps + 1) as f64 * self.step_size
    }

    fn time_of(&self, k: usize) -> f64 {
        k as f64 * self.step_size
    }
}

/// Result of a scenario
#[derive(Debug, Clone, Default)]
pub struct ScenarioResult {
    /// Steps the producer published
    pub published: usize,

    /// `(time, value)` pairs read by each consumer
    pub received: Vec<Vec<(f64, f64)>>,

    /// Failures, one line each
    pub errors: Vec<String>,
}

impl ScenarioResult {
    /// Every consumer read every step, in order, with the published value
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
            && self.received.iter().all(|samples| {
                samples.len() == self.published
                    && samples.iter().enumerate().all(|(k, (_, v))| *v == sample(k))
            })
    }

    /// Times seen by each consumer never go backwards
    pub fn monotonic(&self) -> bool {
        self.received
            .iter()
            .all(|samples| samples.windows(2).all(|w| w[0].0 <= w[1].0))
    }
}

type Worker<T> = JoinHandle<(Connector, IslResult<T>)>;

/// Scenario harness
pub struct ScenarioHarness {
    config: ScenarioConfig,
    hub: Arc<Hub>,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            hub: Hub::with_config(Settings::compact()),
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Run the scenario to completion
    pub fn run(&mut self) -> ScenarioResult {
        let mut result = ScenarioResult::default();
        let (producer, consumers) = match self.setup() {
            Ok(parts) => parts,
            Err(e) => {
                result.errors.push(format!("setup: {}", e));
                return result;
            }
        };

        let workers: Vec<Worker<Vec<(f64, f64)>>> = consumers
            .into_iter()
            .enumerate()
            .map(|(i, c)| self.spawn_consumer(c, i as u64 + 1))
            .collect();
        let producer = self.spawn_producer(producer);

        let mut done = Vec::new();
        match producer.join() {
            Ok((connector, outcome)) => {
                match outcome {
                    Ok(n) => result.published = n,
                    Err(e) => result.errors.push(format!("producer: {}", e)),
                }
                done.push(connector);
            }
            Err(_) => result.errors.push("producer thread panicked".into()),
        }
        for (i, worker) in workers.into_iter().enumerate() {
            match worker.join() {
                Ok((connector, outcome)) => {
                    match outcome {
                        Ok(samples) => result.received.push(samples),
                        Err(e) => {
                            result.errors.push(format!("consumer {}: {}", i, e));
                            result.received.push(Vec::new());
                        }
                    }
                    done.push(connector);
                }
                Err(_) => result.errors.push(format!("consumer {} thread panicked", i)),
            }
        }

        for mut connector in done {
            if let Err(e) = connector.disconnect() {
                result.errors.push(format!("disconnect {}: {}", connector.name(), e));
            }
        }
        tracing::debug!(
            published = result.published,
            consumers = result.received.len(),
            errors = result.errors.len(),
            "scenario finished"
        );
        result
    }

    fn setup(&self) -> IslResult<(Connector, Vec<Connector>)> {
        let cfg = &self.config;
        let session = format!("scenario-{}", cfg.seed);

        let mut producer = participant(&self.hub, "producer", SIGNAL, Causality::Output, cfg.end_time(), cfg.step_size)?;
        if let Some(io) = producer.io_mut(SIGNAL) {
            io.set_fifo_depth(cfg.fifo_depth)?;
            io.set_sync_timeout(cfg.sync_timeout);
        }
        producer.create(Some(&session))?;
        producer.connect(true)?;

        let mut consumers = Vec::with_capacity(cfg.consumers);
        for i in 0..cfg.consumers {
            let name = format!("consumer{}", i);
            let mut consumer = participant(&self.hub, &name, SIGNAL, Causality::Input, cfg.end_time(), cfg.step_size)?;
            if let Some(io) = consumer.io_mut(SIGNAL) {
                io.set_sync_timeout(cfg.sync_timeout);
            }
            consumer.create(Some(&session))?;
            consumer.connect(true)?;
            consumers.push(consumer);
        }
        Ok((producer, consumers))
    }

    fn spawn_producer(&self, mut connector: Connector) -> Worker<usize> {
        let cfg = self.config.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(cfg.seed);
            let outcome = (|| -> IslResult<usize> {
                let io = connector
                    .io_mut(SIGNAL)
                    .ok_or_else(|| IslError::NotFound(SIGNAL.into()))?;
                for k in 0..cfg.steps {
                    io.set_value(Value::real(sample(k)))?;
                    io.set_data(cfg.time_of(k), true)?;
                    pause(&mut rng, cfg.jitter);
                }
                Ok(cfg.steps)
            })();
            (connector, outcome)
        })
    }

    fn spawn_consumer(&self, mut connector: Connector, salt: u64) -> Worker<Vec<(f64, f64)>> {
        let cfg = self.config.clone();
        thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(salt));
            let outcome = (|| -> IslResult<Vec<(f64, f64)>> {
                let io = connector
                    .io_mut(SIGNAL)
                    .ok_or_else(|| IslError::NotFound(SIGNAL.into()))?;
                let mut samples = Vec::with_capacity(cfg.steps);
                for k in 0..cfg.steps {
                    let time = io.get_data(cfg.time_of(k), true)?;
                    let value = io.value().as_real().unwrap_or(f64::NAN);
                    samples.push((time, value));
                    pause(&mut rng, cfg.jitter);
                }
                Ok(samples)
            })();
            (connector, outcome)
        })
    }
}

fn pause(rng: &mut StdRng, jitter: Option<Duration>) {
    if let Some(max) = jitter {
        let micros = rng.gen_range(0..=max.as_micros() as u64);
        if micros > 0 {
            thread::sleep(Duration::from_micros(micros));
        }
    }
}

/// Run the minimal scenario
pub fn test_minimal_exchange() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::minimal()).run()
}

/// Run the stress scenario
pub fn test_stress_exchange() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::stress()).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_minimal_scenario_passes() {
        let result = test_minimal_exchange();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.published, 10);
        assert!(result.passed());
        assert!(result.monotonic());
    }

    #[test]
    fn test_standard_scenario_times() {
        let result = ScenarioHarness::new(ScenarioConfig::standard()).run();
        assert!(result.passed(), "{:?}", result.errors);
        for samples in &result.received {
            for (k, (time, _)) in samples.iter().enumerate() {
                assert_eq!(*time, k as f64 * 0.1);
            }
        }
    }

    #[test]
    fn test_stress_scenario_passes() {
        let result = test_stress_exchange();
        assert!(result.passed(), "{:?}", result.errors);
        assert_eq!(result.received.len(), 4);
        assert!(result.monotonic());
    }

    #[test]
    fn test_too_many_consumers_fails_setup() {
        // compact settings allow four readers per output
        let mut harness = ScenarioHarness::new(ScenarioConfig {
            consumers: 5,
            steps: 2,
            ..ScenarioConfig::default()
        });
        let result = harness.run();
        assert!(!result.passed());
        assert!(result.errors[0].starts_with("setup"));
    }

    #[test]
    fn test_sims_table_lists_participants() {
        let mut harness = ScenarioHarness::new(ScenarioConfig::minimal());
        let (producer, consumers) = harness.setup().unwrap();
        assert_eq!(harness.hub().active_sims(), 2);
        drop(consumers);
        drop(producer);
        assert_eq!(harness.hub().active_sims(), 0);
        assert!(harness.run().passed());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_scenario_delivers_in_order(
            consumers in 1usize..=4,
            depth in 2usize..=6,
            steps in 1usize..40,
            seed in any::<u64>(),
        ) {
            let result = ScenarioHarness::new(ScenarioConfig {
                consumers,
                steps,
                fifo_depth: depth,
                jitter: Some(Duration::from_micros(100)),
                seed,
                ..ScenarioConfig::default()
            })
            .run();
            prop_assert!(result.passed(), "{:?}", result.errors);
            prop_assert!(result.monotonic());
        }
    }
}
