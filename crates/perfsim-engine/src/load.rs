//! Degrading load simulator.
//!
//! Invoked once per inbound request by a load-test harness. Latency grows
//! linearly with the number of requests in flight above a soft limit, each
//! request holds a memory buffer for its lifetime, and requests that run
//! long enough start failing at random with one of a fixed pool of synthetic
//! errors. Unlike the other simulators this one keeps no registry records;
//! it tracks its own concurrency and statistics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use perfsim_types::{LoadTestStats, LoadTestStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::burn::burn_for;
use crate::config::LoadConfig;
use crate::error::{EngineError, EngineResult};

const PAGE_SIZE: usize = 4096;

/// Per-request work parameters. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadParams {
    /// CPU intensity; each cycle burns `work_iterations / 10` ms.
    pub work_iterations: u64,

    /// Memory held for the duration of the request.
    pub buffer_size_kb: u64,

    /// Minimum latency.
    pub baseline_delay_ms: u64,

    /// Concurrency below which no delay is added.
    pub soft_limit: usize,

    /// Milliseconds added per request in flight above the soft limit.
    pub degradation_factor: u64,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            work_iterations: 200,
            buffer_size_kb: 100,
            baseline_delay_ms: 100,
            soft_limit: 20,
            degradation_factor: 100,
        }
    }
}

/// Target duration of a request that observed `current_concurrent` in flight.
pub fn planned_duration_ms(current_concurrent: usize, params: &LoadParams) -> u64 {
    let excess = current_concurrent.saturating_sub(params.soft_limit) as u64;
    params
        .baseline_delay_ms
        .saturating_add(excess.saturating_mul(params.degradation_factor))
}

/// Failures injected into long-running requests.
///
/// These are the product, not bugs: they propagate to the caller as-is so
/// dashboards show a realistic mix of error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntheticFailure {
    #[error("database query timed out")]
    DatabaseTimeout,
    #[error("connection refused by upstream")]
    ConnectionRefused,
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("deadlock detected while acquiring row lock")]
    DeadlockDetected,
    #[error("connection pool exhausted")]
    PoolExhausted,
    #[error("operation is not valid in the current state")]
    InvalidOperation,
    #[error("argument out of range")]
    ArgumentOutOfRange,
    #[error("failed to serialize response payload")]
    SerializationFailure,
    #[error("downstream dependency unavailable")]
    DownstreamUnavailable,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("resource is locked by another request")]
    ResourceLocked,
    #[error("request payload is corrupt")]
    CorruptPayload,
    #[error("authentication token expired")]
    AuthTokenExpired,
    #[error("disk I/O failure")]
    IoFailure,
    #[error("insufficient memory to complete the operation")]
    InsufficientMemory,
}

impl SyntheticFailure {
    pub const ALL: [SyntheticFailure; 15] = [
        SyntheticFailure::DatabaseTimeout,
        SyntheticFailure::ConnectionRefused,
        SyntheticFailure::ConnectionReset,
        SyntheticFailure::DeadlockDetected,
        SyntheticFailure::PoolExhausted,
        SyntheticFailure::InvalidOperation,
        SyntheticFailure::ArgumentOutOfRange,
        SyntheticFailure::SerializationFailure,
        SyntheticFailure::DownstreamUnavailable,
        SyntheticFailure::RateLimited,
        SyntheticFailure::ResourceLocked,
        SyntheticFailure::CorruptPayload,
        SyntheticFailure::AuthTokenExpired,
        SyntheticFailure::IoFailure,
        SyntheticFailure::InsufficientMemory,
    ];

    /// Stable category code for responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SyntheticFailure::DatabaseTimeout => "DATABASE_TIMEOUT",
            SyntheticFailure::ConnectionRefused => "CONNECTION_REFUSED",
            SyntheticFailure::ConnectionReset => "CONNECTION_RESET",
            SyntheticFailure::DeadlockDetected => "DEADLOCK_DETECTED",
            SyntheticFailure::PoolExhausted => "POOL_EXHAUSTED",
            SyntheticFailure::InvalidOperation => "INVALID_OPERATION",
            SyntheticFailure::ArgumentOutOfRange => "ARGUMENT_OUT_OF_RANGE",
            SyntheticFailure::SerializationFailure => "SERIALIZATION_FAILURE",
            SyntheticFailure::DownstreamUnavailable => "DOWNSTREAM_UNAVAILABLE",
            SyntheticFailure::RateLimited => "RATE_LIMITED",
            SyntheticFailure::ResourceLocked => "RESOURCE_LOCKED",
            SyntheticFailure::CorruptPayload => "CORRUPT_PAYLOAD",
            SyntheticFailure::AuthTokenExpired => "AUTH_TOKEN_EXPIRED",
            SyntheticFailure::IoFailure => "IO_FAILURE",
            SyntheticFailure::InsufficientMemory => "INSUFFICIENT_MEMORY",
        }
    }

    fn pick(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Timing and diagnostics for one completed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadWorkResult {
    pub elapsed_ms: u64,
    pub planned_duration_ms: u64,
    pub concurrent_at_start: usize,
    pub degradation_delay_ms: u64,
    pub cycles: u32,
    pub buffer_size_kb: u64,
    pub worker: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
struct Accumulator {
    completed: u64,
    response_sum_ms: f64,
    response_max_ms: f64,
    peak_concurrent: usize,
    exceptions: u64,
}

impl Accumulator {
    fn snapshot(&self, current_concurrent: usize, window: Duration) -> LoadTestStats {
        let secs = window.as_secs_f64();
        LoadTestStats {
            current_concurrent,
            peak_concurrent: self.peak_concurrent,
            requests_completed: self.completed,
            avg_response_time_ms: if self.completed > 0 {
                self.response_sum_ms / self.completed as f64
            } else {
                0.0
            },
            max_response_time_ms: self.response_max_ms,
            requests_per_second: if secs > 0.0 {
                self.completed as f64 / secs
            } else {
                0.0
            },
            exception_count: self.exceptions,
            timestamp: Utc::now(),
        }
    }
}

struct Stats {
    lifetime: Accumulator,
    lifetime_started: Instant,
    period: Accumulator,
    period_started: Instant,
}

/// How a request left `execute_work`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Completed,
    Failed,
    Cancelled,
}

/// Owns one in-flight slot. Dropping it releases the slot and records the
/// request in the statistics, so a request whose future is dropped midway
/// is still accounted for.
struct InFlight<'a> {
    sim: &'a DegradingLoadSimulator,
    started: Instant,
    settled: Settled,
}

impl<'a> InFlight<'a> {
    fn enter(sim: &'a DegradingLoadSimulator) -> (Self, usize) {
        let current = sim.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut stats = sim.stats.lock();
            stats.lifetime.peak_concurrent = stats.lifetime.peak_concurrent.max(current);
            stats.period.peak_concurrent = stats.period.peak_concurrent.max(current);
        }
        let guard = Self {
            sim,
            started: Instant::now(),
            settled: Settled::Cancelled,
        };
        (guard, current)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if self.settled == Settled::Cancelled {
            debug!(elapsed_ms = elapsed_ms as u64, "Load request cancelled");
        }

        {
            let mut guard = self.sim.stats.lock();
            let stats = &mut *guard;
            match self.settled {
                Settled::Completed => {
                    for acc in [&mut stats.lifetime, &mut stats.period] {
                        acc.completed += 1;
                        acc.response_sum_ms += elapsed_ms;
                        acc.response_max_ms = acc.response_max_ms.max(elapsed_ms);
                    }
                }
                Settled::Failed | Settled::Cancelled => {
                    stats.lifetime.exceptions += 1;
                    stats.period.exceptions += 1;
                }
            }
        }

        self.sim.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct DegradingLoadSimulator {
    config: LoadConfig,
    in_flight: AtomicUsize,
    stats: Mutex<Stats>,
}

impl DegradingLoadSimulator {
    pub fn new(config: LoadConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            in_flight: AtomicUsize::new(0),
            stats: Mutex::new(Stats {
                lifetime: Accumulator::default(),
                lifetime_started: now,
                period: Accumulator::default(),
                period_started: now,
            }),
        }
    }

    /// Reject parameters outside the configured limits.
    pub fn validate(&self, params: &LoadParams) -> EngineResult<()> {
        let limits = [
            ("workIterations", params.work_iterations, self.config.max_work_iterations),
            ("bufferSizeKb", params.buffer_size_kb, self.config.max_buffer_size_kb),
            ("baselineDelayMs", params.baseline_delay_ms, self.config.max_baseline_delay_ms),
            ("degradationFactor", params.degradation_factor, self.config.max_degradation_factor),
        ];
        for (field, value, max) in limits {
            if value > max {
                return Err(EngineError::Validation(format!(
                    "{} must be at most {}, got {}",
                    field, max, value
                )));
            }
        }
        Ok(())
    }

    /// Serve one request's worth of degrading work.
    ///
    /// Parameters are validated before the request counts as in flight.
    pub async fn execute_work(&self, params: LoadParams) -> EngineResult<LoadWorkResult> {
        self.validate(&params)?;

        let (mut in_flight, current) = InFlight::enter(self);
        let outcome = self.run(current, &params, in_flight.started).await;

        match &outcome {
            Ok(_) => in_flight.settled = Settled::Completed,
            Err(e) => {
                in_flight.settled = Settled::Failed;
                warn!(
                    error = %e,
                    elapsed_ms = in_flight.started.elapsed().as_millis() as u64,
                    concurrent = current,
                    "Load request failed"
                );
            }
        }

        outcome
    }

    async fn run(
        &self,
        current: usize,
        params: &LoadParams,
        started: Instant,
    ) -> EngineResult<LoadWorkResult> {
        // Split the buffer between a retained vector and a scratch region so
        // both allocator pressure and resident growth show up.
        let total_bytes = usize::try_from(params.buffer_size_kb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024);
        let retained_len = total_bytes / 2;
        let buffer_error = |reason: String| EngineError::BufferAllocation {
            size_kb: params.buffer_size_kb,
            reason,
        };
        let mut retained = reserve_buffer(retained_len, 0x5A).map_err(buffer_error)?;
        let mut scratch = reserve_buffer(total_bytes - retained_len, 0)
            .map_err(buffer_error)?
            .into_boxed_slice();

        let planned_ms = planned_duration_ms(current, params);
        let planned = Duration::from_millis(planned_ms);
        let work = Duration::from_millis(params.work_iterations / 10);
        let mut rng = StdRng::from_entropy();
        let mut cycles = 0u32;

        while started.elapsed() < planned {
            if !work.is_zero() {
                burn_for(work);
            }
            touch(&mut retained, cycles);
            touch(&mut scratch, cycles);
            cycles += 1;

            if started.elapsed() >= self.config.failure_threshold()
                && rng.gen_bool(self.config.failure_probability.clamp(0.0, 1.0))
            {
                return Err(SyntheticFailure::pick(&mut rng).into());
            }

            tokio::time::sleep(self.config.cycle_yield()).await;
        }

        debug!(
            planned_ms,
            cycles,
            concurrent = current,
            "Load request completed"
        );

        Ok(LoadWorkResult {
            elapsed_ms: started.elapsed().as_millis() as u64,
            planned_duration_ms: planned_ms,
            concurrent_at_start: current,
            degradation_delay_ms: planned_ms.saturating_sub(params.baseline_delay_ms),
            cycles,
            buffer_size_kb: params.buffer_size_kb,
            worker: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn current_concurrent(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.current_concurrent() > 0
    }

    pub fn status(&self) -> LoadTestStatus {
        let current_concurrent = self.current_concurrent();
        LoadTestStatus {
            active: current_concurrent > 0,
            current_concurrent,
        }
    }

    /// Lifetime statistics; never reset.
    pub fn current_stats(&self) -> LoadTestStats {
        let stats = self.stats.lock();
        stats
            .lifetime
            .snapshot(self.current_concurrent(), stats.lifetime_started.elapsed())
    }

    /// Statistics for the current period, without resetting it.
    pub fn period_stats(&self) -> LoadTestStats {
        let stats = self.stats.lock();
        stats
            .period
            .snapshot(self.current_concurrent(), stats.period_started.elapsed())
    }

    /// Snapshot the current period and start a new one.
    pub fn take_period_stats(&self) -> LoadTestStats {
        let mut stats = self.stats.lock();
        let current = self.current_concurrent();
        let snapshot = stats.period.snapshot(current, stats.period_started.elapsed());
        stats.period = Accumulator {
            peak_concurrent: current,
            ..Accumulator::default()
        };
        stats.period_started = Instant::now();
        snapshot
    }
}

/// Allocate `len` bytes filled with `fill`, reporting failure instead of
/// aborting.
fn reserve_buffer(len: usize, fill: u8) -> Result<Vec<u8>, String> {
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| e.to_string())?;
    buf.resize(len, fill);
    Ok(buf)
}

/// Write one byte per page so the region stays resident.
fn touch(region: &mut [u8], salt: u32) {
    for offset in (0..region.len()).step_by(PAGE_SIZE) {
        region[offset] = region[offset].wrapping_add(salt as u8 | 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fast_config() -> LoadConfig {
        LoadConfig {
            cycle_yield_ms: 10,
            ..LoadConfig::default()
        }
    }

    #[test]
    fn test_planned_duration_formula() {
        let params = LoadParams {
            baseline_delay_ms: 1000,
            soft_limit: 20,
            degradation_factor: 1000,
            ..LoadParams::default()
        };
        assert_eq!(planned_duration_ms(30, &params), 11_000);
        assert_eq!(planned_duration_ms(20, &params), 1000);
        assert_eq!(planned_duration_ms(5, &params), 1000);
    }

    #[test]
    fn test_failure_pool_is_distinct() {
        let codes: HashSet<_> = SyntheticFailure::ALL.iter().map(|f| f.code()).collect();
        assert_eq!(codes.len(), 15);
    }

    #[test]
    fn test_params_defaults_from_partial_json() {
        let params: LoadParams = serde_json::from_str(r#"{"softLimit": 5}"#).unwrap();
        assert_eq!(params.soft_limit, 5);
        assert_eq!(params.baseline_delay_ms, 100);
        assert_eq!(params.work_iterations, 200);
    }

    #[tokio::test]
    async fn test_request_takes_planned_duration() {
        let sim = DegradingLoadSimulator::new(fast_config());
        let params = LoadParams {
            work_iterations: 10,
            buffer_size_kb: 64,
            baseline_delay_ms: 200,
            soft_limit: 0,
            degradation_factor: 100,
        };

        let result = sim.execute_work(params).await.unwrap();
        assert_eq!(result.concurrent_at_start, 1);
        assert_eq!(result.planned_duration_ms, 300);
        assert_eq!(result.degradation_delay_ms, 100);
        assert!(result.elapsed_ms >= 300);
        assert!(result.elapsed_ms < 600);

        let stats = sim.current_stats();
        assert_eq!(stats.requests_completed, 1);
        assert_eq!(stats.current_concurrent, 0);
        assert_eq!(stats.exception_count, 0);
        assert!(stats.avg_response_time_ms >= 300.0);
    }

    #[tokio::test]
    async fn test_concurrency_is_tracked() {
        let sim = DegradingLoadSimulator::new(fast_config());
        let params = LoadParams {
            work_iterations: 0,
            buffer_size_kb: 4,
            baseline_delay_ms: 50,
            soft_limit: 1,
            degradation_factor: 20,
        };

        let (a, b, c) = tokio::join!(
            sim.execute_work(params.clone()),
            sim.execute_work(params.clone()),
            sim.execute_work(params.clone())
        );
        let mut seen: Vec<usize> = [a, b, c]
            .into_iter()
            .map(|r| r.unwrap().concurrent_at_start)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);

        let stats = sim.current_stats();
        assert_eq!(stats.peak_concurrent, 3);
        assert_eq!(stats.requests_completed, 3);
        assert_eq!(sim.current_concurrent(), 0);
    }

    #[tokio::test]
    async fn test_failures_propagate_and_release_concurrency() {
        let sim = DegradingLoadSimulator::new(LoadConfig {
            failure_threshold_secs: 0,
            failure_probability: 1.0,
            cycle_yield_ms: 10,
            ..LoadConfig::default()
        });

        let err = sim
            .execute_work(LoadParams {
                work_iterations: 0,
                baseline_delay_ms: 500,
                ..LoadParams::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Synthetic(f) if SyntheticFailure::ALL.contains(&f)));

        let stats = sim.current_stats();
        assert_eq!(stats.exception_count, 1);
        assert_eq!(stats.requests_completed, 0);
        assert!(!sim.is_active());
    }

    #[tokio::test]
    async fn test_period_stats_reset() {
        let sim = DegradingLoadSimulator::new(fast_config());
        let params = LoadParams {
            work_iterations: 0,
            baseline_delay_ms: 10,
            ..LoadParams::default()
        };
        sim.execute_work(params.clone()).await.unwrap();
        sim.execute_work(params).await.unwrap();

        let period = sim.take_period_stats();
        assert_eq!(period.requests_completed, 2);
        assert_eq!(sim.period_stats().requests_completed, 0);
        assert_eq!(sim.current_stats().requests_completed, 2);
    }

    #[tokio::test]
    async fn test_out_of_range_params_are_rejected_before_work() {
        let sim = DegradingLoadSimulator::new(fast_config());

        let oversized = [
            LoadParams {
                buffer_size_kb: u64::MAX,
                ..LoadParams::default()
            },
            LoadParams {
                work_iterations: u64::MAX,
                ..LoadParams::default()
            },
            LoadParams {
                baseline_delay_ms: u64::MAX,
                ..LoadParams::default()
            },
            LoadParams {
                degradation_factor: u64::MAX,
                ..LoadParams::default()
            },
        ];
        for params in oversized {
            assert!(matches!(
                sim.execute_work(params).await,
                Err(EngineError::Validation(_))
            ));
        }

        let stats = sim.current_stats();
        assert_eq!(stats.peak_concurrent, 0);
        assert_eq!(stats.exception_count, 0);
        assert_eq!(sim.current_concurrent(), 0);
    }

    #[tokio::test]
    async fn test_params_at_the_limit_are_accepted() {
        let config = LoadConfig {
            max_buffer_size_kb: 64,
            ..fast_config()
        };
        let sim = DegradingLoadSimulator::new(config);
        let params = LoadParams {
            work_iterations: 0,
            buffer_size_kb: 64,
            baseline_delay_ms: 10,
            ..LoadParams::default()
        };
        assert!(sim.validate(&params).is_ok());
        assert!(sim.execute_work(params).await.is_ok());
    }

    #[test]
    fn test_unreservable_buffer_is_an_error() {
        assert!(reserve_buffer(usize::MAX, 0).is_err());

        let buf = reserve_buffer(8, 0x5A).unwrap();
        assert_eq!(buf, vec![0x5A; 8]);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_counted_and_releases_its_slot() {
        let sim = DegradingLoadSimulator::new(fast_config());
        let params = LoadParams {
            work_iterations: 0,
            baseline_delay_ms: 5_000,
            ..LoadParams::default()
        };

        let outcome =
            tokio::time::timeout(Duration::from_millis(100), sim.execute_work(params)).await;
        assert!(outcome.is_err());

        let stats = sim.current_stats();
        assert_eq!(stats.current_concurrent, 0);
        assert_eq!(stats.peak_concurrent, 1);
        assert_eq!(stats.requests_completed, 0);
        assert_eq!(stats.exception_count, 1);
        assert_eq!(sim.take_period_stats().exception_count, 1);
        assert!(!sim.is_active());
    }
}
