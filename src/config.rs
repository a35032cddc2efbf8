//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for both cluster roles, and the
//! environment surface used to override them.
//!
//! ## Environment variables
//! | Variable                       | Field             | Default            |
//! |--------------------------------|-------------------|--------------------|
//! | `PROCVISOR_WORKERS`            | `workers`         | available CPUs     |
//! | `SERVER_PORT`                  | `app_port`        | `4000`             |
//! | `HEALTH_PORT`                  | `health_port`     | `3001`             |
//! | `PROCVISOR_DRAIN_TIMEOUT_MS`   | `drain_timeout`   | `30_000` (30s)     |
//! | `PROCVISOR_GRACE_MS`           | `grace`           | `5_000` (5s)       |
//! | `PROCVISOR_RESTART_BACKOFF_MS` | `restart_backoff` | `2_000` (2s)       |
//!
//! Unset or unparsable values fall back to the defaults; configuration never
//! aborts startup.
//!
//! `PROCVISOR_WORKER` is not configuration: it is the role marker the primary
//! sets on spawned worker processes. [`Cluster::run`](crate::Cluster::run)
//! branches on it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Worker count override.
pub const ENV_WORKERS: &str = "PROCVISOR_WORKERS";
/// Application (worker traffic) port override.
pub const ENV_APP_PORT: &str = "SERVER_PORT";
/// Health endpoint port override.
pub const ENV_HEALTH_PORT: &str = "HEALTH_PORT";
/// Drain timeout override, in milliseconds.
pub const ENV_DRAIN_TIMEOUT_MS: &str = "PROCVISOR_DRAIN_TIMEOUT_MS";
/// Primary-side extra grace override, in milliseconds.
pub const ENV_GRACE_MS: &str = "PROCVISOR_GRACE_MS";
/// Restart backoff override, in milliseconds.
pub const ENV_RESTART_BACKOFF_MS: &str = "PROCVISOR_RESTART_BACKOFF_MS";
/// Role marker set by the primary on spawned worker processes.
pub const ENV_WORKER_ROLE: &str = "PROCVISOR_WORKER";

/// Global configuration for the cluster runtime.
///
/// Shared by both roles; a worker inherits the primary's environment, so both
/// processes resolve the same values from [`Config::from_env`].
///
/// ## Field semantics
/// - `workers`: size of the worker pool (min 1)
/// - `app_port`: shared `SO_REUSEPORT` listener for application traffic
/// - `health_port`: dedicated health endpoint, distinct from `app_port`
/// - `drain_timeout`: per-process window for graceful connection drain
/// - `grace`: extra time the primary waits for workers *after* their own
///   drain window, before force-killing
/// - `restart_backoff`: fixed delay before replacing an exited worker
/// - `drain_poll`: tick of the worker's wait-for-empty-connections loop
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of worker processes to keep alive.
    pub workers: usize,

    /// TCP port workers bind for application traffic.
    pub app_port: u16,

    /// TCP port the primary binds for `GET /health`.
    pub health_port: u16,

    /// Maximum time a worker waits for open connections to finish
    /// before force-closing them.
    pub drain_timeout: Duration,

    /// Extra window the primary grants on top of `drain_timeout` before
    /// it force-kills workers that have not exited.
    pub grace: Duration,

    /// Fixed delay before an exited worker is replaced.
    ///
    /// Deliberately constant (no growth, no circuit breaker): a crash loop
    /// respawns at this cadence and stays visible on the health endpoint.
    pub restart_backoff: Duration,

    /// Poll interval of the drain loop's connection check.
    pub drain_poll: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Builds a config from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let d = Config::default();
        Self {
            workers: env_parse(ENV_WORKERS, d.workers).max(1),
            app_port: env_parse(ENV_APP_PORT, d.app_port),
            health_port: env_parse(ENV_HEALTH_PORT, d.health_port),
            drain_timeout: Duration::from_millis(env_parse(
                ENV_DRAIN_TIMEOUT_MS,
                d.drain_timeout.as_millis() as u64,
            )),
            grace: Duration::from_millis(env_parse(ENV_GRACE_MS, d.grace.as_millis() as u64)),
            restart_backoff: Duration::from_millis(env_parse(
                ENV_RESTART_BACKOFF_MS,
                d.restart_backoff.as_millis() as u64,
            )),
            drain_poll: d.drain_poll,
            bus_capacity: d.bus_capacity,
        }
    }

    /// True when this process was spawned as a worker by a primary.
    pub fn is_worker_process() -> bool {
        std::env::var_os(ENV_WORKER_ROLE).is_some()
    }

    /// Address workers bind for application traffic.
    #[inline]
    pub fn app_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.app_port)
    }

    /// Address the primary binds for the health endpoint.
    #[inline]
    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.health_port)
    }

    /// Total window the primary waits for workers during shutdown.
    #[inline]
    pub fn shutdown_window(&self) -> Duration {
        self.drain_timeout + self.grace
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `workers = available CPU count` (min 1)
    /// - `app_port = 4000`, `health_port = 3001`
    /// - `drain_timeout = 30s`, `grace = 5s`
    /// - `restart_backoff = 2s`, `drain_poll = 500ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            app_port: 4000,
            health_port: 3001,
            drain_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(5),
            restart_backoff: Duration::from_secs(2),
            drain_poll: Duration::from_millis(500),
            bus_capacity: 1024,
        }
    }
}

/// Parses `key` from the environment, returning `default` when the variable
/// is unset or does not parse.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.app_port, 4000);
        assert_eq!(cfg.health_port, 3001);
        assert_eq!(cfg.drain_timeout, Duration::from_secs(30));
        assert_eq!(cfg.grace, Duration::from_secs(5));
        assert_eq!(cfg.restart_backoff, Duration::from_secs(2));
        assert_eq!(cfg.drain_poll, Duration::from_millis(500));
    }

    #[test]
    fn test_shutdown_window_is_timeout_plus_grace() {
        let cfg = Config {
            drain_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(5),
            ..Config::default()
        };
        assert_eq!(cfg.shutdown_window(), Duration::from_secs(35));
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        // Unset key.
        assert_eq!(env_parse::<u16>("PROCVISOR_TEST_UNSET_PORT", 4000), 4000);

        // Garbage value.
        std::env::set_var("PROCVISOR_TEST_BAD_PORT", "not-a-port");
        assert_eq!(env_parse::<u16>("PROCVISOR_TEST_BAD_PORT", 4000), 4000);
        std::env::remove_var("PROCVISOR_TEST_BAD_PORT");

        // Valid value, with surrounding whitespace.
        std::env::set_var("PROCVISOR_TEST_GOOD_PORT", " 8080 ");
        assert_eq!(env_parse::<u16>("PROCVISOR_TEST_GOOD_PORT", 4000), 8080);
        std::env::remove_var("PROCVISOR_TEST_GOOD_PORT");
    }

    #[test]
    fn test_addrs_use_configured_ports() {
        let cfg = Config {
            app_port: 4100,
            health_port: 3101,
            ..Config::default()
        };
        assert_eq!(cfg.app_addr().port(), 4100);
        assert_eq!(cfg.health_addr().port(), 3101);
    }
}
