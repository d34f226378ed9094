use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub engine: EngineRules,
}

/// Tunables for the reservation engine.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineRules {
    /// Bounded wait for each per-seat lock acquisition, in milliseconds.
    #[serde(default = "default_lock_wait_ms")]
    pub seat_lock_wait_ms: u64,
    /// How long a Pending hold keeps its seats before the sweeper reclaims
    /// them.
    #[serde(default = "default_hold_window")]
    pub hold_window_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Broadcast channel capacity for outbound engine events.
    #[serde(default = "default_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_lock_wait_ms() -> u64 {
    2_000
}

fn default_hold_window() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_bus_capacity() -> usize {
    128
}

impl EngineRules {
    pub fn seat_lock_wait(&self) -> Duration {
        Duration::from_millis(self.seat_lock_wait_ms)
    }

    pub fn hold_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_window_seconds as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            seat_lock_wait_ms: default_lock_wait_ms(),
            hold_window_seconds: default_hold_window(),
            sweep_interval_seconds: default_sweep_interval(),
            event_bus_capacity: default_bus_capacity(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `ENCORE__ENGINE__HOLD_WINDOW_SECONDS=60`
            .add_source(config::Environment::with_prefix("ENCORE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineRules::default(),
        }
    }
}
