use std::time::Duration;

use serde::{de, Deserialize, Deserializer};

/// Shortest heartbeat period; anything below it would keep the heartbeat thread spinning.
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 1;

/// Controller settings. Deserializable so hosts can ship them as plugin preferences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Drop the platform lock while the host is paused and take it back on resume.
  pub release_on_pause: bool,
  /// Tag handed to the platform when a lock is created.
  pub tag: String,
  pub heartbeat: HeartbeatConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      release_on_pause: true,
      tag: "PowerManagementPlugin".to_owned(),
      heartbeat: HeartbeatConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
  #[serde(deserialize_with = "interval_millis")]
  pub interval_ms: u64,
  pub initial_delay_ms: u64,
  pub policy: HeartbeatPolicy,
}

impl HeartbeatConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms.max(MIN_HEARTBEAT_INTERVAL_MS))
  }

  pub fn initial_delay(&self) -> Duration {
    Duration::from_millis(self.initial_delay_ms)
  }
}

impl Default for HeartbeatConfig {
  fn default() -> Self {
    Self {
      interval_ms: 10_000,
      initial_delay_ms: 10_000,
      policy: HeartbeatPolicy::default(),
    }
  }
}

fn interval_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
  D: Deserializer<'de>,
{
  let millis = u64::deserialize(deserializer)?;
  if millis < MIN_HEARTBEAT_INTERVAL_MS {
    return Err(de::Error::custom(format!(
      "heartbeat interval_ms must be at least {MIN_HEARTBEAT_INTERVAL_MS}, got {millis}"
    )));
  }
  Ok(millis)
}

/// What happens to a running heartbeat once its lock goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatPolicy {
  /// Cancel the heartbeat when the lock is released.
  #[default]
  StopOnRelease,
  /// Keep ticking until the controller is torn down. A later partial acquire
  /// reuses the running heartbeat.
  UntilTeardown,
}
