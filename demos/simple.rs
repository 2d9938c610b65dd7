#![forbid(unsafe_code)]
#![warn(clippy::all)]

use std::time::Duration;

use powerlock::{
  Config, HeartbeatConfig, HostBridge, LockKind, PlatformError, PowerCapability,
  PowerManagementPlugin, WakeLock, WakeupError,
};
use tracing::info;

struct Printer {}
impl PowerCapability for Printer {
  type Lock = PrintedLock;

  fn new_wake_lock(&self, kind: LockKind, tag: &str) -> Result<PrintedLock, PlatformError> {
    info!(?kind, tag, "new_wake_lock");
    Ok(PrintedLock { kind })
  }
}

struct PrintedLock {
  kind: LockKind,
}
impl WakeLock for PrintedLock {
  fn acquire(&mut self) -> Result<(), PlatformError> {
    info!(kind = ?self.kind, "acquire");
    Ok(())
  }

  fn release(&mut self) -> Result<(), PlatformError> {
    info!(kind = ?self.kind, "release");
    Ok(())
  }
}

struct Host {}
impl HostBridge for Host {
  fn refresh_visibility(&self) {
    info!("refresh_visibility");
  }

  fn fire_wakeup(&self) -> Result<(), WakeupError> {
    info!("fire_wakeup");
    Ok(())
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
    .init();

  let config = Config {
    heartbeat: HeartbeatConfig {
      interval_ms: 1_000,
      initial_delay_ms: 1_000,
      ..HeartbeatConfig::default()
    },
    ..Config::default()
  };
  let plugin = PowerManagementPlugin::initialize(Printer {}, Host {}, config);

  info!(result = ?plugin.execute("acquire", "[true]"), "acquire");
  info!(result = ?plugin.execute("acquire", "[true]"), "acquire again");
  tokio::time::sleep(Duration::from_millis(3_500)).await;

  plugin.on_pause(true);
  plugin.on_resume(true);

  info!(result = ?plugin.execute("release", "[]"), "release");
  info!(result = ?plugin.execute("release", "[]"), "release again");
  plugin.on_destroy();
}
