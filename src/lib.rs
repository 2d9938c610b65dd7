#![warn(clippy::all)]

//! Hold at most one device wake-lock on behalf of a hybrid app shell.
//!
//! The [`Controller`] owns the lock and reacts to host lifecycle events, the
//! [`PowerManagementPlugin`] speaks the bridge command protocol on top of it.

pub mod bridge;
pub mod config;
mod controller;
mod heartbeat;
#[cfg(target_os = "macos")]
mod macos;

pub use bridge::{PluginResult, PowerManagementPlugin, Status};
pub use config::{Config, HeartbeatConfig, HeartbeatPolicy};
pub use controller::{Controller, Release, Snapshot};
#[cfg(target_os = "macos")]
pub use macos::{AssertionLock, MacPower};

use serde::{Deserialize, Serialize};

/// Which variant of wake-lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
  /// The CPU keeps running, the display may turn off.
  Partial,
  /// Both the CPU and the display stay on.
  Full,
}

/// A platform wake-lock handle. Created released; the controller drives it.
pub trait WakeLock: Send + 'static {
  fn acquire(&mut self) -> Result<(), PlatformError>;
  fn release(&mut self) -> Result<(), PlatformError>;
}

/// The platform power-management service.
pub trait PowerCapability: Send + Sync + 'static {
  type Lock: WakeLock;

  fn new_wake_lock(&self, kind: LockKind, tag: &str) -> Result<Self::Lock, PlatformError>;

  /// Whether the platform is in its aggressive low-power idle mode.
  fn is_device_idle_mode(&self) -> bool {
    false
  }
}

/// Side effects the heartbeat pushes back into the host.
pub trait HostBridge: Send + Sync + 'static {
  /// Tell the view layer it is visible so it keeps running its timers.
  fn refresh_visibility(&self) {}

  /// Fire the paired wakeup signal while the platform is idle.
  fn fire_wakeup(&self) -> Result<(), WakeupError> {
    Ok(())
  }
}

/// A host that wants no heartbeat side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl HostBridge for NoopHost {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("WakeLock already active - release first")]
  AlreadyHeld,
  #[error("No WakeLock active - acquire first")]
  NotHeld,
  #[error("Can't acquire wake-lock - check your permissions!")]
  AcquireDenied(#[source] PlatformError),
  #[error("{0}")]
  InvalidArgument(String),
  #[error("malformed input: {0}")]
  MalformedInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
  #[error("permission denied")]
  PermissionDenied,
  #[error("{0}")]
  Unavailable(String),
  #[error("platform call failed. code={code:08x}")]
  Os { code: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WakeupError {
  #[error("permission denied")]
  PermissionDenied,
  #[error("wakeup signal was canceled")]
  Canceled,
}
