use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  config::{Config, HeartbeatPolicy},
  heartbeat::Heartbeat,
  Error, HostBridge, LockKind, PlatformError, PowerCapability, WakeLock,
};

/// Owns zero or one wake-lock and keeps it consistent across host lifecycle events.
///
/// Every operation runs its whole state transition under one mutex, so the
/// controller can be shared between threads and calls are linearized.
pub struct Controller<P: PowerCapability> {
  power: Arc<P>,
  host: Arc<dyn HostBridge>,
  config: Config,
  state: Arc<Mutex<LockState<P::Lock>>>,
}

struct LockState<L> {
  held: Option<Held<L>>,
  release_on_pause: bool,
  heartbeat_active: bool,
  heartbeat: Option<Heartbeat>,
}

struct Held<L> {
  lock: L,
  kind: LockKind,
  // the platform lock was dropped on pause but is still logically ours
  suspended: bool,
}

/// How an explicit release went. Either way the controller is idle afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
  Released,
  PlatformFailed(PlatformError),
}

/// A point-in-time view of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
  pub kind: Option<LockKind>,
  pub suspended: bool,
  pub release_on_pause: bool,
  pub heartbeat_active: bool,
  pub heartbeat_running: bool,
}

impl Snapshot {
  pub fn is_held(&self) -> bool {
    self.kind.is_some()
  }
}

fn lock<L>(state: &Mutex<LockState<L>>) -> MutexGuard<'_, LockState<L>> {
  // every transition leaves the state consistent, so a poisoned guard is still usable
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: PowerCapability> Controller<P> {
  pub fn new<H>(power: P, host: H, config: Config) -> Self
  where
    H: HostBridge,
  {
    let state = LockState {
      held: None,
      release_on_pause: config.release_on_pause,
      heartbeat_active: false,
      heartbeat: None,
    };

    Self {
      power: Arc::new(power),
      host: Arc::new(host),
      config,
      state: Arc::new(Mutex::new(state)),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Acquire a wake-lock of `kind`. Fails with [`Error::AlreadyHeld`] while another is held.
  ///
  /// With `want_heartbeat` a partial lock also starts the heartbeat.
  pub fn acquire(&self, kind: LockKind, want_heartbeat: bool) -> Result<(), Error> {
    let mut state = lock(&self.state);
    if state.held.is_some() {
      debug!(?kind, "acquire rejected, a wake lock is already held");
      return Err(Error::AlreadyHeld);
    }

    let mut wake_lock = self
      .power
      .new_wake_lock(kind, &self.config.tag)
      .map_err(|err| {
        warn!(?kind, error = %err, "failed to create wake lock");
        Error::AcquireDenied(err)
      })?;
    wake_lock.acquire().map_err(|err| {
      warn!(?kind, error = %err, "failed to acquire wake lock");
      Error::AcquireDenied(err)
    })?;

    state.held = Some(Held {
      lock: wake_lock,
      kind,
      suspended: false,
    });
    debug!(?kind, "wake lock acquired");

    if want_heartbeat && kind == LockKind::Partial {
      if state.heartbeat.is_none() {
        state.heartbeat = self.start_heartbeat();
      }
      state.heartbeat_active = state.heartbeat.is_some();
    }

    Ok(())
  }

  /// Release the held wake-lock. The controller is idle afterwards even when
  /// the platform refuses the release.
  pub fn release(&self) -> Result<Release, Error> {
    let mut state = lock(&self.state);
    let Some(mut held) = state.held.take() else {
      debug!("release rejected, no wake lock is held");
      return Err(Error::NotHeld);
    };
    state.heartbeat_active = false;

    let outcome = if held.suspended {
      Release::Released
    } else {
      match held.lock.release() {
        Ok(()) => Release::Released,
        Err(err) => {
          warn!(kind = ?held.kind, error = %err, "platform wake lock release failed");
          Release::PlatformFailed(err)
        }
      }
    };
    debug!(kind = ?held.kind, "wake lock released");

    let heartbeat = match self.config.heartbeat.policy {
      HeartbeatPolicy::StopOnRelease => state.heartbeat.take(),
      HeartbeatPolicy::UntilTeardown => None,
    };
    // the heartbeat thread takes the state mutex, so it has to be joined without holding it
    drop(state);
    if let Some(heartbeat) = heartbeat {
      heartbeat.stop();
    }

    Ok(outcome)
  }

  pub fn set_release_on_pause(&self, release_on_pause: bool) {
    lock(&self.state).release_on_pause = release_on_pause;
    debug!(release_on_pause, "release on pause updated");
  }

  pub fn release_on_pause(&self) -> bool {
    lock(&self.state).release_on_pause
  }

  /// The host is going to the background. Drops the platform lock but keeps it
  /// logically held so [`Controller::on_resume`] can take it back.
  pub fn on_pause(&self) {
    let mut state = lock(&self.state);
    if !state.release_on_pause {
      return;
    }
    let Some(held) = state.held.as_mut() else {
      return;
    };
    if held.suspended {
      return;
    }

    if let Err(err) = held.lock.release() {
      warn!(kind = ?held.kind, error = %err, "failed to release wake lock on pause");
    }
    held.suspended = true;
    debug!(kind = ?held.kind, "wake lock suspended");
  }

  /// The host is back in the foreground. Re-acquires a lock dropped on pause.
  pub fn on_resume(&self) {
    let mut state = lock(&self.state);
    let Some(held) = state.held.as_mut() else {
      return;
    };
    if !held.suspended {
      return;
    }

    // stays suspended on failure so the next resume tries again
    if let Err(err) = held.lock.acquire() {
      warn!(kind = ?held.kind, error = %err, "failed to re-acquire wake lock on resume");
      return;
    }
    held.suspended = false;
    debug!(kind = ?held.kind, "wake lock resumed");
  }

  /// Release anything still held and stop the heartbeat. Safe to call more than once.
  pub fn teardown(&self) {
    let mut state = lock(&self.state);
    if let Some(mut held) = state.held.take() {
      if !held.suspended {
        if let Err(err) = held.lock.release() {
          warn!(kind = ?held.kind, error = %err, "failed to release wake lock on teardown");
        }
      }
      debug!(kind = ?held.kind, "wake lock released on teardown");
    }
    state.heartbeat_active = false;
    let heartbeat = state.heartbeat.take();
    drop(state);

    if let Some(heartbeat) = heartbeat {
      heartbeat.stop();
    }
  }

  pub fn snapshot(&self) -> Snapshot {
    let state = lock(&self.state);
    Snapshot {
      kind: state.held.as_ref().map(|held| held.kind),
      suspended: state.held.as_ref().is_some_and(|held| held.suspended),
      release_on_pause: state.release_on_pause,
      heartbeat_active: state.heartbeat_active,
      heartbeat_running: state.heartbeat.is_some(),
    }
  }

  fn start_heartbeat(&self) -> Option<Heartbeat> {
    let power = Arc::clone(&self.power);
    let host = Arc::clone(&self.host);
    let state = Arc::clone(&self.state);

    let tick = move || {
      host.refresh_visibility();

      let held = lock(&state).held.is_some();
      if held && power.is_device_idle_mode() {
        if let Err(err) = host.fire_wakeup() {
          debug!(error = %err, "heartbeat wakeup signal failed");
        }
      }
    };

    match Heartbeat::start(&self.config.heartbeat, tick) {
      Ok(heartbeat) => {
        debug!(interval_ms = self.config.heartbeat.interval_ms, "heartbeat started");
        Some(heartbeat)
      }
      Err(err) => {
        warn!(error = %err, "failed to start heartbeat thread");
        None
      }
    }
  }
}

impl<P: PowerCapability> Drop for Controller<P> {
  fn drop(&mut self) {
    self.teardown();
  }
}
