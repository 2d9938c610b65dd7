#![allow(dead_code)]

use std::{
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
  },
  thread,
  time::{Duration, Instant},
};

use powerlock::{
  Config, HeartbeatConfig, HeartbeatPolicy, HostBridge, LockKind, PlatformError, PowerCapability,
  WakeLock, WakeupError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  Created(LockKind),
  Acquired(LockKind),
  Released(LockKind),
}

/// Shared bookkeeping for the fake platform and host.
#[derive(Default)]
pub struct Recorder {
  events: Mutex<Vec<Event>>,
  pub idle: AtomicBool,
  pub deny_acquire: AtomicBool,
  pub fail_release: AtomicBool,
  pub wakeup_error: Mutex<Option<WakeupError>>,
  pub refreshes: AtomicUsize,
  pub wakeup_attempts: AtomicUsize,
  pub wakeups: AtomicUsize,
  pub platform_locks: AtomicUsize,
}

impl Recorder {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn events(&self) -> Vec<Event> {
    self.events.lock().unwrap().clone()
  }

  pub fn clear_events(&self) {
    self.events.lock().unwrap().clear();
  }

  fn push(&self, event: Event) {
    self.events.lock().unwrap().push(event);
  }

  /// Number of platform locks currently acquired.
  pub fn platform_locks(&self) -> usize {
    self.platform_locks.load(Ordering::SeqCst)
  }

  pub fn refreshes(&self) -> usize {
    self.refreshes.load(Ordering::SeqCst)
  }
}

pub struct FakePower(pub Arc<Recorder>);

impl PowerCapability for FakePower {
  type Lock = FakeLock;

  fn new_wake_lock(&self, kind: LockKind, _tag: &str) -> Result<FakeLock, PlatformError> {
    self.0.push(Event::Created(kind));
    Ok(FakeLock {
      kind,
      held: false,
      recorder: self.0.clone(),
    })
  }

  fn is_device_idle_mode(&self) -> bool {
    self.0.idle.load(Ordering::SeqCst)
  }
}

pub struct FakeLock {
  kind: LockKind,
  held: bool,
  recorder: Arc<Recorder>,
}

impl WakeLock for FakeLock {
  fn acquire(&mut self) -> Result<(), PlatformError> {
    if self.recorder.deny_acquire.load(Ordering::SeqCst) {
      return Err(PlatformError::PermissionDenied);
    }
    if !self.held {
      self.held = true;
      self.recorder.platform_locks.fetch_add(1, Ordering::SeqCst);
    }
    self.recorder.push(Event::Acquired(self.kind));
    Ok(())
  }

  fn release(&mut self) -> Result<(), PlatformError> {
    if self.recorder.fail_release.load(Ordering::SeqCst) {
      return Err(PlatformError::Unavailable("lock under-locked".to_owned()));
    }
    if self.held {
      self.held = false;
      self.recorder.platform_locks.fetch_sub(1, Ordering::SeqCst);
    }
    self.recorder.push(Event::Released(self.kind));
    Ok(())
  }
}

pub struct FakeHost(pub Arc<Recorder>);

impl HostBridge for FakeHost {
  fn refresh_visibility(&self) {
    self.0.refreshes.fetch_add(1, Ordering::SeqCst);
  }

  fn fire_wakeup(&self) -> Result<(), WakeupError> {
    self.0.wakeup_attempts.fetch_add(1, Ordering::SeqCst);
    if let Some(err) = *self.0.wakeup_error.lock().unwrap() {
      return Err(err);
    }
    self.0.wakeups.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

/// Heartbeat timings short enough for tests.
pub fn fast_config(policy: HeartbeatPolicy) -> Config {
  Config {
    heartbeat: HeartbeatConfig {
      interval_ms: 5,
      initial_delay_ms: 5,
      policy,
    },
    ..Config::default()
  }
}

/// Heartbeat timings that never tick during a test.
pub fn quiet_config() -> Config {
  Config {
    heartbeat: HeartbeatConfig {
      interval_ms: 600_000,
      initial_delay_ms: 600_000,
      policy: HeartbeatPolicy::StopOnRelease,
    },
    ..Config::default()
  }
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + Duration::from_secs(5);
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(1));
  }
  false
}
