use std::{
  panic::{catch_unwind, AssertUnwindSafe},
  sync::mpsc::{self, RecvTimeoutError},
  thread::{self, JoinHandle},
  time::Duration,
};

use tracing::{trace, warn};

use crate::config::HeartbeatConfig;

/// A repeating timer on its own thread. Dropping it cancels the timer and joins the thread.
pub(crate) struct Heartbeat {
  // Dropping the sender is the cancellation signal
  stop: Option<mpsc::Sender<()>>,
  thread: Option<JoinHandle<()>>,
}

impl Heartbeat {
  /// Runs `tick` after `initial_delay` and then every `interval` until cancelled.
  pub(crate) fn start<F>(config: &HeartbeatConfig, tick: F) -> std::io::Result<Self>
  where
    F: FnMut() + Send + 'static,
  {
    let (tx, rx) = mpsc::channel();
    let initial_delay = config.initial_delay();
    let interval = config.interval();
    let thread = thread::Builder::new()
      .name("powerlock-heartbeat".to_owned())
      .spawn(move || heartbeat_proc(rx, initial_delay, interval, tick))?;

    Ok(Self {
      stop: Some(tx),
      thread: Some(thread),
    })
  }

  pub(crate) fn stop(mut self) {
    self.shutdown();
  }

  fn shutdown(&mut self) {
    drop(self.stop.take());

    if let Some(thread) = self.thread.take() {
      // a tick that ends up cancelling its own heartbeat must not join itself
      if thread.thread().id() == thread::current().id() {
        return;
      }
      if thread.join().is_err() {
        warn!("heartbeat thread panicked");
      }
    }
  }
}

impl Drop for Heartbeat {
  fn drop(&mut self) {
    self.shutdown();
  }
}

fn heartbeat_proc<F>(stop: mpsc::Receiver<()>, initial_delay: Duration, interval: Duration, mut tick: F)
where
  F: FnMut(),
{
  let mut delay = initial_delay;
  loop {
    match stop.recv_timeout(delay) {
      Err(RecvTimeoutError::Timeout) => {}
      Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
    }

    trace!("heartbeat tick");
    // the next tick is always scheduled, whatever happened in this one
    if catch_unwind(AssertUnwindSafe(&mut tick)).is_err() {
      warn!("heartbeat tick panicked");
    }
    delay = interval;
  }

  trace!("heartbeat thread exiting");
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      Arc,
    },
    time::Instant,
  };

  use super::*;

  fn fast() -> HeartbeatConfig {
    HeartbeatConfig {
      interval_ms: 5,
      initial_delay_ms: 5,
      ..HeartbeatConfig::default()
    }
  }

  fn wait_for(count: &AtomicUsize, at_least: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
      if count.load(Ordering::SeqCst) >= at_least {
        return true;
      }
      thread::sleep(Duration::from_millis(1));
    }
    false
  }

  #[test]
  fn ticks_repeatedly_until_stopped() {
    let count = Arc::new(AtomicUsize::new(0));
    let ticks = count.clone();
    let heartbeat = Heartbeat::start(&fast(), move || {
      ticks.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert!(wait_for(&count, 3));
    heartbeat.stop();

    let stopped_at = count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(count.load(Ordering::SeqCst), stopped_at);
  }

  #[test]
  fn keeps_ticking_after_a_panic() {
    let count = Arc::new(AtomicUsize::new(0));
    let ticks = count.clone();
    let heartbeat = Heartbeat::start(&fast(), move || {
      if ticks.fetch_add(1, Ordering::SeqCst) == 0 {
        panic!("first tick blows up");
      }
    })
    .unwrap();

    assert!(wait_for(&count, 3));
    drop(heartbeat);
  }

  #[test]
  fn stop_does_not_wait_for_initial_delay() {
    let config = HeartbeatConfig {
      initial_delay_ms: 60_000,
      ..fast()
    };
    let heartbeat = Heartbeat::start(&config, || {}).unwrap();

    let started = Instant::now();
    heartbeat.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
  }
}
