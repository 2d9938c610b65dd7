#![warn(clippy::all)]

use tracing::info;

#[cfg(target_os = "macos")]
#[tokio::main]
async fn main() {
  use powerlock::{Config, Controller, LockKind, MacPower, NoopHost};

  tracing_subscriber::fmt().init();

  let controller = Controller::new(MacPower, NoopHost, Config::default());
  if let Err(err) = controller.acquire(LockKind::Full, false) {
    info!("could not keep the display awake: {}", err);
    return;
  }

  info!("chugging the caffeine. Ctrl-C to stop");
  tokio::signal::ctrl_c().await.unwrap();
  drop(controller);
}

#[cfg(not(target_os = "macos"))]
fn main() {
  tracing_subscriber::fmt().init();
  info!("no power backend for this platform");
}
