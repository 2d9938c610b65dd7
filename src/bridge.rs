//! The bridge command surface: `acquire`, `release` and `setReleaseOnPause`.
//!
//! Arguments arrive as a JSON array and every command answers with a
//! [`PluginResult`] carrying the same status/message pairs hybrid shells
//! already expect from the power-management plugin.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{Config, Controller, Error, HostBridge, LockKind, PowerCapability, Release};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  Ok,
  Error,
  IllegalAccessException,
  JsonException,
  InvalidAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginResult {
  pub status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

impl PluginResult {
  pub fn new(status: Status) -> Self {
    Self {
      status,
      message: None,
    }
  }

  pub fn with_message(status: Status, message: impl Into<String>) -> Self {
    Self {
      status,
      message: Some(message.into()),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.status == Status::Ok
  }
}

impl From<Error> for PluginResult {
  fn from(err: Error) -> Self {
    let status = match err {
      Error::AlreadyHeld | Error::NotHeld => Status::IllegalAccessException,
      Error::AcquireDenied(_) | Error::InvalidArgument(_) => Status::Error,
      Error::MalformedInput(_) => Status::JsonException,
    };
    let message = match err {
      Error::InvalidArgument(reason) | Error::MalformedInput(reason) => reason,
      other => other.to_string(),
    };
    Self::with_message(status, message)
  }
}

/// The plugin as the host shell sees it: commands in, results out, plus lifecycle hooks.
pub struct PowerManagementPlugin<P: PowerCapability> {
  controller: Controller<P>,
}

impl<P: PowerCapability> PowerManagementPlugin<P> {
  /// Called once by the host when the plugin is loaded.
  pub fn initialize<H>(power: P, host: H, config: Config) -> Self
  where
    H: HostBridge,
  {
    Self {
      controller: Controller::new(power, host, config),
    }
  }

  pub fn controller(&self) -> &Controller<P> {
    &self.controller
  }

  /// Run `action` with its arguments given as JSON array text.
  pub fn execute(&self, action: &str, raw_args: &str) -> PluginResult {
    match parse_args(raw_args) {
      Ok(args) => self.execute_args(action, &args),
      Err(err) => err.into(),
    }
  }

  pub fn execute_args(&self, action: &str, args: &[Value]) -> PluginResult {
    debug!(action, "plugin execute called");

    let result = match action {
      "acquire" => self.acquire(args),
      "release" => self.release(),
      "setReleaseOnPause" => self.set_release_on_pause(args),
      _ => return PluginResult::with_message(Status::InvalidAction, format!("Unknown action {action}")),
    };

    result.unwrap_or_else(PluginResult::from)
  }

  pub fn on_pause(&self, _multitasking: bool) {
    self.controller.on_pause();
  }

  pub fn on_resume(&self, _multitasking: bool) {
    self.controller.on_resume();
  }

  pub fn on_destroy(&self) {
    self.controller.teardown();
  }

  fn acquire(&self, args: &[Value]) -> Result<PluginResult, Error> {
    let partial = match args.first() {
      Some(value) => get_boolean(value).ok_or_else(|| not_a_boolean(value))?,
      None => false,
    };

    if partial {
      debug!("partial wake lock");
      self.controller.acquire(LockKind::Partial, true)?;
    } else {
      self.controller.acquire(LockKind::Full, false)?;
    }
    Ok(PluginResult::new(Status::Ok))
  }

  fn release(&self) -> Result<PluginResult, Error> {
    let message = match self.controller.release()? {
      Release::Released => "OK",
      Release::PlatformFailed(_) => "WakeLock already released",
    };
    Ok(PluginResult::with_message(Status::Ok, message))
  }

  fn set_release_on_pause(&self, args: &[Value]) -> Result<PluginResult, Error> {
    let flag = args
      .first()
      .and_then(get_boolean)
      .ok_or_else(|| Error::InvalidArgument("Could not set releaseOnPause".to_owned()))?;
    self.controller.set_release_on_pause(flag);
    Ok(PluginResult::new(Status::Ok))
  }
}

fn parse_args(raw_args: &str) -> Result<Vec<Value>, Error> {
  let raw_args = raw_args.trim();
  if raw_args.is_empty() {
    return Ok(Vec::new());
  }
  serde_json::from_str(raw_args).map_err(|err| Error::MalformedInput(err.to_string()))
}

/// Booleans as the host's JSON layer reads them: a JSON bool or the strings
/// "true"/"false" in any case.
fn get_boolean(value: &Value) -> Option<bool> {
  match value {
    Value::Bool(flag) => Some(*flag),
    Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
    Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
    _ => None,
  }
}

fn not_a_boolean(value: &Value) -> Error {
  Error::MalformedInput(format!("JSONArray[0] is not a boolean: {value}"))
}
