#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]

use std::{
  ffi::{c_char, c_int, c_void, CString},
  marker::{PhantomData, PhantomPinned},
  ptr::null,
};

use tracing::{debug, trace};

use crate::{LockKind, PlatformError, PowerCapability, WakeLock};

/// Wake-locks backed by IOKit power assertions.
///
/// A partial lock keeps the system from idle sleeping, a full lock keeps the
/// display awake too. macOS has no idle mode comparable to a phone's, so the
/// heartbeat never fires its wakeup signal here.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacPower;

impl PowerCapability for MacPower {
  type Lock = AssertionLock;

  fn new_wake_lock(&self, kind: LockKind, tag: &str) -> Result<Self::Lock, PlatformError> {
    let name = CString::new(tag)
      .map_err(|_| PlatformError::Unavailable(format!("lock tag contains a nul byte: {tag:?}")))?;
    Ok(AssertionLock {
      kind,
      name,
      assertion: None,
    })
  }
}

pub struct AssertionLock {
  kind: LockKind,
  name: CString,
  // present while the assertion is held
  assertion: Option<IOPMAssertionID>,
}

impl WakeLock for AssertionLock {
  fn acquire(&mut self) -> Result<(), PlatformError> {
    if self.assertion.is_some() {
      return Ok(());
    }

    let assertion_type = match self.kind {
      LockKind::Partial => &b"PreventUserIdleSystemSleep\0"[..],
      LockKind::Full => &b"PreventUserIdleDisplaySleep\0"[..],
    };

    // SAFETY: both strings are created here and released below regardless of the outcome
    let id = unsafe {
      let type_ref = cf_string(assertion_type.as_ptr() as *const c_char)?;
      let name_ref = match cf_string(self.name.as_ptr()) {
        Ok(name_ref) => name_ref,
        Err(err) => {
          CFRelease(type_ref as CFTypeRef);
          return Err(err);
        }
      };

      let mut id: IOPMAssertionID = 0;
      let ret = IOPMAssertionCreateWithName(type_ref, kIOPMAssertionLevelOn, name_ref, &mut id);
      CFRelease(type_ref as CFTypeRef);
      CFRelease(name_ref as CFTypeRef);
      if ret != kIOReturnSuccess {
        return Err(PlatformError::Os { code: ret });
      }
      id
    };

    trace!("IOPMAssertionCreateWithName id={}", id);
    debug!(kind = ?self.kind, "power assertion created");
    self.assertion = Some(id);
    Ok(())
  }

  fn release(&mut self) -> Result<(), PlatformError> {
    let Some(id) = self.assertion.take() else {
      return Err(PlatformError::Unavailable("power assertion is not held".to_owned()));
    };

    // SAFETY: `id` came from IOPMAssertionCreateWithName and is released exactly once
    let ret = unsafe { IOPMAssertionRelease(id) };
    if ret != kIOReturnSuccess {
      return Err(PlatformError::Os { code: ret });
    }
    trace!("IOPMAssertionRelease id={}", id);
    Ok(())
  }
}

impl Drop for AssertionLock {
  fn drop(&mut self) {
    // don't leak the assertion past the lock that owns it
    if let Some(id) = self.assertion.take() {
      unsafe {
        IOPMAssertionRelease(id);
      }
    }
  }
}

unsafe fn cf_string(text: *const c_char) -> Result<CFStringRef, PlatformError> {
  let string = CFStringCreateWithCString(null(), text, kCFStringEncodingUTF8);
  if string.is_null() {
    return Err(PlatformError::Unavailable("CFStringCreateWithCString failed".to_owned()));
  }
  Ok(string)
}

type kern_return_t = c_int;

//
// Core Foundation
//

type CFTypeRef = *const c_void;
type CFStringEncoding = u32;

#[repr(C)]
struct __CFString(c_void);
type CFStringRef = *const __CFString;

#[repr(C)]
struct __CFAllocator {
  _data: [u8; 0],
  _marker: PhantomData<(*mut u8, PhantomPinned)>,
}
type CFAllocatorRef = *const __CFAllocator;

const kCFStringEncodingUTF8: CFStringEncoding = 0x0800_0100;

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
  fn CFStringCreateWithCString(
    alloc: CFAllocatorRef,
    cStr: *const c_char,
    encoding: CFStringEncoding,
  ) -> CFStringRef;

  fn CFRelease(cf: CFTypeRef);
}

//
// IOKit
//

type IOReturn = kern_return_t;
type IOPMAssertionID = u32;
type IOPMAssertionLevel = u32;

const kIOReturnSuccess: i32 = 0;
const kIOPMAssertionLevelOn: IOPMAssertionLevel = 255;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
  fn IOPMAssertionCreateWithName(
    AssertionType: CFStringRef,
    AssertionLevel: IOPMAssertionLevel,
    AssertionName: CFStringRef,
    AssertionID: *mut IOPMAssertionID,
  ) -> IOReturn;

  fn IOPMAssertionRelease(AssertionID: IOPMAssertionID) -> IOReturn;
}
