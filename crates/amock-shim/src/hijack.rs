//! Process-wide `dlsym` interposition.
//!
//! Exporting `dlsym` from a preloaded library makes every by-name symbol
//! lookup in the process land here, including the vendor library's own
//! internal self-lookups, which is what lets the shim capture entry points
//! the vendor resolves dynamically rather than through the PLT.
//!
//! The delicate part is reaching the *real* lookup primitive without going
//! through ourselves. The mechanism differs per platform:
//!
//! - glibc additionally exports `dlsym` under a versioned name, so
//!   `dlvsym(RTLD_NEXT, "dlsym", <version>)` reaches the genuine one without
//!   recursion; the version string differs per ABI, so the known set is
//!   probed.
//! - macOS uses two-level namespaces, so a flat export cannot interpose
//!   `dlsym` for other images anyway; the real primitive is taken from a
//!   one-time `dlopen` of libSystem, with a re-entry latch in case that
//!   lookup lands back on our own export.
//!
//! Either way the primitive is resolved at most once and cached for the
//! process lifetime. If it cannot be found at all, interception fails open:
//! lookups report "not found" and nothing crashes.

use std::ffi::CStr;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use libc::{c_char, c_void};

pub(crate) type DlsymFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void;

static REAL_DLSYM: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
/// Re-entry latch: the macOS bootstrap itself goes through a `dlsym` call
/// that can land back on our exported definition. A nested bootstrap reports
/// "not found" instead of recursing.
static BOOTSTRAPPING: AtomicBool = AtomicBool::new(false);

/// The genuine lookup primitive, bootstrapped on first use.
pub(crate) fn real_dlsym() -> Option<DlsymFn> {
    let cached = REAL_DLSYM.load(Ordering::Acquire);
    if !cached.is_null() {
        return Some(unsafe { mem::transmute::<*mut c_void, DlsymFn>(cached) });
    }
    if BOOTSTRAPPING.swap(true, Ordering::SeqCst) {
        return None;
    }
    let found = unsafe { bootstrap() };
    BOOTSTRAPPING.store(false, Ordering::SeqCst);
    if found.is_null() {
        return None;
    }
    // First publication wins; concurrent bootstraps resolve the same address.
    let addr = match REAL_DLSYM.compare_exchange(
        ptr::null_mut(),
        found,
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => found,
        Err(prev) => prev,
    };
    Some(unsafe { mem::transmute::<*mut c_void, DlsymFn>(addr) })
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
unsafe fn bootstrap() -> *mut c_void {
    // Symbol-version per glibc ABI: x86-64, aarch64, and the 2.34 merge of
    // libdl into libc.
    const VERSIONS: [&CStr; 3] = [c"GLIBC_2.2.5", c"GLIBC_2.17", c"GLIBC_2.34"];
    for version in VERSIONS {
        let found = libc::dlvsym(libc::RTLD_NEXT, c"dlsym".as_ptr(), version.as_ptr());
        if !found.is_null() {
            return found;
        }
    }
    ptr::null_mut()
}

#[cfg(target_os = "macos")]
unsafe fn bootstrap() -> *mut c_void {
    let handle = libc::dlopen(c"/usr/lib/libSystem.B.dylib".as_ptr(), libc::RTLD_LAZY);
    if handle.is_null() {
        return ptr::null_mut();
    }
    // Two-level namespace: this binds to libSystem's dlsym, not ours.
    libc::dlsym(handle, c"dlsym".as_ptr())
}

#[cfg(not(any(all(target_os = "linux", target_env = "gnu"), target_os = "macos")))]
unsafe fn bootstrap() -> *mut c_void {
    ptr::null_mut()
}

/// Next-in-chain lookup relative to this library, used to reach the genuine
/// vendor implementations past the interception layer.
pub(crate) fn lookup_next(name: &CStr) -> *mut c_void {
    match real_dlsym() {
        Some(real) => unsafe { real(libc::RTLD_NEXT, name.as_ptr()) },
        None => ptr::null_mut(),
    }
}

/// Interposed process-wide symbol lookup.
///
/// `RTLD_NEXT` requests keep their usual meaning and go straight to the real
/// primitive. For every other scope the global default lookup runs first
/// (the preload position puts this library ahead of the vendor ones, so any
/// symbol the shim defines resolves to the shim), and only then the caller's
/// requested scope.
#[no_mangle]
pub unsafe extern "C" fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    let Some(real) = real_dlsym() else {
        return ptr::null_mut();
    };
    if handle == libc::RTLD_NEXT {
        return real(libc::RTLD_NEXT, symbol);
    }
    let preferred = real(libc::RTLD_DEFAULT, symbol);
    if !preferred.is_null() {
        return preferred;
    }
    real(handle, symbol)
}

#[cfg(all(test, target_os = "linux", target_env = "gnu"))]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_finds_the_real_primitive() {
        let real = real_dlsym().expect("glibc exports a versioned dlsym");
        // The resolved primitive must not be our own interposed definition.
        assert_ne!(real as usize, dlsym as usize);
    }

    #[test]
    fn lookup_next_resolves_libc_symbols() {
        let first = lookup_next(c"strlen");
        let second = lookup_next(c"strlen");
        assert!(!first.is_null());
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_symbols_report_not_found() {
        assert!(lookup_next(c"amock_no_such_symbol_").is_null());
    }
}
