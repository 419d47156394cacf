//! Typed caches of the genuine vendor entry points.
//!
//! Each intercepted entry point owns one [`OriginSlot`] carrying the symbol
//! name and the concrete function-pointer type, so the untyped address from
//! the dynamic loader is cast back exactly once, against the slot's declared
//! signature. The GPU and NPU registries are independent; a name cached in
//! one is never visible to the other.

use std::ffi::CStr;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use libc::c_void;

use crate::{hijack, sink};

/// Lazily resolved address of one genuine vendor function.
///
/// Resolution skips the interception layer via the next-in-chain lookup and
/// happens at most once per slot: the winning thread publishes with
/// compare-and-set, racing first callers observe the published address.
/// Failures are not cached: the vendor library may legitimately appear
/// later in the process lifetime (dlopen after attach).
pub(crate) struct OriginSlot<F> {
    name: &'static CStr,
    addr: AtomicPtr<c_void>,
    _signature: PhantomData<F>,
}

impl<F: Copy> OriginSlot<F> {
    pub(crate) const fn new(name: &'static CStr) -> Self {
        Self {
            name,
            addr: AtomicPtr::new(ptr::null_mut()),
            _signature: PhantomData,
        }
    }

    /// The cached origin, resolving on first use. `None` means the genuine
    /// implementation is unreachable; the dynamic loader's diagnostic has
    /// been recorded.
    pub(crate) fn get(&self) -> Option<F> {
        let cached = self.addr.load(Ordering::Acquire);
        if !cached.is_null() {
            return Some(unsafe { self.typed(cached) });
        }
        let found = hijack::lookup_next(self.name);
        if found.is_null() {
            note_resolve_failure(self.name);
            return None;
        }
        let addr = match self.addr.compare_exchange(
            ptr::null_mut(),
            found,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => found,
            Err(prev) => prev,
        };
        Some(unsafe { self.typed(addr) })
    }

    unsafe fn typed(&self, addr: *mut c_void) -> F {
        debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
        mem::transmute_copy::<*mut c_void, F>(&addr)
    }
}

fn note_resolve_failure(name: &CStr) {
    let detail = unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            None
        } else {
            Some(CStr::from_ptr(err).to_string_lossy().into_owned())
        }
    };
    match detail {
        Some(detail) => sink::write_line(&detail),
        None => sink::write_line(&format!(
            "failed to resolve origin of {}",
            name.to_string_lossy()
        )),
    }
}

#[cfg(all(test, target_os = "linux", target_env = "gnu"))]
mod tests {
    use super::*;
    use libc::{c_char, size_t};

    type StrlenFn = unsafe extern "C" fn(*const c_char) -> size_t;

    #[test]
    fn resolves_once_and_reuses_the_cached_address() {
        let slot: OriginSlot<StrlenFn> = OriginSlot::new(c"strlen");
        let first = slot.get().expect("libc strlen resolves");
        let second = slot.get().expect("cached address reused");
        assert_eq!(first as usize, second as usize);
        assert_eq!(unsafe { first(c"origin".as_ptr()) }, 6);
    }

    #[test]
    fn unresolvable_names_yield_none() {
        let slot: OriginSlot<StrlenFn> = OriginSlot::new(c"amock_absent_origin_");
        assert!(slot.get().is_none());
        // A later success is still possible; nothing negative is cached.
        assert!(slot.addr.load(Ordering::Acquire).is_null());
    }
}
