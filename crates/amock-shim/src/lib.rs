//! # amock-shim
//!
//! LD_PRELOAD injection library that substitutes or augments GPU (NVML) and
//! NPU (DCMI) management API calls with responses taken from an override
//! configuration, so a test harness can exercise fault paths (ECC errors,
//! retired pages, link degradation, critical XID events) without the
//! hardware to produce them.
//!
//! Loaded ahead of the vendor libraries, the shim exports their entry points
//! directly and additionally interposes `dlsym` so that by-name lookups,
//! including the vendor library's own internal ones, land on the shim's
//! definitions first. Each intercepted call consults the configuration and
//! either fabricates its output, delegates to the genuine implementation
//! (reached by skipping past the shim in the library search order), or calls
//! the genuine implementation and rewrites selected output fields.
//!
//! Every failure degrades toward "behave like the unmodified library":
//! missing configuration means pure delegation, an unresolvable origin maps
//! to the vendor's own "not available" status, and nothing in here may take
//! the host process down.

// Vendor entry points keep their C names.
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

#[macro_use]
mod macros;

pub mod dcmi;
pub mod hijack;
pub mod nvml;
mod origin;
mod sink;
mod state;

/// Library constructor: build the process-wide state as soon as the dynamic
/// loader maps us, before the host makes its first vendor call.
#[cfg(target_os = "linux")]
#[link_section = ".init_array"]
#[used]
static ATTACH: unsafe extern "C" fn() = {
    unsafe extern "C" fn attach() {
        crate::state::attach();
    }
    attach
};

#[cfg(target_os = "linux")]
#[link_section = ".fini_array"]
#[used]
static DETACH: unsafe extern "C" fn() = {
    unsafe extern "C" fn detach() {
        crate::state::detach();
    }
    detach
};

#[cfg(target_os = "macos")]
#[link_section = "__DATA,__mod_init_func"]
#[used]
static ATTACH: unsafe extern "C" fn() = {
    unsafe extern "C" fn attach() {
        crate::state::attach();
    }
    attach
};

#[cfg(target_os = "macos")]
#[link_section = "__DATA,__mod_term_func"]
#[used]
static DETACH: unsafe extern "C" fn() = {
    unsafe extern "C" fn detach() {
        crate::state::detach();
    }
    detach
};
