//! Library initialization entry points.
//!
//! `gpus.nvml_init_error` forces a specific status out of both init variants
//! without the driver ever being touched, which is how a harness simulates a
//! broken or absent driver stack.

use libc::c_uint;

use amock_config::Seg;

use super::abi::*;
use super::GPUS;
use crate::state::InjectorState;

#[no_mangle]
pub unsafe extern "C" fn nvmlInit_v2() -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_DRIVER_NOT_LOADED;
    };
    if let Some(forced) = st.conf.get_i64(&[Seg::Key(GPUS), Seg::Key("nvml_init_error")]) {
        return forced as NvmlReturn;
    }
    delegate!(st.gpu.init, NVML_ERROR_DRIVER_NOT_LOADED, ())
}

#[no_mangle]
pub unsafe extern "C" fn nvmlInitWithFlags(flags: c_uint) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_DRIVER_NOT_LOADED;
    };
    if let Some(forced) = st.conf.get_i64(&[Seg::Key(GPUS), Seg::Key("nvml_init_error")]) {
        return forced as NvmlReturn;
    }
    delegate!(st.gpu.init_with_flags, NVML_ERROR_DRIVER_NOT_LOADED, (flags))
}
