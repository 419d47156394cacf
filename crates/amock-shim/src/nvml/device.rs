//! Device identity and topology entry points.

use libc::{c_char, c_uint};

use amock_config::Seg;

use super::abi::*;
use super::{device_index, gpu_i64, gpu_str, write_c_string, GPUS};
use crate::state::InjectorState;

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetCount_v2(device_count: *mut c_uint) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    if let Some(count) = st.conf.get_u64(&[Seg::Key(GPUS), Seg::Key("card_count")]) {
        *device_count = count as c_uint;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_count_v2,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device_count)
    )
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetName(
    device: NvmlDevice,
    name: *mut c_char,
    length: c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) = gpu_str(&st.conf, index, "device_name") {
        write_c_string(configured, name, length);
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_name,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, name, length)
    )
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetUUID(
    device: NvmlDevice,
    uuid: *mut c_char,
    length: c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) = gpu_str(&st.conf, index, "uuid") {
        write_c_string(configured, uuid, length);
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_uuid,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, uuid, length)
    )
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetArchitecture(
    device: NvmlDevice,
    arch: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) = gpu_i64(&st.conf, index, "arch") {
        *arch = configured as c_uint;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_architecture,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, arch)
    )
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetMaxPcieLinkGeneration(
    device: NvmlDevice,
    max_link_gen: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) = gpu_i64(&st.conf, index, "link_gen") {
        *max_link_gen = configured as c_uint;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_max_pcie_link_generation,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, max_link_gen)
    )
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetMaxPcieLinkWidth(
    device: NvmlDevice,
    max_link_width: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) = gpu_i64(&st.conf, index, "link_width_max") {
        *max_link_width = configured as c_uint;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_max_pcie_link_width,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, max_link_width)
    )
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetCurrPcieLinkWidth(
    device: NvmlDevice,
    curr_link_width: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) = gpu_i64(&st.conf, index, "link_width_current") {
        *curr_link_width = configured as c_uint;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_curr_pcie_link_width,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, curr_link_width)
    )
}

/// Per-link activity override. A configured `nvlink_active[link]` rewrites
/// the output, but the genuine call still runs so the rest of the reported
/// state stays real; its status is returned unchanged.
#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetNvLinkState(
    device: NvmlDevice,
    link: c_uint,
    is_active: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    let configured = st.conf.get_bool(&[
        Seg::Key(GPUS),
        Seg::Index(index as usize),
        Seg::Key("nvlink_active"),
        Seg::Index(link as usize),
    ]);
    if let Some(active) = configured {
        *is_active = if active {
            NVML_FEATURE_ENABLED
        } else {
            NVML_FEATURE_DISABLED
        };
    }
    delegate!(
        st.gpu.device_get_nvlink_state,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, link, is_active)
    )
}

fn parse_pci(config: &str) -> Option<(c_uint, c_uint)> {
    let mut parts = config.split(':');
    let bus = c_uint::from_str_radix(parts.next()?.trim(), 16).ok()?;
    let device_part = parts.next()?;
    let device_digits = device_part.split('.').next().unwrap_or(device_part);
    let device = c_uint::from_str_radix(device_digits.trim(), 16).ok()?;
    Some((bus, device))
}

/// `gpus.<idx>.pci` carries "bus:device.function" in hex. Only the bus and
/// device fields are fabricated; the rest of the caller's struct is left as
/// delivered.
#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetPciInfo_v3(
    device: NvmlDevice,
    pci: *mut NvmlPciInfo,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(parsed) = gpu_str(&st.conf, index, "pci").and_then(parse_pci) {
        (*pci).bus = parsed.0;
        (*pci).device = parsed.1;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_pci_info_v3,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, pci)
    )
}

#[cfg(test)]
mod tests {
    use super::parse_pci;

    #[test]
    fn pci_config_parses_bus_and_device() {
        assert_eq!(parse_pci("3b:00.0"), Some((0x3b, 0)));
        assert_eq!(parse_pci("af:1f.6"), Some((0xaf, 0x1f)));
    }

    #[test]
    fn malformed_pci_config_is_rejected() {
        assert_eq!(parse_pci("not-a-bdf"), None);
        assert_eq!(parse_pci(""), None);
    }
}
