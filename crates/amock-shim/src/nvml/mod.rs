//! GPU (NVML) interception surface.
//!
//! One override dispatch unit per vendor entry point, each deciding between
//! fabricating output from the `[gpus]` configuration table, delegating to
//! the genuine implementation, or delegating and then rewriting selected
//! output fields. Per-device overrides are addressed by device *index*, so
//! per-device units first translate the caller's opaque handle through the
//! genuine `nvmlDeviceGetIndex`.

pub mod abi;
mod device;
mod events;
mod init;
mod memory;

use libc::{c_char, c_uint};

use amock_config::{ConfigStore, Seg};

use crate::origin::OriginSlot;
use crate::state::InjectorState;
use abi::*;

/// Configuration subsystem table for this surface.
const GPUS: &str = "gpus";

/// Origin registry for the GPU subsystem. Names cached here are never shared
/// with the NPU registry, even when textually identical.
pub(crate) struct GpuOrigins {
    pub init: OriginSlot<InitFn>,
    pub init_with_flags: OriginSlot<InitWithFlagsFn>,
    pub device_get_count_v2: OriginSlot<DeviceGetCountFn>,
    pub device_get_count: OriginSlot<DeviceGetCountFn>,
    pub device_get_index: OriginSlot<DeviceGetIndexFn>,
    pub device_get_handle_by_index: OriginSlot<DeviceGetHandleByIndexFn>,
    pub device_get_name: OriginSlot<DeviceGetNameFn>,
    pub device_get_uuid: OriginSlot<DeviceGetUuidFn>,
    pub device_get_architecture: OriginSlot<DeviceGetArchitectureFn>,
    pub device_get_max_pcie_link_generation: OriginSlot<DeviceGetMaxPcieLinkGenerationFn>,
    pub device_get_max_pcie_link_width: OriginSlot<DeviceGetMaxPcieLinkWidthFn>,
    pub device_get_curr_pcie_link_width: OriginSlot<DeviceGetCurrPcieLinkWidthFn>,
    pub device_get_memory_error_counter: OriginSlot<DeviceGetMemoryErrorCounterFn>,
    pub device_get_remapped_rows: OriginSlot<DeviceGetRemappedRowsFn>,
    pub device_get_retired_pages: OriginSlot<DeviceGetRetiredPagesFn>,
    pub device_get_retired_pages_pending_status: OriginSlot<DeviceGetRetiredPagesPendingStatusFn>,
    pub device_get_nvlink_state: OriginSlot<DeviceGetNvLinkStateFn>,
    pub device_get_field_values: OriginSlot<DeviceGetFieldValuesFn>,
    pub device_get_pci_info_v3: OriginSlot<DeviceGetPciInfoFn>,
    pub event_set_wait_v2: OriginSlot<EventSetWaitFn>,
}

impl GpuOrigins {
    pub(crate) fn new() -> Self {
        Self {
            init: OriginSlot::new(c"nvmlInit_v2"),
            init_with_flags: OriginSlot::new(c"nvmlInitWithFlags"),
            device_get_count_v2: OriginSlot::new(c"nvmlDeviceGetCount_v2"),
            device_get_count: OriginSlot::new(c"nvmlDeviceGetCount"),
            device_get_index: OriginSlot::new(c"nvmlDeviceGetIndex"),
            device_get_handle_by_index: OriginSlot::new(c"nvmlDeviceGetHandleByIndex"),
            device_get_name: OriginSlot::new(c"nvmlDeviceGetName"),
            device_get_uuid: OriginSlot::new(c"nvmlDeviceGetUUID"),
            device_get_architecture: OriginSlot::new(c"nvmlDeviceGetArchitecture"),
            device_get_max_pcie_link_generation: OriginSlot::new(
                c"nvmlDeviceGetMaxPcieLinkGeneration",
            ),
            device_get_max_pcie_link_width: OriginSlot::new(c"nvmlDeviceGetMaxPcieLinkWidth"),
            device_get_curr_pcie_link_width: OriginSlot::new(c"nvmlDeviceGetCurrPcieLinkWidth"),
            device_get_memory_error_counter: OriginSlot::new(c"nvmlDeviceGetMemoryErrorCounter"),
            device_get_remapped_rows: OriginSlot::new(c"nvmlDeviceGetRemappedRows"),
            device_get_retired_pages: OriginSlot::new(c"nvmlDeviceGetRetiredPages"),
            device_get_retired_pages_pending_status: OriginSlot::new(
                c"nvmlDeviceGetRetiredPagesPendingStatus",
            ),
            device_get_nvlink_state: OriginSlot::new(c"nvmlDeviceGetNvLinkState"),
            device_get_field_values: OriginSlot::new(c"nvmlDeviceGetFieldValues"),
            device_get_pci_info_v3: OriginSlot::new(c"nvmlDeviceGetPciInfo_v3"),
            event_set_wait_v2: OriginSlot::new(c"nvmlEventSetWait_v2"),
        }
    }
}

/// Translate an opaque device handle to its index by delegation. Overrides
/// are addressed by index; a failed translation propagates verbatim.
fn device_index(st: &InjectorState, device: NvmlDevice) -> Result<u32, NvmlReturn> {
    let get_index = st
        .gpu
        .device_get_index
        .get()
        .ok_or(NVML_ERROR_FUNCTION_NOT_FOUND)?;
    let mut index: c_uint = 0;
    let ret = unsafe { get_index(device, &mut index) };
    if ret != NVML_SUCCESS {
        return Err(ret);
    }
    Ok(index)
}

fn gpu_i64(conf: &ConfigStore, index: u32, field: &str) -> Option<i64> {
    conf.get_i64(&[Seg::Key(GPUS), Seg::Index(index as usize), Seg::Key(field)])
}

fn gpu_u64(conf: &ConfigStore, index: u32, field: &str) -> Option<u64> {
    conf.get_u64(&[Seg::Key(GPUS), Seg::Index(index as usize), Seg::Key(field)])
}

fn gpu_bool(conf: &ConfigStore, index: u32, field: &str) -> Option<bool> {
    conf.get_bool(&[Seg::Key(GPUS), Seg::Index(index as usize), Seg::Key(field)])
}

fn gpu_str<'c>(conf: &'c ConfigStore, index: u32, field: &str) -> Option<&'c str> {
    conf.get_str(&[Seg::Key(GPUS), Seg::Index(index as usize), Seg::Key(field)])
}

/// Copy a configured string into a caller-supplied buffer, truncating to fit
/// and always NUL-terminating when the buffer has any room at all.
unsafe fn write_c_string(value: &str, out: *mut c_char, capacity: c_uint) {
    if out.is_null() || capacity == 0 {
        return;
    }
    let copy = value.len().min(capacity as usize - 1);
    std::ptr::copy_nonoverlapping(value.as_ptr(), out.cast::<u8>(), copy);
    *out.add(copy) = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn c_string_writes_truncate_and_terminate() {
        let mut buf = [0x7f as c_char; 8];
        unsafe { write_c_string("A100-SXM4", buf.as_mut_ptr(), buf.len() as c_uint) };
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "A100-SX");
    }

    #[test]
    fn c_string_write_into_empty_buffer_is_a_noop() {
        let mut buf = [0x7f as c_char; 1];
        unsafe { write_c_string("name", buf.as_mut_ptr(), 0) };
        assert_eq!(buf[0], 0x7f);
    }
}
