//! Synthetic critical-fault event injection.
//!
//! `nvmlEventSetWait_v2` normally blocks until the driver reports an event.
//! When any device has a pending fault code configured, the wait is bypassed
//! entirely: the lowest-indexed configured device wins, its real handle is
//! resolved by delegation, and a fabricated XID critical-error event is
//! returned immediately, whatever timeout the caller asked for. With nothing
//! configured the call falls through to the genuine blocking wait.

use libc::c_uint;

use amock_config::{ConfigStore, Seg};

use super::abi::*;
use super::GPUS;
use crate::state::InjectorState;

/// Device population to scan: the configured count when present, the genuine
/// count otherwise. `None` means the scan cannot run at all.
fn scan_device_count(st: &InjectorState) -> Option<u32> {
    if let Some(count) = st.conf.get_u64(&[Seg::Key(GPUS), Seg::Key("card_count")]) {
        return Some(count as u32);
    }
    let origin = st.gpu.device_get_count.get()?;
    let mut count: c_uint = 0;
    let ret = unsafe { origin(&mut count) };
    if ret != NVML_SUCCESS {
        return None;
    }
    Some(count)
}

/// Pending fault code for one device. Only the first configured code is
/// surfaced; the event set cannot be inspected, so registration filters are
/// not honored for synthetic events.
fn pending_fault_code(conf: &ConfigStore, index: u32) -> Option<i64> {
    conf.get_i64(&[
        Seg::Key(GPUS),
        Seg::Index(index as usize),
        Seg::Key("crictl_xid"),
        Seg::Index(0),
    ])
}

/// Lowest index in `from..count` carrying a pending fault code, with the
/// code. The wait loop restarts the scan past a device whose handle cannot
/// be resolved.
fn first_pending_fault(conf: &ConfigStore, from: u32, count: u32) -> Option<(u32, i64)> {
    (from..count).find_map(|index| pending_fault_code(conf, index).map(|xid| (index, xid)))
}

#[no_mangle]
pub unsafe extern "C" fn nvmlEventSetWait_v2(
    set: NvmlEventSet,
    data: *mut NvmlEventData,
    timeout_ms: c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    if !data.is_null() {
        if let Some(count) = scan_device_count(st) {
            let mut from = 0;
            while let Some((index, xid)) = first_pending_fault(&st.conf, from, count) {
                from = index + 1;
                // The override is keyed by index but the event must carry the
                // caller-visible handle; a device whose handle cannot be
                // resolved is skipped rather than failing the wait.
                let Some(get_handle) = st.gpu.device_get_handle_by_index.get() else {
                    continue;
                };
                let mut device: NvmlDevice = std::ptr::null_mut();
                if get_handle(index, &mut device) != NVML_SUCCESS {
                    continue;
                }
                (*data).device = device;
                (*data).event_type = NVML_EVENT_TYPE_XID_CRITICAL_ERROR;
                (*data).event_data = xid as u64;
                return NVML_SUCCESS;
            }
        }
    }
    delegate!(
        st.gpu.event_set_wait_v2,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (set, data, timeout_ms)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(doc: &str) -> ConfigStore {
        ConfigStore::from_toml_str(doc).unwrap()
    }

    #[test]
    fn lowest_indexed_fault_wins() {
        let conf = conf("[gpus.2]\ncrictl_xid = [79]\n\n[gpus.1]\ncrictl_xid = [48, 62]\n");
        assert_eq!(first_pending_fault(&conf, 0, 4), Some((1, 48)));
    }

    #[test]
    fn scan_is_bounded_by_the_device_count() {
        let conf = conf("[gpus.5]\ncrictl_xid = [79]\n");
        assert_eq!(first_pending_fault(&conf, 0, 4), None);
        assert_eq!(first_pending_fault(&conf, 0, 6), Some((5, 79)));
    }

    #[test]
    fn no_configured_fault_means_no_injection() {
        let conf = conf("[gpus]\ncard_count = 4\n");
        assert_eq!(first_pending_fault(&conf, 0, 4), None);
    }

    #[test]
    fn empty_fault_list_reads_as_absent() {
        let conf = conf("[gpus.0]\ncrictl_xid = []\n");
        assert_eq!(pending_fault_code(&conf, 0), None);
    }
}
