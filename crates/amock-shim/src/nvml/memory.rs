//! ECC, row-remapping, and page-retirement entry points: the fault surface
//! a harness cares most about, since real hardware only produces these
//! conditions by actually degrading.

use libc::{c_int, c_uint, c_ulonglong};

use amock_config::{ConfigStore, Seg};

use super::abi::*;
use super::{device_index, gpu_bool, gpu_u64, GPUS};
use crate::state::InjectorState;

/// Configuration field for one (error type, counter type, location) triple.
/// Triples outside this table are never overridden.
fn memory_error_field(error_type: c_uint, counter_type: c_uint, location: c_uint) -> Option<&'static str> {
    match (error_type, counter_type, location) {
        (NVML_MEMORY_ERROR_TYPE_UNCORRECTED, NVML_VOLATILE_ECC, NVML_MEMORY_LOCATION_SRAM) => {
            Some("sram_ue")
        }
        (NVML_MEMORY_ERROR_TYPE_UNCORRECTED, NVML_VOLATILE_ECC, NVML_MEMORY_LOCATION_DRAM) => {
            Some("dram_ue")
        }
        (NVML_MEMORY_ERROR_TYPE_CORRECTED, NVML_VOLATILE_ECC, NVML_MEMORY_LOCATION_DRAM) => {
            Some("dram_ce")
        }
        (NVML_MEMORY_ERROR_TYPE_UNCORRECTED, NVML_AGGREGATE_ECC, NVML_MEMORY_LOCATION_L1_CACHE) => {
            Some("uncorrectable_agg_l1")
        }
        (NVML_MEMORY_ERROR_TYPE_UNCORRECTED, NVML_AGGREGATE_ECC, NVML_MEMORY_LOCATION_L2_CACHE) => {
            Some("uncorrectable_agg_l2")
        }
        (
            NVML_MEMORY_ERROR_TYPE_UNCORRECTED,
            NVML_AGGREGATE_ECC,
            NVML_MEMORY_LOCATION_REGISTER_FILE,
        ) => Some("uncorrectable_agg_reg"),
        _ => None,
    }
}

fn retired_pages_field(cause: c_uint) -> Option<&'static str> {
    match cause {
        NVML_PAGE_RETIREMENT_CAUSE_MULTIPLE_SINGLE_BIT_ECC_ERRORS => Some("retired_page_sbe"),
        NVML_PAGE_RETIREMENT_CAUSE_DOUBLE_BIT_ECC_ERROR => Some("retired_page_dbe"),
        _ => None,
    }
}

fn configured_error_count(
    conf: &ConfigStore,
    index: u32,
    error_type: c_uint,
    counter_type: c_uint,
    location: c_uint,
) -> Option<u64> {
    let field = memory_error_field(error_type, counter_type, location)?;
    gpu_u64(conf, index, field)
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetMemoryErrorCounter(
    device: NvmlDevice,
    error_type: c_uint,
    counter_type: c_uint,
    location: c_uint,
    count: *mut c_ulonglong,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(configured) =
        configured_error_count(&st.conf, index, error_type, counter_type, location)
    {
        *count = configured;
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_memory_error_counter,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, error_type, counter_type, location, count)
    )
}

/// Augmented delegation: the genuine call populates everything first, then
/// the pending/failure flags are rewritten from configuration. Any rewrite
/// forces a success status so the fabricated flags are believed.
#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetRemappedRows(
    device: NvmlDevice,
    corr_rows: *mut c_uint,
    unc_rows: *mut c_uint,
    is_pending: *mut c_uint,
    failure_occurred: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let Some(origin) = st.gpu.device_get_remapped_rows.get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let origin_ret = origin(device, corr_rows, unc_rows, is_pending, failure_occurred);
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    let mut rewritten = false;
    if let Some(failed) = gpu_bool(&st.conf, index, "remapping_failure") {
        *failure_occurred = failed.into();
        rewritten = true;
    }
    if let Some(pending) = gpu_bool(&st.conf, index, "remapping_pending") {
        *is_pending = pending.into();
        rewritten = true;
    }
    if rewritten {
        return NVML_SUCCESS;
    }
    origin_ret
}

/// Augmented delegation with a hard ordering requirement: the genuine call
/// runs first, at the caller's untouched page count, because it fills the
/// caller's bounded `addresses` buffer. Only the copy of the count returned
/// to the caller may be overridden; overriding before the call could make
/// the genuine implementation overflow that buffer.
#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetRetiredPages(
    device: NvmlDevice,
    cause: c_uint,
    page_count: *mut c_uint,
    addresses: *mut c_ulonglong,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let Some(origin) = st.gpu.device_get_retired_pages.get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let origin_ret = origin(device, cause, page_count, addresses);
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(field) = retired_pages_field(cause) {
        if let Some(configured) = gpu_u64(&st.conf, index, field) {
            *page_count = configured as c_uint;
            return NVML_SUCCESS;
        }
    }
    origin_ret
}

#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetRetiredPagesPendingStatus(
    device: NvmlDevice,
    is_pending: *mut c_uint,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    if let Some(pending) = gpu_bool(&st.conf, index, "retired_page_pending") {
        *is_pending = if pending {
            NVML_FEATURE_ENABLED
        } else {
            NVML_FEATURE_DISABLED
        };
        return NVML_SUCCESS;
    }
    delegate!(
        st.gpu.device_get_retired_pages_pending_status,
        NVML_ERROR_FUNCTION_NOT_FOUND,
        (device, is_pending)
    )
}

/// Augmented delegation: after the genuine call fills the caller's value
/// array, a configured `nvlink_active` array rewrites the NVLink link-count
/// field to its length, forcing success so the fabricated count is believed.
#[no_mangle]
pub unsafe extern "C" fn nvmlDeviceGetFieldValues(
    device: NvmlDevice,
    values_count: c_int,
    values: *mut NvmlFieldValue,
) -> NvmlReturn {
    let Some(st) = InjectorState::get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let Some(origin) = st.gpu.device_get_field_values.get() else {
        return NVML_ERROR_FUNCTION_NOT_FOUND;
    };
    let mut origin_ret = origin(device, values_count, values);
    let index = match device_index(st, device) {
        Ok(index) => index,
        Err(ret) => return ret,
    };
    let links = st
        .conf
        .get_array(&[
            Seg::Key(GPUS),
            Seg::Index(index as usize),
            Seg::Key("nvlink_active"),
        ])
        .map(|a| a.len());
    if let Some(link_count) = links {
        for i in 0..values_count.max(0) as usize {
            let value = &mut *values.add(i);
            if value.field_id == NVML_FI_DEV_NVLINK_LINK_COUNT {
                value.value_type = NVML_VALUE_TYPE_UNSIGNED_INT;
                value.value = NvmlValue {
                    ui_val: link_count as c_uint,
                };
                origin_ret = NVML_SUCCESS;
            }
        }
    }
    origin_ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(doc: &str) -> ConfigStore {
        ConfigStore::from_toml_str(doc).unwrap()
    }

    #[test]
    fn volatile_dram_uncorrected_maps_to_dram_ue() {
        let conf = conf("[gpus.2]\ndram_ue = 7\n");
        assert_eq!(
            configured_error_count(
                &conf,
                2,
                NVML_MEMORY_ERROR_TYPE_UNCORRECTED,
                NVML_VOLATILE_ECC,
                NVML_MEMORY_LOCATION_DRAM,
            ),
            Some(7)
        );
        // The same query for a different device falls through.
        assert_eq!(
            configured_error_count(
                &conf,
                3,
                NVML_MEMORY_ERROR_TYPE_UNCORRECTED,
                NVML_VOLATILE_ECC,
                NVML_MEMORY_LOCATION_DRAM,
            ),
            None
        );
    }

    #[test]
    fn unmapped_counter_triples_never_override() {
        let conf = conf("[gpus.0]\ndram_ue = 7\nsram_ue = 1\n");
        // Aggregate DRAM has no configuration field.
        assert_eq!(
            configured_error_count(
                &conf,
                0,
                NVML_MEMORY_ERROR_TYPE_UNCORRECTED,
                NVML_AGGREGATE_ECC,
                NVML_MEMORY_LOCATION_DRAM,
            ),
            None
        );
    }

    #[test]
    fn aggregate_locations_map_to_their_fields() {
        let conf = conf(
            "[gpus.1]\nuncorrectable_agg_l1 = 3\nuncorrectable_agg_l2 = 4\nuncorrectable_agg_reg = 5\n",
        );
        for (location, expected) in [
            (NVML_MEMORY_LOCATION_L1_CACHE, 3),
            (NVML_MEMORY_LOCATION_L2_CACHE, 4),
            (NVML_MEMORY_LOCATION_REGISTER_FILE, 5),
        ] {
            assert_eq!(
                configured_error_count(
                    &conf,
                    1,
                    NVML_MEMORY_ERROR_TYPE_UNCORRECTED,
                    NVML_AGGREGATE_ECC,
                    location,
                ),
                Some(expected)
            );
        }
    }

    #[test]
    fn retirement_causes_map_to_their_fields() {
        assert_eq!(
            retired_pages_field(NVML_PAGE_RETIREMENT_CAUSE_MULTIPLE_SINGLE_BIT_ECC_ERRORS),
            Some("retired_page_sbe")
        );
        assert_eq!(
            retired_pages_field(NVML_PAGE_RETIREMENT_CAUSE_DOUBLE_BIT_ECC_ERROR),
            Some("retired_page_dbe")
        );
        assert_eq!(retired_pages_field(99), None);
    }
}
