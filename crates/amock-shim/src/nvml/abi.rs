//! NVML ABI surface, reproduced as the vendor library defines it.
//!
//! Callers are unaware they are not talking to the real library, so every
//! signature, enumeration value, and struct layout here must match the
//! vendor definitions exactly. Enumerations arrive from the caller as raw
//! integers and are kept that way; an out-of-range value is the caller's
//! bug to surface, not undefined behavior in ours.

use libc::{c_char, c_int, c_longlong, c_uint, c_ulong, c_ulonglong, c_void};

/// Opaque device handle (`nvmlDevice_t`).
pub type NvmlDevice = *mut c_void;
/// Opaque event-set handle (`nvmlEventSet_t`).
pub type NvmlEventSet = *mut c_void;

/// `nvmlReturn_t`
pub type NvmlReturn = c_int;
pub const NVML_SUCCESS: NvmlReturn = 0;
pub const NVML_ERROR_DRIVER_NOT_LOADED: NvmlReturn = 9;
pub const NVML_ERROR_FUNCTION_NOT_FOUND: NvmlReturn = 13;

/// `nvmlMemoryErrorType_t`
pub const NVML_MEMORY_ERROR_TYPE_CORRECTED: c_uint = 0;
pub const NVML_MEMORY_ERROR_TYPE_UNCORRECTED: c_uint = 1;

/// `nvmlEccCounterType_t`
pub const NVML_VOLATILE_ECC: c_uint = 0;
pub const NVML_AGGREGATE_ECC: c_uint = 1;

/// `nvmlMemoryLocation_t`
pub const NVML_MEMORY_LOCATION_L1_CACHE: c_uint = 0;
pub const NVML_MEMORY_LOCATION_L2_CACHE: c_uint = 1;
pub const NVML_MEMORY_LOCATION_DRAM: c_uint = 2;
pub const NVML_MEMORY_LOCATION_REGISTER_FILE: c_uint = 3;
pub const NVML_MEMORY_LOCATION_SRAM: c_uint = 7;

/// `nvmlEnableState_t`
pub const NVML_FEATURE_DISABLED: c_uint = 0;
pub const NVML_FEATURE_ENABLED: c_uint = 1;

/// `nvmlPageRetirementCause_t`
pub const NVML_PAGE_RETIREMENT_CAUSE_MULTIPLE_SINGLE_BIT_ECC_ERRORS: c_uint = 0;
pub const NVML_PAGE_RETIREMENT_CAUSE_DOUBLE_BIT_ECC_ERROR: c_uint = 1;

/// `nvmlFieldValue_t` field id for the NVLink link count.
pub const NVML_FI_DEV_NVLINK_LINK_COUNT: c_uint = 91;
/// `nvmlValueType_t`
pub const NVML_VALUE_TYPE_UNSIGNED_INT: c_uint = 1;

/// Event-type bit for XID critical errors.
pub const NVML_EVENT_TYPE_XID_CRITICAL_ERROR: c_ulonglong = 0x0000000000000008;

/// `nvmlPciInfo_t` (v3 layout).
#[repr(C)]
pub struct NvmlPciInfo {
    pub bus_id_legacy: [c_char; 16],
    pub domain: c_uint,
    pub bus: c_uint,
    pub device: c_uint,
    pub pci_device_id: c_uint,
    pub pci_sub_system_id: c_uint,
    pub bus_id: [c_char; 32],
}

/// `nvmlValue_t`
#[repr(C)]
#[derive(Clone, Copy)]
pub union NvmlValue {
    pub d_val: f64,
    pub ui_val: c_uint,
    pub ul_val: c_ulong,
    pub ull_val: c_ulonglong,
    pub sll_val: c_longlong,
    pub si_val: c_int,
}

/// `nvmlFieldValue_t`
#[repr(C)]
pub struct NvmlFieldValue {
    pub field_id: c_uint,
    pub scope_id: c_uint,
    pub timestamp: c_longlong,
    pub latency_usec: c_longlong,
    pub value_type: c_uint,
    pub nvml_return: NvmlReturn,
    pub value: NvmlValue,
}

/// `nvmlEventData_t` (v2 layout, as consumed by `nvmlEventSetWait_v2`).
#[repr(C)]
pub struct NvmlEventData {
    pub device: NvmlDevice,
    pub event_type: c_ulonglong,
    pub event_data: c_ulonglong,
    pub gpu_instance_id: c_uint,
    pub compute_instance_id: c_uint,
}

// One alias per intercepted entry point, matching the vendor prototypes.
pub type InitFn = unsafe extern "C" fn() -> NvmlReturn;
pub type InitWithFlagsFn = unsafe extern "C" fn(c_uint) -> NvmlReturn;
pub type DeviceGetCountFn = unsafe extern "C" fn(*mut c_uint) -> NvmlReturn;
pub type DeviceGetIndexFn = unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn;
pub type DeviceGetHandleByIndexFn = unsafe extern "C" fn(c_uint, *mut NvmlDevice) -> NvmlReturn;
pub type DeviceGetNameFn = unsafe extern "C" fn(NvmlDevice, *mut c_char, c_uint) -> NvmlReturn;
pub type DeviceGetUuidFn = unsafe extern "C" fn(NvmlDevice, *mut c_char, c_uint) -> NvmlReturn;
pub type DeviceGetArchitectureFn = unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn;
pub type DeviceGetMaxPcieLinkGenerationFn =
    unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn;
pub type DeviceGetMaxPcieLinkWidthFn = unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn;
pub type DeviceGetCurrPcieLinkWidthFn =
    unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn;
pub type DeviceGetMemoryErrorCounterFn =
    unsafe extern "C" fn(NvmlDevice, c_uint, c_uint, c_uint, *mut c_ulonglong) -> NvmlReturn;
pub type DeviceGetRemappedRowsFn =
    unsafe extern "C" fn(NvmlDevice, *mut c_uint, *mut c_uint, *mut c_uint, *mut c_uint) -> NvmlReturn;
pub type DeviceGetRetiredPagesFn =
    unsafe extern "C" fn(NvmlDevice, c_uint, *mut c_uint, *mut c_ulonglong) -> NvmlReturn;
pub type DeviceGetRetiredPagesPendingStatusFn =
    unsafe extern "C" fn(NvmlDevice, *mut c_uint) -> NvmlReturn;
pub type DeviceGetNvLinkStateFn =
    unsafe extern "C" fn(NvmlDevice, c_uint, *mut c_uint) -> NvmlReturn;
pub type DeviceGetFieldValuesFn =
    unsafe extern "C" fn(NvmlDevice, c_int, *mut NvmlFieldValue) -> NvmlReturn;
pub type DeviceGetPciInfoFn = unsafe extern "C" fn(NvmlDevice, *mut NvmlPciInfo) -> NvmlReturn;
pub type EventSetWaitFn =
    unsafe extern "C" fn(NvmlEventSet, *mut NvmlEventData, c_uint) -> NvmlReturn;
