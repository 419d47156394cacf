//! DCMI ABI surface, reproduced as the vendor library defines it.
//!
//! DCMI status codes are plain ints: zero for success, negative for errors.
//! Field spellings follow the vendor header.

use libc::{c_int, c_uint};

pub type DcmiReturn = c_int;
pub const DCMI_OK: DcmiReturn = 0;
pub const DCMI_ERR_CODE_INNER_ERR: DcmiReturn = -99997;

/// `struct dcmi_pcie_info_all`
#[repr(C)]
pub struct DcmiPcieInfoAll {
    pub venderid: c_uint,
    pub subvenderid: c_uint,
    pub deviceid: c_uint,
    pub subdeviceid: c_uint,
    pub bdf_busid: c_uint,
    pub bdf_deviceid: c_uint,
    pub bdf_funcid: c_uint,
    pub reserve: [c_uint; 32],
}

// One alias per intercepted entry point, matching the vendor prototypes.
pub type InitFn = unsafe extern "C" fn() -> DcmiReturn;
pub type GetCardListFn = unsafe extern "C" fn(*mut c_int, *mut c_int, c_int) -> DcmiReturn;
pub type GetDeviceIdInCardFn =
    unsafe extern "C" fn(c_int, *mut c_int, *mut c_int, *mut c_int) -> DcmiReturn;
pub type GetDeviceErrorCodeFn =
    unsafe extern "C" fn(c_int, c_int, *mut c_int, *mut c_uint, c_uint) -> DcmiReturn;
pub type GetDevicePcieInfoFn =
    unsafe extern "C" fn(c_int, c_int, *mut DcmiPcieInfoAll) -> DcmiReturn;
