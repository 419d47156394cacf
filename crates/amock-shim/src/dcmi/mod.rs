//! NPU (DCMI) interception surface.
//!
//! Same decision pattern as the GPU surface, consulting the `[ascend_npus]`
//! configuration table. DCMI identifies devices by (card, device-in-card)
//! integer pairs rather than opaque handles, so no handle translation is
//! needed here.

pub mod abi;
mod card;
mod fault;

use crate::origin::OriginSlot;
use abi::*;

/// Configuration subsystem table for this surface.
const ASCEND_NPUS: &str = "ascend_npus";

/// Origin registry for the NPU subsystem, independent of the GPU one.
pub(crate) struct NpuOrigins {
    pub init: OriginSlot<InitFn>,
    pub get_card_list: OriginSlot<GetCardListFn>,
    pub get_device_id_in_card: OriginSlot<GetDeviceIdInCardFn>,
    pub get_device_errorcode_v2: OriginSlot<GetDeviceErrorCodeFn>,
    pub get_device_pcie_info_v2: OriginSlot<GetDevicePcieInfoFn>,
}

impl NpuOrigins {
    pub(crate) fn new() -> Self {
        Self {
            init: OriginSlot::new(c"dcmi_init"),
            get_card_list: OriginSlot::new(c"dcmi_get_card_list"),
            get_device_id_in_card: OriginSlot::new(c"dcmi_get_device_id_in_card"),
            get_device_errorcode_v2: OriginSlot::new(c"dcmi_get_device_errorcode_v2"),
            get_device_pcie_info_v2: OriginSlot::new(c"dcmi_get_device_pcie_info_v2"),
        }
    }
}
