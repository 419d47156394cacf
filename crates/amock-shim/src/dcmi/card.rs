//! Card discovery and identity entry points.

use libc::{c_int, c_uint};

use amock_config::Seg;

use super::abi::*;
use super::ASCEND_NPUS;
use crate::state::InjectorState;

#[no_mangle]
pub unsafe extern "C" fn dcmi_init() -> DcmiReturn {
    let Some(st) = InjectorState::get() else {
        return DCMI_ERR_CODE_INNER_ERR;
    };
    if let Some(forced) = st
        .conf
        .get_i64(&[Seg::Key(ASCEND_NPUS), Seg::Key("dcmi_init_error")])
    {
        return forced as DcmiReturn;
    }
    delegate!(st.npu.init, DCMI_ERR_CODE_INNER_ERR, ())
}

/// Fabricated cards are numbered 0..count; the id list is clamped to the
/// caller's buffer while the reported total stays at the configured count.
fn fill_card_ids(count: usize, out: &mut [c_int]) -> usize {
    let fill = count.min(out.len());
    for (id, slot) in out[..fill].iter_mut().enumerate() {
        *slot = id as c_int;
    }
    fill
}

#[no_mangle]
pub unsafe extern "C" fn dcmi_get_card_list(
    card_num: *mut c_int,
    card_list: *mut c_int,
    list_len: c_int,
) -> DcmiReturn {
    let Some(st) = InjectorState::get() else {
        return DCMI_ERR_CODE_INNER_ERR;
    };
    if let Some(count) = st
        .conf
        .get_u64(&[Seg::Key(ASCEND_NPUS), Seg::Key("card_count")])
    {
        *card_num = count as c_int;
        if !card_list.is_null() && list_len > 0 {
            let out = std::slice::from_raw_parts_mut(card_list, list_len as usize);
            fill_card_ids(count as usize, out);
        }
        return DCMI_OK;
    }
    delegate!(
        st.npu.get_card_list,
        DCMI_ERR_CODE_INNER_ERR,
        (card_num, card_list, list_len)
    )
}

/// A mocked card always carries a single device; the MCU and control-CPU ids
/// are left as delivered by the caller.
#[no_mangle]
pub unsafe extern "C" fn dcmi_get_device_id_in_card(
    card_id: c_int,
    device_id_max: *mut c_int,
    mcu_id: *mut c_int,
    cpu_id: *mut c_int,
) -> DcmiReturn {
    let Some(st) = InjectorState::get() else {
        return DCMI_ERR_CODE_INNER_ERR;
    };
    if st
        .conf
        .get_u64(&[Seg::Key(ASCEND_NPUS), Seg::Key("card_count")])
        .is_some()
    {
        *device_id_max = 1;
        return DCMI_OK;
    }
    delegate!(
        st.npu.get_device_id_in_card,
        DCMI_ERR_CODE_INNER_ERR,
        (card_id, device_id_max, mcu_id, cpu_id)
    )
}

/// `ascend_npus.<card>.<dev>.pcie` carries "bus:device.function" in hex.
fn parse_bdf(config: &str) -> Option<(c_uint, c_uint, c_uint)> {
    let mut parts = config.split(':');
    let bus = c_uint::from_str_radix(parts.next()?.trim(), 16).ok()?;
    let rest = parts.next()?;
    let mut dev_fn = rest.split('.');
    let device = c_uint::from_str_radix(dev_fn.next()?.trim(), 16).ok()?;
    let function = match dev_fn.next() {
        Some(f) => c_uint::from_str_radix(f.trim(), 16).ok()?,
        None => 0,
    };
    Some((bus, device, function))
}

#[no_mangle]
pub unsafe extern "C" fn dcmi_get_device_pcie_info_v2(
    card_id: c_int,
    device_id: c_int,
    pcie_info: *mut DcmiPcieInfoAll,
) -> DcmiReturn {
    let Some(st) = InjectorState::get() else {
        return DCMI_ERR_CODE_INNER_ERR;
    };
    if card_id >= 0 && device_id >= 0 && !pcie_info.is_null() {
        let configured = st.conf.get_str(&[
            Seg::Key(ASCEND_NPUS),
            Seg::Index(card_id as usize),
            Seg::Index(device_id as usize),
            Seg::Key("pcie"),
        ]);
        if let Some(parsed) = configured.and_then(parse_bdf) {
            (*pcie_info).bdf_busid = parsed.0;
            (*pcie_info).bdf_deviceid = parsed.1;
            (*pcie_info).bdf_funcid = parsed.2;
            return DCMI_OK;
        }
    }
    delegate!(
        st.npu.get_device_pcie_info_v2,
        DCMI_ERR_CODE_INNER_ERR,
        (card_id, device_id, pcie_info)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_ids_fill_ascending_and_clamp_to_the_buffer() {
        let mut out = [-1; 8];
        assert_eq!(fill_card_ids(3, &mut out), 3);
        assert_eq!(&out[..4], &[0, 1, 2, -1]);

        let mut short = [-1; 2];
        assert_eq!(fill_card_ids(5, &mut short), 2);
        assert_eq!(short, [0, 1]);
    }

    #[test]
    fn bdf_parses_with_and_without_function() {
        assert_eq!(parse_bdf("82:00.1"), Some((0x82, 0, 1)));
        assert_eq!(parse_bdf("5e:1c"), Some((0x5e, 0x1c, 0)));
        assert_eq!(parse_bdf("bogus"), None);
    }
}
