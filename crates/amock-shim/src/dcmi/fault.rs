//! Fault-code reporting entry point.
//!
//! `ascend_npus.<card>.<dev>.fault_codes` is an array of integer codes; its
//! presence, even empty, fully replaces the device's reported error set.

use libc::{c_int, c_uint};

use amock_config::{ConfigStore, Seg};

use super::abi::*;
use super::ASCEND_NPUS;
use crate::state::InjectorState;

/// Configured codes for one (card, device) pair. Non-integer array elements
/// are skipped; an absent array means no override.
fn configured_fault_codes(conf: &ConfigStore, card_id: c_int, device_id: c_int) -> Option<Vec<c_uint>> {
    if card_id < 0 || device_id < 0 {
        return None;
    }
    let array = conf.get_array(&[
        Seg::Key(ASCEND_NPUS),
        Seg::Index(card_id as usize),
        Seg::Index(device_id as usize),
        Seg::Key("fault_codes"),
    ])?;
    Some(
        array
            .iter()
            .filter_map(|value| value.as_integer())
            .map(|code| code as c_uint)
            .collect(),
    )
}

fn fill_codes(codes: &[c_uint], out: &mut [c_uint]) -> usize {
    let fill = codes.len().min(out.len());
    out[..fill].copy_from_slice(&codes[..fill]);
    fill
}

#[no_mangle]
pub unsafe extern "C" fn dcmi_get_device_errorcode_v2(
    card_id: c_int,
    device_id: c_int,
    error_count: *mut c_int,
    error_code_list: *mut c_uint,
    list_len: c_uint,
) -> DcmiReturn {
    let Some(st) = InjectorState::get() else {
        return DCMI_ERR_CODE_INNER_ERR;
    };
    if let Some(codes) = configured_fault_codes(&st.conf, card_id, device_id) {
        let written = if !error_code_list.is_null() && list_len > 0 {
            let out = std::slice::from_raw_parts_mut(error_code_list, list_len as usize);
            fill_codes(&codes, out)
        } else {
            0
        };
        *error_count = written as c_int;
        return DCMI_OK;
    }
    delegate!(
        st.npu.get_device_errorcode_v2,
        DCMI_ERR_CODE_INNER_ERR,
        (card_id, device_id, error_count, error_code_list, list_len)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(doc: &str) -> ConfigStore {
        ConfigStore::from_toml_str(doc).unwrap()
    }

    #[test]
    fn codes_come_from_the_card_and_device_pair() {
        let conf = conf("[ascend_npus.1.0]\nfault_codes = [0x80C98022, 0x80D38024]\n");
        assert_eq!(
            configured_fault_codes(&conf, 1, 0),
            Some(vec![0x80C9_8022, 0x80D3_8024])
        );
        assert_eq!(configured_fault_codes(&conf, 0, 0), None);
        assert_eq!(configured_fault_codes(&conf, -1, 0), None);
    }

    #[test]
    fn empty_array_still_overrides_with_zero_codes() {
        let conf = conf("[ascend_npus.0.0]\nfault_codes = []\n");
        assert_eq!(configured_fault_codes(&conf, 0, 0), Some(vec![]));
    }

    #[test]
    fn non_integer_elements_are_skipped() {
        let conf = conf("[ascend_npus.0.0]\nfault_codes = [1, \"two\", 3]\n");
        assert_eq!(configured_fault_codes(&conf, 0, 0), Some(vec![1, 3]));
    }

    #[test]
    fn fill_clamps_to_the_caller_buffer() {
        let mut out = [0; 2];
        assert_eq!(fill_codes(&[7, 8, 9], &mut out), 2);
        assert_eq!(out, [7, 8]);
    }
}
