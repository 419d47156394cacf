/// Resolve an origin slot and call it, or return the uniform "not available"
/// status when the genuine implementation cannot be reached.
///
/// ```ignore
/// delegate!(st.gpu.device_get_name, NVML_ERROR_FUNCTION_NOT_FOUND, (device, name, length))
/// ```
macro_rules! delegate {
    ($slot:expr, $unavailable:expr, ($($arg:expr),* $(,)?)) => {
        match $slot.get() {
            Some(origin) => origin($($arg),*),
            None => $unavailable,
        }
    };
}
