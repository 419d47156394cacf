//! Append-only diagnostic sink.
//!
//! One line per event, appended to `<root>/log` where `<root>` is the mounted
//! host staging directory when present, the local one otherwise. The file is
//! opened and closed per write so the shim never holds a descriptor open in
//! the host process. No writable location silently disables the sink; a
//! diagnostic must never fail the intercepted call.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

const HOST_LOG_ROOT: &str = "/host/opt/gpu_mock";
const LOG_ROOT: &str = "/opt/gpu_mock";
const LOG_NAME: &str = "log";

pub(crate) fn write_line(msg: &str) {
    if !write_line_under(Path::new(HOST_LOG_ROOT), msg) {
        write_line_under(Path::new(LOG_ROOT), msg);
    }
}

fn write_line_under(root: &Path, msg: &str) -> bool {
    if !root.is_dir() {
        return false;
    }
    let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(root.join(LOG_NAME))
    else {
        return false;
    };
    writeln!(file, "{msg}").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_one_line_per_write() {
        let dir = TempDir::new().unwrap();
        assert!(write_line_under(dir.path(), "first"));
        assert!(write_line_under(dir.path(), "second"));
        let log = std::fs::read_to_string(dir.path().join(LOG_NAME)).unwrap();
        assert_eq!(log, "first\nsecond\n");
    }

    #[test]
    fn missing_root_disables_the_sink() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("absent");
        assert!(!write_line_under(&gone, "dropped"));
        assert!(!gone.exists());
    }
}
