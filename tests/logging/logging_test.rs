//! File-logging smoke test.
//!
//! Subscriber installation is process-global, so this test binary holds
//! exactly one logging test.

use embercast::logging::init_with_file;

#[test]
fn file_logging_creates_a_rotated_log_file() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let logs_dir = dir.path().join("logs");

    let guard = init_with_file(&logs_dir).expect("logging should initialise");
    tracing::info!("notifier logging smoke test");
    drop(guard); // flush

    let entries: Vec<_> = std::fs::read_dir(&logs_dir)
        .expect("logs dir should exist")
        .filter_map(Result::ok)
        .collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name();
    let name = name.to_string_lossy();
    assert!(
        name.starts_with("embercast.log"),
        "unexpected log file name: {name}"
    );
}
