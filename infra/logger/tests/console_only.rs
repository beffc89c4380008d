use shortly_logger::{LevelFilter, Logger};

#[test]
fn console_only_has_no_file_writers() {
    let logger = Logger::builder()
        .name("integration-console-only")
        .console(true)
        .level(LevelFilter::INFO)
        .init()
        .expect("logger should initialize");

    assert_eq!(logger.file_writers(), 0, "console-only logger should not spawn file writers");
}
