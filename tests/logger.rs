use procsim::logger;

#[test]
fn test_buffered_logger_drains_in_order() {
    logger::LoggerBuilder::default()
        .level(log::LevelFilter::Trace)
        .target(None::<&str>)
        .init()
        .unwrap();
    log::info!("arrival");
    log::debug!("queued");
    log::warn!("dropped");
    let logs = logger::drain();
    assert_eq!(
        logs,
        vec![
            String::from("[INFO]  arrival"),
            String::from("[DEBUG] queued"),
            String::from("[WARN]  dropped"),
        ]
    );
    // Only new records show up on the next drain.
    log::error!("boom");
    assert_eq!(logger::drain(), vec![String::from("[ERROR] boom")]);
    // Re-initialization is a no-op rather than an error.
    logger::LoggerBuilder::default().init().unwrap();
}
