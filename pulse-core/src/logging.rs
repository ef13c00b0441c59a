use std::io::Write;

use log::LevelFilter;

/// Installs the stdout logger and sets the max level to `level`. The logger
/// passes everything and `log::set_max_level` does the gating, so later calls
/// can raise or lower verbosity even though the logger is installed once.
pub fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder
        .format(move |buf, record| {
            writeln!(
                buf,
                "{}: {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stdout)
        .filter_level(LevelFilter::Trace);

    let _ = builder.try_init();

    log::set_max_level(level);
}

/// Parses a level name, case-insensitively. `warning` is accepted for `warn`.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    let lvl = match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => return None,
    };
    Some(lvl)
}
