// Logging Configuration
// fern dispatch to stderr, level from config or CHATLOOP_LOG_LEVEL

use log::LevelFilter;

const LOG_LEVEL_ENV: &str = "CHATLOOP_LOG_LEVEL";

/// Dependency targets that are only interesting when something breaks
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "rustls"];

pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

fn default_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Resolve the level; an invalid override falls back to the config default
pub fn resolve_level(debug: bool, env_value: Option<&str>) -> LevelFilter {
    match env_value {
        Some(value) => parse_log_level(value).unwrap_or_else(|| {
            eprintln!(
                "Warning: Invalid {} '{}', falling back to default",
                LOG_LEVEL_ENV, value
            );
            default_level(debug)
        }),
        None => default_level(debug),
    }
}

pub fn init_logging(debug: bool) -> Result<LevelFilter, log::SetLoggerError> {
    let env_value = std::env::var(LOG_LEVEL_ENV).ok();
    let level = resolve_level(debug, env_value.as_deref());

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level);

    for target in QUIET_TARGETS {
        dispatch = dispatch.level_for(target, level.min(LevelFilter::Warn));
    }

    dispatch.chain(std::io::stderr()).apply()?;

    Ok(level)
}
