//! Logging initialisation built on flexi_logger
//!
//! The engine itself only uses the `log` macro facade; embedders either
//! install their own sink or call `init_logging` for a ready-made one.

// Global static logger handle for flexi_logger
static LOGGER_HANDLE: std::sync::OnceLock<std::sync::Mutex<flexi_logger::LoggerHandle>> =
    std::sync::OnceLock::new();

/// Initialise logging with the given level ("info" when None), format
/// ("text" or "json") and optional log file path.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let level_str = log_level.unwrap_or("info");
    let format_type = log_format.map_or("text", |f| f);

    let mut logger = Logger::try_with_str(level_str)?;

    match format_type {
        "json" => {
            logger = logger.format(json_format);
        }
        _ => {
            logger = logger.format(simple_format);
        }
    }

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(std::sync::Mutex::new(handle));

    Ok(())
}

/// Reconfigure the log level at runtime.
///
/// # Limitations
/// flexi_logger fixes format and output during initialisation; only the
/// level can change afterwards.
pub fn reconfigure_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(handle_mutex) = LOGGER_HANDLE.get() {
        if let Ok(mut handle) = handle_mutex.lock() {
            let _ = handle.parse_and_push_temp_spec(log_level);
            Ok(())
        } else {
            Err("Could not acquire logger handle lock".into())
        }
    } else {
        Err("Logger handle not initialised. Call init_logging first.".into())
    }
}

// Simple text format: "YYYY-MM-DD HH:mm:ss.fff INF message (module/file.rs:42)"
fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let level_abbr = match record.level() {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    };

    let target_formatted = format_target_as_path(record.target(), record.line());

    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr,
        record.args(),
        target_formatted
    )
}

// Compact single-object-per-line JSON format
fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use serde_json::{json, to_string};

    let level_abbr = match record.level() {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    };

    let target_formatted = format_target_as_path(record.target(), record.line());

    let json_obj = json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr,
        "message": record.args().to_string(),
        "target": target_formatted
    });

    match to_string(&json_obj) {
        Ok(json_string) => {
            w.write_all(json_string.as_bytes())?;
            Ok(())
        }
        Err(_) => {
            w.write_all(b"{\"error\":\"Failed to serialize log message\"}")?;
            Ok(())
        }
    }
}

// Helper function to format target as file path with line number
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    // Convert persiq::queue::pipeline -> queue/pipeline.rs
    let path_like = if let Some(without_prefix) = target.strip_prefix("persiq::") {
        without_prefix.replace("::", "/") + ".rs"
    } else {
        target.replace("::", "/")
    };

    if let Some(line_num) = line {
        format!("{}:{}", path_like, line_num)
    } else {
        path_like
    }
}
