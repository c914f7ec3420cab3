use std::{
    fs::{OpenOptions, create_dir_all},
    io,
    path::Path,
};

use env_logger::{Builder, Target};
use log::LevelFilter;

pub fn parse_level(log_level: &str) -> Option<LevelFilter> {
    match log_level.to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Installs the global logger. Output goes to stderr unless `log_file` names
/// a file, which is created (with its parent directories) and appended to.
pub fn init_logger(log_level: &str, log_file: Option<&str>) -> io::Result<()> {
    let level = parse_level(log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        LevelFilter::Info
    });

    let mut builder = Builder::new();
    builder.filter_level(level).format_timestamp_secs();

    if let Some(log_file) = log_file {
        if let Some(parent) = Path::new(log_file).parent() {
            create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|err| io::Error::new(io::ErrorKind::AlreadyExists, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_level("TRACE"), Some(LevelFilter::Trace));
        assert_eq!(parse_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_level("off"), Some(LevelFilter::Off));
        assert_eq!(parse_level("shout"), None);
    }

    #[test]
    fn file_target_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("roundabout.log");

        // Another test binary may already own the global logger; the file
        // must exist either way.
        let _ = init_logger("debug", Some(path.to_str().unwrap()));
        assert!(path.exists());
    }
}
