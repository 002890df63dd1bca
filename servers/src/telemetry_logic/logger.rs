use anyhow::Result;
use std::fs;
use std::path::Path;

/// Logs to stdout and to `<log_dir>/<prefix>_<timestamp>.log`. Older files with
/// the same prefix are removed first; other files in the directory are left alone.
pub fn setup_logging(log_dir: &Path, prefix: &str, log_level: &str) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    cleanup_old_logs(log_dir, prefix)?;

    let log_file_name = format!("{}_{}.log", prefix, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let log_path = log_dir.join(log_file_name);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S%.3f]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(parse_level(log_level))
        .chain(std::io::stdout())
        .chain(fern::log_file(log_path)?)
        .apply()?;

    Ok(())
}

fn parse_level(log_level: &str) -> log::LevelFilter {
    log_level.parse().unwrap_or_else(|_| {
        eprintln!("Unknown log level '{}', using info", log_level);
        log::LevelFilter::Info
    })
}

fn is_own_log(path: &Path, prefix: &str) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with(prefix) && name.ends_with(".log")
}

/// Keeps the newest log file of this server.
fn cleanup_old_logs(log_dir: &Path, prefix: &str) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .map(|e| e.path())
        .filter(|path| is_own_log(path, prefix))
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .collect();

    entries.sort_by_key(|(modified, _)| std::cmp::Reverse(*modified));

    for (_, path) in entries.iter().skip(1) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Failed to delete old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}
