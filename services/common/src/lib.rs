use std::{
    env,
    fs,
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
    panic,
    str::FromStr,
    thread,
    time::{Duration, SystemTime},
};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

const DEFAULT_LOG_DIR: &str = "/var/log/workfront-webhook";

/// Keeps the non-blocking file writer alive; drop it only at process exit.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Where and how long rolled log files are kept.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub root: PathBuf,
    pub retention_days: u64,
    pub cleanup_interval_minutes: u64,
}

impl LogConfig {
    pub fn from_env(service_name: &str) -> Self {
        let log_dir = env_string("LOG_DIR", DEFAULT_LOG_DIR);
        Self {
            root: PathBuf::from(log_dir).join(service_name),
            retention_days: env_or("LOG_RETENTION_DAYS", 14u64),
            cleanup_interval_minutes: env_or("LOG_CLEANUP_INTERVAL_MINUTES", 360u64),
        }
    }

    fn pruning_enabled(&self) -> bool {
        self.retention_days > 0 && self.cleanup_interval_minutes > 0
    }
}

pub fn init_tracing(service_name: &str) -> TracingGuards {
    let config = LogConfig::from_env(service_name);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // The file layer is best effort: containers often mount no writable log dir.
    let file_writer = fs::create_dir_all(&config.root).ok().and_then(|_| {
        panic::catch_unwind(|| {
            tracing_appender::rolling::daily(&config.root, format!("{service_name}.log"))
        })
        .ok()
    });

    let file_guard = match file_writer {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = Registry::default()
                .with(filter)
                .with(stdout_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer));
            let _ = tracing::subscriber::set_global_default(subscriber);
            Some(guard)
        }
        None => {
            let subscriber = Registry::default().with(filter).with(stdout_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
            None
        }
    };

    if file_guard.is_some() && config.pruning_enabled() {
        spawn_log_cleanup(config);
    }

    TracingGuards {
        _file_guard: file_guard,
    }
}

/// Parses a typed environment value, falling back to `default` when unset or unparsable.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

/// Reads a string setting; empty values count as unset.
pub fn env_string(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Boolean switch where `0`, `false`, `no` and `off` disable and anything else enables.
pub fn env_flag(key: &str, default: bool) -> bool {
    env_optional(key)
        .map(|value| {
            !matches!(
                value.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            )
        })
        .unwrap_or(default)
}

fn spawn_log_cleanup(config: LogConfig) {
    let retention = Duration::from_secs(config.retention_days * 24 * 60 * 60);
    let interval = Duration::from_secs(config.cleanup_interval_minutes * 60);

    thread::spawn(move || loop {
        if let Some(cutoff) = SystemTime::now().checked_sub(retention) {
            cleanup_old_logs(&config.root, cutoff);
        }
        thread::sleep(interval);
    });
}

fn cleanup_old_logs(root: &Path, cutoff: SystemTime) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            cleanup_old_logs(&path, cutoff);
            continue;
        }
        let modified = fs::metadata(&path).and_then(|metadata| metadata.modified());
        if matches!(modified, Ok(modified) if modified < cutoff) {
            let _ = fs::remove_file(&path);
        }
    }
}

pub async fn bind_listener(port: u16) -> io::Result<TcpListener> {
    // Bind on all interfaces for container compatibility.
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    Ok(listener)
}

pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm handler unavailable");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn env_or_falls_back_on_missing_or_bad_values() {
        env::remove_var("WEBHOOK_COMMON_TEST_PORT");
        assert_eq!(env_or("WEBHOOK_COMMON_TEST_PORT", 8080u16), 8080);

        env::set_var("WEBHOOK_COMMON_TEST_PORT", "not-a-port");
        assert_eq!(env_or("WEBHOOK_COMMON_TEST_PORT", 8080u16), 8080);

        env::set_var("WEBHOOK_COMMON_TEST_PORT", "9090");
        assert_eq!(env_or("WEBHOOK_COMMON_TEST_PORT", 8080u16), 9090);
    }

    #[test]
    fn env_string_treats_blank_as_unset() {
        env::set_var("WEBHOOK_COMMON_TEST_BUCKET", "   ");
        assert_eq!(env_string("WEBHOOK_COMMON_TEST_BUCKET", "fallback"), "fallback");

        env::set_var("WEBHOOK_COMMON_TEST_BUCKET", " events ");
        assert_eq!(env_string("WEBHOOK_COMMON_TEST_BUCKET", "fallback"), "events");
    }

    #[test]
    fn env_flag_parses_common_spellings() {
        env::remove_var("WEBHOOK_COMMON_TEST_FLAG");
        assert!(env_flag("WEBHOOK_COMMON_TEST_FLAG", true));
        assert!(!env_flag("WEBHOOK_COMMON_TEST_FLAG", false));

        for off in ["0", "false", "No", "OFF"] {
            env::set_var("WEBHOOK_COMMON_TEST_FLAG", off);
            assert!(!env_flag("WEBHOOK_COMMON_TEST_FLAG", true), "{off}");
        }

        env::set_var("WEBHOOK_COMMON_TEST_FLAG", "1");
        assert!(env_flag("WEBHOOK_COMMON_TEST_FLAG", false));
    }

    #[test]
    fn cleanup_removes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("nested dir");

        let stale = nested.join("old.log");
        let fresh = dir.path().join("new.log");
        File::create(&stale).expect("stale file");
        File::create(&fresh).expect("fresh file");

        let month_ago = SystemTime::now() - Duration::from_secs(30 * 24 * 60 * 60);
        File::options()
            .write(true)
            .open(&stale)
            .and_then(|file| file.set_modified(month_ago))
            .expect("backdate stale file");

        let cutoff = SystemTime::now() - Duration::from_secs(7 * 24 * 60 * 60);
        cleanup_old_logs(dir.path(), cutoff);

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(nested.exists());
    }

    #[test]
    fn log_config_disables_pruning_with_zero_values() {
        let config = LogConfig {
            root: PathBuf::from("/tmp/unused"),
            retention_days: 0,
            cleanup_interval_minutes: 60,
        };
        assert!(!config.pruning_enabled());
    }
}
