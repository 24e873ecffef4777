//! Debug logging for diagnosing scan and archive behavior.
//!
//! Enable by setting environment variable: CAPMON_DEBUG_LOG=1
//! Logs are written to /tmp/capmon-debug.log

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();
static LOG_FILE: OnceLock<std::sync::Mutex<std::fs::File>> = OnceLock::new();

/// Initialize debug logging. Call once at startup.
pub fn init() {
    if std::env::var("CAPMON_DEBUG_LOG").is_ok() {
        ENABLED.store(true, Ordering::SeqCst);
        START_TIME.get_or_init(Instant::now);
        LOG_FILE.get_or_init(|| {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open("/tmp/capmon-debug.log")
                .expect("Failed to open debug log file");
            std::sync::Mutex::new(file)
        });
        log("DEBUG", "init", "Debug logging initialized");
    }
}

/// Check if debug logging is enabled.
#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Log a debug message with elapsed time and category.
pub fn log(category: &str, action: &str, detail: &str) {
    if !is_enabled() {
        return;
    }

    let elapsed = START_TIME
        .get()
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);

    let msg = format!("[{elapsed:>8}ms] [{category}] {action} - {detail}\n");

    if let Some(file_mutex) = LOG_FILE.get()
        && let Ok(mut file) = file_mutex.lock()
    {
        let _ = file.write_all(msg.as_bytes());
        let _ = file.flush();
    }
}
