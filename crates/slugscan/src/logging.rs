use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn init(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
    if enabled {
        verbose("verbose logging enabled");
    }
}

pub fn info(message: impl AsRef<str>) {
    eprintln!("[slugscan] {}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    eprintln!("[slugscan] warning: {}", message.as_ref());
}

pub fn verbose(message: impl AsRef<str>) {
    if VERBOSE.load(Ordering::Relaxed) {
        eprintln!("[slugscan] {}", message.as_ref());
    }
}

/// `SLUGSCAN_VERBOSE=1|true|yes|on` turns verbose logging on without the flag.
pub fn env_flag() -> bool {
    env::var("SLUGSCAN_VERBOSE")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
