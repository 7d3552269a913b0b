use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

use crate::db;

/// Required directories that will be created if missing
const REQUIRED_DIRS: &[&str] = &["data", "data/db"];

/// Run all boot checks. Call this before Rocket launches.
/// Creates missing directories and aborts if the database location is
/// unusable.
pub fn run() {
    info!("CourseCraft boot check starting...");

    let mut warnings = 0u32;
    let mut errors = 0u32;

    // ── 1. Directories ─────────────────────────────────
    for dir in REQUIRED_DIRS {
        let path = Path::new(dir);
        if !path.exists() {
            match fs::create_dir_all(path) {
                Ok(_) => info!("  Created directory: {}", dir),
                Err(e) => {
                    error!("  FAILED to create directory {}: {}", dir, e);
                    errors += 1;
                }
            }
        }
    }

    // ── 2. Database directory writable ──────────────────
    let db_path = db::db_path();
    let db_dir = Path::new(&db_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(".").to_path_buf());
    if !db_dir.exists() {
        match fs::create_dir_all(&db_dir) {
            Ok(_) => info!("  Created directory: {}", db_dir.display()),
            Err(e) => {
                error!("  FAILED to create directory {}: {}", db_dir.display(), e);
                errors += 1;
            }
        }
    }
    if db_dir.exists() {
        let test_file = db_dir.join(".write_test");
        match fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
            }
            Err(e) => {
                error!("  Database directory not writable: {}", e);
                errors += 1;
            }
        }
    }

    info!("  Using database path: {}", db_path);

    if !Path::new("Rocket.toml").exists() {
        warn!("  Rocket.toml not found — using default config");
        warnings += 1;
    }

    // ── Summary ─────────────────────────────────────────
    if errors > 0 {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            errors, warnings
        );
        process::exit(1);
    }

    if warnings > 0 {
        warn!("Boot check passed with {} warning(s).", warnings);
    } else {
        info!("Boot check passed. All systems go.");
    }
}
