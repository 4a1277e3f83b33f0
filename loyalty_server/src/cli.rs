use std::env::{self, VarError};

const README: &str = include_str!("./cli-help.txt");

/// Every variable the server reads, with the value used when it is unset. None of them hold secrets.
const SETTINGS: [(&str, &str); 12] = [
    ("RUST_LOG", "error"),
    ("LPS_DATABASE_URL", "sqlite://data/loyalty.db"),
    ("LPS_ACCRUAL_SYSTEM_ADDRESS", "http://127.0.0.1:8080"),
    ("LPS_WORKERS", "3"),
    ("LPS_PAGE_SIZE", "10"),
    ("LPS_POLL_INTERVAL_MS", "1000"),
    ("LPS_LOOKUP_TIMEOUT_SECS", "30"),
    ("LPS_DB_RETRY_ATTEMPTS", "3"),
    ("LPS_DB_RETRY_DELAY_MS", "500"),
    ("LPS_DB_MAX_CONNECTIONS", "25"),
    ("LPS_RUN_MIGRATIONS", "true"),
    ("LPS_SHUTDOWN_TIMEOUT_SECS", "25"),
];

/// The server takes no arguments. Any argument at all prints the help text and the effective settings, and the
/// caller should exit.
pub fn handle_command_line_args() -> bool {
    if env::args().len() <= 1 {
        return false;
    }
    println!("\n{README}\n");
    println!("Current settings:");
    for line in settings_report() {
        println!("{line}");
    }
    true
}

fn settings_report() -> Vec<String> {
    SETTINGS
        .iter()
        .map(|&(name, default)| {
            let value = match env::var(name) {
                Ok(s) => s,
                Err(VarError::NotPresent) => format!("{default} (default)"),
                Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
            };
            format!("  {name:<30} {value}")
        })
        .collect()
}
