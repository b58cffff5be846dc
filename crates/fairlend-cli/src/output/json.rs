use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout. Reports can run to tens of thousands of
/// records, so this streams through a locked stdout instead of building the
/// whole string first.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|_| writeln!(out));
    if let Err(e) = written {
        if e.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("JSON serialization error: {}", e);
        }
    }
}
