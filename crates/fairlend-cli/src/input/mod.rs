pub mod file;
pub mod report;
pub mod stdin;

use serde_json::Value;

/// Read a JSON document from `--input`, or from piped stdin when no path is
/// given.
pub fn read_document(path: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json_value(path);
    }
    stdin::read_stdin()?
        .ok_or_else(|| "no input: pass --input <file> or pipe a JSON document on stdin".into())
}
