//! Error reporting for human and JSON output modes.

use leasehold_core::Error;
use serde_json::json;

/// Exit code for an error, from the core error when there is one.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

/// `{"success": false, "error": {code, message, exit_code}}` for `--json`.
#[must_use]
pub fn json_error(err: &anyhow::Error) -> serde_json::Value {
    let code = err.downcast_ref::<Error>().map_or("ERROR", Error::code);
    json!({
        "success": false,
        "error": {
            "code": code,
            "message": format!("{err:#}"),
            "exit_code": exit_code(err),
        }
    })
}

/// Print `err` in the selected mode and return the exit code.
pub fn report(err: &anyhow::Error, json: bool) -> i32 {
    let body = json.then(|| json_error(err));
    match body.map(|b| serde_json::to_string_pretty(&b)) {
        Some(Ok(text)) => println!("{text}"),
        _ => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {err:#}");
            }
        }
    }
    exit_code(err)
}
