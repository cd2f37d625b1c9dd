/// Reduce an error to a single readable line.
///
/// Browser errors often carry a stack trace after the first line or after a
/// `Stacktrace` marker; both are dropped.
pub fn clean_error_message(error: &anyhow::Error) -> String {
    clean_message(&format!("{:#}", error))
}

pub fn clean_message(message: &str) -> String {
    let first = message.lines().next().unwrap_or("");
    let cleaned = first.split("Stacktrace").next().unwrap_or("").trim();
    if cleaned.is_empty() {
        "Browser error occurred".to_string()
    } else {
        cleaned.to_string()
    }
}
