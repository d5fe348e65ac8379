pub use masterror::{AppError, AppResult};

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create file write error
pub fn file_write_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to write file '{}': {}", path, source))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create rule configuration error (invalid policy, raised before any
/// statement is processed)
pub fn rule_config_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format!("Invalid rule configuration: {}", msg))
}

/// Create baseline I/O error with the offending path
pub fn baseline_io_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Baseline I/O error at '{}': {}", path, source))
}

/// Create baseline format error (file exists but cannot be decoded or encoded)
pub fn baseline_format_error(path: &str, message: impl Into<String>) -> AppError {
    AppError::internal(format!(
        "Baseline file '{}' is not valid: {}",
        path,
        message.into()
    ))
}

/// Create database connection error
pub fn connection_error(message: impl Into<String>) -> AppError {
    AppError::service(format!("Database connection failed: {}", message.into()))
}

/// Create schema parse error for configured DDL files
pub fn schema_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Schema parse error", &msg))
}

/// Format SQL error with position highlighting
pub(crate) fn format_sql_error(prefix: &str, message: &str) -> String {
    // sqlparser format: "... at Line: X, Column Y"
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";

    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let col_start = message[line_num_start..].find(col_marker)?;
    let line_str = &message[line_num_start..line_num_start + col_start];
    let col_num_start = line_num_start + col_start + col_marker.len();
    let col_end = message[col_num_start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(message.len() - col_num_start);
    let col_str = &message[col_num_start..col_num_start + col_end];

    match (line_str.parse(), col_str.parse()) {
        (Ok(line), Ok(column)) => Some(SqlPosition {
            line,
            column
        }),
        _ => None
    }
}
