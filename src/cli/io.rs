//! JSON I/O handling for CLI
//!
//! - Output: one JSON value per line on stdout
//! - UTF-8 only

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::driver::Document;

/// Parses a `--filter` argument into a query document
pub fn parse_query(raw: &str) -> CliResult<Document> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::invalid_argument(format!(
            "filter must be a JSON object, got {}",
            other
        ))),
        Err(e) => Err(CliError::invalid_argument(format!("filter is not valid JSON: {}", e))),
    }
}

/// Writes `value` as a single line
pub fn write_line<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes each value on its own line, then flushes
pub fn write_lines<W, T, I>(out: &mut W, values: I) -> CliResult<usize>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = CliResult<T>>,
{
    let mut written = 0;
    for value in values {
        write_line(out, &value?)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

/// Locked stdout
pub fn stdout() -> io::StdoutLock<'static> {
    io::stdout().lock()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query() {
        let query = parse_query(r#"{"lang": {"$eq": "es"}}"#).unwrap();
        assert_eq!(Value::Object(query), json!({"lang": {"$eq": "es"}}));
        assert!(parse_query("[1]").is_err());
        assert!(parse_query("{").is_err());
    }

    #[test]
    fn test_write_lines() {
        let mut out = Vec::new();
        let n = write_lines(&mut out, vec![Ok(json!({"a": 1})), Ok(json!("b"))]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n\"b\"\n");
    }

    #[test]
    fn test_write_lines_stops_on_error() {
        let mut out = Vec::new();
        let values: Vec<CliResult<Value>> =
            vec![Ok(json!(1)), Err(CliError::io_error("boom")), Ok(json!(2))];
        assert!(write_lines(&mut out, values).is_err());
        assert_eq!(String::from_utf8(out).unwrap(), "1\n");
    }
}
