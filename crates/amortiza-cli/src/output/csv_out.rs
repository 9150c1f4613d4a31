use serde_json::{Map, Value};
use std::io;

use super::format_scalar;

/// Lists worth exporting row by row, in order of preference.
const ROW_LISTS: &[&str] = &["schedule", "summary", "differences"];

/// Write output as CSV to stdout.
///
/// A result carrying a schedule or summary list is written as that list;
/// anything else as two-column field/value rows.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            let list = ROW_LISTS.iter().find_map(|key| match body.get(*key) {
                Some(Value::Array(arr)) if !arr.is_empty() => Some(arr),
                _ => None,
            });
            match list {
                Some(arr) => write_array_csv(&mut wtr, arr),
                None => {
                    let _ = wtr.write_record(["field", "value"]);
                    write_fields(&mut wtr, body, "");
                }
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_scalar(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_fields(wtr: &mut csv::Writer<io::StdoutLock<'_>>, map: &Map<String, Value>, prefix: &str) {
    for (key, val) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => write_fields(wtr, inner, &path),
            _ => {
                let _ = wtr.write_record([path.as_str(), &format_scalar(val)]);
            }
        }
    }
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    // Extract headers from first object
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_scalar).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_scalar(item)]);
        }
    }
}
