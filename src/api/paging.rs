use serde_json::Value;

/// Extract the cursor for the next page from a response body.
///
/// The API nests it under `records.cursor`; some endpoints return a
/// top-level `cursor` instead. No cursor means the last page.
pub fn next_cursor(body: &Value) -> Option<String> {
    body.get("records")
        .and_then(|records| records.get("cursor"))
        .or_else(|| body.get("cursor"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Pull the record array under `data_key` out of a response body.
pub fn records(body: &Value, data_key: &str) -> Vec<Value> {
    body.get(data_key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cursor_under_records() {
        let body = json!({"records": {"cursor": "abc123", "totalRecords": 250}});
        assert_eq!(next_cursor(&body).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_top_level_cursor_fallback() {
        let body = json!({"cursor": "xyz", "calls": []});
        assert_eq!(next_cursor(&body).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_no_cursor_means_last_page() {
        assert_eq!(next_cursor(&json!({"records": {"totalRecords": 3}})), None);
        assert_eq!(next_cursor(&json!({"calls": []})), None);
        assert_eq!(next_cursor(&json!({"records": {"cursor": ""}})), None);
    }

    #[test]
    fn test_records_extraction() {
        let body = json!({"calls": [{"id": "1"}, {"id": "2"}], "records": {}});
        assert_eq!(records(&body, "calls").len(), 2);
        assert!(records(&body, "users").is_empty());
    }
}
