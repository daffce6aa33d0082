//! Interpretation of raw case-status API responses.
//!
//! Kept apart from the HTTP client so response handling can be tested
//! without a server.

use serde_json::Value;

use super::error::LookupError;
use super::record::{truthy, CaseRecord};

/// Whether an HTTP status means the session is missing or expired
pub fn is_auth_failure(status: u16) -> bool {
  status == 401 || status == 403
}

/// Strip the optional `{ "data": ... }` envelope.
///
/// The payload is used only when `data` holds something; a null or empty
/// `data` falls back to the body itself.
pub fn unwrap_envelope(body: Value) -> Value {
  match body {
    Value::Object(mut fields) => match fields.remove("data") {
      Some(data) if truthy(&data) => data,
      Some(data) => {
        fields.insert("data".to_string(), data);
        Value::Object(fields)
      }
      None => Value::Object(fields),
    },
    other => other,
  }
}

/// Turn a case lookup response into a record or a lookup error.
pub fn classify_response(status: u16, body: &[u8]) -> Result<CaseRecord, LookupError> {
  if is_auth_failure(status) {
    return Err(LookupError::NotAuthenticated);
  }

  if !(200..300).contains(&status) {
    return Err(LookupError::Http { status });
  }

  let body: Value = serde_json::from_slice(body)
    .map_err(|e| LookupError::Transport(format!("invalid JSON in response: {}", e)))?;

  match unwrap_envelope(body) {
    Value::Object(fields) if !fields.is_empty() => Ok(CaseRecord::new(fields)),
    _ => Err(LookupError::NoData),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn body(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
  }

  #[test]
  fn test_auth_statuses() {
    assert_eq!(
      classify_response(401, b""),
      Err(LookupError::NotAuthenticated)
    );
    assert_eq!(
      classify_response(403, b"{}"),
      Err(LookupError::NotAuthenticated)
    );
  }

  #[test]
  fn test_other_failures_carry_status() {
    assert_eq!(
      classify_response(500, b"oops"),
      Err(LookupError::Http { status: 500 })
    );
    assert_eq!(
      classify_response(404, b"{}"),
      Err(LookupError::Http { status: 404 })
    );
  }

  #[test]
  fn test_bare_record() {
    let record = classify_response(200, &body(json!({"formType": "I-485"}))).unwrap();
    assert_eq!(record.form_type(), Some("I-485"));
  }

  #[test]
  fn test_enveloped_record() {
    let record = classify_response(
      200,
      &body(json!({"data": {"formType": "I-130", "closed": true}})),
    )
    .unwrap();
    assert_eq!(record.form_type(), Some("I-130"));
    assert_eq!(record.get("closed"), Some(&json!(true)));
    assert!(record.get("data").is_none());
  }

  #[test]
  fn test_empty_results() {
    assert_eq!(classify_response(200, b"{}"), Err(LookupError::NoData));
    assert_eq!(
      classify_response(200, &body(json!({"data": {}}))),
      Err(LookupError::NoData)
    );
    assert_eq!(classify_response(200, b"[]"), Err(LookupError::NoData));
  }

  #[test]
  fn test_null_data_keeps_body() {
    let record = classify_response(200, &body(json!({"data": null, "formType": "I-90"}))).unwrap();
    assert_eq!(record.form_type(), Some("I-90"));
  }

  #[test]
  fn test_invalid_json() {
    assert!(matches!(
      classify_response(200, b"<html>"),
      Err(LookupError::Transport(_))
    ));
  }
}
