//! Change detection between two snapshots of the same case.

use serde_json::Value;

use super::record::CaseRecord;

/// Fields whose sections carry a "new" badge
pub const TRACKED_FIELDS: &[&str] = &["notices", "events"];

/// Whether `field` differs between the previous and current snapshot.
///
/// Values are compared structurally, so object key order never matters,
/// and numbers by value, so `1` and `1.0` are the same.
/// An absent field equals another absent field but not an explicit `null`.
/// Without both snapshots there is nothing to compare, so nothing changed.
pub fn has_changed(
  previous: Option<&CaseRecord>,
  current: Option<&CaseRecord>,
  field: &str,
) -> bool {
  let (Some(prev), Some(cur)) = (previous, current) else {
    return false;
  };
  match (prev.get(field), cur.get(field)) {
    (None, None) => false,
    (Some(a), Some(b)) => !same_value(a, b),
    _ => true,
  }
}

fn same_value(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
    (Value::Array(xs), Value::Array(ys)) => {
      xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
    }
    (Value::Object(xs), Value::Object(ys)) => {
      xs.len() == ys.len()
        && xs
          .iter()
          .all(|(key, x)| ys.get(key).is_some_and(|y| same_value(x, y)))
    }
    _ => a == b,
  }
}

/// Per-field change flags for one render. Derived on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFlags {
  changed: Vec<String>,
}

impl ChangeFlags {
  /// Compare the tracked fields of two snapshots
  pub fn compute(previous: Option<&CaseRecord>, current: Option<&CaseRecord>) -> Self {
    Self::compute_fields(previous, current, TRACKED_FIELDS)
  }

  pub fn compute_fields(
    previous: Option<&CaseRecord>,
    current: Option<&CaseRecord>,
    fields: &[&str],
  ) -> Self {
    let changed = fields
      .iter()
      .filter(|field| has_changed(previous, current, field))
      .map(|field| field.to_string())
      .collect();
    Self { changed }
  }

  pub fn is_changed(&self, field: &str) -> bool {
    self.changed.iter().any(|f| f == field)
  }

  pub fn any(&self) -> bool {
    !self.changed.is_empty()
  }

  pub fn changed_fields(&self) -> &[String] {
    &self.changed
  }
}
