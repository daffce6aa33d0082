//! Case records as returned by the case-status API, plus the reference
//! tables used to describe them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A case document. The schema belongs to the API, so it is kept as a JSON
/// object and read field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseRecord(Map<String, Value>);

impl CaseRecord {
  pub fn new(fields: Map<String, Value>) -> Self {
    Self(fields)
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.0.get(field)
  }

  /// String field; empty strings count as absent.
  pub fn str_field(&self, field: &str) -> Option<&str> {
    self
      .get(field)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }

  /// Array field; an empty array counts as absent.
  pub fn array_field(&self, field: &str) -> Option<&[Value]> {
    self
      .get(field)
      .and_then(Value::as_array)
      .map(Vec::as_slice)
      .filter(|items| !items.is_empty())
  }

  /// Truthiness of a field the way the web shell tests it
  pub fn is_truthy(&self, field: &str) -> bool {
    self.get(field).is_some_and(truthy)
  }

  /// Form type code such as "I-485"
  pub fn form_type(&self) -> Option<&str> {
    self.str_field("formType")
  }
}

/// JSON truthiness: null, false, 0, "" are false; arrays and objects are true
pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

const FORM_TYPES: &[(&str, &str)] = &[
  ("I-130", "Petition for Alien Relative"),
  ("I-129", "Petition for Nonimmigrant Worker"),
  ("I-129F", "Petition for Alien Fiancé(e)"),
  ("I-140", "Immigrant Petition for Alien Worker"),
  (
    "I-485",
    "Application to Register Permanent Residence or Adjust Status",
  ),
  ("I-539", "Application to Extend/Change Nonimmigrant Status"),
  ("I-765", "Application for Employment Authorization"),
  ("I-131", "Application for Travel Document"),
  ("I-751", "Petition to Remove Conditions on Residence"),
  ("I-821", "Application for Temporary Protected Status"),
  ("I-90", "Application to Replace Permanent Resident Card"),
  ("N-400", "Application for Naturalization"),
  ("N-600", "Application for Certificate of Citizenship"),
];

const EVENT_CODES: &[(&str, &str)] = &[
  ("IAF", "Initial Acceptance and Fee Payment - Your application has been accepted and fees have been processed"),
  ("RFE", "Request for Evidence - USCIS needs additional documentation"),
  ("NOA", "Notice of Action - Official notice about your case"),
  ("APR", "Case Approved - Your application has been approved"),
  ("DEN", "Case Denied - Your application has been denied"),
  ("WDR", "Case Withdrawn - Application has been withdrawn"),
  ("TRM", "Case Terminated - Application has been terminated"),
  ("INT", "Interview Scheduled - You have been scheduled for an interview"),
  ("FPR", "Fingerprint Review - Fingerprints are being reviewed"),
  ("CPO", "Card Production Ordered - Your card is being produced"),
  ("CPM", "Card Mailed - Your card has been mailed to you"),
  ("RET", "Case Returned - Case has been returned"),
  ("ADM", "Administrative Processing - Case is in administrative review"),
  ("TSC", "Transferred to Service Center - Case transferred"),
  ("EAD", "Employment Authorization Document - Related to work permit"),
  ("AP", "Advance Parole - Travel document processing"),
];

pub const UNKNOWN_EVENT: &str = "Event description not available";

/// Human-readable name of a form type code
pub fn form_name(code: &str) -> Option<&'static str> {
  FORM_TYPES
    .iter()
    .find(|(c, _)| *c == code)
    .map(|(_, name)| *name)
}

/// What an event code means, with a generic fallback
pub fn event_description(code: &str) -> &'static str {
  EVENT_CODES
    .iter()
    .find(|(c, _)| *c == code)
    .map(|(_, desc)| *desc)
    .unwrap_or(UNKNOWN_EVENT)
}
