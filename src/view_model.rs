//! Structured, render-agnostic view of a case record.
//!
//! `CaseView::build` is pure: the same record, flags, timezone and clock
//! always produce the same view. The TUI and the `check` subcommand both
//! render from it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

use crate::case::record::{event_description, form_name, truthy};
use crate::case::{CaseRecord, ChangeFlags, ReceiptNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
  Active,
  Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoRow {
  pub label: &'static str,
  pub value: String,
}

impl InfoRow {
  fn new(label: &'static str, value: impl Into<String>) -> Self {
    Self {
      label,
      value: value.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormInfo {
  pub code: Option<String>,
  pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeView {
  pub title: String,
  pub action_type: Option<String>,
  pub appointment: Option<String>,
  pub generated: Option<String>,
  pub letter_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventView {
  pub title: String,
  pub code: Option<String>,
  pub description: Option<&'static str>,
  pub date: Option<String>,
  pub created: Option<String>,
}

/// A list section that can carry a "new since last check" badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSection<T> {
  pub is_new: bool,
  pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseView {
  pub receipt: String,
  pub service_center: String,
  pub status: Option<CaseStatus>,
  pub action_required: bool,
  pub form: Option<FormInfo>,
  pub applicant: Vec<InfoRow>,
  pub dates: Vec<InfoRow>,
  pub notices: Option<ItemSection<NoticeView>>,
  pub events: Option<ItemSection<EventView>>,
  pub details: Vec<InfoRow>,
}

const DETAIL_FIELDS: &[(&str, &str)] = &[
  ("elisChannelType", "Filing Channel"),
  ("isPremiumProcessed", "Premium Processing"),
  ("noticeMailingPrefIndicator", "Notice Mailing Preference"),
  ("areAllGroupMembersAuthorizedForTravel", "Authorized for Travel"),
];

impl CaseView {
  pub fn build(
    receipt: &ReceiptNumber,
    record: &CaseRecord,
    flags: &ChangeFlags,
    tz: Tz,
    now: DateTime<Utc>,
  ) -> Self {
    let dates = DateFormatter { tz, now };

    let status = record.get("closed").map(|closed| {
      if truthy(closed) {
        CaseStatus::Closed
      } else {
        CaseStatus::Active
      }
    });

    let form_code = record.str_field("formType").map(String::from);
    let form_label = record.str_field("formName").map(String::from);
    let form = if form_code.is_some() || form_label.is_some() {
      let name = form_label.or_else(|| {
        form_code
          .as_deref()
          .and_then(form_name)
          .map(String::from)
      });
      Some(FormInfo {
        code: form_code,
        name,
      })
    } else {
      None
    };

    let mut applicant = Vec::new();
    if let Some(name) = record.str_field("applicantName") {
      applicant.push(InfoRow::new("Name", name));
    }
    if let Some(attorney) = record.str_field("representativeName") {
      applicant.push(InfoRow::new("Attorney", attorney));
    }

    let mut key_dates = Vec::new();
    if let Some(submitted) = record.str_field("submissionTimestamp") {
      key_dates.push(InfoRow::new("Submitted", dates.format(submitted)));
    }
    if let Some(updated) = record.str_field("updatedAtTimestamp") {
      key_dates.push(InfoRow::new("Last Updated", dates.format(updated)));
    }

    let notices = record.array_field("notices").map(|items| ItemSection {
      is_new: flags.is_changed("notices"),
      items: items
        .iter()
        .enumerate()
        .map(|(i, notice)| NoticeView {
          title: format!("Notice #{}", i + 1),
          action_type: item_str(notice, "actionType").map(String::from),
          appointment: item_str(notice, "appointmentDateTime").map(|d| dates.format(d)),
          generated: item_str(notice, "generationDate").map(|d| dates.format(d)),
          letter_id: item_str(notice, "letterId").map(String::from),
        })
        .collect(),
    });

    let events = record.array_field("events").map(|items| ItemSection {
      is_new: flags.is_changed("events"),
      items: items
        .iter()
        .enumerate()
        .map(|(i, event)| {
          let code = item_str(event, "eventCode");
          EventView {
            title: format!("Event #{}", i + 1),
            code: code.map(String::from),
            description: code.map(event_description),
            date: item_str(event, "eventDateTime").map(|d| dates.format(d)),
            created: item_str(event, "createdAt").map(|d| dates.format(d)),
          }
        })
        .collect(),
    });

    let details = DETAIL_FIELDS
      .iter()
      .filter_map(|(field, label)| match record.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(InfoRow::new(label, format_value(value))),
      })
      .collect();

    Self {
      receipt: receipt.to_string(),
      service_center: receipt.service_center().to_string(),
      status,
      action_required: record.is_truthy("actionRequired"),
      form,
      applicant,
      dates: key_dates,
      notices,
      events,
      details,
    }
  }
}

fn item_str<'a>(item: &'a Value, field: &str) -> Option<&'a str> {
  item
    .get(field)
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
}

/// Renders API timestamps in the user's timezone, relative to `now`
struct DateFormatter {
  tz: Tz,
  now: DateTime<Utc>,
}

impl DateFormatter {
  fn format(&self, raw: &str) -> String {
    format_date(raw, self.tz, self.now)
  }
}

/// Parse the timestamp shapes the API produces.
///
/// Timestamps without an offset are read in the display timezone; bare dates
/// are UTC midnight.
fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
    return tz
      .from_local_datetime(&naive)
      .earliest()
      .map(|dt| dt.with_timezone(&Utc));
  }
  if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
  }
  None
}

/// Format a timestamp as e.g. `May 1, 2024, 07:00 AM CDT (3 days ago)`.
///
/// Empty input is `N/A`; anything unparseable is returned unchanged.
pub fn format_date(raw: &str, tz: Tz, now: DateTime<Utc>) -> String {
  if raw.is_empty() {
    return "N/A".to_string();
  }

  let Some(at) = parse_timestamp(raw, tz) else {
    return raw.to_string();
  };

  let formatted = at
    .with_timezone(&tz)
    .format("%B %-d, %Y, %I:%M %p %Z")
    .to_string();

  // Floor division so a timestamp in the future never reads as "today"
  let diff_days = (now - at).num_seconds().div_euclid(86_400);
  match diff_days {
    0 => format!("{} (today)", formatted),
    1 => format!("{} (yesterday)", formatted),
    2..=29 => format!("{} ({} days ago)", formatted, diff_days),
    _ => formatted,
  }
}

/// Human-readable detail value
pub fn format_value(value: &Value) -> String {
  match value {
    Value::Bool(true) => "Yes".to_string(),
    Value::Bool(false) => "No".to_string(),
    Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        group_thousands(i)
      } else if let Some(f) = n.as_f64() {
        // Round first so a carry reaches the whole part
        let rounded = (f * 1000.0).round() / 1000.0;
        let whole = rounded.trunc();
        let fraction = format!("{:.3}", (rounded - whole).abs());
        let fraction = fraction.trim_start_matches('0').trim_end_matches('0');
        let fraction = fraction.trim_end_matches('.');
        // `whole as i64` loses the sign of values in (-1, 0)
        let sign = if rounded < 0.0 && whole == 0.0 { "-" } else { "" };
        format!("{}{}{}", sign, group_thousands(whole as i64), fraction)
      } else {
        n.to_string()
      }
    }
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

fn group_thousands(n: i64) -> String {
  let digits = n.unsigned_abs().to_string();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
  if n < 0 {
    grouped.push('-');
  }
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  grouped
}
