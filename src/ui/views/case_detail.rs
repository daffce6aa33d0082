use crate::app::Notice;
use crate::case::AuthStatus;
use crate::ui::renderfns::status_color;
use crate::view_model::{CaseStatus, CaseView, InfoRow};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

const NEW_BADGE: &str = " NEW";

fn label_style() -> Style {
  Style::default().fg(Color::DarkGray)
}

fn section_title(title: String, is_new: bool) -> Line<'static> {
  let mut spans = vec![Span::styled(
    title,
    Style::default().fg(Color::Cyan).bold(),
  )];
  if is_new {
    spans.push(Span::styled(
      NEW_BADGE,
      Style::default().fg(Color::Black).bg(Color::Yellow).bold(),
    ));
  }
  Line::from(spans)
}

fn info_line(row: &InfoRow) -> Line<'static> {
  Line::from(vec![
    Span::styled(format!("  {:<26}", row.label), label_style()),
    Span::raw(row.value.clone()),
  ])
}

fn indented(label: &str, value: &str, style: Style) -> Line<'static> {
  Line::from(vec![
    Span::styled(format!("    {}: ", label), label_style()),
    Span::styled(value.to_string(), style),
  ])
}

/// Lay out a case view as text lines
pub fn case_lines(view: &CaseView) -> Vec<Line<'static>> {
  let mut lines = vec![
    Line::from(Span::styled(
      view.receipt.clone(),
      Style::default().fg(Color::White).bold(),
    )),
    Line::from(Span::styled(view.service_center.clone(), label_style())),
  ];

  if let Some(status) = view.status {
    let text = match status {
      CaseStatus::Active => "Active",
      CaseStatus::Closed => "Closed",
    };
    lines.push(Line::from(Span::styled(
      format!("● {}", text),
      Style::default().fg(status_color(status)),
    )));
  }

  if view.action_required {
    lines.push(Line::from(Span::styled(
      "⚠ ACTION REQUIRED",
      Style::default().fg(Color::Yellow).bold(),
    )));
  }

  if let Some(form) = &view.form {
    lines.push(Line::default());
    let mut spans = Vec::new();
    if let Some(code) = &form.code {
      spans.push(Span::styled(
        code.clone(),
        Style::default().fg(Color::Magenta).bold(),
      ));
    }
    if let Some(name) = &form.name {
      if !spans.is_empty() {
        spans.push(Span::raw("  "));
      }
      spans.push(Span::raw(name.clone()));
    }
    lines.push(Line::from(spans));
  }

  for (title, rows) in [
    ("Applicant Information", &view.applicant),
    ("Key Dates", &view.dates),
  ] {
    if !rows.is_empty() {
      lines.push(Line::default());
      lines.push(section_title(title.to_string(), false));
      lines.extend(rows.iter().map(info_line));
    }
  }

  if let Some(notices) = &view.notices {
    lines.push(Line::default());
    lines.push(section_title(
      format!("Notices ({})", notices.items.len()),
      notices.is_new,
    ));
    for notice in &notices.items {
      lines.push(Line::from(Span::styled(
        format!("  {}", notice.title),
        Style::default().bold(),
      )));
      if let Some(action) = &notice.action_type {
        lines.push(indented("Action", action, Style::default().bold()));
      }
      if let Some(at) = &notice.appointment {
        lines.push(indented("Appointment", at, Style::default().fg(Color::Green)));
      }
      if let Some(at) = &notice.generated {
        lines.push(indented("Generated", at, Style::default()));
      }
      if let Some(id) = &notice.letter_id {
        lines.push(indented("Letter ID", id, Style::default()));
      }
    }
  }

  if let Some(events) = &view.events {
    lines.push(Line::default());
    lines.push(section_title(
      format!("Events ({})", events.items.len()),
      events.is_new,
    ));
    for event in &events.items {
      lines.push(Line::from(Span::styled(
        format!("  {}", event.title),
        Style::default().bold(),
      )));
      if let Some(code) = &event.code {
        lines.push(indented("Code", code, Style::default().fg(Color::Magenta)));
      }
      if let Some(description) = event.description {
        lines.push(indented("What this means", description, Style::default()));
      }
      if let Some(at) = &event.date {
        lines.push(indented("Date", at, Style::default()));
      }
      if let Some(at) = &event.created {
        lines.push(indented("Created", at, label_style()));
      }
    }
  }

  if !view.details.is_empty() {
    lines.push(Line::default());
    lines.push(section_title("Case Details".to_string(), false));
    lines.extend(view.details.iter().map(info_line));
  }

  lines
}

fn login_lines() -> Vec<Line<'static>> {
  vec![
    Line::from(Span::styled(
      "Not logged in",
      Style::default().fg(Color::Red).bold(),
    )),
    Line::default(),
    Line::from("1. Log in to my.uscis.gov in your browser."),
    Line::from("2. Copy the session cookie into CASEWATCH_SESSION_COOKIE."),
    Line::from("3. Restart casewatch, or press r to check again."),
  ]
}

/// Draw the result panel: the case, a loading note, or the login help
pub fn draw_case_panel(
  frame: &mut Frame,
  area: Rect,
  view: Option<&CaseView>,
  auth: AuthStatus,
  checking: bool,
  notice: Option<&Notice>,
) {
  let title = if checking {
    " Case (checking...) ".to_string()
  } else {
    " Case ".to_string()
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let mut lines = Vec::new();
  match notice {
    Some(Notice::Error(message)) => {
      lines.push(Line::from(vec![
        Span::styled("Error: ", Style::default().fg(Color::Red).bold()),
        Span::styled(message.clone(), Style::default().fg(Color::Red)),
      ]));
      lines.push(Line::default());
    }
    Some(Notice::Info(message)) => {
      lines.push(Line::from(Span::styled(
        message.clone(),
        Style::default().fg(Color::Green),
      )));
      lines.push(Line::default());
    }
    None => {}
  }

  if auth == AuthStatus::NotAuthenticated {
    lines.extend(login_lines());
  } else if let Some(view) = view {
    lines.extend(case_lines(view));
  } else if !checking && notice.is_none() {
    lines.push(Line::from(Span::styled(
      "Press c to look up a receipt number (e.g. IOE0934989946).",
      label_style(),
    )));
  }

  let paragraph = Paragraph::new(lines)
    .block(block)
    .wrap(Wrap { trim: false });
  frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::case::{CaseRecord, ChangeFlags, ReceiptNumber};
  use chrono::Utc;
  use serde_json::json;

  fn text(lines: &[Line]) -> Vec<String> {
    lines
      .iter()
      .map(|line| {
        line
          .spans
          .iter()
          .map(|span| span.content.as_ref())
          .collect::<String>()
      })
      .collect()
  }

  fn view(current: serde_json::Value, previous: Option<serde_json::Value>) -> CaseView {
    let current: CaseRecord = serde_json::from_value(current).unwrap();
    let previous: Option<CaseRecord> = previous.map(|p| serde_json::from_value(p).unwrap());
    let flags = ChangeFlags::compute(previous.as_ref(), Some(&current));
    CaseView::build(
      &ReceiptNumber::parse("EAC2190012345").unwrap(),
      &current,
      &flags,
      chrono_tz::UTC,
      Utc::now(),
    )
  }

  #[test]
  fn test_new_badge_only_on_changed_section() {
    let lines = text(&case_lines(&view(
      json!({"events": [{"eventCode": "RFE"}, {"eventCode": "APR"}], "notices": [{"letterId": "1"}]}),
      Some(json!({"events": [{"eventCode": "RFE"}], "notices": [{"letterId": "1"}]})),
    )));

    assert!(lines.contains(&format!("Events (2){}", NEW_BADGE)));
    assert!(lines.contains(&"Notices (1)".to_string()));
  }

  #[test]
  fn test_header_and_details() {
    let lines = text(&case_lines(&view(
      json!({"closed": true, "actionRequired": true, "formType": "I-130", "isPremiumProcessed": true}),
      None,
    )));

    assert_eq!(lines[0], "EAC2190012345");
    assert_eq!(lines[1], "Vermont Service Center");
    assert!(lines.contains(&"● Closed".to_string()));
    assert!(lines.contains(&"⚠ ACTION REQUIRED".to_string()));
    assert!(lines.contains(&"I-130  Petition for Alien Relative".to_string()));
    assert!(lines
      .iter()
      .any(|l| l.starts_with("  Premium Processing") && l.ends_with("Yes")));
  }
}
