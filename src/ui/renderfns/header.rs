use super::utils::auth_badge;
use crate::case::AuthStatus;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with name, API host, login state and timezone
pub fn draw_header(frame: &mut Frame, area: Rect, api_url: &str, auth: AuthStatus, timezone: &str) {
  let host = extract_domain(api_url);
  let (auth_label, auth_color) = auth_badge(auth);

  let header = Line::from(vec![
    Span::styled(" casewatch ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", auth_label),
      Style::default().fg(auth_color).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", timezone), Style::default().fg(Color::Yellow)),
    Span::raw("  "),
    Span::styled("<c>", Style::default().fg(Color::Cyan)),
    Span::styled(" check", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<:>", Style::default().fg(Color::Cyan)),
    Span::styled(" command", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" quit", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract host from the API base URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(
      extract_domain("https://my.uscis.gov:443/account/case-service/api/cases"),
      "my.uscis.gov:443"
    );
    assert_eq!(extract_domain("http://localhost:8080"), "localhost:8080");
    assert_eq!(extract_domain("localhost"), "localhost");
  }
}
