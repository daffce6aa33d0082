use crate::case::AuthStatus;
use crate::view_model::CaseStatus;
use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a case status
pub fn status_color(status: CaseStatus) -> Color {
  match status {
    CaseStatus::Active => Color::Green,
    CaseStatus::Closed => Color::Gray,
  }
}

/// Label and color of the auth badge
pub fn auth_badge(auth: AuthStatus) -> (&'static str, Color) {
  match auth {
    AuthStatus::Unknown => ("checking login", Color::DarkGray),
    AuthStatus::Authenticated => ("logged in", Color::Green),
    AuthStatus::NotAuthenticated => ("not logged in", Color::Red),
  }
}
