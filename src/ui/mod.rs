mod renderfns;
mod views;

use crate::app::App;
use ratatui::prelude::*;
use renderfns::{draw_footer, draw_header};
use views::case_detail::draw_case_panel;
use views::history_list::draw_history_list;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let session = app.session();

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(
    frame,
    chunks[0],
    app.api_url(),
    session.auth(),
    session.timezone().name(),
  );

  let panes = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
    .split(chunks[1]);

  let view = app.case_view();
  draw_case_panel(
    frame,
    panes[0],
    view.as_ref(),
    session.auth(),
    session.is_checking(),
    app.notice(),
  );
  draw_history_list(
    frame,
    panes[1],
    app.history(),
    app.selected_history(),
    session.timezone(),
  );

  draw_footer(frame, chunks[2], app);
}
