use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 6;

/// Draw the status bar: key hints, input line or confirm prompt
pub fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.mode() {
    Mode::Normal => {
      let hint = if app.session().is_checking() {
        " Checking case status...".to_string()
      } else {
        let install = if app.session().can_install() {
          "  i:install"
        } else {
          ""
        };
        format!(
          " c:check  j/k:history  Enter:open  x:clear  t:timezone{}  D:forget  r:login  q:quit",
          install
        )
      };
      (hint, Style::default().fg(Color::DarkGray))
    }
    Mode::Receipt => (
      format!(" Receipt: {}█", app.receipt_input()),
      Style::default().fg(Color::Cyan),
    ),
    Mode::Command => (
      format!(":{}", app.command_input()),
      Style::default().fg(Color::Yellow),
    ),
    Mode::ConfirmClearHistory => (
      " Clear all saved cases? (y/n)".to_string(),
      Style::default().fg(Color::Red).bold(),
    ),
    Mode::ConfirmInstall => (
      " Install the offline app shell? (y/n)".to_string(),
      Style::default().fg(Color::Green).bold(),
    ),
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);

  if *app.mode() == Mode::Command {
    draw_suggestions(frame, area, app);
  }
}

/// Autocomplete popup just above the status bar
fn draw_suggestions(frame: &mut Frame, area: Rect, app: &App) {
  let suggestions = app.autocomplete_suggestions();
  if suggestions.is_empty() {
    return;
  }

  let shown = suggestions.len().min(MAX_SUGGESTIONS);
  let height = shown as u16 + 2;
  let popup = Rect {
    x: area.x,
    y: area.y.saturating_sub(height),
    width: area.width.min(50),
    height,
  };

  let items: Vec<ListItem> = suggestions
    .iter()
    .take(shown)
    .map(|cmd| {
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:<10}", cmd.name), Style::default().fg(Color::Yellow)),
        Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
      ]))
    })
    .collect();

  let list = List::new(items)
    .block(Block::default().borders(Borders::ALL))
    .highlight_style(Style::default().bg(Color::DarkGray));

  let mut state = ListState::default();
  state.select(Some(app.selected_suggestion().min(shown - 1)));

  frame.render_widget(Clear, popup);
  frame.render_stateful_widget(list, popup, &mut state);
}
