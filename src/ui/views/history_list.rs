use crate::cache::HistoryEntry;
use crate::ui::renderfns::truncate;
use chrono_tz::Tz;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// When an entry was saved, in the display timezone
pub fn saved_at(entry: &HistoryEntry, tz: Tz) -> String {
  entry
    .timestamp
    .with_timezone(&tz)
    .format("%-m/%-d/%Y, %-I:%M:%S %p")
    .to_string()
}

pub fn draw_history_list(
  frame: &mut Frame,
  area: Rect,
  entries: &[HistoryEntry],
  selected: usize,
  tz: Tz,
) {
  let block = Block::default()
    .title(format!(" Saved Cases ({}) ", entries.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if entries.is_empty() {
    let paragraph = Paragraph::new("No saved cases yet.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let width = area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = entries
    .iter()
    .map(|entry| {
      let form = entry.data.form_type().unwrap_or("Unknown");
      ListItem::new(vec![
        Line::from(vec![
          Span::styled(
            entry.case_number.clone(),
            Style::default().fg(Color::Cyan).bold(),
          ),
          Span::raw("  "),
          Span::styled(form.to_string(), Style::default().fg(Color::Magenta)),
        ]),
        Line::from(Span::styled(
          truncate(&saved_at(entry, tz), width),
          Style::default().fg(Color::DarkGray),
        )),
      ])
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}
