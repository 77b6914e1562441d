use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with view breadcrumb and the assistant hint
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], busy: bool) {
  let mut spans = Vec::new();

  spans.push(Span::raw(" "));

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      // Current view - highlighted
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  if busy {
    spans.push(Span::styled("  working...", Style::default().fg(Color::Yellow)));
  }

  let hint = Line::from(Span::styled(
    "Ctrl-A assistant ",
    Style::default().fg(Color::DarkGray),
  ))
  .right_aligned();

  frame.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    area,
  );
  frame.render_widget(Paragraph::new(hint), area);
}
