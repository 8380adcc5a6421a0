use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::view::{TableView, Tone};

const MAX_COLUMN_WIDTH: usize = 48;

/// Selection state for one `TableView`. The view itself is rebuilt from
/// console state on every frame.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    state: TableState,
}

impl DataTable {
    pub fn selected(&self) -> Option<usize> {
        self.state.selected()
    }

    /// Keep the selection inside a table of `len` rows.
    pub fn sync(&mut self, len: usize) {
        let next = match self.state.selected() {
            _ if len == 0 => None,
            None => Some(0),
            Some(i) if i >= len => Some(len - 1),
            current => current,
        };
        self.state.select(next);
    }

    /// Move the selection. Returns whether the key was a navigation key.
    pub fn handle_key(&mut self, key: KeyEvent, len: usize) -> bool {
        if len == 0 {
            return matches!(
                key.code,
                KeyCode::Char('j' | 'k' | 'g' | 'G') | KeyCode::Down | KeyCode::Up
            );
        }
        let current = self.state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if current + 1 < len {
                    self.state.select(Some(current + 1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.select(Some(current.saturating_sub(1)));
            }
            // Jump to first/last
            KeyCode::Char('g') => self.state.select(Some(0)),
            KeyCode::Char('G') => self.state.select(Some(len - 1)),
            _ => return false,
        }
        true
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        view: &TableView,
        is_active: bool,
    ) {
        let border_style = if is_active {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .title(format!(" {title} ({}) ", view.rows.len()))
            .borders(Borders::ALL)
            .border_style(border_style);

        if view.is_empty() {
            let paragraph = Paragraph::new(view.empty.as_str())
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(view.header.iter().map(|h| Cell::from(*h)))
            .style(Style::default().fg(Color::Yellow).bold());
        let rows = view.rows.iter().map(|row| {
            Row::new(
                row.cells
                    .iter()
                    .map(|c| Cell::from(c.text.as_str()).style(tone_style(c.tone))),
            )
        });

        let table = Table::new(rows, column_widths(view))
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan).bold())
            .highlight_symbol("> ");

        let mut state = self.state.clone();
        frame.render_stateful_widget(table, area, &mut state);
    }
}

/// Widest cell per column, capped. The last column takes what is left.
fn column_widths(view: &TableView) -> Vec<Constraint> {
    let count = view.header.len();
    (0..count)
        .map(|i| {
            if i + 1 == count {
                return Constraint::Min(0);
            }
            let widest = view
                .rows
                .iter()
                .filter_map(|r| r.cells.get(i))
                .map(|c| c.text.chars().count())
                .chain(std::iter::once(view.header[i].len()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH);
            Constraint::Length(widest as u16 + 1)
        })
        .collect()
}

pub fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Plain => Style::default(),
        Tone::Ok => Style::default().fg(Color::Green),
        Tone::Warn => Style::default().fg(Color::Yellow),
        Tone::Bad => Style::default().fg(Color::Red).bold(),
        Tone::Muted => Style::default().fg(Color::DarkGray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    use crate::view::{Cell as ViewCell, RowView};

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn sync_clamps_selection() {
        let mut table = DataTable::default();
        table.sync(3);
        assert_eq!(table.selected(), Some(0));
        table.handle_key(key('G'), 3);
        assert_eq!(table.selected(), Some(2));
        table.sync(1);
        assert_eq!(table.selected(), Some(0));
        table.sync(0);
        assert_eq!(table.selected(), None);
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut table = DataTable::default();
        table.sync(2);
        table.handle_key(key('k'), 2);
        assert_eq!(table.selected(), Some(0));
        table.handle_key(key('j'), 2);
        table.handle_key(key('j'), 2);
        assert_eq!(table.selected(), Some(1));
        assert!(!table.handle_key(key('x'), 2));
    }

    #[test]
    fn widths_follow_content() {
        let view = TableView {
            header: vec!["ID", "STATUS", "TIER"],
            rows: vec![RowView {
                id: Some(1),
                cells: vec![
                    ViewCell::plain("12345"),
                    ViewCell::plain("ok"),
                    ViewCell::plain("3"),
                ],
            }],
            empty: String::new(),
        };
        assert_eq!(
            column_widths(&view),
            vec![Constraint::Length(6), Constraint::Length(7), Constraint::Min(0)]
        );
    }
}
