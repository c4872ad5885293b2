use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Tabs};

use crate::app::{App, Mode, Pane};
use crate::buffer::severity_color;
use crate::classify::Severity;

const ACCENT_COLOR: Color = Color::Rgb(0x00, 0x7a, 0xcc);
const DIM_COLOR: Color = Color::Rgb(0x6a, 0x6a, 0x6a);

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// TUI rendering handler
pub struct Renderer;

impl Renderer {
    /// Render application state
    pub fn render(frame: &mut Frame, app: &App) {
        let [header, url_area, stats_area, tabs_area, log_area, status_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .areas(frame.area());

        // Header
        let title = Line::from(vec![
            Span::styled(
                "Gallery-DL TUI",
                Style::new().fg(ACCENT_COLOR).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(format!("v{APP_VERSION}"), Style::new().fg(DIM_COLOR)),
        ]);
        frame.render_widget(Paragraph::new(title), header);

        // Target URL
        let url_block = Block::bordered().title(" Target URL ");
        let url_inner = url_block.inner(url_area);
        frame.render_widget(url_block, url_area);
        match app.mode() {
            Mode::EditUrl => {
                let width = url_inner.width.max(1) as usize - 1;
                let scroll = app.url_input().visual_scroll(width);
                frame.render_widget(
                    Paragraph::new(app.url_input().value()).scroll((0, scroll as u16)),
                    url_inner,
                );
                let cursor_x = app.url_input().visual_cursor().saturating_sub(scroll) as u16;
                frame.set_cursor_position(Position::new(
                    url_inner.x + cursor_x.min(url_inner.width.saturating_sub(1)),
                    url_inner.y,
                ));
            }
            Mode::Normal if app.url().is_empty() => {
                frame.render_widget(
                    Paragraph::new("press e to enter a URL")
                        .style(Style::new().fg(DIM_COLOR)),
                    url_inner,
                );
            }
            Mode::Normal => {
                frame.render_widget(Paragraph::new(app.url()), url_inner);
            }
        }

        // Stats line
        frame.render_widget(
            Paragraph::new(app.stats_line())
                .style(Style::new().fg(severity_color(Severity::Success))),
            stats_area,
        );

        // Pane tabs
        let failed_title = if app.failed_unread() {
            "⚠ Failed Items"
        } else {
            "Failed Items"
        };
        let selected = match app.pane() {
            Pane::Log => 0,
            Pane::Failed => 1,
        };
        frame.render_widget(
            Tabs::new(vec!["Log", failed_title])
                .select(selected)
                .style(Style::new().fg(DIM_COLOR))
                .highlight_style(Style::new().fg(Color::White).add_modifier(Modifier::BOLD)),
            tabs_area,
        );

        // Log pane
        let log_block = Block::bordered();
        let log_inner = log_block.inner(log_area);
        frame.render_widget(log_block, log_area);
        let lines: Vec<Line> = app
            .current_view()
            .visible_slice()
            .into_iter()
            .map(|line| Line::from(line.styled_spans()))
            .collect();
        frame.render_widget(Paragraph::new(lines), log_inner);

        // Status bar
        let [status_left, status_right] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(16)]).areas(status_area);
        frame.render_widget(
            Paragraph::new(app.status()).style(Style::new().fg(DIM_COLOR)),
            status_left,
        );
        frame.render_widget(
            Paragraph::new(format!("gdl-tui v{APP_VERSION}"))
                .style(Style::new().fg(DIM_COLOR))
                .right_aligned(),
            status_right,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    fn render_to_string(app: &App) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| Renderer::render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn render_shows_header_and_status() {
        let app = App::new(None, None, 10, Duration::from_secs(120), 100);
        let content = render_to_string(&app);

        assert!(content.contains("Gallery-DL TUI"));
        assert!(content.contains("Target URL"));
        assert!(content.contains("Ready"));
        assert!(content.contains("press e to enter a URL"));
    }

    #[test]
    fn render_shows_url_and_pane_titles() {
        let app = App::new(
            Some("https://example.com/gallery".into()),
            None,
            10,
            Duration::from_secs(120),
            100,
        );
        let content = render_to_string(&app);

        assert!(content.contains("https://example.com/gallery"));
        assert!(content.contains("Log"));
        assert!(content.contains("Failed Items"));
    }
}
