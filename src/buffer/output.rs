use std::collections::VecDeque;

use ansi_to_tui::IntoText;
use ratatui::style::Color;
use ratatui::text::Span;

use crate::classify::Severity;

// Log palette (VS Code Dark+, carried over from the original GUI)
const SUCCESS_COLOR: Color = Color::Rgb(0x4e, 0xc9, 0xb0);
const WARNING_COLOR: Color = Color::Rgb(0xce, 0x91, 0x78);
const ERROR_COLOR: Color = Color::Rgb(0xf4, 0x87, 0x71);
const DIM_COLOR: Color = Color::Rgb(0x6a, 0x6a, 0x6a);
const INFO_COLOR: Color = Color::Rgb(0xd4, 0xd4, 0xd4);

/// Foreground color for a severity tag
pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => INFO_COLOR,
        Severity::Success => SUCCESS_COLOR,
        Severity::Warning => WARNING_COLOR,
        Severity::Error => ERROR_COLOR,
        Severity::Dim => DIM_COLOR,
    }
}

/// One severity-tagged line in a log view
#[derive(Debug, Clone)]
pub struct LogLine {
    pub severity: Severity,
    /// Pre-parsed spans with styles (for rendering)
    spans: Vec<Span<'static>>,
}

impl LogLine {
    /// Create a new LogLine.
    ///
    /// Parses ANSI escape sequences into styled spans; spans without their
    /// own color take the severity color at render time.
    pub fn new(severity: Severity, content: String) -> Self {
        let spans = match content.as_str().into_text() {
            Ok(text) => text
                .lines
                .into_iter()
                .next()
                .map(|line| line.spans)
                .unwrap_or_else(Vec::new),
            Err(_) => vec![Span::raw(content)],
        };

        Self { severity, spans }
    }

    /// Spans for rendering, with the severity color filled in where the
    /// child output carried no color of its own
    pub fn styled_spans(&self) -> Vec<Span<'static>> {
        let fallback = severity_color(self.severity);
        self.spans
            .iter()
            .map(|span| {
                let mut span = span.clone();
                if span.style.fg.is_none() {
                    span.style.fg = Some(fallback);
                }
                span
            })
            .collect()
    }

    /// Plain text without ANSI escape sequences (derived from spans)
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.content.as_ref()).collect()
    }
}

/// Ring buffer for log lines
///
/// When max lines is exceeded, old lines are automatically discarded.
/// Uses VecDeque internally for O(1) removal from the front.
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    max_lines: usize,
}

impl LogBuffer {
    /// Create a buffer with specified max lines (0 for unlimited)
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines,
        }
    }

    /// Add a line, discarding the oldest when max_lines is exceeded
    pub fn push(&mut self, line: LogLine) {
        if self.max_lines > 0 && self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Get lines in specified range; empty or partial result if out of bounds
    pub fn get_range(&self, start: usize, count: usize) -> Vec<&LogLine> {
        self.lines.iter().skip(start).take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_buffer_push_discards_oldest_line_when_max_exceeded() {
        let mut buffer = LogBuffer::new(3);
        for i in 1..=4 {
            buffer.push(LogLine::new(Severity::Info, format!("line{i}")));
        }

        assert_eq!(buffer.len(), 3);
        let lines = buffer.get_range(0, 3);
        assert_eq!(lines[0].plain(), "line2");
        assert_eq!(lines[2].plain(), "line4");
    }

    #[test]
    fn log_buffer_push_unlimited_when_max_lines_is_zero() {
        let mut buffer = LogBuffer::new(0);
        for i in 0..1000 {
            buffer.push(LogLine::new(Severity::Info, format!("line{i}")));
        }

        assert_eq!(buffer.len(), 1000);
    }

    #[test]
    fn log_buffer_get_range_returns_partial_when_exceeds_buffer() {
        let mut buffer = LogBuffer::new(100);
        for i in 0..5 {
            buffer.push(LogLine::new(Severity::Info, format!("line{i}")));
        }

        let lines = buffer.get_range(3, 10);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].plain(), "line3");
    }

    #[test]
    fn log_line_plain_strips_ansi_sequences() {
        let line = LogLine::new(Severity::Error, "\x1b[31mERROR\x1b[0m: timeout".into());
        assert_eq!(line.plain(), "ERROR: timeout");
    }

    #[test]
    fn log_line_severity_color_fills_uncolored_spans() {
        let line = LogLine::new(Severity::Success, "# 1 ./a.jpg".into());
        let spans = line.styled_spans();

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].style.fg, Some(severity_color(Severity::Success)));
    }

    #[test]
    fn log_line_keeps_ansi_colors_over_severity() {
        let line = LogLine::new(Severity::Info, "\x1b[31mred\x1b[0m plain".into());
        let spans = line.styled_spans();

        let red = spans.iter().find(|s| s.content == "red").unwrap();
        assert_eq!(red.style.fg, Some(Color::Red));
        let plain = spans.iter().find(|s| s.content.contains("plain")).unwrap();
        assert_eq!(plain.style.fg, Some(severity_color(Severity::Info)));
    }
}
