use crate::buffer::{LogBuffer, LogLine};

/// A scrollable log pane (Log or Failed Items)
pub struct LogView {
    buffer: LogBuffer,
    scroll_offset: usize,
    auto_scroll: bool,
    visible_lines: usize,
}

impl LogView {
    pub fn new(max_buffer_lines: usize) -> Self {
        Self {
            buffer: LogBuffer::new(max_buffer_lines),
            scroll_offset: 0,
            auto_scroll: true,
            visible_lines: 0,
        }
    }

    /// Add a line, following the tail when auto-scroll is on
    pub fn push(&mut self, line: LogLine) {
        self.buffer.push(line);
        if self.auto_scroll {
            self.scroll_to_bottom();
        }
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Lines currently in the viewport
    pub fn visible_slice(&self) -> Vec<&LogLine> {
        self.buffer.get_range(self.scroll_offset, self.visible_lines)
    }

    pub fn set_visible_lines(&mut self, lines: usize) {
        self.visible_lines = lines;
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_down(&mut self) {
        let max_offset = self.max_scroll_offset();
        if self.scroll_offset < max_offset {
            self.scroll_offset += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.visible_lines / 2;
        let max_offset = self.max_scroll_offset();
        self.scroll_offset = (self.scroll_offset + half_page).min(max_offset);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.visible_lines / 2;
        self.scroll_offset = self.scroll_offset.saturating_sub(half_page);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll_offset();
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn toggle_auto_scroll(&mut self) {
        self.auto_scroll = !self.auto_scroll;
    }

    /// Clear the buffer and reset scroll state for a new run
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scroll_offset = 0;
        self.auto_scroll = true;
    }

    fn max_scroll_offset(&self) -> usize {
        self.buffer.len().saturating_sub(self.visible_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Severity;

    fn view_with_lines(count: usize, visible: usize) -> LogView {
        let mut view = LogView::new(100);
        view.set_visible_lines(visible);
        for i in 0..count {
            view.push(LogLine::new(Severity::Info, format!("line{i}")));
        }
        view
    }

    #[test]
    fn view_auto_scroll_follows_tail() {
        let view = view_with_lines(20, 5);
        // max offset = 20 - 5
        assert_eq!(view.scroll_offset(), 15);
        assert_eq!(view.visible_slice().last().unwrap().plain(), "line19");
    }

    #[test]
    fn view_scroll_down_stops_at_max() {
        let mut view = view_with_lines(10, 5);
        view.scroll_to_top();

        for _ in 0..20 {
            view.scroll_down();
        }
        assert_eq!(view.scroll_offset(), 5);
    }

    #[test]
    fn view_half_page_scrolling() {
        let mut view = view_with_lines(20, 6);
        view.scroll_to_top();

        view.scroll_half_page_down();
        assert_eq!(view.scroll_offset(), 3);
        view.scroll_half_page_up();
        assert_eq!(view.scroll_offset(), 0);
    }

    #[test]
    fn view_reset_clears_buffer_and_scroll() {
        let mut view = view_with_lines(20, 5);
        view.toggle_auto_scroll();

        view.reset();
        assert!(view.buffer().is_empty());
        assert_eq!(view.scroll_offset(), 0);
        assert!(view.auto_scroll());
    }
}
