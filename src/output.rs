//! Output surface the pipeline writes answers and inline errors to.

use std::io::Write;

pub trait OutputSurface {
    /// Drops whatever the previous request produced.
    fn clear(&mut self);
    /// Opens the assistant's answer block.
    fn begin_answer(&mut self);
    /// Appends model content exactly as received.
    fn append_markup(&mut self, markup: &str);
    fn append_error(&mut self, message: &str);
}

/// Prints to a terminal. Model content is passed through except for control
/// characters, so a reply cannot drive the terminal with escape sequences.
pub struct TerminalSurface<W: Write> {
    out: W,
    answer_open: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out, answer_open: false }
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            log::warn!("Failed to write to terminal: {e}");
        }
    }

    fn close_answer(&mut self) {
        if self.answer_open {
            self.answer_open = false;
            self.write("\n");
        }
    }
}

impl<W: Write> OutputSurface for TerminalSurface<W> {
    fn clear(&mut self) {
        self.close_answer();
    }

    fn begin_answer(&mut self) {
        self.close_answer();
        self.answer_open = true;
        self.write("Assistant: ");
    }

    fn append_markup(&mut self, markup: &str) {
        let printable = strip_control(markup);
        self.write(&printable);
    }

    fn append_error(&mut self, message: &str) {
        self.close_answer();
        let line = format!("Error: {}\n", strip_control(message));
        self.write(&line);
    }
}

impl<W: Write> Drop for TerminalSurface<W> {
    fn drop(&mut self) {
        self.close_answer();
    }
}

fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// In-memory surface for tests.
#[cfg(test)]
#[derive(Default)]
pub struct BufferSurface {
    pub answer: String,
    pub errors: Vec<String>,
    pub answers_started: usize,
    pub clears: usize,
}

#[cfg(test)]
impl OutputSurface for BufferSurface {
    fn clear(&mut self) {
        self.answer.clear();
        self.errors.clear();
        self.clears += 1;
    }

    fn begin_answer(&mut self) {
        self.answers_started += 1;
    }

    fn append_markup(&mut self, markup: &str) {
        self.answer.push_str(markup);
    }

    fn append_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}
