/// Collects prompt input until every `{` has been closed, so a block can be
/// typed over several lines and still run as one chunk.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    buffer: String,
    open_braces: usize,
}

impl ChunkBuffer {
    /// Prompt to show for the next line: one `-` per block still open.
    pub fn prompt(&self) -> String {
        format!("{}>", "-".repeat(self.open_braces))
    }

    /// Adds a line of input. Returns the buffered chunk once it is complete.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        self.buffer.push_str(line);
        if !line.ends_with('\n') {
            self.buffer.push('\n');
        }

        let opened = line.matches('{').count();
        let closed = line.matches('}').count();
        self.open_braces = (self.open_braces + opened).saturating_sub(closed);

        if self.open_braces > 0 {
            return None;
        }
        Some(self.take())
    }

    /// Whatever is left over, e.g. when the input ends inside a block.
    pub fn take(&mut self) -> String {
        self.open_braces = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}
