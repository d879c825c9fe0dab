use std::fmt::{self, Write};

/// State of a single render call.
///
/// Every call gets a fresh one, including the nested ones (footnotes), so that
/// an inner render can't disturb the table or paragraph the outer one is in the middle of.
#[derive(Debug, Default)]
pub struct RenderState {
    /// Next paragraph follows another one, and should be visually separated
    pub needs_indent: bool,
    /// Cells seen in the table header so far
    pub column_count: usize,
    pub first_column: bool,
    /// Buffers taking the writes instead of the output. Only table headers use this,
    /// since their width must be written before they are.
    pub redirect: Vec<String>,
}

impl RenderState {
    /// Current write destination
    pub fn sink<'s, W: Write + ?Sized>(&'s mut self, output: &'s mut W) -> Sink<'s, W> {
        match self.redirect.last_mut() {
            Some(buffer) => Sink::Buffer(buffer),
            None => Sink::Output(output),
        }
    }
}

pub enum Sink<'s, W: ?Sized> {
    Output(&'s mut W),
    Buffer(&'s mut String),
}

impl<W: Write + ?Sized> Write for Sink<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self {
            Sink::Output(output) => output.write_str(s),
            Sink::Buffer(buffer) => buffer.write_str(s),
        }
    }
}
