//! Incremental reader for `text/event-stream` bodies.

use std::collections::VecDeque;

/// One dispatched server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Value of the `event:` field, `message` when absent.
    pub event: Box<str>,
    /// All `data:` lines joined by newlines.
    pub data: Box<str>,
}

/// Accumulates body chunks and cuts them into [`Message`]s. Chunk boundaries
/// may fall anywhere, including inside a line.
#[derive(Default)]
pub struct Parser {
    /// Bytes of the current incomplete line.
    line: Vec<u8>,
    event: Option<String>,
    data: Option<String>,
}

impl Parser {
    pub fn feed(&mut self, chunk: &[u8], out: &mut VecDeque<Message>) {
        for &byte in chunk {
            if byte != b'\n' {
                self.line.push(byte);
                continue;
            }
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
            let line = core::mem::take(&mut self.line);
            if let Some(message) = self.on_line(&String::from_utf8_lossy(&line)) {
                out.push_back(message);
            }
        }
    }

    fn on_line(&mut self, line: &str) -> Option<Message> {
        if line.is_empty() {
            let data = self.data.take();
            let event = self.event.take();
            return data.map(|data| Message {
                event: event.unwrap_or_else(|| String::from("message")).into_boxed_str(),
                data: data.into_boxed_str(),
            });
        }

        // Comment lines double as keep-alives.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => self.event = Some(String::from(value)),
            "data" => match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(String::from(value)),
            },
            _ => log::trace!("ignoring event-stream field {field:?}"),
        }
        None
    }
}
