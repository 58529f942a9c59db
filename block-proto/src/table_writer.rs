//! Bulk table ingest (§4.10), grounded in `config_server.c`'s
//! `parse_table_command`/`process_put_table_command`/`convert_*_line`.
//!
//! A `TableWriter` is opened once per `<` command, fed one payload line at a
//! time until the client sends a blank line, and closed to learn the final
//! word count and whether anything went wrong. Decode errors do not stop
//! the line loop — the client's payload must be fully consumed so the
//! connection stays synchronized — but the *first* error encountered (be it
//! the open-phase lookup failure or a later decode error) is the one
//! ultimately reported.

use base64::Engine;
use block_core::{Class, CoreError, DummySink, TableSink};

/// Parses the table-command suffix that follows the field name's `<`
/// separator: optional second `<` for append, optional `B` for base64.
pub fn parse_table_header(remainder: &str) -> Result<(bool, bool), CoreError> {
    let mut chars = remainder.chars();
    let mut append = false;
    let mut base64 = false;
    let mut next = chars.next();
    if next == Some('<') {
        append = true;
        next = chars.next();
    }
    if next == Some('B') {
        base64 = true;
        next = chars.next();
    }
    if next.is_some() {
        return Err(CoreError::parse(format!(
            "malformed table command '<{}'",
            remainder
        )));
    }
    Ok((append, base64))
}

pub struct TableWriter {
    sink: Box<dyn TableSink>,
    base64: bool,
    first_error: Option<CoreError>,
    word_count: usize,
}

impl TableWriter {
    /// Opens a writer against `class`. If the class rejects the table open
    /// (wrong class, or a malformed header already detected by the caller),
    /// a dummy sink takes its place so payload lines are still drained.
    pub fn open(class: &Class, append: bool, base64: bool, header_error: Option<CoreError>) -> Self {
        let (sink, open_error) = match header_error {
            Some(e) => (Box::new(DummySink) as Box<dyn TableSink>, Some(e)),
            None => match class.put_table(append) {
                Ok(sink) => (sink, None),
                Err(e) => (Box::new(DummySink) as Box<dyn TableSink>, Some(e)),
            },
        };
        TableWriter {
            sink,
            base64,
            first_error: open_error,
            word_count: 0,
        }
    }

    /// Opens a dummy-sink writer carrying `error` as the open failure, for
    /// table commands whose target couldn't even be resolved to a field.
    /// The payload must still be drained so the connection stays in sync.
    pub fn dummy(error: CoreError) -> Self {
        TableWriter {
            sink: Box::new(DummySink),
            base64: false,
            first_error: Some(error),
            word_count: 0,
        }
    }

    /// Consumes one payload line. Never returns an error directly: decode
    /// failures are recorded internally and surfaced by `close`.
    pub fn feed_line(&mut self, line: &str) {
        let words = if self.base64 {
            self.decode_base64_line(line)
        } else {
            self.decode_ascii_line(line)
        };
        match words {
            Ok(words) => {
                self.word_count = self.sink.push(&words);
            }
            Err(e) => self.remember_error(e),
        }
    }

    fn decode_ascii_line(&self, line: &str) -> Result<Vec<u32>, CoreError> {
        line.split_whitespace()
            .map(|tok| {
                tok.parse::<u32>()
                    .map_err(|_| CoreError::parse(format!("invalid table value '{}'", tok)))
            })
            .collect()
    }

    fn decode_base64_line(&self, line: &str) -> Result<Vec<u32>, CoreError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(line.trim())
            .map_err(|_| CoreError::parse("invalid base64 table data"))?;
        if bytes.len() % 4 != 0 {
            return Err(CoreError::parse("Invalid data length"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn remember_error(&mut self, error: CoreError) {
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    /// Finalises the ingest and returns the total word count written, or
    /// the first error encountered across the whole session.
    pub fn close(mut self) -> Result<usize, CoreError> {
        let success = self.first_error.is_none();
        self.sink.close(success);
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.word_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_four_header_forms() {
        assert_eq!(parse_table_header("").unwrap(), (false, false));
        assert_eq!(parse_table_header("<").unwrap(), (true, false));
        assert_eq!(parse_table_header("B").unwrap(), (false, true));
        assert_eq!(parse_table_header("<B").unwrap(), (true, true));
        assert!(parse_table_header("X").is_err());
    }

    #[test]
    fn ascii_payload_accumulates_words() {
        let class = Class::table();
        let mut writer = TableWriter::open(&class, false, false, None);
        writer.feed_line("1 2 3");
        writer.feed_line("4");
        assert_eq!(writer.close().unwrap(), 4);
    }

    #[test]
    fn base64_payload_decodes_little_endian_words() {
        let class = Class::table();
        let mut writer = TableWriter::open(&class, false, true, None);
        let encoded = base64::engine::general_purpose::STANDARD.encode(1u32.to_le_bytes());
        writer.feed_line(&encoded);
        assert_eq!(writer.close().unwrap(), 1);
    }

    #[test]
    fn malformed_base64_length_is_reported_but_consumption_continues() {
        let class = Class::table();
        let mut writer = TableWriter::open(&class, false, true, None);
        writer.feed_line("AAA"); // 2 raw bytes, not a multiple of 4
        writer.feed_line("not consumed either way, still fine");
        assert!(writer.close().is_err());
    }

    #[test]
    fn open_phase_error_wins_over_stream_errors() {
        let class = Class::table();
        let mut writer = TableWriter::open(&class, false, false, Some(CoreError::parse("bad header")));
        writer.feed_line("not a number");
        match writer.close() {
            Err(CoreError::Parse(msg)) => assert_eq!(msg, "bad header"),
            other => panic!("expected the open-phase error, got {:?}", other.err().map(|e| e.to_string())),
        }
    }
}
