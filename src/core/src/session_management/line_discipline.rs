//! Byte-at-a-time line assembly for the fake terminal.

const NUL: u8 = 0x00;
const BS: u8 = 0x08;
const LF: u8 = b'\n';
const CR: u8 = b'\r';
const DEL: u8 = 0x7f;

/// Longest line kept; further bytes are dropped until the line ends.
pub const MAX_LINE_LEN: usize = 4096;

/// Consecutive blank lines after which the current prompt is shown again.
const BLANKS_BEFORE_REPROMPT: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Nothing visible happened.
    Pending,
    /// The byte was appended to the line.
    Typed(u8),
    /// The last byte of the line was removed.
    Erased,
    /// A terminator arrived with nothing buffered.
    Blank { reprompt: bool },
    Line(String),
}

#[derive(Debug, Default)]
pub struct LineDiscipline {
    buffer: Vec<u8>,
    blank_count: u8,
}

impl LineDiscipline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> LineEvent {
        let byte = if byte == LF { CR } else { byte };

        match byte {
            CR if self.buffer.is_empty() => {
                self.blank_count += 1;
                if self.blank_count >= BLANKS_BEFORE_REPROMPT {
                    self.blank_count = 0;
                    LineEvent::Blank { reprompt: true }
                } else {
                    LineEvent::Blank { reprompt: false }
                }
            }
            CR => {
                self.blank_count = 0;
                let line = std::mem::take(&mut self.buffer);
                LineEvent::Line(String::from_utf8_lossy(&line).into_owned())
            }
            NUL => LineEvent::Pending,
            BS | DEL => match self.buffer.pop() {
                Some(_) => LineEvent::Erased,
                None => LineEvent::Pending,
            },
            _ if self.buffer.len() >= MAX_LINE_LEN => LineEvent::Pending,
            _ => {
                self.buffer.push(byte);
                LineEvent::Typed(byte)
            }
        }
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(discipline: &mut LineDiscipline, bytes: &[u8]) -> Vec<LineEvent> {
        bytes.iter().map(|&b| discipline.push(b)).collect()
    }

    fn lines(events: &[LineEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                LineEvent::Line(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn cr_lf_and_cr_nul_end_lines() {
        let mut d = LineDiscipline::new();
        let events = feed(&mut d, b"root\r\nls -la\r\0pwd\n");
        assert_eq!(lines(&events), vec!["root", "ls -la", "pwd"]);
        assert!(d.buffered().is_empty());
    }

    #[test]
    fn two_blank_lines_reprompt() {
        let mut d = LineDiscipline::new();
        assert_eq!(d.push(b'\r'), LineEvent::Blank { reprompt: false });
        assert_eq!(d.push(b'\r'), LineEvent::Blank { reprompt: true });
        // Counter starts over after a reprompt.
        assert_eq!(d.push(b'\n'), LineEvent::Blank { reprompt: false });
        assert_eq!(d.push(b'\n'), LineEvent::Blank { reprompt: true });
    }

    #[test]
    fn non_empty_line_resets_blank_count() {
        let mut d = LineDiscipline::new();
        d.push(b'\r');
        feed(&mut d, b"id\r");
        assert_eq!(d.push(b'\r'), LineEvent::Blank { reprompt: false });
    }

    #[test]
    fn backspace_and_delete_erase() {
        let mut d = LineDiscipline::new();
        let events = feed(&mut d, b"lsx\x08\x7f\x7fwho\x7fami\r");
        assert_eq!(lines(&events), vec!["whami"]);
        assert_eq!(d.push(0x08), LineEvent::Pending);
    }

    #[test]
    fn overlong_line_is_capped() {
        let mut d = LineDiscipline::new();
        for _ in 0..MAX_LINE_LEN + 10 {
            d.push(b'A');
        }
        match d.push(b'\r') {
            LineEvent::Line(line) => assert_eq!(line.len(), MAX_LINE_LEN),
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut d = LineDiscipline::new();
        let events = feed(&mut d, &[b'a', 0xc3, b'\r']);
        assert_eq!(lines(&events), vec!["a\u{fffd}"]);
    }
}
