/// Reassembles newline-delimited lines from arbitrary chunks.
///
/// Bytes are kept until a `\n` shows up, so neither a line nor a multi-byte UTF-8 character
/// split across two reads is lost.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no `\n`.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without the terminator.
    /// Blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = vec![];
        let mut start = 0;
        for (offset, _) in self.pending[self.scanned..]
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == b'\n')
        {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.pending[start..end]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                lines.push(line.to_owned());
            }
            start = end + 1;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }
}

#[cfg(test)]
mod line_buffer_tests {
    use super::*;

    #[test]
    fn test_line_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(br#"{"action":"gen_"#).is_empty());
        assert_eq!(buffer.push(b"log\"}\n{\"a\""), vec![r#"{"action":"gen_log"}"#]);
        assert_eq!(buffer.pending, br#"{"a""#);
        assert_eq!(buffer.push(b":1}\n\n"), vec![r#"{"a":1}"#]);
        assert!(buffer.pending.is_empty());
    }

    #[test]
    fn test_long_line_in_small_chunks() {
        let mut buffer = LineBuffer::new();
        let line = format!(r#"{{"action":"gen_log","message":"{}"}}"#, "x".repeat(100_000));
        for chunk in line.as_bytes().chunks(7) {
            assert!(buffer.push(chunk).is_empty());
            assert_eq!(buffer.scanned, buffer.pending.len());
        }
        assert_eq!(buffer.push(b"\nnext"), vec![line]);
        assert_eq!(buffer.pending, b"next");
        assert_eq!(buffer.push(b"\n"), vec!["next"]);
        assert_eq!(buffer.scanned, 0);
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"a\r\nb\n  \nc"), vec!["a", "b"]);
        assert_eq!(buffer.push(b"\n"), vec!["c"]);
    }

    #[test]
    fn test_utf8_split() {
        let text = "{\"message\":\"é\"}\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(&text[..split]).is_empty());
        assert_eq!(buffer.push(&text[split..]), vec!["{\"message\":\"é\"}"]);
    }
}
