use tokio::io::{AsyncRead, AsyncReadExt};

/// Split a newly read chunk into complete lines.
///
/// `pending` is the unterminated tail carried over from the previous read;
/// the returned remainder must be fed back in with the next chunk. Handles
/// both `\n` and `\r\n` terminators.
pub fn split_lines(pending: String, chunk: &str) -> (Vec<String>, String) {
    let mut buffer = pending;
    buffer.push_str(chunk);

    let mut lines = Vec::new();
    while let Some(newline) = buffer.find('\n') {
        let mut line: String = buffer.drain(..=newline).collect();
        line.pop(); // the '\n'
        if line.ends_with('\r') {
            line.pop();
        }
        lines.push(line);
    }

    (lines, buffer)
}

/// Stateful wrapper over `split_lines` for incremental stream consumption.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and get back every line it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let (lines, remainder) = split_lines(std::mem::take(&mut self.pending), chunk);
        self.pending = remainder;
        lines
    }

    /// Take the trailing unterminated line, if any. Call at stream end.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Read a stream to completion, invoking `on_line` for every complete line
/// in emission order, and once more for a trailing unterminated line.
///
/// Decoding is incremental: a multibyte character split across read
/// boundaries is held back until its remaining bytes arrive, so non-ASCII
/// engine output survives intact.
pub async fn for_each_line<R, F>(mut reader: R, mut on_line: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut chunk = [0u8; 4096];
    let mut undecoded = Vec::new();
    let mut buffer = LineBuffer::new();

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        undecoded.extend_from_slice(&chunk[..n]);
        let text = take_decodable(&mut undecoded);
        for line in buffer.push(&text) {
            on_line(&line);
        }
    }

    // The stream ended mid-character; nothing more is coming
    if !undecoded.is_empty() {
        let tail = String::from_utf8_lossy(&undecoded).into_owned();
        for line in buffer.push(&tail) {
            on_line(&line);
        }
    }

    if let Some(tail) = buffer.take_remainder() {
        on_line(&tail);
    }

    Ok(())
}

/// Decode the longest complete-UTF-8 prefix of `bytes`, leaving at most a
/// trailing partial character behind for the next read. Genuinely invalid
/// sequences become replacement characters rather than stalling the
/// carry-over.
fn take_decodable(bytes: &mut Vec<u8>) -> String {
    let mut decoded = String::new();
    let mut raw = std::mem::take(bytes);

    loop {
        match String::from_utf8(raw) {
            Ok(text) => {
                decoded.push_str(&text);
                return decoded;
            }
            Err(err) => {
                let valid = err.utf8_error().valid_up_to();
                let error_len = err.utf8_error().error_len();
                let mut rest = err.into_bytes();
                decoded.push_str(&String::from_utf8_lossy(&rest[..valid]));

                match error_len {
                    // Real garbage: replace it and keep decoding
                    Some(skip) => {
                        decoded.push(char::REPLACEMENT_CHARACTER);
                        raw = rest.split_off(valid + skip);
                    }
                    // Partial character at the end: carry it over
                    None => {
                        *bytes = rest.split_off(valid);
                        return decoded;
                    }
                }
            }
        }
    }
}
