use crate::error::Error;

/// Longest accepted outgoing header line, in bytes.
pub(crate) const MAX_HEADER_LEN: usize = 8192;

/// The header keys that may be set automatically.
const ACCEPT: &str = "Accept:";
const CONNECTION: &str = "Connection:";
const CONTENT_LENGTH: &str = "Content-Length:";
const KEEP_ALIVE: &str = "Keep-Alive:";

/// The outgoing header list and its auto-management flags.
///
/// Headers the caller never supplied are appended automatically at start
/// time; supplying one clears the matching flag so nothing is emitted
/// twice.
#[derive(Debug)]
pub(crate) struct HeaderSet {
    lines: Vec<String>,
    pub(crate) set_accept: bool,
    pub(crate) set_connection: bool,
    pub(crate) set_keep_alive: bool,
}

impl HeaderSet {
    pub(crate) fn new() -> HeaderSet {
        HeaderSet {
            lines: Vec::new(),
            set_accept: false,
            set_connection: true,
            set_keep_alive: true,
        }
    }

    pub(crate) fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Appends one header line, tracking the auto-managed keys.
    ///
    /// Returns the declared size when the line is a valid
    /// `Content-Length` header. An invalid `Content-Length` value rejects
    /// the line outright.
    pub(crate) fn push(&mut self, line: &str) -> crate::Result<Option<u64>> {
        if line.len() > MAX_HEADER_LEN {
            return Err(Error::new_header_too_large());
        }

        let mut content_length = None;
        if has_key(line, ACCEPT) {
            self.set_accept = false;
        } else if has_key(line, CONNECTION) {
            self.set_connection = false;
        } else if has_key(line, CONTENT_LENGTH) {
            let value = line[CONTENT_LENGTH.len()..].trim_start();
            match value.parse::<i64>() {
                Ok(n) if n >= 0 => content_length = Some(n as u64),
                _ => return Err(Error::new_content_length_invalid()),
            }
        } else if has_key(line, KEEP_ALIVE) {
            self.set_keep_alive = false;
        }

        self.lines.push(line.to_owned());
        Ok(content_length)
    }
}

/// Case-insensitive match of the line's key prefix.
fn has_key(line: &str, key: &str) -> bool {
    line.len() >= key.len() && line.as_bytes()[..key.len()].eq_ignore_ascii_case(key.as_bytes())
}
