//! Raw terminal input decoding
//!
//! In raw mode the terminal hands over bytes, not keys. A single keypress
//! can span several bytes (arrow keys are `ESC [ A`, an X10 mouse report is
//! `ESC [ M` plus three payload bytes) and a read may end in the middle of
//! one. [`decode`] classifies the front of a buffer; [`InputDecoder`] keeps
//! the unconsumed tail between reads.

use std::time::Duration;
use tracing::debug;

pub const ESC: u8 = 0x1b;

/// How long a lone ESC waits for a continuation before it counts as Escape
pub const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// `ESC [ M` followed by button, column and row bytes
const X10_MOUSE_LEN: usize = 6;

/// Incomplete sequences longer than this are dropped as garbage
const MAX_SEQUENCE_LEN: usize = 32;

/// A decoded key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Any single byte other than ESC, including control bytes
    Byte(u8),
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
}

/// Result of decoding the front of an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Not enough bytes yet; keep buffering
    Incomplete,
    /// This many bytes were consumed without producing a key
    Swallowed(usize),
    /// A key, and how many bytes it consumed
    Key(Key, usize),
}

impl Decoded {
    pub fn key(&self) -> Option<Key> {
        match self {
            Decoded::Key(key, _) => Some(*key),
            _ => None,
        }
    }

    /// Whether the bytes were fully consumed (with or without a key)
    pub fn is_complete(&self) -> bool {
        !matches!(self, Decoded::Incomplete)
    }

    pub fn consumed(&self) -> usize {
        match self {
            Decoded::Incomplete => 0,
            Decoded::Swallowed(len) | Decoded::Key(_, len) => *len,
        }
    }
}

/// Decode the key at the front of `buf`.
///
/// - empty buffer, lone `ESC`, or a partial sequence: [`Decoded::Incomplete`]
/// - any other single byte: that byte as [`Key::Byte`]
/// - `ESC [ M b x y` (X10 mouse): swallowed
/// - CSI / SS3 sequences for arrows, Home, End, Insert, Delete, PageUp,
///   PageDown: the matching key; every other sequence is swallowed
/// - `ESC` followed by a byte that starts no sequence: [`Key::Escape`],
///   consuming only the `ESC`
pub fn decode(buf: &[u8]) -> Decoded {
    match buf {
        [] | [ESC] => Decoded::Incomplete,
        [ESC, b'[', body @ ..] => decode_csi(body),
        [ESC, b'O', body @ ..] => decode_ss3(body),
        [ESC, ..] => Decoded::Key(Key::Escape, 1),
        [byte, ..] => Decoded::Key(Key::Byte(*byte), 1),
    }
}

/// `body` is everything after `ESC [`
fn decode_csi(body: &[u8]) -> Decoded {
    if body.first() == Some(&b'M') {
        return if body.len() >= X10_MOUSE_LEN - 2 {
            Decoded::Swallowed(X10_MOUSE_LEN)
        } else {
            Decoded::Incomplete
        };
    }

    for (i, &byte) in body.iter().enumerate() {
        match byte {
            // parameter and intermediate bytes
            0x20..=0x3f => {}
            0x40..=0x7e => {
                let len = 2 + i + 1;
                return match csi_key(&body[..i], byte) {
                    Some(key) => Decoded::Key(key, len),
                    None => Decoded::Swallowed(len),
                };
            }
            // not part of a CSI sequence: drop what came before it
            _ => return Decoded::Swallowed(2 + i),
        }
    }

    Decoded::Incomplete
}

fn csi_key(params: &[u8], final_byte: u8) -> Option<Key> {
    match final_byte {
        // SGR mouse reports also end in M/m but carry a '<' prefix
        _ if params.first() == Some(&b'<') => None,
        b'A' => Some(Key::Up),
        b'B' => Some(Key::Down),
        b'C' => Some(Key::Right),
        b'D' => Some(Key::Left),
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        b'~' => match params {
            b"1" | b"7" => Some(Key::Home),
            b"2" => Some(Key::Insert),
            b"3" => Some(Key::Delete),
            b"4" | b"8" => Some(Key::End),
            b"5" => Some(Key::PageUp),
            b"6" => Some(Key::PageDown),
            _ => None,
        },
        _ => None,
    }
}

/// `body` is everything after `ESC O`
fn decode_ss3(body: &[u8]) -> Decoded {
    let Some(&byte) = body.first() else {
        return Decoded::Incomplete;
    };

    let key = match byte {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        _ => return Decoded::Swallowed(3),
    };
    Decoded::Key(key, 3)
}

/// Buffers raw input across reads and turns it into keys
#[derive(Debug, Default)]
pub struct InputDecoder {
    pending: Vec<u8>,
}

impl InputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and drain every complete key.
    ///
    /// An incomplete tail stays buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Key> {
        self.pending.extend_from_slice(bytes);

        let mut keys = Vec::new();
        let mut offset = 0;
        loop {
            let rest = &self.pending[offset..];
            match decode(rest) {
                Decoded::Incomplete => {
                    if rest.len() > MAX_SEQUENCE_LEN {
                        debug!("dropping {} bytes of unterminated escape sequence", rest.len());
                        offset = self.pending.len();
                    }
                    break;
                }
                Decoded::Swallowed(len) => offset += len,
                Decoded::Key(key, len) => {
                    keys.push(key);
                    offset += len;
                }
            }
        }

        self.pending.drain(..offset);
        keys
    }

    /// Whether bytes are waiting for a continuation
    pub fn pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Give up waiting for a continuation.
    ///
    /// A lone `ESC` becomes [`Key::Escape`]; a stale partial sequence is
    /// discarded.
    pub fn expire(&mut self) -> Option<Key> {
        if self.pending.is_empty() {
            return None;
        }

        let lone_escape = self.pending == [ESC];
        if !lone_escape {
            debug!("discarding {} bytes of partial escape sequence", self.pending.len());
        }
        self.pending.clear();
        lone_escape.then_some(Key::Escape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(buf: &[u8]) -> (Option<Key>, bool) {
        let decoded = decode(buf);
        (decoded.key(), decoded.is_complete())
    }

    #[test]
    fn test_decode_basic_cases() {
        assert_eq!(tuple(&[]), (None, false));
        assert_eq!(tuple(&[ESC]), (None, false));
        assert_eq!(tuple(&[ESC, b'[']), (None, false));
        assert_eq!(tuple(b"a"), (Some(Key::Byte(b'a')), true));
        assert_eq!(tuple(&[0x03]), (Some(Key::Byte(0x03)), true));
    }

    #[test]
    fn test_decode_x10_mouse() {
        for payload in [[b'x', b'y', b'M'], [0x20, 0x21, 0x21], [0xff, 0x00, 0x7f]] {
            let buf = [ESC, b'[', b'M', payload[0], payload[1], payload[2]];
            assert_eq!(tuple(&buf), (None, true));
            assert_eq!(decode(&buf).consumed(), 6);
        }

        assert_eq!(decode(&[ESC, b'[', b'M', b' ', b'!']), Decoded::Incomplete);
    }

    #[test]
    fn test_decode_special_keys() {
        assert_eq!(decode(b"\x1b[A"), Decoded::Key(Key::Up, 3));
        assert_eq!(decode(b"\x1b[D"), Decoded::Key(Key::Left, 3));
        assert_eq!(decode(b"\x1bOB"), Decoded::Key(Key::Down, 3));
        assert_eq!(decode(b"\x1b[5~"), Decoded::Key(Key::PageUp, 4));
        assert_eq!(decode(b"\x1b[3~"), Decoded::Key(Key::Delete, 4));
        assert_eq!(decode(b"\x1b[1;5C"), Decoded::Key(Key::Right, 6));
    }

    #[test]
    fn test_decode_unmapped_sequences_are_swallowed() {
        assert_eq!(decode(b"\x1b[<0;10;5M"), Decoded::Swallowed(10));
        assert_eq!(decode(b"\x1b[Z"), Decoded::Swallowed(3));
        assert_eq!(decode(b"\x1b[15~"), Decoded::Swallowed(5));
        assert_eq!(decode(b"\x1bOP"), Decoded::Swallowed(3));
    }

    #[test]
    fn test_decode_escape_followed_by_other_byte() {
        assert_eq!(decode(b"\x1bq"), Decoded::Key(Key::Escape, 1));
        assert_eq!(decode(&[ESC, ESC]), Decoded::Key(Key::Escape, 1));
    }

    #[test]
    fn test_decode_broken_csi() {
        // a control byte cannot appear inside CSI; the prefix is dropped
        assert_eq!(decode(&[ESC, b'[', b'1', 0x03]), Decoded::Swallowed(3));
    }

    #[test]
    fn test_feed_multiple_keys() {
        let mut decoder = InputDecoder::new();
        let keys = decoder.feed(b"p\x1b[Aq");
        assert_eq!(keys, vec![Key::Byte(b'p'), Key::Up, Key::Byte(b'q')]);
        assert!(!decoder.pending());
    }

    #[test]
    fn test_feed_fragmented_mouse_report() {
        let mut decoder = InputDecoder::new();
        assert!(decoder.feed(&[ESC]).is_empty());
        assert!(decoder.feed(&[b'[', b'M']).is_empty());
        assert!(decoder.feed(&[0x20]).is_empty());
        assert!(decoder.pending());

        let keys = decoder.feed(&[0x30, 0x31, b'r']);
        assert_eq!(keys, vec![Key::Byte(b'r')]);
        assert!(!decoder.pending());
    }

    #[test]
    fn test_expire_lone_escape() {
        let mut decoder = InputDecoder::new();
        assert!(decoder.feed(&[ESC]).is_empty());
        assert_eq!(decoder.expire(), Some(Key::Escape));
        assert!(!decoder.pending());
        assert_eq!(decoder.expire(), None);
    }

    #[test]
    fn test_expire_discards_partial_sequence() {
        let mut decoder = InputDecoder::new();
        decoder.feed(&[ESC, b'[', b'1']);
        assert_eq!(decoder.expire(), None);
        assert!(!decoder.pending());
    }

    #[test]
    fn test_runaway_sequence_is_dropped() {
        let mut decoder = InputDecoder::new();
        let mut garbage = vec![ESC, b'['];
        garbage.extend(std::iter::repeat(b'1').take(40));

        assert!(decoder.feed(&garbage).is_empty());
        assert!(!decoder.pending());
        assert_eq!(decoder.feed(b"q"), vec![Key::Byte(b'q')]);
    }
}
