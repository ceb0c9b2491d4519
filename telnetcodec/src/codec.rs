//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use super::{CodecError, Outbound, consts};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// Default maximum number of characters kept from one input line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 512;

/// Worst case UTF-8 width, used to bound the raw bytes buffered per line.
const MAX_UTF8_WIDTH: usize = 4;

/// A codec turning a telnet byte stream into text lines and [`Outbound`] items into bytes.
///
/// Decoding strips every telnet command sequence (`IAC <cmd>`, `IAC <verb> <option>` and
/// `IAC SB ... IAC SE`), even when a sequence is split across reads. Completed lines are decoded
/// as lossy UTF-8, trimmed and capped at `max_length` characters. Bytes past the cap are thrown
/// away as they arrive rather than buffered.
///
/// # Example
/// ```
/// use bytes::BytesMut;
/// use mudlark_telnetcodec::LineCodec;
/// use tokio_util::codec::Decoder;
///
/// let mut codec = LineCodec::new();
/// let mut input = BytesMut::from(&b"\xFF\xFD\x01alice\r\n"[..]);
/// assert_eq!(codec.decode(&mut input).unwrap(), Some("alice".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct LineCodec {
    line: BytesMut,
    decoder_state: DecoderState,
    max_length: usize,
    overflowed: bool,
}

impl LineCodec {
    /// Creates a codec with the default line cap of [`DEFAULT_MAX_LINE_LENGTH`].
    pub fn new() -> LineCodec {
        LineCodec::default()
    }

    /// Creates a codec that caps decoded lines at `max_length` characters.
    pub fn with_max_length(max_length: usize) -> LineCodec {
        LineCodec {
            max_length: max_length.max(1),
            ..LineCodec::default()
        }
    }

    /// The configured line cap in characters.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn byte_budget(&self) -> usize {
        self.max_length.saturating_mul(MAX_UTF8_WIDTH)
    }

    fn push_data(&mut self, byte: u8) {
        // Leading whitespace is trimmed anyway and must not use up the budget.
        if self.line.is_empty() && byte.is_ascii_whitespace() {
            return;
        }
        if self.line.len() < self.byte_budget() {
            self.line.put_u8(byte);
        } else if !self.overflowed {
            self.overflowed = true;
            trace!(
                max_length = self.max_length,
                "Input line over limit, discarding excess"
            );
        }
    }

    fn take_line(&mut self) -> String {
        let raw = self.line.split();
        self.overflowed = false;
        let text = String::from_utf8_lossy(&raw);
        let trimmed = text.trim();
        match trimmed.char_indices().nth(self.max_length) {
            Some((cut, _)) => trimmed[..cut].to_string(),
            None => trimmed.to_string(),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        LineCodec {
            line: BytesMut::new(),
            decoder_state: DecoderState::NormalData,
            max_length: DEFAULT_MAX_LINE_LENGTH,
            overflowed: false,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    /// Consumes bytes from `src` until a full line is available.
    ///
    /// Returns `Ok(None)` once `src` is exhausted without reaching a line feed; partial lines and
    /// partial command sequences are kept in the codec for the next call.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            match (self.decoder_state, byte) {
                (DecoderState::NormalData, consts::IAC) => {
                    self.decoder_state = DecoderState::InterpretAsCommand;
                }
                (DecoderState::NormalData, consts::LF) => {
                    return Ok(Some(self.take_line()));
                }
                (DecoderState::NormalData, consts::NUL) => {}
                (DecoderState::NormalData, _) => {
                    self.push_data(byte);
                }
                (DecoderState::InterpretAsCommand, consts::IAC) => {
                    // Escaped 0xFF is data
                    self.decoder_state = DecoderState::NormalData;
                    self.push_data(consts::IAC);
                }
                (DecoderState::InterpretAsCommand, consts::SB) => {
                    self.decoder_state = DecoderState::Subnegotiate;
                }
                (DecoderState::InterpretAsCommand, _) if consts::is_negotiation(byte) => {
                    self.decoder_state = DecoderState::Negotiate(byte);
                }
                (DecoderState::InterpretAsCommand, _) => {
                    self.decoder_state = DecoderState::NormalData;
                    match consts::command_name(byte) {
                        Some(name) => trace!(command = name, "Ignoring telnet command"),
                        None => warn!("Received Unknown Command {:#X}", byte),
                    }
                }
                (DecoderState::Negotiate(verb), _) => {
                    self.decoder_state = DecoderState::NormalData;
                    trace!(
                        verb = consts::command_name(verb).unwrap_or("?"),
                        option = consts::option_name(byte).unwrap_or("?"),
                        code = byte,
                        "Ignoring telnet negotiation"
                    );
                }
                (DecoderState::Subnegotiate, consts::IAC) => {
                    self.decoder_state = DecoderState::SubnegotiateIac;
                }
                (DecoderState::Subnegotiate, _) => {}
                (DecoderState::SubnegotiateIac, consts::SE) => {
                    self.decoder_state = DecoderState::NormalData;
                    trace!("Ignoring telnet subnegotiation");
                }
                (DecoderState::SubnegotiateIac, _) => {
                    self.decoder_state = DecoderState::Subnegotiate;
                }
            }
        }
        Ok(None)
    }

    /// Flushes a final unterminated line when the peer closes the stream.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.decoder_state = DecoderState::NormalData;
        if self.line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.take_line()))
        }
    }
}

impl Encoder<Outbound> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Line(text) => {
                put_normalized(&text, dst);
                if !text.ends_with('\n') {
                    dst.put_slice(&[consts::CR, consts::LF]);
                }
            }
            Outbound::Prompt(text) => put_normalized(&text, dst),
            Outbound::Raw(bytes) => {
                dst.reserve(bytes.len());
                dst.put_slice(&bytes);
            }
        }
        Ok(())
    }
}

/// Writes `text` with every line ending, bare or not, rewritten to CR LF.
fn put_normalized(text: &str, dst: &mut BytesMut) {
    dst.reserve(text.len() + 2);
    let mut bytes = text.as_bytes().iter().peekable();
    while let Some(&byte) = bytes.next() {
        match byte {
            consts::CR if bytes.peek() == Some(&&consts::LF) => {}
            consts::LF => dst.put_slice(&[consts::CR, consts::LF]),
            _ => dst.put_u8(byte),
        }
    }
}

/// Decoder position within the telnet byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecoderState {
    /// Normal Data
    NormalData,
    /// Received IAC, Next byte is Command
    InterpretAsCommand,
    /// Received a negotiation verb, Next byte is the option
    Negotiate(u8),
    /// Inside IAC SB, discarding until IAC SE
    Subnegotiate,
    /// Received IAC during Subnegotiation, Next byte is command
    SubnegotiateIac,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn collect_all(codec: &mut LineCodec, bytes: &[u8]) -> Vec<String> {
        let mut src = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(line) = codec.decode(&mut src).expect("decode should not error") {
            out.push(line);
        }
        out
    }

    fn encode(item: Outbound) -> BytesMut {
        let mut codec = LineCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(item, &mut dst).expect("encode ok");
        dst
    }

    // ============================================================================
    // Decoding
    // ============================================================================

    #[test]
    fn decode_crlf_and_lf_lines() {
        let mut codec = LineCodec::new();
        let lines = collect_all(&mut codec, b"hello\r\nworld\n");
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn decode_partial_line_waits_for_terminator() {
        let mut codec = LineCodec::new();
        assert!(collect_all(&mut codec, b"hel").is_empty());
        assert_eq!(collect_all(&mut codec, b"lo\r\n"), vec!["hello"]);
    }

    #[test]
    fn decode_trims_surrounding_whitespace() {
        let mut codec = LineCodec::new();
        assert_eq!(collect_all(&mut codec, b"   alice \t\r\n"), vec!["alice"]);
    }

    #[test]
    fn decode_blank_line_is_empty_string() {
        let mut codec = LineCodec::new();
        assert_eq!(collect_all(&mut codec, b"\r\n  \r\n"), vec!["", ""]);
    }

    #[test]
    fn decode_strips_leading_negotiation() {
        let mut codec = LineCodec::new();
        let input = [
            consts::IAC,
            consts::DO,
            consts::option::ECHO,
            b'h',
            b'i',
            consts::CR,
            consts::LF,
        ];
        assert_eq!(collect_all(&mut codec, &input), vec!["hi"]);
    }

    #[test]
    fn decode_strips_two_byte_commands() {
        let mut codec = LineCodec::new();
        let input = [consts::IAC, consts::NOP, b'o', consts::IAC, consts::AYT, b'k', consts::LF];
        assert_eq!(collect_all(&mut codec, &input), vec!["ok"]);
    }

    #[test]
    fn decode_strips_subnegotiation() {
        let mut codec = LineCodec::new();
        let input = [
            b'a',
            consts::IAC,
            consts::SB,
            consts::option::NAWS,
            0,
            80,
            0,
            24,
            consts::IAC,
            consts::SE,
            b'b',
            consts::LF,
        ];
        assert_eq!(collect_all(&mut codec, &input), vec!["ab"]);
    }

    #[test]
    fn decode_subnegotiation_body_may_contain_line_feeds() {
        let mut codec = LineCodec::new();
        let input = [
            consts::IAC,
            consts::SB,
            consts::option::GMCP,
            b'x',
            consts::LF,
            consts::IAC,
            consts::IAC,
            consts::IAC,
            consts::SE,
            b'y',
            consts::LF,
        ];
        assert_eq!(collect_all(&mut codec, &input), vec!["y"]);
    }

    #[test]
    fn decode_negotiation_split_across_reads() {
        let mut codec = LineCodec::new();
        assert!(collect_all(&mut codec, &[b'a', consts::IAC]).is_empty());
        assert!(collect_all(&mut codec, &[consts::WILL]).is_empty());
        assert_eq!(
            collect_all(&mut codec, &[consts::option::NAWS, b'b', consts::LF]),
            vec!["ab"]
        );
    }

    #[test]
    fn decode_escaped_iac_is_not_a_command() {
        let mut codec = LineCodec::new();
        let input = [b'a', consts::IAC, consts::IAC, b'b', consts::LF];
        let lines = collect_all(&mut codec, &input);
        assert_eq!(lines, vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn decode_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new();
        let lines = collect_all(&mut codec, &[b'o', 0xC3, b'k', consts::LF]);
        assert_eq!(lines, vec!["o\u{FFFD}k"]);
    }

    #[test]
    fn decode_utf8_text() {
        let mut codec = LineCodec::new();
        let lines = collect_all(&mut codec, "s\u{00E9}an\r\n".as_bytes());
        assert_eq!(lines, vec!["s\u{00E9}an"]);
    }

    #[test]
    fn decode_truncates_to_max_length() {
        let mut codec = LineCodec::with_max_length(8);
        let lines = collect_all(&mut codec, b"abcdefghijklmnop\r\nnext\r\n");
        assert_eq!(lines, vec!["abcdefgh", "next"]);
    }

    #[test]
    fn decode_discards_excess_bytes() {
        let mut codec = LineCodec::with_max_length(4);
        let mut src = BytesMut::from(&[b'x'; 1000][..]);
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(codec.line.len(), 16);
        assert!(src.is_empty());
    }

    #[test]
    fn decode_truncates_multibyte_on_char_boundary() {
        let mut codec = LineCodec::with_max_length(3);
        let lines = collect_all(&mut codec, "\u{00E9}\u{00E9}\u{00E9}\u{00E9}\n".as_bytes());
        assert_eq!(lines, vec!["\u{00E9}\u{00E9}\u{00E9}"]);
    }

    #[test]
    fn decode_eof_flushes_unterminated_line() {
        let mut codec = LineCodec::new();
        let mut src = BytesMut::from(&b"bye"[..]);
        assert_eq!(codec.decode_eof(&mut src).unwrap(), Some("bye".to_string()));
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
    }

    #[test]
    fn decode_eof_with_nothing_buffered_is_end_of_stream() {
        let mut codec = LineCodec::new();
        let mut src = BytesMut::new();
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
    }

    #[test]
    fn decode_eof_drops_dangling_command() {
        let mut codec = LineCodec::new();
        let mut src = BytesMut::from(&[consts::IAC, consts::DO][..]);
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
        assert_eq!(codec.decoder_state, DecoderState::NormalData);
    }

    // ============================================================================
    // Encoding
    // ============================================================================

    #[test]
    fn encode_line_appends_crlf() {
        assert_eq!(&encode(Outbound::line("hello"))[..], b"hello\r\n");
    }

    #[test]
    fn encode_line_normalizes_newlines() {
        assert_eq!(
            &encode(Outbound::line("one\ntwo\r\nthree\n"))[..],
            b"one\r\ntwo\r\nthree\r\n"
        );
    }

    #[test]
    fn encode_prompt_has_no_terminator() {
        assert_eq!(&encode(Outbound::prompt("Name: "))[..], b"Name: ");
    }

    #[test]
    fn encode_raw_is_verbatim() {
        let raw = Bytes::from_static(&[consts::IAC, consts::WILL, consts::option::ECHO]);
        assert_eq!(&encode(Outbound::Raw(raw.clone()))[..], &raw[..]);
    }

    #[test]
    fn encode_password_mode() {
        assert_eq!(
            &encode(Outbound::password_mode(true))[..],
            &[consts::IAC, consts::WILL, consts::option::ECHO]
        );
        assert_eq!(
            &encode(Outbound::password_mode(false))[..],
            &[consts::IAC, consts::WONT, consts::option::ECHO]
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn decode_unknown_command_is_logged_and_dropped() {
        let mut codec = LineCodec::new();
        assert_eq!(collect_all(&mut codec, b"a\xFF\x01b\n"), vec!["ab"]);
        assert!(logs_contain("Received Unknown Command"));
    }
}
