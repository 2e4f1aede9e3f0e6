//! Frame decoding for the controller's `<...>`-delimited ASCII protocol.
//!
//! Frames carry colon-separated tokens: two tokens for log lines and device
//! commands (`<LOG:text>`, `<STOP:OK>`), four for coordinate points
//! (`<DOWN:x:y:z>`). Everything outside the delimiters is line noise from
//! the transport and is discarded.
//!
//! [`FrameDecoder::push_byte`] is the canonical, chunking-invariant decoder.
//! [`FrameDecoder::decode_bulk`] handles firmware revisions that write one
//! already-bounded frame per transfer.

use embedded_io_async::{Error as IoError, Read, Write};
use heapless::{String, Vec};

use crate::config::{FRAME_BODY_MAX, NAME_MAX, READ_CHUNK, TEXT_MAX};
use crate::error::{ChannelError, DecodeError, ReadError};

const FRAME_OPEN: u8 = b'<';
const FRAME_CLOSE: u8 = b'>';
const TOKEN_SEPARATOR: char = ':';
const LOG_TAG: &str = "LOG";
const STOP_COMMAND: &str = "STOP";

/// First token of a frame: a device command or point name.
pub type Name = String<NAME_MAX>;
/// Log text or command argument.
pub type Text = String<TEXT_MAX>;

/// One coordinate/resistance triple exactly as the controller reported it.
/// Untrusted input; nothing here is bounds-checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A decoded frame. Produced only by [`FrameDecoder`]; consumed once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// `<LOG:text>` diagnostic line from the device.
    Log { text: Text },
    /// Any other two-token frame; the argument is passed through opaquely.
    Command { name: Name, arg: Text },
    /// `<name:x:y:z>` coordinate point (`CAL`, `DOWN`, `UP`, ...).
    Point { name: Name, sample: RawSample },
}

impl Message {
    /// True for the device-initiated `STOP` command (finger lifted during
    /// pressure acquisition).
    pub fn is_stop(&self) -> bool {
        matches!(self, Message::Command { name, .. } if name.as_str() == STOP_COMMAND)
    }
}

/// Commands the host writes to the controller, framed as `<NAME>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostCommand {
    Start,
    Stop,
    CalPoint,
    CalPressure,
    CalPressureEnd,
}

impl HostCommand {
    pub fn as_frame(self) -> &'static [u8] {
        match self {
            HostCommand::Start => b"<START>",
            HostCommand::Stop => b"<STOP>",
            HostCommand::CalPoint => b"<CAL_POINT>",
            HostCommand::CalPressure => b"<CAL_PRESSURE>",
            HostCommand::CalPressureEnd => b"<CAL_PRESSURE_END>",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    /// Discarding bytes until the next `<`.
    Noise,
    /// Accumulating a frame body until `>`.
    Body,
}

/// Incremental frame scanner. Feed it bytes in whatever chunks the transport
/// delivers; frame boundaries never depend on read boundaries.
#[derive(Debug)]
pub struct FrameDecoder {
    state: ScanState,
    body: Vec<u8, FRAME_BODY_MAX>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            state: ScanState::Noise,
            body: Vec::new(),
        }
    }

    /// Advances the scanner by one byte. Returns a message when this byte
    /// closed a frame, or a [`DecodeError`] when it closed a malformed one.
    /// After an error the scanner is already resynchronized and will pick up
    /// at the next `<`.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Message>, DecodeError> {
        match self.state {
            ScanState::Noise => {
                if byte == FRAME_OPEN {
                    self.state = ScanState::Body;
                    self.body.clear();
                }
                Ok(None)
            }
            ScanState::Body => {
                if byte == FRAME_CLOSE {
                    self.state = ScanState::Noise;
                    let result = parse_body(&self.body);
                    self.body.clear();
                    result.map(Some)
                } else if byte == FRAME_OPEN {
                    // The previous frame was truncated; start over from this
                    // delimiter.
                    self.body.clear();
                    Ok(None)
                } else if self.body.push(byte).is_err() {
                    self.state = ScanState::Noise;
                    self.body.clear();
                    Err(DecodeError::Oversize)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Decodes one transfer that is already bounded by the delimiters,
    /// stripping exactly one leading `<` and one trailing `>`. Alternative
    /// entry point for firmware that writes whole frames per transfer; the
    /// incremental scanner is the canonical path.
    pub fn decode_bulk(frame: &[u8]) -> Result<Message, DecodeError> {
        if frame.len() < 2 || frame[0] != FRAME_OPEN || frame[frame.len() - 1] != FRAME_CLOSE {
            return Err(DecodeError::Unframed);
        }
        parse_body(&frame[1..frame.len() - 1])
    }
}

fn parse_body(body: &[u8]) -> Result<Message, DecodeError> {
    let text = core::str::from_utf8(body).map_err(|_| DecodeError::NotText)?;

    // One extra slot so a five-token body is seen (and rejected) rather than
    // silently truncated.
    let mut tokens: Vec<&str, 5> = Vec::new();
    for token in text.split(TOKEN_SEPARATOR) {
        if tokens.push(token).is_err() {
            return Err(DecodeError::TokenCount);
        }
    }

    match tokens.len() {
        2 => {
            if tokens[0] == LOG_TAG {
                Ok(Message::Log {
                    text: copy_token(tokens[1])?,
                })
            } else {
                Ok(Message::Command {
                    name: copy_token(tokens[0])?,
                    arg: copy_token(tokens[1])?,
                })
            }
        }
        4 => Ok(Message::Point {
            name: copy_token(tokens[0])?,
            sample: RawSample {
                x: parse_int(tokens[1])?,
                y: parse_int(tokens[2])?,
                z: parse_int(tokens[3])?,
            },
        }),
        _ => Err(DecodeError::TokenCount),
    }
}

fn parse_int(token: &str) -> Result<i32, DecodeError> {
    token.parse().map_err(|_| DecodeError::BadInteger)
}

fn copy_token<const N: usize>(token: &str) -> Result<String<N>, DecodeError> {
    String::try_from(token).map_err(|_| DecodeError::Oversize)
}

/// Owns the byte channel and turns it into a message stream. The session and
/// the event loop both read through this, so device ordering is preserved.
pub struct FrameReader<R> {
    channel: R,
    decoder: FrameDecoder,
    chunk: [u8; READ_CHUNK],
    chunk_len: usize,
    chunk_pos: usize,
}

impl<R> FrameReader<R> {
    pub fn new(channel: R) -> Self {
        Self {
            channel,
            decoder: FrameDecoder::new(),
            chunk: [0; READ_CHUNK],
            chunk_len: 0,
            chunk_pos: 0,
        }
    }

    /// Hands the channel back, dropping any partially decoded frame.
    pub fn release(self) -> R {
        self.channel
    }
}

impl<R: Read> FrameReader<R> {
    /// Returns the next decoded message. Decode errors cover one frame and
    /// leave the reader usable; channel errors (including a zero-length
    /// read) are fatal.
    pub async fn next_message(&mut self) -> Result<Message, ReadError> {
        loop {
            while self.chunk_pos < self.chunk_len {
                let byte = self.chunk[self.chunk_pos];
                self.chunk_pos += 1;
                match self.decoder.push_byte(byte) {
                    Ok(Some(message)) => return Ok(message),
                    Ok(None) => {}
                    Err(e) => return Err(ReadError::Decode(e)),
                }
            }

            let len = self
                .channel
                .read(&mut self.chunk)
                .await
                .map_err(|e| ReadError::Channel(ChannelError::Io(e.kind())))?;
            if len == 0 {
                return Err(ReadError::Channel(ChannelError::Disconnected));
            }
            self.chunk_len = len;
            self.chunk_pos = 0;
        }
    }
}

impl<R: Read + Write> FrameReader<R> {
    /// Writes one host command frame to the device.
    pub async fn send(&mut self, command: HostCommand) -> Result<(), ChannelError> {
        self.channel
            .write_all(command.as_frame())
            .await
            .map_err(|e| ChannelError::Io(e.kind()))?;
        self.channel
            .flush()
            .await
            .map_err(|e| ChannelError::Io(e.kind()))
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::testutil::ScriptedPort;

    fn name(s: &str) -> Name {
        Name::try_from(s).unwrap()
    }

    fn text(s: &str) -> Text {
        Text::try_from(s).unwrap()
    }

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> std::vec::Vec<Message> {
        let mut out = std::vec::Vec::new();
        for &byte in bytes {
            if let Ok(Some(message)) = decoder.push_byte(byte) {
                out.push(message);
            }
        }
        out
    }

    #[test]
    fn decodes_log_frame() {
        let mut decoder = FrameDecoder::new();
        let messages = decode_all(&mut decoder, b"<LOG:Device not calibrated>");
        assert_eq!(
            messages,
            std::vec![Message::Log {
                text: text("Device not calibrated")
            }]
        );
    }

    #[test]
    fn decodes_command_frame_with_opaque_argument() {
        let mut decoder = FrameDecoder::new();
        let messages = decode_all(&mut decoder, b"<STOP:OK>");
        assert_eq!(
            messages,
            std::vec![Message::Command {
                name: name("STOP"),
                arg: text("OK")
            }]
        );
        assert!(messages[0].is_stop());
    }

    #[test]
    fn decodes_point_frame() {
        let mut decoder = FrameDecoder::new();
        let messages = decode_all(&mut decoder, b"<DOWN:512:-3:1020>");
        assert_eq!(
            messages,
            std::vec![Message::Point {
                name: name("DOWN"),
                sample: RawSample {
                    x: 512,
                    y: -3,
                    z: 1020
                }
            }]
        );
    }

    #[test]
    fn discards_noise_before_frame() {
        let mut decoder = FrameDecoder::new();
        let messages = decode_all(&mut decoder, b"\x00\xffgarbage>:<UP:0:0:0>");
        assert_eq!(
            messages,
            std::vec![Message::Point {
                name: name("UP"),
                sample: RawSample::default()
            }]
        );
    }

    #[test]
    fn rejects_bad_token_counts() {
        let mut decoder = FrameDecoder::new();
        for &byte in b"<A:1:2" {
            assert_eq!(decoder.push_byte(byte), Ok(None));
        }
        assert_eq!(decoder.push_byte(b'>'), Err(DecodeError::TokenCount));

        // The scanner must resynchronize on the next frame.
        let messages = decode_all(&mut decoder, b"<LOG:ok>");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn rejects_malformed_integer_in_point_frame() {
        let mut decoder = FrameDecoder::new();
        for &byte in b"<DOWN:12a:5:9" {
            assert_eq!(decoder.push_byte(byte), Ok(None));
        }
        assert_eq!(decoder.push_byte(b'>'), Err(DecodeError::BadInteger));
    }

    #[test]
    fn truncated_frame_restarts_at_next_delimiter() {
        let mut decoder = FrameDecoder::new();
        let messages = decode_all(&mut decoder, b"<DOWN:1:2<LOG:restarted>");
        assert_eq!(
            messages,
            std::vec![Message::Log {
                text: text("restarted")
            }]
        );
    }

    #[test]
    fn oversize_body_is_an_error_then_resyncs() {
        let mut decoder = FrameDecoder::new();
        let mut saw_oversize = false;
        for _ in 0..(FRAME_BODY_MAX + 8) {
            match decoder.push_byte(b'x') {
                Ok(None) => {}
                Err(DecodeError::Oversize) => saw_oversize = true,
                other => panic!("unexpected result: {:?}", other),
            }
        }
        // Never entered a frame, so padding alone is fine.
        assert!(!saw_oversize);

        assert_eq!(decoder.push_byte(b'<'), Ok(None));
        for i in 0..(FRAME_BODY_MAX + 8) {
            match decoder.push_byte(b'x') {
                Ok(None) => assert!(i < FRAME_BODY_MAX),
                Err(DecodeError::Oversize) => {
                    saw_oversize = true;
                    break;
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert!(saw_oversize);

        let messages = decode_all(&mut decoder, b"<LOG:ok>");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn bulk_decode_strips_exactly_one_delimiter_pair() {
        let message = FrameDecoder::decode_bulk(b"<CAL:900:500:300>").unwrap();
        assert_eq!(
            message,
            Message::Point {
                name: name("CAL"),
                sample: RawSample {
                    x: 900,
                    y: 500,
                    z: 300
                }
            }
        );

        assert_eq!(
            FrameDecoder::decode_bulk(b"CAL:1:2:3>"),
            Err(DecodeError::Unframed)
        );
        assert_eq!(FrameDecoder::decode_bulk(b"<>"), Err(DecodeError::TokenCount));
    }

    #[test]
    fn reader_is_chunking_invariant() {
        let input = b"junk<LOG:hello><DOWN:10:20:30>tail<UP:0:0:0>";
        let mut per_chunk_size = std::vec::Vec::new();

        for chunk in [1usize, 3, 7, 64] {
            let port = ScriptedPort::new(input.to_vec(), chunk);
            let mut reader = FrameReader::new(port);
            let mut messages = std::vec::Vec::new();
            block_on(async {
                loop {
                    match reader.next_message().await {
                        Ok(message) => messages.push(message),
                        Err(ReadError::Channel(ChannelError::Disconnected)) => break,
                        Err(e) => panic!("unexpected error: {:?}", e),
                    }
                }
            });
            per_chunk_size.push(messages);
        }

        assert_eq!(per_chunk_size[0].len(), 3);
        for messages in &per_chunk_size[1..] {
            assert_eq!(messages, &per_chunk_size[0]);
        }
    }

    #[test]
    fn reader_surfaces_decode_error_and_recovers() {
        let port = ScriptedPort::new(b"<DOWN:x:0:0><UP:0:0:0>".to_vec(), 64);
        let mut reader = FrameReader::new(port);
        block_on(async {
            assert_eq!(
                reader.next_message().await,
                Err(ReadError::Decode(DecodeError::BadInteger))
            );
            assert_eq!(
                reader.next_message().await,
                Ok(Message::Point {
                    name: name("UP"),
                    sample: RawSample::default()
                })
            );
        });
    }

    #[test]
    fn reader_reports_disconnect_as_channel_error() {
        let port = ScriptedPort::new(b"<LOG:bye".to_vec(), 64);
        let mut reader = FrameReader::new(port);
        block_on(async {
            assert_eq!(
                reader.next_message().await,
                Err(ReadError::Channel(ChannelError::Disconnected))
            );
        });
    }

    #[test]
    fn send_writes_framed_commands() {
        let port = ScriptedPort::new(std::vec::Vec::new(), 64);
        let mut reader = FrameReader::new(port);
        block_on(async {
            reader.send(HostCommand::CalPoint).await.unwrap();
            reader.send(HostCommand::Stop).await.unwrap();
        });
        let port = reader.release();
        assert_eq!(port.written, b"<CAL_POINT><STOP>");
    }
}
