//! ASCII line codec.
//!
//! Every hop speaks the same LF-terminated line protocol: a data record is
//! six comma-separated floats formatted to two decimals
//! (`alpha,beta,gamma,ax,ay,az`), a liveness probe is the literal `ping`,
//! and replies are single keywords. Anything else is a parse failure and is
//! silently dropped by whoever received it.

use crate::sample::Sample;

/// Liveness probe keyword (exact match after trimming CR/whitespace).
pub const PING: &str = "ping";

/// Longest accepted line, terminator excluded. Matches the relay rx buffer
/// of the original bridge firmware; overlong lines are discarded whole.
pub const MAX_LINE_LEN: usize = 128;

/// Reply keywords written back over the upstream link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Pong,
    Ack,
    ErrNoCanInit,
    ErrCanSend,
    Heartbeat,
    /// One-time notice emitted right after a vendor-bulk (WebUSB-style)
    /// link connects.
    WebUsbConnected,
}

impl Reply {
    /// The LF-terminated wire form.
    pub fn as_line(self) -> &'static str {
        match self {
            Reply::Pong => "PONG\n",
            Reply::Ack => "ACK\n",
            Reply::ErrNoCanInit => "ERR:NO_CAN_INIT\n",
            Reply::ErrCanSend => "ERR:CAN_SEND\n",
            Reply::Heartbeat => "HEARTBEAT\n",
            Reply::WebUsbConnected => "WEBUSB_CONNECTED_CALLBACK\n",
        }
    }
}

/// A successfully decoded inbound line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineFrame {
    /// Six-field numeric record in wire order.
    Data([f32; 6]),
    /// Liveness probe.
    Ping,
}

/// Decode one line (without its terminator).
///
/// Returns `None` for anything that is neither a `ping` nor exactly six
/// numeric tokens; callers drop such lines without replying.
pub fn decode_line(line: &str) -> Option<LineFrame> {
    let line = line.trim();
    if line == PING {
        return Some(LineFrame::Ping);
    }

    let mut fields = [0.0f32; 6];
    let mut count = 0;
    for token in line.split(',') {
        if count == 6 {
            return None;
        }
        fields[count] = token.trim().parse::<f32>().ok()?;
        count += 1;
    }
    if count != 6 {
        return None;
    }
    Some(LineFrame::Data(fields))
}

/// Format six floats as one LF-terminated record.
pub fn encode_fields(fields: &[f32; 6]) -> String {
    format!(
        "{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}\n",
        fields[0], fields[1], fields[2], fields[3], fields[4], fields[5]
    )
}

/// Format a sample record; unset sub-fields encode as `0.00`.
pub fn encode_sample(sample: &Sample) -> String {
    encode_fields(&sample.wire_fields())
}

/// One completed line as assembled from a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLine {
    /// Line content, CR and LF stripped.
    pub text: String,
    /// Every byte of the line exactly as received, terminator included.
    /// The relay forwards this verbatim on the echo path.
    pub raw: Vec<u8>,
}

/// Incremental line assembler over a polled byte stream.
///
/// Strips CR, completes on LF, and keeps the raw bytes alongside the
/// cleaned text. A line growing past [`MAX_LINE_LEN`] is discarded at its
/// terminator without desynchronizing the next line.
#[derive(Debug, Default)]
pub struct LineAssembler {
    line: Vec<u8>,
    raw: Vec<u8>,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns the completed line on LF.
    pub fn push(&mut self, byte: u8) -> Option<CompletedLine> {
        if byte == b'\n' {
            self.raw.push(byte);
            let done = if self.overflowed {
                None
            } else {
                Some(CompletedLine {
                    text: String::from_utf8_lossy(&self.line).into_owned(),
                    raw: std::mem::take(&mut self.raw),
                })
            };
            self.line.clear();
            self.raw.clear();
            self.overflowed = false;
            return done;
        }

        self.raw.push(byte);
        if byte == b'\r' {
            return None;
        }
        if self.line.len() == MAX_LINE_LEN {
            self.overflowed = true;
        } else {
            self.line.push(byte);
        }
        None
    }
}
