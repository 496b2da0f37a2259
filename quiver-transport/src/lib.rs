// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Send-side stream engine for a QUIC endpoint, extended with a
//! partial-reliability (PR) policy layer.
//!
//! The crate models the per-stream sender: it accepts producer writes,
//! chops them into frames that fit packet budgets, observes stream flow
//! control, survives loss through retransmission, and -- when PR is
//! enabled -- may deliberately skip retransmission of selected frames
//! while advancing the peer's reassembly offset with a notification
//! frame.  Packet packing, loss detection, congestion control, and the
//! receive side are external collaborators reached through the traits in
//! [`events`].

use std::fmt::{self, Display};

use static_assertions::const_assert;

pub mod codec;
pub mod events;
pub mod fc;
pub mod frame;
pub mod pool;
pub mod pr;
pub mod send_stream;
pub mod stream_id;

pub use self::{
    events::{CancelSignal, StreamEvents},
    frame::Frame,
    pr::{PrConfig, PrPolicy},
    send_stream::{SendStream, SendStreams, SentFrame, WriteError},
    stream_id::StreamId,
};

/// The largest packet buffer handed to the packet assembler.  Frame data
/// buffers drawn from the pool all have exactly this capacity.
pub const MAX_PACKET_BUFFER_SIZE: usize = 1452;

/// Frames decoded with less data than this use an exact allocation
/// instead of a pooled buffer.
pub const MIN_STREAM_FRAME_BUFFER_SIZE: usize = 128;

/// The largest offset a stream can carry, 2^62 - 1.  This is also the
/// largest value a varint can encode.
pub const MAX_STREAM_OFFSET: u64 = (1 << 62) - 1;

/// Budget reserved when converting a `STREAM` frame into a `PR_STREAM`
/// frame: one byte of PTDA plus a conservative eight bytes for the
/// `ptda_c` varint.
pub const PR_FRAME_OVERHEAD: usize = 1 + 8;

const_assert!(MIN_STREAM_FRAME_BUFFER_SIZE < MAX_PACKET_BUFFER_SIZE);
const_assert!(PR_FRAME_OVERHEAD < MIN_STREAM_FRAME_BUFFER_SIZE);

/// An application error code carried on `RESET_STREAM` and
/// `STOP_SENDING` frames.
pub type AppError = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Ran out of bytes while decoding a frame.
    NoMoreData,
    /// The frame type is not one this crate understands.
    UnknownFrameType(u64),
    /// A stream frame would extend past [`MAX_STREAM_OFFSET`].
    StreamDataOverflow,
    /// A PTDA byte without exactly one policy bit, or with reserved low
    /// bits set.
    InvalidPtda(u8),
    InvalidInput,
    /// No stream with that identifier.
    InvalidStreamId,
    /// `write` after `close`.
    WriteOnClosedStream(StreamId),
    /// `write` after a local cancel or a peer `STOP_SENDING`.
    WriteOnCanceledStream(StreamId, AppError),
    /// `close` after a cancel.
    CloseOnCanceledStream(StreamId),
    /// The cause handed to `close_for_shutdown` when the connection goes
    /// away without a more specific error.
    ConnectionAborted,
    /// The write deadline fired before all bytes were framed.
    DeadlineExceeded,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoMoreData => write!(f, "ran out of data"),
            Self::UnknownFrameType(t) => write!(f, "unknown frame type {t:#x}"),
            Self::StreamDataOverflow => write!(f, "stream data overflows maximum offset"),
            Self::InvalidPtda(b) => write!(f, "invalid PTDA byte {b:#04x}"),
            Self::InvalidInput => write!(f, "invalid input"),
            Self::InvalidStreamId => write!(f, "invalid stream id"),
            Self::WriteOnClosedStream(id) => write!(f, "write on closed stream {id}"),
            Self::WriteOnCanceledStream(id, code) => {
                write!(f, "write on stream {id} canceled with error code {code}")
            }
            Self::CloseOnCanceledStream(id) => write!(f, "close called for canceled stream {id}"),
            Self::ConnectionAborted => write!(f, "connection aborted"),
            Self::DeadlineExceeded => write!(f, "write deadline exceeded"),
        }
    }
}

impl std::error::Error for Error {}

pub type Res<T> = Result<T, Error>;
