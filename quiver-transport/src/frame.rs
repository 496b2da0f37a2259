// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Wire format of the frames the send-side stream engine produces and
// consumes.

use std::time::Instant;

use static_assertions::const_assert;

use crate::{
    codec::{Decoder, Encoder},
    pool,
    pr::PrPolicy,
    stream_id::StreamId,
    AppError, Error, Res, MAX_STREAM_OFFSET, MIN_STREAM_FRAME_BUFFER_SIZE,
};

pub const FRAME_TYPE_RESET_STREAM: u8 = 0x04;
pub const FRAME_TYPE_STOP_SENDING: u8 = 0x05;
pub const FRAME_TYPE_STREAM_BASE: u8 = 0x08;
pub const FRAME_TYPE_STREAM_DATA_BLOCKED: u8 = 0x15;
pub const FRAME_TYPE_PR_STREAM_BASE: u8 = 0x48;
pub const FRAME_TYPE_PR_ACK_NOTIFY: u8 = 0x50;
pub const FRAME_TYPE_PR_DATAGRAM_BASE: u8 = 0x52;

/// Low bits of the `STREAM` and `PR_STREAM` type bytes.
const STREAM_FLAG_FIN: u8 = 0x01;
const STREAM_FLAG_LEN: u8 = 0x02;
const STREAM_FLAG_OFF: u8 = 0x04;

const_assert!(FRAME_TYPE_STREAM_BASE & 0x07 == 0);
const_assert!(FRAME_TYPE_PR_STREAM_BASE & 0x07 == 0);

fn need<T>(v: Option<T>) -> Res<T> {
    v.ok_or(Error::NoMoreData)
}

/// Type byte, stream id, and optional offset for a (PR_)STREAM frame
/// header; the length varint is provisionally counted as one byte and
/// corrected by [`max_data_len_for`].
fn stream_header_len(stream_id: StreamId, offset: u64, data_len_present: bool) -> usize {
    let mut len = 1 + Encoder::varint_len(stream_id.as_u64());
    if offset > 0 {
        len += Encoder::varint_len(offset);
    }
    if data_len_present {
        len += 1;
    }
    len
}

fn max_data_len_for(header_len: usize, data_len_present: bool, budget: usize) -> usize {
    if header_len > budget {
        return 0;
    }
    let mut max_data_len = budget - header_len;
    if data_len_present && Encoder::varint_len(max_data_len as u64) != 1 {
        // The provisional one-byte length varint needs another byte.
        max_data_len -= 1;
    }
    max_data_len
}

/// Take ownership of decoded frame data.  Small frames get an exact
/// allocation; anything else draws a pooled buffer.
fn alloc_data(data: &[u8]) -> (Vec<u8>, bool) {
    if data.len() < MIN_STREAM_FRAME_BUFFER_SIZE {
        (data.to_vec(), false)
    } else {
        let mut buf = pool::take();
        buf.extend_from_slice(data);
        (buf, true)
    }
}

/// A contiguous slice of one stream's byte sequence.
#[derive(Debug)]
pub struct StreamFrame {
    pub stream_id: StreamId,
    pub offset: u64,
    pub fin: bool,
    pub data_len_present: bool,
    data: Vec<u8>,
    from_pool: bool,
    /// How many times this frame has been declared lost.  Not on the
    /// wire; consulted by the times-based PR policy.
    pub(crate) lost_count: u64,
    /// When this frame was first handed to the assembler.  Not on the
    /// wire; consulted by the deadline-based PR policy.
    pub(crate) first_sent: Option<Instant>,
}

impl StreamFrame {
    /// A frame at `offset` with an empty pooled data buffer.
    #[must_use]
    pub fn new(stream_id: StreamId, offset: u64) -> Self {
        Self {
            stream_id,
            offset,
            fin: false,
            data_len_present: true,
            data: pool::take(),
            from_pool: true,
            lost_count: 0,
            first_sent: None,
        }
    }

    /// A frame over a copy of `data`, allocated exactly.
    #[must_use]
    pub fn with_data(stream_id: StreamId, offset: u64, fin: bool, data: &[u8]) -> Self {
        Self {
            stream_id,
            offset,
            fin,
            data_len_present: true,
            data: data.to_vec(),
            from_pool: false,
            lost_count: 0,
            first_sent: None,
        }
    }

    /// A data-less frame carrying only FIN.
    #[must_use]
    pub fn fin_only(stream_id: StreamId, offset: u64) -> Self {
        Self {
            stream_id,
            offset,
            fin: true,
            data_len_present: true,
            data: Vec::new(),
            from_pool: false,
            lost_count: 0,
            first_sent: None,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn extend_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub(crate) fn truncate_data(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Return the data buffer to the pool.
    pub fn put_back(self) {
        let mut f = self;
        if f.from_pool {
            f.from_pool = false;
            pool::put_back(std::mem::take(&mut f.data));
        }
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = 1 + Encoder::varint_len(self.stream_id.as_u64());
        if self.offset > 0 {
            len += Encoder::varint_len(self.offset);
        }
        if self.data_len_present {
            len += Encoder::varint_len(self.data.len() as u64);
        }
        len + self.data.len()
    }

    /// The most data a frame of this shape can carry within `budget`
    /// bytes, or 0 when the header alone does not fit.
    #[must_use]
    pub fn max_data_len(&self, budget: usize) -> usize {
        let header_len = stream_header_len(self.stream_id, self.offset, self.data_len_present);
        max_data_len_for(header_len, self.data_len_present, budget)
    }

    /// Split so that the returned head fits within `budget`, leaving
    /// `self` as the tail at `offset + head_len`.  Returns
    /// `(None, false)` when no split is needed and `(None, true)` when
    /// the budget cannot fit even a one-byte frame.
    pub fn maybe_split(&mut self, budget: usize) -> (Option<Self>, bool) {
        if budget >= self.encoded_len() {
            return (None, false);
        }
        let head_len = self.max_data_len(budget);
        if head_len == 0 {
            return (None, true);
        }

        let head_data = std::mem::replace(&mut self.data, pool::take());
        let head_from_pool = std::mem::replace(&mut self.from_pool, true);
        self.data.extend_from_slice(&head_data[head_len..]);
        let mut head = Self {
            stream_id: self.stream_id,
            offset: self.offset,
            fin: false,
            data_len_present: self.data_len_present,
            data: head_data,
            from_pool: head_from_pool,
            lost_count: self.lost_count,
            first_sent: self.first_sent,
        };
        head.data.truncate(head_len);
        self.offset += head_len as u64;
        (Some(head), true)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        let mut t = FRAME_TYPE_STREAM_BASE;
        if self.fin {
            t |= STREAM_FLAG_FIN;
        }
        if self.data_len_present {
            t |= STREAM_FLAG_LEN;
        }
        if self.offset > 0 {
            t |= STREAM_FLAG_OFF;
        }
        enc.encode_byte(t);
        enc.encode_varint(self.stream_id.as_u64());
        if self.offset > 0 {
            enc.encode_varint(self.offset);
        }
        if self.data_len_present {
            enc.encode_vvec(&self.data);
        } else {
            enc.encode(&self.data);
        }
    }

    pub fn decode(dec: &mut Decoder, type_byte: u8) -> Res<Self> {
        let fin = type_byte & STREAM_FLAG_FIN != 0;
        let data_len_present = type_byte & STREAM_FLAG_LEN != 0;
        let has_offset = type_byte & STREAM_FLAG_OFF != 0;

        let stream_id = StreamId::new(need(dec.decode_varint())?);
        let offset = if has_offset {
            need(dec.decode_varint())?
        } else {
            0
        };
        let data = if data_len_present {
            need(dec.decode_vvec())?
        } else {
            dec.decode_remainder()
        };
        if offset + data.len() as u64 > MAX_STREAM_OFFSET {
            return Err(Error::StreamDataOverflow);
        }

        let (data, from_pool) = alloc_data(data);
        Ok(Self {
            stream_id,
            offset,
            fin,
            data_len_present,
            data,
            from_pool,
            lost_count: 0,
            first_sent: None,
        })
    }
}

impl PartialEq for StreamFrame {
    fn eq(&self, other: &Self) -> bool {
        // Loss bookkeeping and buffer provenance are not part of the
        // frame's identity.
        self.stream_id == other.stream_id
            && self.offset == other.offset
            && self.fin == other.fin
            && self.data_len_present == other.data_len_present
            && self.data == other.data
    }
}
impl Eq for StreamFrame {}

/// A `STREAM` frame carrying partial-reliability policy fields.
#[derive(Debug)]
pub struct PrStreamFrame {
    pub stream_id: StreamId,
    pub offset: u64,
    pub fin: bool,
    pub data_len_present: bool,
    pub ptda: PrPolicy,
    pub ptda_c: u64,
    data: Vec<u8>,
    from_pool: bool,
    pub(crate) lost_count: u64,
    pub(crate) first_sent: Option<Instant>,
}

impl PrStreamFrame {
    /// Stamp PR policy fields onto a plain `STREAM` frame.
    #[must_use]
    pub fn wrap(f: StreamFrame, ptda: PrPolicy, ptda_c: u64) -> Self {
        let mut f = f;
        let data = std::mem::take(&mut f.data);
        let from_pool = std::mem::replace(&mut f.from_pool, false);
        Self {
            stream_id: f.stream_id,
            offset: f.offset,
            fin: f.fin,
            data_len_present: f.data_len_present,
            ptda,
            ptda_c,
            data,
            from_pool,
            lost_count: f.lost_count,
            first_sent: f.first_sent,
        }
    }

    /// Demote to a plain `STREAM` frame, keeping data and bookkeeping.
    #[must_use]
    pub fn into_stream(self) -> StreamFrame {
        let mut f = self;
        let data = std::mem::take(&mut f.data);
        let from_pool = std::mem::replace(&mut f.from_pool, false);
        StreamFrame {
            stream_id: f.stream_id,
            offset: f.offset,
            fin: f.fin,
            data_len_present: f.data_len_present,
            data,
            from_pool,
            lost_count: f.lost_count,
            first_sent: f.first_sent,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn put_back(self) {
        let mut f = self;
        if f.from_pool {
            f.from_pool = false;
            pool::put_back(std::mem::take(&mut f.data));
        }
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = 1 + Encoder::varint_len(self.stream_id.as_u64());
        if self.offset > 0 {
            len += Encoder::varint_len(self.offset);
        }
        if self.data_len_present {
            len += Encoder::varint_len(self.data.len() as u64);
        }
        len + 1 + Encoder::varint_len(self.ptda_c) + self.data.len()
    }

    #[must_use]
    pub fn max_data_len(&self, budget: usize) -> usize {
        let header_len = stream_header_len(self.stream_id, self.offset, self.data_len_present)
            + 1
            + Encoder::varint_len(self.ptda_c);
        max_data_len_for(header_len, self.data_len_present, budget)
    }

    /// As [`StreamFrame::maybe_split`]; policy fields are copied to both
    /// halves.
    pub fn maybe_split(&mut self, budget: usize) -> (Option<Self>, bool) {
        if budget >= self.encoded_len() {
            return (None, false);
        }
        let head_len = self.max_data_len(budget);
        if head_len == 0 {
            return (None, true);
        }

        let head_data = std::mem::replace(&mut self.data, pool::take());
        let head_from_pool = std::mem::replace(&mut self.from_pool, true);
        self.data.extend_from_slice(&head_data[head_len..]);
        let mut head = Self {
            stream_id: self.stream_id,
            offset: self.offset,
            fin: false,
            data_len_present: self.data_len_present,
            ptda: self.ptda,
            ptda_c: self.ptda_c,
            data: head_data,
            from_pool: head_from_pool,
            lost_count: self.lost_count,
            first_sent: self.first_sent,
        };
        head.data.truncate(head_len);
        self.offset += head_len as u64;
        (Some(head), true)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        let mut t = FRAME_TYPE_PR_STREAM_BASE;
        if self.fin {
            t |= STREAM_FLAG_FIN;
        }
        if self.data_len_present {
            t |= STREAM_FLAG_LEN;
        }
        if self.offset > 0 {
            t |= STREAM_FLAG_OFF;
        }
        enc.encode_byte(t);
        enc.encode_varint(self.stream_id.as_u64());
        if self.offset > 0 {
            enc.encode_varint(self.offset);
        }
        if self.data_len_present {
            enc.encode_varint(self.data.len() as u64);
        }
        enc.encode_byte(self.ptda.bits());
        enc.encode_varint(self.ptda_c);
        enc.encode(&self.data);
    }

    pub fn decode(dec: &mut Decoder, type_byte: u8) -> Res<Self> {
        let fin = type_byte & STREAM_FLAG_FIN != 0;
        let data_len_present = type_byte & STREAM_FLAG_LEN != 0;
        let has_offset = type_byte & STREAM_FLAG_OFF != 0;

        let stream_id = StreamId::new(need(dec.decode_varint())?);
        let offset = if has_offset {
            need(dec.decode_varint())?
        } else {
            0
        };
        let data_len = if data_len_present {
            Some(need(dec.decode_varint())?)
        } else {
            None
        };
        let ptda = PrPolicy::from_bits(need(dec.decode_byte())?)?;
        let ptda_c = need(dec.decode_varint())?;
        let data = match data_len {
            Some(len) => need(dec.decode(usize::try_from(len).map_err(|_| Error::NoMoreData)?))?,
            None => dec.decode_remainder(),
        };
        if offset + data.len() as u64 > MAX_STREAM_OFFSET {
            return Err(Error::StreamDataOverflow);
        }

        let (data, from_pool) = alloc_data(data);
        Ok(Self {
            stream_id,
            offset,
            fin,
            data_len_present,
            ptda,
            ptda_c,
            data,
            from_pool,
            lost_count: 0,
            first_sent: None,
        })
    }
}

impl PartialEq for PrStreamFrame {
    fn eq(&self, other: &Self) -> bool {
        self.stream_id == other.stream_id
            && self.offset == other.offset
            && self.fin == other.fin
            && self.data_len_present == other.data_len_present
            && self.ptda == other.ptda
            && self.ptda_c == other.ptda_c
            && self.data == other.data
    }
}
impl Eq for PrStreamFrame {}

/// Sent in place of a retransmission: the receiver treats `pr_data_len`
/// bytes at `offset` as delivered so reassembly does not stall on the
/// permanently missing range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrAckNotifyFrame {
    pub stream_id: StreamId,
    pub offset: u64,
    pub pr_data_len: u64,
    pub ptda: PrPolicy,
    pub ptda_c: u64,
}

impl PrAckNotifyFrame {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + Encoder::varint_len(self.stream_id.as_u64())
            + 1
            + Encoder::varint_len(self.ptda_c)
            + Encoder::varint_len(self.offset)
            + Encoder::varint_len(self.pr_data_len)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.encode_byte(FRAME_TYPE_PR_ACK_NOTIFY);
        enc.encode_varint(self.stream_id.as_u64());
        enc.encode_byte(self.ptda.bits());
        enc.encode_varint(self.ptda_c);
        enc.encode_varint(self.offset);
        enc.encode_varint(self.pr_data_len);
    }

    pub fn decode(dec: &mut Decoder) -> Res<Self> {
        let stream_id = StreamId::new(need(dec.decode_varint())?);
        let ptda = PrPolicy::from_bits(need(dec.decode_byte())?)?;
        let ptda_c = need(dec.decode_varint())?;
        let offset = need(dec.decode_varint())?;
        let pr_data_len = need(dec.decode_varint())?;
        if offset + pr_data_len > MAX_STREAM_OFFSET {
            return Err(Error::StreamDataOverflow);
        }
        Ok(Self {
            stream_id,
            offset,
            pr_data_len,
            ptda,
            ptda_c,
        })
    }
}

/// An unreliable datagram carrying partial-reliability policy fields.
#[derive(Debug, PartialEq, Eq)]
pub struct PrDatagramFrame {
    pub data_len_present: bool,
    pub ptda: PrPolicy,
    pub ptda_c: u64,
    data: Vec<u8>,
}

impl PrDatagramFrame {
    #[must_use]
    pub fn with_data(data_len_present: bool, ptda: PrPolicy, ptda_c: u64, data: &[u8]) -> Self {
        Self {
            data_len_present,
            ptda,
            ptda_c,
            data: data.to_vec(),
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = 1;
        if self.data_len_present {
            len += Encoder::varint_len(self.data.len() as u64);
        }
        len + 1 + Encoder::varint_len(self.ptda_c) + self.data.len()
    }

    #[must_use]
    pub fn max_data_len(&self, budget: usize) -> usize {
        let mut header_len = 1 + 1 + Encoder::varint_len(self.ptda_c);
        if self.data_len_present {
            header_len += 1;
        }
        max_data_len_for(header_len, self.data_len_present, budget)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        let mut t = FRAME_TYPE_PR_DATAGRAM_BASE;
        if self.data_len_present {
            t |= 0x01;
        }
        enc.encode_byte(t);
        if self.data_len_present {
            enc.encode_varint(self.data.len() as u64);
        }
        enc.encode_byte(self.ptda.bits());
        enc.encode_varint(self.ptda_c);
        enc.encode(&self.data);
    }

    pub fn decode(dec: &mut Decoder, type_byte: u8) -> Res<Self> {
        let data_len_present = type_byte & 0x01 != 0;
        let data_len = if data_len_present {
            Some(need(dec.decode_varint())?)
        } else {
            None
        };
        let ptda = PrPolicy::from_bits(need(dec.decode_byte())?)?;
        let ptda_c = need(dec.decode_varint())?;
        let data = match data_len {
            Some(len) => need(dec.decode(usize::try_from(len).map_err(|_| Error::NoMoreData)?))?,
            None => dec.decode_remainder(),
        };
        Ok(Self {
            data_len_present,
            ptda,
            ptda_c,
            data: data.to_vec(),
        })
    }
}

/// Sender-initiated abort of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetStreamFrame {
    pub stream_id: StreamId,
    pub app_error: AppError,
    pub final_size: u64,
}

impl ResetStreamFrame {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + Encoder::varint_len(self.stream_id.as_u64())
            + Encoder::varint_len(self.app_error)
            + Encoder::varint_len(self.final_size)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.encode_byte(FRAME_TYPE_RESET_STREAM);
        enc.encode_varint(self.stream_id.as_u64());
        enc.encode_varint(self.app_error);
        enc.encode_varint(self.final_size);
    }

    pub fn decode(dec: &mut Decoder) -> Res<Self> {
        Ok(Self {
            stream_id: StreamId::new(need(dec.decode_varint())?),
            app_error: need(dec.decode_varint())?,
            final_size: need(dec.decode_varint())?,
        })
    }
}

/// Peer-initiated request that the sender stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSendingFrame {
    pub stream_id: StreamId,
    pub app_error: AppError,
}

impl StopSendingFrame {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + Encoder::varint_len(self.stream_id.as_u64()) + Encoder::varint_len(self.app_error)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.encode_byte(FRAME_TYPE_STOP_SENDING);
        enc.encode_varint(self.stream_id.as_u64());
        enc.encode_varint(self.app_error);
    }

    pub fn decode(dec: &mut Decoder) -> Res<Self> {
        Ok(Self {
            stream_id: StreamId::new(need(dec.decode_varint())?),
            app_error: need(dec.decode_varint())?,
        })
    }
}

/// Announces that the sender is stalled on stream flow control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamDataBlockedFrame {
    pub stream_id: StreamId,
    pub limit: u64,
}

impl StreamDataBlockedFrame {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + Encoder::varint_len(self.stream_id.as_u64()) + Encoder::varint_len(self.limit)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.encode_byte(FRAME_TYPE_STREAM_DATA_BLOCKED);
        enc.encode_varint(self.stream_id.as_u64());
        enc.encode_varint(self.limit);
    }

    pub fn decode(dec: &mut Decoder) -> Res<Self> {
        Ok(Self {
            stream_id: StreamId::new(need(dec.decode_varint())?),
            limit: need(dec.decode_varint())?,
        })
    }
}

/// Any frame this crate can put on or take off the wire.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Stream(StreamFrame),
    PrStream(PrStreamFrame),
    PrAckNotify(PrAckNotifyFrame),
    PrDatagram(PrDatagramFrame),
    ResetStream(ResetStreamFrame),
    StopSending(StopSendingFrame),
    StreamDataBlocked(StreamDataBlockedFrame),
}

impl Frame {
    pub fn decode(dec: &mut Decoder) -> Res<Self> {
        let t = need(dec.decode_byte())?;
        match t {
            FRAME_TYPE_RESET_STREAM => Ok(Self::ResetStream(ResetStreamFrame::decode(dec)?)),
            FRAME_TYPE_STOP_SENDING => Ok(Self::StopSending(StopSendingFrame::decode(dec)?)),
            FRAME_TYPE_STREAM_DATA_BLOCKED => {
                Ok(Self::StreamDataBlocked(StreamDataBlockedFrame::decode(dec)?))
            }
            FRAME_TYPE_PR_ACK_NOTIFY => Ok(Self::PrAckNotify(PrAckNotifyFrame::decode(dec)?)),
            t if (FRAME_TYPE_STREAM_BASE..=(FRAME_TYPE_STREAM_BASE | 0x07)).contains(&t) => {
                Ok(Self::Stream(StreamFrame::decode(dec, t)?))
            }
            t if (FRAME_TYPE_PR_STREAM_BASE..=(FRAME_TYPE_PR_STREAM_BASE | 0x07)).contains(&t) => {
                Ok(Self::PrStream(PrStreamFrame::decode(dec, t)?))
            }
            t if t & !0x01 == FRAME_TYPE_PR_DATAGRAM_BASE => {
                Ok(Self::PrDatagram(PrDatagramFrame::decode(dec, t)?))
            }
            t => Err(Error::UnknownFrameType(u64::from(t))),
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        match self {
            Self::Stream(f) => f.encode(enc),
            Self::PrStream(f) => f.encode(enc),
            Self::PrAckNotify(f) => f.encode(enc),
            Self::PrDatagram(f) => f.encode(enc),
            Self::ResetStream(f) => f.encode(enc),
            Self::StopSending(f) => f.encode(enc),
            Self::StreamDataBlocked(f) => f.encode(enc),
        }
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Stream(f) => f.encoded_len(),
            Self::PrStream(f) => f.encoded_len(),
            Self::PrAckNotify(f) => f.encoded_len(),
            Self::PrDatagram(f) => f.encoded_len(),
            Self::ResetStream(f) => f.encoded_len(),
            Self::StopSending(f) => f.encoded_len(),
            Self::StreamDataBlocked(f) => f.encoded_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decoder, Encoder};

    fn encode_frame(f: &Frame) -> Vec<u8> {
        let mut enc = Encoder::new();
        f.encode(&mut enc);
        assert_eq!(enc.len(), f.encoded_len());
        enc.into()
    }

    fn decode_frame(buf: &[u8]) -> Frame {
        let mut dec = Decoder::new(buf);
        let f = Frame::decode(&mut dec).expect("decodes");
        assert_eq!(dec.remaining(), 0);
        f
    }

    #[test]
    fn stream_frame_wire_layout() {
        let f = StreamFrame::with_data(StreamId::new(5), 0, false, b"hello");
        let buf = encode_frame(&Frame::Stream(f));
        assert_eq!(buf, [0x0a, 0x05, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn stream_frame_offset_and_fin_bits() {
        let f = StreamFrame::with_data(StreamId::new(5), 0x30, true, b"x");
        let buf = encode_frame(&Frame::Stream(f));
        assert_eq!(buf[0], 0x08 | 0x04 | 0x02 | 0x01);
        assert_eq!(&buf[1..], [0x05, 0x30, 0x01, b'x']);
    }

    #[test]
    fn stream_frame_roundtrip() {
        for (offset, fin) in [(0, false), (0, true), (94, false), (0x5000, true)] {
            let f = StreamFrame::with_data(StreamId::new(1993), offset, fin, b"some data");
            let buf = encode_frame(&Frame::Stream(f));
            let f = StreamFrame::with_data(StreamId::new(1993), offset, fin, b"some data");
            assert_eq!(decode_frame(&buf), Frame::Stream(f));
        }
    }

    #[test]
    fn stream_frame_without_length_takes_remainder() {
        let buf = [0x08, 0x05, b'a', b'b', b'c'];
        let Frame::Stream(f) = decode_frame(&buf) else {
            panic!("wrong frame kind");
        };
        assert!(!f.data_len_present);
        assert_eq!(f.data(), b"abc");
    }

    #[test]
    fn stream_frame_truncated_length() {
        let buf = [0x0a, 0x05, 0x20, b'a'];
        let mut dec = Decoder::new(&buf);
        assert_eq!(Frame::decode(&mut dec), Err(Error::NoMoreData));
    }

    #[test]
    fn stream_frame_offset_overflow() {
        let mut enc = Encoder::new();
        enc.encode_byte(0x0e);
        enc.encode_varint(0);
        enc.encode_varint(MAX_STREAM_OFFSET);
        enc.encode_vvec(b"x");
        let mut dec = Decoder::new(enc.as_ref());
        assert_eq!(Frame::decode(&mut dec), Err(Error::StreamDataOverflow));
    }

    #[test]
    fn unknown_frame_type() {
        let mut dec = Decoder::new(&[0x6f, 0x00]);
        assert_eq!(Frame::decode(&mut dec), Err(Error::UnknownFrameType(0x6f)));
    }

    #[test]
    fn max_data_len_header_does_not_fit() {
        let f = StreamFrame::new(StreamId::new(5), 0);
        // Type byte, stream id, and provisional length need three bytes.
        assert_eq!(f.max_data_len(2), 0);
        assert_eq!(f.max_data_len(3), 0);
        assert_eq!(f.max_data_len(4), 1);
    }

    #[test]
    fn max_data_len_length_varint_self_reference() {
        let f = StreamFrame::new(StreamId::new(5), 0);
        // At a 66-byte budget the 63 bytes of candidate data would need
        // a two-byte length varint, so one byte is given up.
        assert_eq!(f.max_data_len(66), 63);
        assert_eq!(f.max_data_len(67), 63);
        assert_eq!(f.max_data_len(68), 64);
    }

    #[test]
    fn split_identity() {
        let payload = (0..200).map(|i| i as u8).collect::<Vec<_>>();
        let mut f = StreamFrame::with_data(StreamId::new(7), 40, true, &payload);
        let total = f.encoded_len();
        let (head, was_split) = f.maybe_split(total - 50);
        assert!(was_split);
        let head = head.expect("split produced a head");
        assert_eq!(head.offset, 40);
        assert!(!head.fin);
        assert_eq!(f.offset, 40 + head.data_len() as u64);
        assert!(f.fin);
        let mut joined = head.data().to_vec();
        joined.extend_from_slice(f.data());
        assert_eq!(joined, payload);
    }

    #[test]
    fn split_not_needed() {
        let mut f = StreamFrame::with_data(StreamId::new(7), 0, false, b"tiny");
        let len = f.encoded_len();
        assert_eq!(f.maybe_split(len), (None, false));
        assert_eq!(f.data(), b"tiny");
    }

    #[test]
    fn split_budget_below_header() {
        let mut f = StreamFrame::with_data(StreamId::new(7), 100, false, b"payload");
        assert_eq!(f.maybe_split(2), (None, true));
        assert_eq!(f.data(), b"payload");
        assert_eq!(f.offset, 100);
    }

    #[test]
    fn pr_stream_wire_layout() {
        let inner = StreamFrame::with_data(StreamId::new(5), 0, false, b"hello");
        let f = PrStreamFrame::wrap(inner, PrPolicy::Probability, 10_000);
        let buf = encode_frame(&Frame::PrStream(f));
        assert_eq!(
            buf,
            [0x4a, 0x05, 0x05, 0x80, 0x67, 0x10, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn pr_stream_roundtrip() {
        let inner = StreamFrame::with_data(StreamId::new(9), 0x1234, true, b"pr data");
        let f = PrStreamFrame::wrap(inner, PrPolicy::Deadline, 1000);
        let buf = encode_frame(&Frame::PrStream(f));
        let inner = StreamFrame::with_data(StreamId::new(9), 0x1234, true, b"pr data");
        let expected = PrStreamFrame::wrap(inner, PrPolicy::Deadline, 1000);
        assert_eq!(decode_frame(&buf), Frame::PrStream(expected));
    }

    #[test]
    fn pr_stream_bad_ptda() {
        // Two policy bits at once.
        let buf = [0x4a, 0x05, 0x01, 0xc0, 0x00, b'x'];
        let mut dec = Decoder::new(&buf);
        assert_eq!(Frame::decode(&mut dec), Err(Error::InvalidPtda(0xc0)));
        // Reserved low nibble set.
        let buf = [0x4a, 0x05, 0x01, 0x81, 0x00, b'x'];
        let mut dec = Decoder::new(&buf);
        assert_eq!(Frame::decode(&mut dec), Err(Error::InvalidPtda(0x81)));
    }

    #[test]
    fn pr_overhead_shrinks_max_data_len() {
        let plain = StreamFrame::new(StreamId::new(5), 0);
        let pr = PrStreamFrame::wrap(StreamFrame::new(StreamId::new(5), 0), PrPolicy::Times, 3);
        // PTDA byte plus a one-byte ptda_c varint.
        assert_eq!(pr.max_data_len(50) + 2, plain.max_data_len(50));
    }

    #[test]
    fn pr_ack_notify_wire_layout() {
        let f = PrAckNotifyFrame {
            stream_id: StreamId::new(5),
            offset: 7,
            pr_data_len: 1200,
            ptda: PrPolicy::Probability,
            ptda_c: 8000,
        };
        let buf = encode_frame(&Frame::PrAckNotify(f));
        assert_eq!(buf, [0x50, 0x05, 0x80, 0x5f, 0x40, 0x07, 0x44, 0xb0]);
        assert_eq!(decode_frame(&buf), Frame::PrAckNotify(f));
    }

    #[test]
    fn pr_ack_notify_zero_offset_roundtrip() {
        let f = PrAckNotifyFrame {
            stream_id: StreamId::new(0),
            offset: 0,
            pr_data_len: 5,
            ptda: PrPolicy::AssetPriority,
            ptda_c: 2,
        };
        let buf = encode_frame(&Frame::PrAckNotify(f));
        assert_eq!(decode_frame(&buf), Frame::PrAckNotify(f));
    }

    #[test]
    fn pr_datagram_roundtrip() {
        for len_present in [false, true] {
            let f = PrDatagramFrame::with_data(len_present, PrPolicy::Times, 3, b"datagram");
            let buf = encode_frame(&Frame::PrDatagram(f));
            assert_eq!(buf[0], 0x52 | u8::from(len_present));
            let f = PrDatagramFrame::with_data(len_present, PrPolicy::Times, 3, b"datagram");
            assert_eq!(decode_frame(&buf), Frame::PrDatagram(f));
        }
    }

    #[test]
    fn control_frame_roundtrips() {
        let reset = ResetStreamFrame {
            stream_id: StreamId::new(3),
            app_error: 7,
            final_size: 0x4321,
        };
        assert_eq!(
            decode_frame(&encode_frame(&Frame::ResetStream(reset))),
            Frame::ResetStream(reset)
        );

        let stop = StopSendingFrame {
            stream_id: StreamId::new(3),
            app_error: 9,
        };
        assert_eq!(
            decode_frame(&encode_frame(&Frame::StopSending(stop))),
            Frame::StopSending(stop)
        );

        let blocked = StreamDataBlockedFrame {
            stream_id: StreamId::new(3),
            limit: 65536,
        };
        assert_eq!(
            decode_frame(&encode_frame(&Frame::StreamDataBlocked(blocked))),
            Frame::StreamDataBlocked(blocked)
        );
    }
}
