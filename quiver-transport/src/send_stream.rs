// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Accepting writer bytes and framing them for the packet assembler,
// until everything is acked or the stream is torn down.

use std::{
    cmp::min,
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use crossbeam_channel::{at, bounded, select, Receiver, Sender};
use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    codec::Encoder,
    events::{CancelHandle, CancelSignal, StreamEvents},
    fc::SenderFlowControl,
    frame::{
        Frame, PrAckNotifyFrame, PrStreamFrame, ResetStreamFrame, StopSendingFrame,
        StreamDataBlockedFrame, StreamFrame,
    },
    pr::{PrConfig, PrDecision, PrEvaluator},
    stream_id::StreamId,
    AppError, Error, Res, MAX_PACKET_BUFFER_SIZE, PR_FRAME_OVERHEAD,
};

/// A frame handed to the packet assembler.  The loss detector passes
/// the same value back through [`SendStream::on_acked`] or
/// [`SendStream::on_lost`].
#[derive(Debug, PartialEq, Eq)]
pub enum SentFrame {
    Stream(StreamFrame),
    PrStream(PrStreamFrame),
    PrAckNotify(PrAckNotifyFrame),
}

impl SentFrame {
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        match self {
            Self::Stream(f) => f.stream_id,
            Self::PrStream(f) => f.stream_id,
            Self::PrAckNotify(f) => f.stream_id,
        }
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Stream(f) => f.encoded_len(),
            Self::PrStream(f) => f.encoded_len(),
            Self::PrAckNotify(f) => f.encoded_len(),
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        match self {
            Self::Stream(f) => f.encode(enc),
            Self::PrStream(f) => f.encode(enc),
            Self::PrAckNotify(f) => f.encode(enc),
        }
    }

    /// Return any pooled buffer this frame holds.
    pub fn put_back(self) {
        match self {
            Self::Stream(f) => f.put_back(),
            Self::PrStream(f) => f.put_back(),
            Self::PrAckNotify(_) => (),
        }
    }
}

/// The error side of [`SendStream::write`]: the sticky cause together
/// with how many bytes were framed before it struck.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteError {
    written: usize,
    error: Error,
}

impl WriteError {
    const fn new(written: usize, error: Error) -> Self {
        Self { written, error }
    }

    /// Bytes of the write that made it into frames.
    #[must_use]
    pub const fn bytes_written(&self) -> usize {
        self.written
    }

    #[must_use]
    pub const fn error(&self) -> &Error {
        &self.error
    }

    #[must_use]
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} after {} bytes", self.error, self.written)
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Everything the stream mutex protects.
struct SendStreamInner {
    stream_id: StreamId,
    fc: SenderFlowControl,
    pr: Option<PrEvaluator>,

    /// Total bytes ever framed for the first time.
    write_offset: u64,
    /// The not-yet-framed remainder of the write in progress.
    pending_write: Vec<u8>,
    pending_start: usize,
    /// Tail of the latest write, parked so the writer can return and a
    /// later `close` can piggyback FIN on it.
    next_frame: Option<StreamFrame>,

    retransmission_queue: VecDeque<StreamFrame>,
    pr_notify_queue: VecDeque<PrAckNotifyFrame>,
    /// Frames handed to the assembler that are neither acked nor
    /// requeued.
    outstanding_frames: u64,

    finished_writing: bool,
    fin_sent: bool,
    canceled_write: bool,
    closed_for_shutdown: bool,
    completed: bool,

    cancel_error: Option<Error>,
    shutdown_error: Option<Error>,
    deadline: Option<Instant>,
}

impl SendStreamInner {
    fn pending(&self) -> &[u8] {
        &self.pending_write[self.pending_start..]
    }

    fn pending_len(&self) -> usize {
        self.pending_write.len() - self.pending_start
    }

    fn clear_pending(&mut self) {
        self.pending_write.clear();
        self.pending_start = 0;
    }

    /// Whether the write in progress is small enough to park in
    /// `next_frame` alongside whatever is already there.
    fn can_buffer_frame(&self) -> bool {
        let buffered = self.next_frame.as_ref().map_or(0, StreamFrame::data_len);
        buffered + self.pending_len() <= MAX_PACKET_BUFFER_SIZE
    }

    /// Move the whole pending remainder into `next_frame`.
    fn buffer_into_next_frame(&mut self) {
        debug_assert!(self.can_buffer_frame());
        let start = self.pending_start;
        let data = std::mem::take(&mut self.pending_write);
        match &mut self.next_frame {
            Some(f) => f.extend_data(&data[start..]),
            None => {
                let mut f = StreamFrame::new(self.stream_id, self.write_offset);
                f.extend_data(&data[start..]);
                self.next_frame = Some(f);
            }
        }
        self.pending_start = 0;
    }

    fn has_send_work(&self) -> bool {
        !self.retransmission_queue.is_empty()
            || !self.pr_notify_queue.is_empty()
            || self.pending_len() > 0
            || self.next_frame.is_some()
            || (self.finished_writing && !self.fin_sent)
    }

    fn dec_outstanding(&mut self) {
        self.outstanding_frames = self
            .outstanding_frames
            .checked_sub(1)
            .expect("outstanding frame count underflow");
    }

    /// Evaluate the completion predicate; true exactly once, on the
    /// transition.
    fn is_newly_completed(&mut self) -> bool {
        let completed = (self.fin_sent || self.canceled_write)
            && self.outstanding_frames == 0
            && self.retransmission_queue.is_empty()
            && self.pr_notify_queue.is_empty();
        if completed && !self.completed {
            self.completed = true;
            return true;
        }
        false
    }

    /// Finish an outbound frame: stamp the first-send time, count it
    /// outstanding, and stamp PR policy fields when PR is enabled.
    fn seal(&mut self, mut frame: StreamFrame, now: Instant) -> SentFrame {
        if frame.first_sent.is_none() {
            frame.first_sent = Some(now);
        }
        self.outstanding_frames += 1;
        match &self.pr {
            Some(ev) => {
                let config = ev.config();
                SentFrame::PrStream(PrStreamFrame::wrap(frame, config.policy(), config.value()))
            }
            None => SentFrame::Stream(frame),
        }
    }
}

struct Shared {
    stream_id: StreamId,
    inner: Mutex<SendStreamInner>,
    events: Arc<dyn StreamEvents>,
    /// Capacity 1: "something changed, recheck predicates".  Duplicate
    /// wakes collapse.
    write_wake_tx: Sender<()>,
    write_wake_rx: Receiver<()>,
    /// Capacity 1, used as a binary semaphore serializing `write`.
    write_token_tx: Sender<()>,
    write_token_rx: Receiver<()>,
    cancel: CancelHandle,
    cancel_signal: CancelSignal,
}

/// Releases the single-writer token on every exit path from `write`.
struct WriteToken<'a>(&'a Receiver<()>);

impl Drop for WriteToken<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

/// The send half of a stream.  Cheap to clone; writer, assembler, and
/// loss detector each hold a handle.
#[derive(Clone)]
pub struct SendStream {
    shared: Arc<Shared>,
}

impl SendStream {
    #[must_use]
    pub fn new(
        stream_id: StreamId,
        max_stream_data: u64,
        events: Arc<dyn StreamEvents>,
        pr: PrConfig,
    ) -> Self {
        let (write_wake_tx, write_wake_rx) = bounded(1);
        let (write_token_tx, write_token_rx) = bounded(1);
        let (cancel, cancel_signal) = CancelHandle::new();
        Self {
            shared: Arc::new(Shared {
                stream_id,
                inner: Mutex::new(SendStreamInner {
                    stream_id,
                    fc: SenderFlowControl::new(max_stream_data),
                    pr: pr.enabled().then(|| PrEvaluator::new(pr)),
                    write_offset: 0,
                    pending_write: Vec::new(),
                    pending_start: 0,
                    next_frame: None,
                    retransmission_queue: VecDeque::new(),
                    pr_notify_queue: VecDeque::new(),
                    outstanding_frames: 0,
                    finished_writing: false,
                    fin_sent: false,
                    canceled_write: false,
                    closed_for_shutdown: false,
                    completed: false,
                    cancel_error: None,
                    shutdown_error: None,
                    deadline: None,
                }),
                events,
                write_wake_tx,
                write_wake_rx,
                write_token_tx,
                write_token_rx,
                cancel,
                cancel_signal,
            }),
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        self.shared.stream_id
    }

    /// The one-shot event marking the logical end of this stream's
    /// lifecycle.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.shared.cancel_signal.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SendStreamInner> {
        self.shared.inner.lock().expect("send stream mutex poisoned")
    }

    /// Non-blocking wake of a suspended `write`.
    fn signal_write(&self) {
        let _ = self.shared.write_wake_tx.try_send(());
    }

    /// Block until all of `buf` has been framed or parked for framing.
    /// Only one `write` runs at a time; a second caller waits its turn.
    /// On cancel, shutdown, or an elapsed deadline, the error reports
    /// how many bytes were framed first.
    pub fn write(&self, buf: &[u8]) -> Result<usize, WriteError> {
        self.shared
            .write_token_tx
            .send(())
            .expect("writer token channel closed");
        let _token = WriteToken(&self.shared.write_token_rx);

        let id = self.shared.stream_id;
        let mut inner = self.lock();

        if let Some(err) = &inner.shutdown_error {
            return Err(WriteError::new(0, err.clone()));
        }
        if inner.finished_writing {
            return Err(WriteError::new(0, Error::WriteOnClosedStream(id)));
        }
        if let Some(err) = &inner.cancel_error {
            return Err(WriteError::new(0, err.clone()));
        }
        if inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(WriteError::new(0, Error::DeadlineExceeded));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        inner.pending_write = buf.to_vec();
        inner.pending_start = 0;

        let mut notified = false;
        let mut bytes_written = 0;
        loop {
            let mut copied = false;
            let mut wait_deadline = None;
            // Once the remainder fits next to what is already parked,
            // move it there and let the writer return; a `close` right
            // after this write can then set FIN on that frame instead
            // of sending an empty FIN frame.
            if inner.can_buffer_frame() && inner.pending_len() > 0 {
                inner.buffer_into_next_frame();
                bytes_written = buf.len();
                copied = true;
            } else {
                bytes_written = buf.len() - inner.pending_len();
                if let Some(d) = inner.deadline {
                    if Instant::now() >= d {
                        inner.clear_pending();
                        return Err(WriteError::new(bytes_written, Error::DeadlineExceeded));
                    }
                    wait_deadline = Some(d);
                }
                if inner.pending_len() == 0 || inner.canceled_write || inner.closed_for_shutdown {
                    break;
                }
            }

            drop(inner);
            if !notified {
                // Must not hold the mutex for this.
                self.shared.events.on_has_stream_data(id);
                notified = true;
            }
            if copied {
                inner = self.lock();
                break;
            }
            match wait_deadline {
                Some(d) => select! {
                    recv(self.shared.write_wake_rx) -> _ => (),
                    recv(at(d)) -> _ => (),
                },
                None => {
                    let _ = self.shared.write_wake_rx.recv();
                }
            }
            inner = self.lock();
        }

        if bytes_written == buf.len() {
            return Ok(bytes_written);
        }
        if let Some(err) = &inner.shutdown_error {
            let err = err.clone();
            inner.clear_pending();
            return Err(WriteError::new(bytes_written, err));
        }
        if let Some(err) = &inner.cancel_error {
            let err = err.clone();
            inner.clear_pending();
            return Err(WriteError::new(bytes_written, err));
        }
        Ok(bytes_written)
    }

    /// Finish the stream.  A FIN-carrying frame goes out with whatever
    /// data is still buffered.  Fails after a cancel; does nothing
    /// after a shutdown.
    pub fn close(&self) -> Res<()> {
        let id = self.shared.stream_id;
        {
            let mut inner = self.lock();
            if inner.closed_for_shutdown {
                return Ok(());
            }
            if inner.canceled_write {
                return Err(Error::CloseOnCanceledStream(id));
            }
            self.shared.cancel.fire();
            inner.finished_writing = true;
        }
        // The FIN still needs to be sent.
        self.shared.events.on_has_stream_data(id);
        Ok(())
    }

    /// Abandon the stream with `error_code`, telling the peer through a
    /// `RESET_STREAM` frame.
    pub fn cancel_write(&self, error_code: AppError) {
        let id = self.shared.stream_id;
        self.cancel_write_impl(error_code, Error::WriteOnCanceledStream(id, error_code));
    }

    /// Peer-initiated cancel.
    pub fn handle_stop_sending(&self, frame: &StopSendingFrame) {
        let id = self.shared.stream_id;
        self.cancel_write_impl(
            frame.app_error,
            Error::WriteOnCanceledStream(id, frame.app_error),
        );
    }

    fn cancel_write_impl(&self, error_code: AppError, error: Error) {
        let id = self.shared.stream_id;
        let (final_size, newly_completed) = {
            let mut inner = self.lock();
            if inner.canceled_write {
                return;
            }
            trace!("[{self}] cancel with error code {error_code}");
            self.shared.cancel.fire();
            inner.canceled_write = true;
            inner.cancel_error = Some(error);
            inner.outstanding_frames = 0;
            for f in inner.retransmission_queue.drain(..) {
                f.put_back();
            }
            inner.pr_notify_queue.clear();
            if let Some(f) = inner.next_frame.take() {
                f.put_back();
            }
            // Pending bytes stay so a suspended write can report how
            // far it got; its exit path drops them.
            (inner.write_offset, inner.is_newly_completed())
        };

        self.signal_write();
        self.shared
            .events
            .queue_control_frame(Frame::ResetStream(ResetStreamFrame {
                stream_id: id,
                app_error: error_code,
                final_size,
            }));
        if newly_completed {
            self.shared.events.on_stream_completed(id);
        }
    }

    /// Local abrupt termination; the peer is not informed.
    pub fn close_for_shutdown(&self, err: Error) {
        {
            let mut inner = self.lock();
            self.shared.cancel.fire();
            inner.closed_for_shutdown = true;
            inner.shutdown_error = Some(err);
        }
        self.signal_write();
    }

    /// Arm or clear the deadline observed by `write`.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.lock().deadline = deadline;
        self.signal_write();
    }

    /// Advance the peer-granted send window.
    pub fn update_send_window(&self, limit: u64) {
        let has_stream_data = {
            let mut inner = self.lock();
            inner.fc.update(limit);
            inner.pending_len() > 0 || inner.next_frame.is_some()
        };
        if has_stream_data {
            self.shared.events.on_has_stream_data(self.shared.stream_id);
        }
    }

    /// Whether a producer write is waiting to be framed.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.lock().pending_len() > 0
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// The next frame to send on this stream, at most `max_bytes` long
    /// once encoded.  Notifications and retransmissions drain before
    /// new data.  The boolean reports whether more send work remains.
    pub fn pop_frame(&self, max_bytes: usize) -> (Option<SentFrame>, bool) {
        let now = Instant::now();
        let mut inner = self.lock();

        if inner.canceled_write || inner.closed_for_shutdown {
            return (None, false);
        }

        let budget = if inner.pr.is_some() {
            max_bytes.saturating_sub(PR_FRAME_OVERHEAD)
        } else {
            max_bytes
        };

        if let Some(notify) = inner.pr_notify_queue.front().copied() {
            if notify.encoded_len() > max_bytes {
                return (None, true);
            }
            inner.pr_notify_queue.pop_front();
            inner.outstanding_frames += 1;
            let has_more = inner.has_send_work();
            trace!("[{self}] pop PR_ACK_NOTIFY at {}", notify.offset);
            return (Some(SentFrame::PrAckNotify(notify)), has_more);
        }

        if !inner.retransmission_queue.is_empty() {
            let head = inner
                .retransmission_queue
                .front_mut()
                .expect("queue is non-empty");
            let (split, was_split) = head.maybe_split(budget);
            let frame = if was_split {
                let Some(head) = split else {
                    // Not even a one-byte frame fits; the tail stays
                    // queued.
                    return (None, true);
                };
                head
            } else {
                inner
                    .retransmission_queue
                    .pop_front()
                    .expect("queue is non-empty")
            };
            trace!(
                "[{self}] pop retransmission at {} len {}",
                frame.offset,
                frame.data_len()
            );
            let sent = inner.seal(frame, now);
            let has_more = inner.has_send_work();
            return (Some(sent), has_more);
        }

        if inner.pending_len() == 0 && inner.next_frame.is_none() {
            if inner.finished_writing && !inner.fin_sent {
                inner.fin_sent = true;
                let frame = StreamFrame::fin_only(inner.stream_id, inner.write_offset);
                trace!("[{self}] pop FIN at {}", frame.offset);
                return (Some(inner.seal(frame, now)), false);
            }
            return (None, false);
        }

        let send_window = inner.fc.available();
        if send_window == 0 {
            if let Some(limit) = inner.fc.newly_blocked() {
                let blocked = StreamDataBlockedFrame {
                    stream_id: inner.stream_id,
                    limit,
                };
                drop(inner);
                debug!("[{self}] blocked at {limit}");
                self.shared
                    .events
                    .queue_control_frame(Frame::StreamDataBlocked(blocked));
                return (None, false);
            }
            return (None, true);
        }
        let send_window = usize::try_from(send_window).unwrap_or(usize::MAX);

        let mut wake_writer = false;
        let (mut frame, has_more) = if let Some(mut nf) = inner.next_frame.take() {
            let max_data = min(send_window, nf.max_data_len(budget));
            if max_data == 0 {
                inner.next_frame = Some(nf);
                return (None, true);
            }
            if nf.data_len() > max_data {
                // Emit the head; a fresh tail stays parked.
                let mut tail =
                    StreamFrame::new(inner.stream_id, inner.write_offset + max_data as u64);
                tail.extend_data(&nf.data()[max_data..]);
                nf.truncate_data(max_data);
                inner.next_frame = Some(tail);
            } else {
                // A slot opened for the writer.
                wake_writer = true;
            }
            let has_more = inner.next_frame.is_some() || inner.pending_len() > 0;
            (nf, has_more)
        } else {
            let mut f = StreamFrame::new(inner.stream_id, inner.write_offset);
            let max_data = f.max_data_len(budget);
            if max_data > 0 {
                let take = min(min(max_data, send_window), inner.pending_len());
                f.extend_data(&inner.pending()[..take]);
                inner.pending_start += take;
                if inner.pending_len() == 0 {
                    inner.clear_pending();
                    wake_writer = true;
                } else if inner.can_buffer_frame() {
                    wake_writer = true;
                }
            }
            let has_more =
                inner.pending_len() > 0 || inner.next_frame.is_some() || inner.finished_writing;
            (f, has_more)
        };

        frame.fin = inner.finished_writing
            && inner.pending_len() == 0
            && inner.next_frame.is_none()
            && !inner.fin_sent;
        if frame.fin {
            inner.fin_sent = true;
        }

        if frame.data_len() == 0 && !frame.fin {
            frame.put_back();
            if wake_writer {
                self.signal_write();
            }
            return (None, has_more);
        }

        let data_len = frame.data_len() as u64;
        if data_len > 0 {
            inner.write_offset += data_len;
            inner.fc.consume(data_len);
        }
        trace!(
            "[{self}] pop new frame at {} len {data_len} fin {}",
            frame.offset,
            frame.fin
        );
        let sent = inner.seal(frame, now);
        drop(inner);
        if wake_writer {
            self.signal_write();
        }
        (Some(sent), has_more)
    }

    /// The loss detector saw this frame acknowledged.
    pub fn on_acked(&self, frame: SentFrame) {
        frame.put_back();
        let newly_completed = {
            let mut inner = self.lock();
            if inner.canceled_write {
                return;
            }
            inner.dec_outstanding();
            inner.is_newly_completed()
        };
        if newly_completed {
            self.shared.events.on_stream_completed(self.shared.stream_id);
        }
    }

    /// The loss detector declared this frame lost.
    pub fn on_lost(&self, frame: SentFrame) {
        match frame {
            SentFrame::Stream(f) => self.queue_retransmission(f),
            SentFrame::PrStream(f) => self.pr_lost(f),
            SentFrame::PrAckNotify(f) => self.requeue_notify(f),
        }
    }

    fn queue_retransmission(&self, mut frame: StreamFrame) {
        {
            let mut inner = self.lock();
            if inner.canceled_write {
                drop(inner);
                frame.put_back();
                return;
            }
            // The frame must self-delimit when repacked next to others.
            frame.data_len_present = true;
            frame.lost_count += 1;
            inner.retransmission_queue.push_back(frame);
            inner.dec_outstanding();
        }
        self.shared.events.on_has_stream_data(self.shared.stream_id);
    }

    fn pr_lost(&self, frame: PrStreamFrame) {
        let now = Instant::now();
        {
            let mut inner = self.lock();
            if inner.canceled_write {
                drop(inner);
                frame.put_back();
                return;
            }
            let decision = inner
                .pr
                .as_mut()
                .expect("PR frame on a stream without PR")
                .decide(frame, now);
            match decision {
                PrDecision::Retransmit(mut f) => {
                    f.data_len_present = true;
                    f.lost_count += 1;
                    inner.retransmission_queue.push_back(f);
                }
                PrDecision::Skip(notify) => {
                    inner.pr_notify_queue.push_back(notify);
                }
            }
            inner.dec_outstanding();
        }
        self.shared.events.on_has_stream_data(self.shared.stream_id);
    }

    fn requeue_notify(&self, frame: PrAckNotifyFrame) {
        {
            let mut inner = self.lock();
            if inner.canceled_write {
                return;
            }
            inner.pr_notify_queue.push_back(frame);
            inner.dec_outstanding();
        }
        self.shared.events.on_has_stream_data(self.shared.stream_id);
    }

    #[cfg(test)]
    pub(crate) fn retransmission_queue_len(&self) -> usize {
        self.lock().retransmission_queue.len()
    }

    #[cfg(test)]
    pub(crate) fn pr_notify_queue_len(&self) -> usize {
        self.lock().pr_notify_queue.len()
    }

    #[cfg(test)]
    pub(crate) fn outstanding_frames(&self) -> u64 {
        self.lock().outstanding_frames
    }

    #[cfg(test)]
    pub(crate) fn write_offset(&self) -> u64 {
        self.lock().write_offset
    }
}

impl fmt::Display for SendStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SendStream {}", self.shared.stream_id)
    }
}

/// All send streams of a connection, routed by stream id.
#[derive(Default)]
pub struct SendStreams {
    map: IndexMap<StreamId, SendStream>,
}

impl SendStreams {
    pub fn get(&self, id: StreamId) -> Res<&SendStream> {
        self.map.get(&id).ok_or(Error::InvalidStreamId)
    }

    #[must_use]
    pub fn exists(&self, id: StreamId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn insert(&mut self, id: StreamId, stream: SendStream) {
        self.map.insert(id, stream);
    }

    /// Route an acknowledgment to its stream.  Frames for streams that
    /// are already gone just surrender their buffers.
    pub fn acked(&self, frame: SentFrame) {
        match self.map.get(&frame.stream_id()) {
            Some(ss) => ss.on_acked(frame),
            None => frame.put_back(),
        }
    }

    /// Route a loss to its stream.
    pub fn lost(&self, frame: SentFrame) {
        match self.map.get(&frame.stream_id()) {
            Some(ss) => ss.on_lost(frame),
            None => frame.put_back(),
        }
    }

    pub fn update_send_window(&self, id: StreamId, limit: u64) {
        if let Some(ss) = self.map.get(&id) {
            ss.update_send_window(limit);
        }
    }

    pub fn handle_stop_sending(&self, frame: &StopSendingFrame) {
        if let Some(ss) = self.map.get(&frame.stream_id) {
            ss.handle_stop_sending(frame);
        }
    }

    /// Abrupt teardown of every stream, e.g. when the connection dies.
    pub fn close_for_shutdown(&self, err: &Error) {
        for ss in self.map.values() {
            ss.close_for_shutdown(err.clone());
        }
    }

    /// Drop streams that have reported completion.
    pub fn remove_terminal(&mut self) {
        self.map.retain(|_, ss| !ss.is_completed());
    }
}

impl<'a> IntoIterator for &'a SendStreams {
    type Item = (&'a StreamId, &'a SendStream);
    type IntoIter = indexmap::map::Iter<'a, StreamId, SendStream>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}
