// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Partial-reliability policy: at loss time, decide per frame between
// retransmitting data and emitting a PR_ACK_NOTIFY.

use std::{
    fmt,
    time::{Duration, Instant},
};

use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    frame::{PrAckNotifyFrame, PrStreamFrame, StreamFrame},
    Error, Res,
};

/// Probability draws are made against this range; a `ptda_c` of 10000
/// under the probability policy skips every retransmission.
pub const PR_PROBABILITY_RANGE: u64 = 10_000;

/// Which retransmission policy a PTDA bitfield selects.  Exactly one
/// bit of the high nibble is set; the low nibble is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrPolicy {
    /// Skip with probability `ptda_c` / 10000.
    Probability,
    /// Retransmit at most `ptda_c` times.
    Times,
    /// Skip once the frame is older than `ptda_c` milliseconds.
    Deadline,
    /// Skip when the stream's asset class is below `ptda_c`.
    AssetPriority,
}

impl PrPolicy {
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Probability => 0x80,
            Self::Times => 0x40,
            Self::Deadline => 0x20,
            Self::AssetPriority => 0x10,
        }
    }

    pub fn from_bits(b: u8) -> Res<Self> {
        match b {
            0x80 => Ok(Self::Probability),
            0x40 => Ok(Self::Times),
            0x20 => Ok(Self::Deadline),
            0x10 => Ok(Self::AssetPriority),
            _ => Err(Error::InvalidPtda(b)),
        }
    }
}

impl fmt::Display for PrPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Probability => write!(f, "P"),
            Self::Times => write!(f, "T"),
            Self::Deadline => write!(f, "D"),
            Self::AssetPriority => write!(f, "A"),
        }
    }
}

/// Per-stream partial-reliability configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrConfig {
    enabled: bool,
    policy: PrPolicy,
    value: u64,
    stream_class: u64,
}

impl PrConfig {
    /// Partial reliability off: the stream behaves exactly like a
    /// baseline reliable stream.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            policy: PrPolicy::Probability,
            value: 0,
            stream_class: 0,
        }
    }

    /// Skip retransmissions with probability `permyriad` / 10000.
    #[must_use]
    pub const fn probability(permyriad: u64) -> Self {
        Self {
            enabled: true,
            policy: PrPolicy::Probability,
            value: permyriad,
            stream_class: 0,
        }
    }

    /// Retransmit each frame at most `count` times.
    #[must_use]
    pub const fn times(count: u64) -> Self {
        Self {
            enabled: true,
            policy: PrPolicy::Times,
            value: count,
            stream_class: 0,
        }
    }

    /// Stop retransmitting frames older than `ms` milliseconds.
    #[must_use]
    pub const fn deadline_ms(ms: u64) -> Self {
        Self {
            enabled: true,
            policy: PrPolicy::Deadline,
            value: ms,
            stream_class: 0,
        }
    }

    /// Retransmit only when the stream's `stream_class` is at least the
    /// advertised `threshold`.
    #[must_use]
    pub const fn asset_priority(threshold: u64, stream_class: u64) -> Self {
        Self {
            enabled: true,
            policy: PrPolicy::AssetPriority,
            value: threshold,
            stream_class,
        }
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn policy(&self) -> PrPolicy {
        self.policy
    }

    /// The `ptda_c` value stamped onto outgoing `PR_STREAM` frames.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }
}

impl Default for PrConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// What to do about a lost `PR_STREAM` frame.
#[derive(Debug)]
pub enum PrDecision {
    /// Put the data back on the retransmission queue.
    Retransmit(StreamFrame),
    /// Tell the peer to treat the range as delivered.
    Skip(PrAckNotifyFrame),
}

/// Loss-time policy evaluation for one stream.  The RNG is seeded once
/// at stream creation; reseeding per draw would make outcomes cluster
/// on the seed granularity.
pub struct PrEvaluator {
    config: PrConfig,
    rng: StdRng,
}

impl PrEvaluator {
    #[must_use]
    pub fn new(config: PrConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_seed(config: PrConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PrConfig {
        &self.config
    }

    /// Decide whether `frame` is worth retransmitting.  A frame carrying
    /// FIN is always retransmitted: the notification layout has no way
    /// to convey FIN, and losing it would leave the peer waiting for the
    /// end of the stream.
    pub fn decide(&mut self, frame: PrStreamFrame, now: Instant) -> PrDecision {
        if frame.fin {
            return PrDecision::Retransmit(frame.into_stream());
        }

        let skip = match frame.ptda {
            PrPolicy::Probability => frame.ptda_c > self.rng.gen_range(0..PR_PROBABILITY_RANGE),
            PrPolicy::Times => frame.lost_count >= frame.ptda_c,
            PrPolicy::Deadline => frame
                .first_sent
                .is_some_and(|t| now.duration_since(t) > Duration::from_millis(frame.ptda_c)),
            PrPolicy::AssetPriority => self.config.stream_class < frame.ptda_c,
        };

        if skip {
            trace!(
                "PR {} skip retransmission of {} bytes at {} on stream {}",
                frame.ptda,
                frame.data_len(),
                frame.offset,
                frame.stream_id
            );
            let notify = PrAckNotifyFrame {
                stream_id: frame.stream_id,
                offset: frame.offset,
                pr_data_len: frame.data_len() as u64,
                ptda: frame.ptda,
                ptda_c: frame.ptda_c,
            };
            frame.put_back();
            PrDecision::Skip(notify)
        } else {
            PrDecision::Retransmit(frame.into_stream())
        }
    }
}

impl fmt::Debug for PrEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrEvaluator {:?}", self.config)
    }
}
