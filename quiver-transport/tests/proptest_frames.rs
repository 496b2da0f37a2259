// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Property-based tests for the wire codec: varint encoding, frame
//! round-trips across header flag combinations, and the split identity.

use proptest::prelude::*;
use quiver_transport::{
    codec::{Decoder, Encoder},
    frame::{Frame, PrAckNotifyFrame, PrStreamFrame, StreamFrame},
    PrPolicy, StreamId,
};

/// Valid varint values, weighted across the four encoding widths.
fn varint_value() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..0x40,
        0x40u64..0x4000,
        0x4000u64..0x4000_0000,
        0x4000_0000u64..(1 << 62),
    ]
}

fn pr_policy() -> impl Strategy<Value = PrPolicy> {
    prop_oneof![
        Just(PrPolicy::Probability),
        Just(PrPolicy::Times),
        Just(PrPolicy::Deadline),
        Just(PrPolicy::AssetPriority),
    ]
}

fn roundtrip(frame: &Frame) -> Frame {
    let mut enc = Encoder::new();
    frame.encode(&mut enc);
    assert_eq!(enc.len(), frame.encoded_len());
    let mut dec = Decoder::new(enc.as_ref());
    let decoded = Frame::decode(&mut dec).expect("frame decodes");
    assert_eq!(dec.remaining(), 0);
    decoded
}

proptest! {
    #[test]
    fn varint_roundtrip(val in varint_value()) {
        let mut enc = Encoder::new();
        enc.encode_varint(val);
        prop_assert_eq!(enc.len(), Encoder::varint_len(val));
        let mut dec = Decoder::new(enc.as_ref());
        prop_assert_eq!(dec.decode_varint(), Some(val));
    }

    #[test]
    fn stream_frame_roundtrip(
        id in 0u64..0x4000_0000,
        offset in 0u64..0x100_0000_0000,
        fin: bool,
        data in proptest::collection::vec(any::<u8>(), 0..300),
    ) {
        let f = StreamFrame::with_data(StreamId::new(id), offset, fin, &data);
        let decoded = roundtrip(&Frame::Stream(f));
        let expected = StreamFrame::with_data(StreamId::new(id), offset, fin, &data);
        prop_assert_eq!(decoded, Frame::Stream(expected));
    }

    #[test]
    fn pr_stream_frame_roundtrip(
        id in 0u64..0x4000_0000,
        offset in 0u64..0x100_0000_0000,
        fin: bool,
        ptda in pr_policy(),
        ptda_c in varint_value(),
        data in proptest::collection::vec(any::<u8>(), 0..300),
    ) {
        let f = StreamFrame::with_data(StreamId::new(id), offset, fin, &data);
        let f = PrStreamFrame::wrap(f, ptda, ptda_c);
        let decoded = roundtrip(&Frame::PrStream(f));
        let expected = StreamFrame::with_data(StreamId::new(id), offset, fin, &data);
        let expected = PrStreamFrame::wrap(expected, ptda, ptda_c);
        prop_assert_eq!(decoded, Frame::PrStream(expected));
    }

    #[test]
    fn pr_ack_notify_roundtrip(
        id in 0u64..0x4000_0000,
        offset in 0u64..0x100_0000_0000,
        pr_data_len in 0u64..0x4000,
        ptda in pr_policy(),
        ptda_c in varint_value(),
    ) {
        let f = PrAckNotifyFrame {
            stream_id: StreamId::new(id),
            offset,
            pr_data_len,
            ptda,
            ptda_c,
        };
        prop_assert_eq!(roundtrip(&Frame::PrAckNotify(f)), Frame::PrAckNotify(f));
    }

    /// For any budget between the header size and the full encoding,
    /// splitting yields a head that fits and a tail that carries the
    /// rest of the bytes at the right offset.
    #[test]
    fn split_identity(
        offset in 0u64..0x10_0000,
        fin: bool,
        data in proptest::collection::vec(any::<u8>(), 2..400),
        budget_back in 1usize..390,
    ) {
        let f = StreamFrame::with_data(StreamId::new(11), offset, fin, &data);
        let full = f.encoded_len();
        let budget = full.saturating_sub(budget_back).max(3);
        let mut tail = StreamFrame::with_data(StreamId::new(11), offset, fin, &data);
        let (head, was_split) = tail.maybe_split(budget);
        if budget >= full {
            prop_assert!(!was_split);
            prop_assert!(head.is_none());
        } else {
            prop_assert!(was_split);
            if let Some(head) = head {
                prop_assert!(head.encoded_len() <= budget);
                prop_assert_eq!(head.offset, offset);
                prop_assert!(!head.fin);
                prop_assert_eq!(tail.offset, offset + head.data_len() as u64);
                prop_assert_eq!(tail.fin, fin);
                let mut joined = head.data().to_vec();
                joined.extend_from_slice(tail.data());
                prop_assert_eq!(joined, data);
            } else {
                // Nothing fits; the frame must be untouched.
                prop_assert_eq!(tail.offset, offset);
                prop_assert_eq!(tail.data().len(), data.len());
            }
        }
    }

    /// A frame filled to exactly `max_data_len` never exceeds the
    /// budget it was sized against.
    #[test]
    fn max_data_len_respects_budget(
        id in 0u64..0x4000,
        offset in 0u64..0x10_0000,
        budget in 3usize..1500,
    ) {
        let shape = StreamFrame::with_data(StreamId::new(id), offset, false, b"");
        let max = shape.max_data_len(budget);
        if max > 0 {
            let data = vec![0xa5; max];
            let f = StreamFrame::with_data(StreamId::new(id), offset, false, &data);
            prop_assert!(f.encoded_len() <= budget);
        }
    }
}
