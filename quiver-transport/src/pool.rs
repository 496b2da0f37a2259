// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Reusable frame-data buffers for the packet assembly hot path.

use std::sync::Mutex;

use crate::MAX_PACKET_BUFFER_SIZE;

/// How many idle buffers the pool keeps around.  Beyond this, returned
/// buffers are simply dropped.
const POOL_RETAIN_LIMIT: usize = 256;

static POOL: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

/// Take an empty buffer with capacity [`MAX_PACKET_BUFFER_SIZE`].
#[must_use]
pub fn take() -> Vec<u8> {
    let buf = POOL.lock().expect("buffer pool poisoned").pop();
    buf.unwrap_or_else(|| Vec::with_capacity(MAX_PACKET_BUFFER_SIZE))
}

/// Return a buffer obtained from [`take`].
///
/// # Panics
/// When the buffer does not have the fixed pool capacity.  That means a
/// caller returned a buffer it did not take from the pool, which would
/// poison every later user of it.
pub fn put_back(mut buf: Vec<u8>) {
    assert!(
        buf.capacity() >= MAX_PACKET_BUFFER_SIZE,
        "pooled buffer returned with the wrong capacity"
    );
    buf.clear();
    let mut pool = POOL.lock().expect("buffer pool poisoned");
    if pool.len() < POOL_RETAIN_LIMIT {
        pool.push(buf);
    }
}
