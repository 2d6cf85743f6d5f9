use std::collections::VecDeque;

/// Client-side FIFO of received payloads.
///
/// There is no admission limit and no reordering by sequence number: arrival order is kept, and
///  the oldest entry is released for 'processing' once the buffer holds more than
///  `release_threshold` entries. The jitter absorption is purely the simulated processing delay
///  the receive loop derives from the buffer depth.
///
/// This type is not synchronized - the client engine guards it with a lock around push, depth
///  check and release.
pub struct JitterBuffer {
    queue: VecDeque<String>,
    release_threshold: usize,
}

impl JitterBuffer {
    pub fn new(release_threshold: usize) -> JitterBuffer {
        JitterBuffer {
            queue: VecDeque::new(),
            release_threshold,
        }
    }

    /// returns the depth after the push
    pub fn push(&mut self, payload: String) -> usize {
        self.queue.push_back(payload);
        self.queue.len()
    }

    pub fn depth(&self) -> usize {
        self.queue.len()
    }

    /// Pops the oldest entry if (and only if) the depth exceeds the release threshold. This
    ///  releases at most one entry per call.
    pub fn release(&mut self) -> Option<String> {
        if self.queue.len() > self.release_threshold {
            self.queue.pop_front()
        }
        else {
            None
        }
    }
}
