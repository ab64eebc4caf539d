use std::sync::atomic::{AtomicI32, Ordering};

/// Monotonic request-id source. Wraps at `i32::MAX`; ids only need to be
/// unique within one in-flight window.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicI32,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    pub fn next_id(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
