//! Process-wide bound on the number of archives being written at once.

use std::sync::OnceLock;

use log::debug;
use parking_lot::{Condvar, Mutex};

const MIN_WRITE_SLOTS: usize = 4;

static GLOBAL: OnceLock<WriteLimiter> = OnceLock::new();

/// Counting semaphore handing out [`WritePermit`]s.
pub struct WriteLimiter {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl WriteLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    /// Block until a slot is free. The slot is returned when the permit drops.
    pub fn acquire(&self) -> WritePermit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.released.wait(&mut available);
        }
        *available -= 1;
        WritePermit { limiter: self }
    }

    pub fn try_acquire(&self) -> Option<WritePermit<'_>> {
        let mut available = self.available.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(WritePermit { limiter: self })
    }

    fn release(&self) {
        *self.available.lock() += 1;
        self.released.notify_one();
    }
}

/// A held write slot.
pub struct WritePermit<'a> {
    limiter: &'a WriteLimiter,
}

impl Drop for WritePermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

/// Slot count used when nothing was configured: available parallelism, at least 4.
pub fn default_write_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WRITE_SLOTS)
        .max(MIN_WRITE_SLOTS)
}

/// Size the global limiter. Only effective before the first container write;
/// returns false if the limiter already exists.
pub fn configure_write_limit(slots: usize) -> bool {
    let configured = GLOBAL.set(WriteLimiter::new(slots)).is_ok();
    if configured {
        debug!("write limiter configured with {} slots", slots.max(1));
    }
    configured
}

pub fn global() -> &'static WriteLimiter {
    GLOBAL.get_or_init(|| WriteLimiter::new(default_write_limit()))
}
