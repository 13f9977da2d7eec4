use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{Condvar, Mutex},
};

/// A byte sink/source bound to handles 0 and 1 of every process.
pub trait Console: Send + Sync {
    /// Reads up to `buf.len()` bytes, suspending the caller until at least
    /// one byte is available. Returns 0 only at end of input.
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Writes `buf`, returning how many bytes the device accepted.
    fn write(&self, buf: &[u8]) -> usize;
}

/// The process's own stdin/stdout.
pub struct StdConsole;

impl Console for StdConsole {
    fn read(&self, buf: &mut [u8]) -> usize {
        io::stdin().lock().read(buf).unwrap_or(0)
    }

    fn write(&self, buf: &[u8]) -> usize {
        let mut stdout = io::stdout().lock();
        match stdout.write_all(buf).and_then(|()| stdout.flush()) {
            Ok(()) => buf.len(),
            Err(_) => 0,
        }
    }
}

/// An in-memory console: input is fed by the embedder, output is captured.
///
/// Reads park on a condition variable until bytes arrive or the input side
/// closes, so a blocked reader holds no lock other than its own queue's.
pub struct PipeConsole {
    input: Mutex<InputQueue>,
    avail: Condvar,
    output: Mutex<Vec<u8>>,
}

struct InputQueue {
    bytes: VecDeque<u8>,
    closed: bool,
}

impl PipeConsole {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(InputQueue {
                bytes: VecDeque::new(),
                closed: false,
            }),
            avail: Condvar::new(),
            output: Mutex::new(Vec::new()),
        }
    }

    /// Makes `bytes` available to readers, waking any that are parked.
    pub fn feed(&self, bytes: &[u8]) {
        let mut input = self.input.lock().unwrap();
        input.bytes.extend(bytes);
        self.avail.notify_all();
    }

    /// Signals end of input: once the queue drains, reads return 0 instead
    /// of parking.
    pub fn close_input(&self) {
        self.input.lock().unwrap().closed = true;
        self.avail.notify_all();
    }

    /// Drains everything written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.lock().unwrap())
    }
}

impl Console for PipeConsole {
    fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let mut input = self.input.lock().unwrap();
        while input.bytes.is_empty() {
            if input.closed {
                return 0;
            }
            input = self.avail.wait(input).unwrap();
        }
        let count = buf.len().min(input.bytes.len());
        for slot in buf[..count].iter_mut() {
            *slot = input
                .bytes
                .pop_front()
                .expect("queue holds at least `count` bytes");
        }
        count
    }

    fn write(&self, buf: &[u8]) -> usize {
        self.output.lock().unwrap().extend_from_slice(buf);
        buf.len()
    }
}

impl Default for PipeConsole {
    fn default() -> Self {
        Self::new()
    }
}
