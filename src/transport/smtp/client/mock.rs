//! An in-memory stream standing in for a server connection in tests
//!
//! Replies are queued in the read buffer ahead of time and everything the
//! client writes can be taken back for inspection.

use std::{
    io::{self, Cursor, Read, Write},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

type MockCursor = Cursor<Vec<u8>>;

/// A stream backed by two shared buffers
///
/// Clones share their buffers, so a test can keep a handle on a stream
/// after moving it into a connection.
#[derive(Clone, Debug, Default)]
pub struct MockStream {
    reader: Arc<Mutex<MockCursor>>,
    writer: Arc<Mutex<MockCursor>>,
    shutdowns: Arc<AtomicUsize>,
}

fn lock(cursor: &Mutex<MockCursor>) -> MutexGuard<'_, MockCursor> {
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockStream {
    /// Creates a stream with nothing to read
    pub fn new() -> MockStream {
        MockStream::default()
    }

    /// Creates a stream which will read `vec`
    pub fn with_vec(vec: Vec<u8>) -> MockStream {
        MockStream {
            reader: Arc::new(Mutex::new(MockCursor::new(vec))),
            ..MockStream::default()
        }
    }

    /// Takes everything written so far
    pub fn take_vec(&mut self) -> Vec<u8> {
        let mut cursor = lock(&self.writer);
        let vec = cursor.get_ref().to_vec();
        cursor.set_position(0);
        cursor.get_mut().clear();
        vec
    }

    /// Replaces the read buffer
    pub fn next_vec(&mut self, vec: &[u8]) {
        let mut cursor = lock(&self.reader);
        cursor.set_position(0);
        cursor.get_mut().clear();
        cursor.get_mut().extend_from_slice(vec);
    }

    /// Exchanges the contents of the read and write buffers
    pub fn swap(&mut self) {
        let mut cur_write = lock(&self.writer);
        let mut cur_read = lock(&self.reader);
        let vec_write = cur_write.get_ref().to_vec();
        let vec_read = cur_read.get_ref().to_vec();
        cur_write.set_position(0);
        cur_read.set_position(0);
        cur_write.get_mut().clear();
        cur_read.get_mut().clear();
        cur_read.get_mut().extend_from_slice(vec_write.as_slice());
        cur_write.get_mut().extend_from_slice(vec_read.as_slice());
    }

    /// How many times the owning connection shut the stream down
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

impl Write for MockStream {
    fn write(&mut self, msg: &[u8]) -> io::Result<usize> {
        lock(&self.writer).write(msg)
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.writer).flush()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        lock(&self.reader).read(buf)
    }
}
