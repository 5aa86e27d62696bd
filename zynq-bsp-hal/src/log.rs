//! # Logging provider
//!
//! The drivers log through the [log] facade. This module provides a logger which does not block
//! on an output peripheral: records are formatted into a ring buffer and the frame sizes are
//! queued, so a low priority task or the main loop can forward the frames to any output.

use core::sync::atomic::AtomicBool;

static LOGGER_INIT_DONE: AtomicBool = AtomicBool::new(false);

/// Logger module which logs into a ring buffer to allow asynchronous logging handling.
pub mod rb {
    use core::cell::RefCell;
    use core::fmt::Write as _;
    use core::sync::atomic::{AtomicU32, Ordering};

    use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
    use log::{LevelFilter, set_logger, set_max_level};
    use ringbuf::{
        StaticRb,
        traits::{Consumer, Observer, Producer},
    };

    pub const RING_BUF_SIZE: usize = 4096;
    pub const FRAME_QUEUE_DEPTH: usize = 32;
    /// Longer records are truncated.
    pub const MAX_FRAME_LEN: usize = 256;

    pub type FrameQueue = Channel<CriticalSectionRawMutex, usize, FRAME_QUEUE_DEPTH>;

    /// Logger implementation which logs frames via a ring buffer and sends the frame sizes
    /// as messages.
    pub struct Logger {
        frame_queue: FrameQueue,
        data_buf: critical_section::Mutex<RefCell<heapless::String<MAX_FRAME_LEN>>>,
        ring_buf: critical_section::Mutex<RefCell<Option<StaticRb<u8, RING_BUF_SIZE>>>>,
        dropped: AtomicU32,
    }

    unsafe impl Send for Logger {}
    unsafe impl Sync for Logger {}

    static LOGGER_RB: Logger = Logger {
        frame_queue: Channel::new(),
        data_buf: critical_section::Mutex::new(RefCell::new(heapless::String::new())),
        ring_buf: critical_section::Mutex::new(RefCell::new(None)),
        dropped: AtomicU32::new(0),
    };

    impl log::Log for Logger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &log::Record) {
            critical_section::with(|cs| {
                let mut buf = self.data_buf.borrow(cs).borrow_mut();
                buf.clear();
                // A full buffer truncates the record.
                let _ = writeln!(
                    buf,
                    "{} {} - {}\r",
                    record.level(),
                    record.target(),
                    record.args()
                );
                let mut rb_opt = self.ring_buf.borrow(cs).borrow_mut();
                let Some(rb) = rb_opt.as_mut() else {
                    return;
                };
                // Frames are dropped as a whole so the queued sizes stay in sync with the data.
                if rb.vacant_len() < buf.len() || self.frame_queue.is_full() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                rb.push_slice(buf.as_bytes());
                let _ = self.frame_queue.try_send(buf.len());
            });
        }

        fn flush(&self) {
            while !self.frame_queue.is_empty() {}
        }
    }

    /// Install the ring buffer logger. Subsequent calls have no effect.
    pub fn init(level: LevelFilter) {
        if super::LOGGER_INIT_DONE.swap(true, Ordering::Relaxed) {
            return;
        }
        critical_section::with(|cs| {
            LOGGER_RB
                .ring_buf
                .borrow(cs)
                .replace(Some(StaticRb::<u8, RING_BUF_SIZE>::default()));
        });
        // Can only fail if another logger was installed.
        let _ = set_logger(&LOGGER_RB);
        set_max_level(level);
    }

    /// Pop the data of a frame whose size was received from the [frame_queue]. Returns the
    /// number of bytes copied into the buffer. The rest of the frame is discarded if the buffer
    /// is too small.
    pub fn read_frame(frame_len: usize, buf: &mut [u8]) -> usize {
        let read_len = core::cmp::min(frame_len, buf.len());
        critical_section::with(|cs| {
            let mut rb_opt = LOGGER_RB.ring_buf.borrow(cs).borrow_mut();
            let Some(rb) = rb_opt.as_mut() else {
                return 0;
            };
            let read = rb.pop_slice(&mut buf[0..read_len]);
            rb.skip(frame_len - read_len);
            read
        })
    }

    /// Non-blocking read of the next frame.
    pub fn read_next_frame(buf: &mut [u8]) -> Option<usize> {
        let frame_len = LOGGER_RB.frame_queue.try_receive().ok()?;
        Some(read_frame(frame_len, buf))
    }

    /// Queue of frame sizes, which can be awaited in async applications.
    pub fn frame_queue() -> &'static FrameQueue {
        &LOGGER_RB.frame_queue
    }

    /// Number of frames which were dropped because the buffers were full.
    pub fn dropped_frames() -> u32 {
        LOGGER_RB.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::rb;
    use std::{string::String, vec::Vec};

    #[test]
    fn test_ring_buffer_logger() {
        rb::init(log::LevelFilter::Info);
        // Second initialization is ignored.
        rb::init(log::LevelFilter::Trace);
        assert_eq!(log::max_level(), log::LevelFilter::Info);

        log::info!("XADC temperature {}", 42);
        log::debug!("filtered");

        let mut frames = Vec::new();
        let mut buf = [0; rb::MAX_FRAME_LEN];
        while let Some(len) = rb::read_next_frame(&mut buf) {
            frames.push(String::from_utf8_lossy(&buf[..len]).into_owned());
        }
        assert!(
            frames
                .iter()
                .any(|f| f.starts_with("INFO") && f.ends_with("XADC temperature 42\r\n"))
        );
        assert!(!frames.iter().any(|f| f.contains("filtered")));

        log::warn!("truncated frame");
        let mut small = [0; 4];
        let mut lens = Vec::new();
        while let Some(len) = rb::read_next_frame(&mut small) {
            lens.push(len);
        }
        assert!(!lens.is_empty());
        assert!(lens.iter().all(|len| *len <= 4));
        // Skipped remainders leave the ring buffer consistent.
        log::error!("next frame");
        let mut found = false;
        while let Some(len) = rb::read_next_frame(&mut buf) {
            found |= buf[..len].starts_with(b"ERROR");
        }
        assert!(found);
    }
}
