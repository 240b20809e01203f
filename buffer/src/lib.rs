//! Fixed-capacity buffers for real-time audio and feature streams.
//!
//! This crate provides two buffer types:
//!
//! - [`RingBuffer<T>`]: A shared, thread-safe ring that overwrites its oldest
//!   samples when full. Storage is allocated once and never grows, so it can
//!   be written from an audio callback.
//! - [`SlidingWindow<T>`]: A single-owner FIFO with a fixed capacity, used
//!   for per-tick histories.
//!
//! # RingBuffer (Shared, Overwriting)
//!
//! ```
//! use phonic_buffer::RingBuffer;
//!
//! let buf = RingBuffer::<i32>::new(3);
//! buf.write(&[1, 2, 3, 4, 5]);  // Overwrites 1, 2
//! assert_eq!(buf.to_vec(), vec![3, 4, 5]);
//! ```
//!
//! # SlidingWindow (Owned, Evicting)
//!
//! ```
//! use phonic_buffer::SlidingWindow;
//!
//! let mut win = SlidingWindow::new(2);
//! win.push(vec![0.1f32]);
//! win.push(vec![0.2f32]);
//! assert!(win.is_full());
//! ```
//!
//! # Thread Safety
//!
//! `RingBuffer` is `Send + Sync` and `Clone` (clones share the underlying
//! storage via `Arc`). `SlidingWindow` is a plain owned value.

mod ring_buffer;
mod window;

pub use ring_buffer::RingBuffer;
pub use window::SlidingWindow;
