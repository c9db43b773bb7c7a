// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Producing-side byte acquisition.
//!
//! Serial reads block, so they run on a dedicated thread and never share
//! the event-loop thread. Bytes are pushed through a [`FrameDecoder`] in
//! raw mode; complete (still-encoded) frames are handed to the publish
//! loop through a bounded queue.

use crate::frame::FrameDecoder;
use std::io::Read;
use tokio::sync::mpsc;

/// Default depth of the frame queue between the reader thread and the
/// publish loop.
pub const FRAME_QUEUE_DEPTH: usize = 64;

/// Spawn the blocking read loop over `device`.
///
/// Returns the queue of raw frames and the reader thread's join handle.
/// The reader exits when the device reports end of stream, on an
/// unrecoverable read error, or once the receiving side is dropped. Read
/// timeouts are treated as "no byte yet" and retried.
pub fn spawn_frame_reader<R>(
    mut device: R,
    depth: usize,
) -> (mpsc::Receiver<String>, std::thread::JoinHandle<()>)
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(depth);

    let handle = std::thread::spawn(move || {
        let mut decoder = FrameDecoder::new();
        let mut byte = [0u8; 1];
        loop {
            match device.read(&mut byte) {
                Ok(0) => {
                    log::info!("Serial device reached end of stream");
                    break;
                }
                Ok(_) => {
                    let chunk = (byte[0] as char).to_string();
                    if let Some(frame) = decoder.push_raw(&chunk) {
                        if tx.blocking_send(frame).is_err() {
                            break;
                        }
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::Interrupted
                            | std::io::ErrorKind::TimedOut
                            | std::io::ErrorKind::WouldBlock
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("Serial read failed: {}", e);
                    break;
                }
            }
        }
    });

    (rx, handle)
}
