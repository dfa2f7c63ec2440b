//! Streaming reads and writes for requests in io mode.
//!
//! The engine pushes response bytes into `recv` from its callbacks; the
//! task pulls them out of `io_recv` first, then out of a coalesced `recv`.
//! Uploads go the other way: the task fills `send`, pokes the engine to
//! resume, and waits for the drain. All waiting is deadline-bounded.

use std::cmp;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::request::Request;
use crate::error::Error;
use crate::rt;

impl Request {
    /// Reads up to `dst.len()` response body bytes.
    ///
    /// Suspends until bytes are available, the transfer completes, or
    /// `timeout` expires (an error). `Ok(0)` is end-of-stream.
    pub async fn io_read(&mut self, dst: &mut [u8], timeout: Duration) -> crate::Result<usize> {
        if !self.state.io.get() {
            return Err(Error::new_not_streaming());
        }

        let deadline = rt::deadline(timeout);
        while self.state.in_progress.get()
            && !timeout.is_zero()
            && self.io_recv.is_empty()
            && self.state.recv.borrow().is_empty()
        {
            self.state.recv_cond.wait_deadline(deadline).await?;
        }

        if self.io_recv.is_empty() && self.state.recv.borrow().is_empty() {
            return Ok(0);
        }

        // The staging buffer goes first: it holds bytes pushed before
        // anything now sitting in `recv`.
        let mut copied = self.io_recv.read_into(dst);

        if copied < dst.len() && !self.state.recv.borrow().is_empty() {
            let mut recv = self.state.recv.borrow_mut();
            let body = recv.join();
            let take = cmp::min(dst.len() - copied, body.len());
            dst[copied..copied + take].copy_from_slice(&body[..take]);
            copied += take;
            // Restage whatever the caller had no room for.
            if take < body.len() {
                self.io_recv.write(&body[take..]);
            }
            recv.clear();
        }

        trace!(copied, "io_read");
        Ok(copied)
    }

    /// Writes `data` as the next outgoing body chunk; empty `data` closes
    /// the upload.
    ///
    /// Returns how many bytes were handed to the engine. `Ok(0)` means the
    /// transfer ended (or the upload was already closed) and the bytes
    /// went nowhere; writing after close is absorbed. A deadline expiring
    /// while an earlier chunk is still queued is an error.
    pub async fn io_write(&mut self, data: &[u8], timeout: Duration) -> crate::Result<usize> {
        if !self.state.io.get() {
            return Err(Error::new_not_streaming());
        }
        if !self.state.io_send.get() {
            return Err(Error::new_bodyless_upload());
        }
        if !self.state.in_progress.get() || self.state.io_send_closed.get() {
            return Ok(0);
        }

        let deadline = rt::deadline(timeout);
        // Wait out a previous chunk the engine has not drained yet.
        while self.state.in_progress.get()
            && !self.state.send.borrow().is_empty()
            && !timeout.is_zero()
        {
            self.state.send_cond.wait_deadline(deadline).await?;
        }

        if !self.state.send.borrow().is_empty() {
            if self.state.in_progress.get() {
                return Err(Error::new_timed_out());
            }
            return Ok(0);
        }

        if data.is_empty() {
            self.state.io_send_closed.set(true);
        } else {
            let mut send = self.state.send.borrow_mut();
            send.reset();
            send.write(data);
        }

        self.transfer.resume_send();
        let _ = self.state.send_cond.wait_deadline(deadline).await;

        if !self.state.send.borrow().is_empty() {
            // The transfer ended, or the deadline fired, before the chunk
            // drained; it never reached the wire.
            self.state.send.borrow_mut().reset();
            return Ok(0);
        }

        trace!(len = data.len(), "io_write");
        Ok(data.len())
    }

    /// Closes the upload if still open, finishes the request with the
    /// remaining budget, and wakes any parked streaming operation.
    pub async fn io_finish(&mut self, timeout: Duration) -> crate::Result<()> {
        if !self.state.io.get() {
            return Err(Error::new_not_streaming());
        }

        let mut remaining = timeout;
        if self.state.in_progress.get() && !self.state.io_send_closed.get() {
            let started = Instant::now();
            if let Ok(0) = self.io_write(&[], remaining).await {
                self.state.io_send_closed.set(true);
            }
            remaining = remaining.saturating_sub(started.elapsed());
        }

        if self.status == 0 {
            self.finish(remaining).await?;
        }

        self.state.send_cond.broadcast();
        self.state.recv_cond.broadcast();
        Ok(())
    }
}
