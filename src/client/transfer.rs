use std::cell::{Cell, RefCell};

use tracing::trace;

use crate::common::buf::{IBuf, Region};
use crate::engine::{TerminalCode, TransferHooks, UploadChunk};
use crate::rt::Condvar;

/// State shared between a request and the engine callbacks bound to it.
///
/// While the transfer is in progress the callbacks are the exclusive
/// writer of `recv` and `resp_headers` and the exclusive reader of `send`;
/// the owning task is the exclusive writer of `send` and reader of the
/// receive side. No borrow crosses a suspension point, so the partition
/// keeps every `RefCell` borrow conflict-free and no lock is needed.
#[derive(Debug)]
pub(crate) struct TransferState {
    /// Outgoing body chunk currently being drained by the engine.
    pub(crate) send: RefCell<IBuf>,
    /// Response body bytes delivered by the engine, not yet consumed.
    pub(crate) recv: RefCell<Region>,
    /// Raw header bytes of the final response.
    pub(crate) resp_headers: RefCell<Region>,
    /// Highest redirect index observed from the engine so far.
    pub(crate) redirect_count: Cell<u32>,
    pub(crate) in_progress: Cell<bool>,
    terminal: RefCell<Option<TerminalCode>>,
    /// Streaming mode.
    pub(crate) io: Cell<bool>,
    /// Streaming mode with an upload channel.
    pub(crate) io_send: Cell<bool>,
    pub(crate) io_send_closed: Cell<bool>,
    pub(crate) recv_cond: Condvar,
    pub(crate) send_cond: Condvar,
    pub(crate) done_cond: Condvar,
}

impl TransferState {
    pub(crate) fn new() -> TransferState {
        TransferState {
            send: RefCell::new(IBuf::new()),
            recv: RefCell::new(Region::new()),
            resp_headers: RefCell::new(Region::new()),
            redirect_count: Cell::new(0),
            in_progress: Cell::new(false),
            terminal: RefCell::new(None),
            io: Cell::new(false),
            io_send: Cell::new(false),
            io_send_closed: Cell::new(false),
            recv_cond: Condvar::new(),
            send_cond: Condvar::new(),
            done_cond: Condvar::new(),
        }
    }

    /// The condvar `start` parks on while the response gets under way,
    /// resolved by method shape.
    pub(crate) fn headers_cond(&self) -> &Condvar {
        if self.io_send.get() {
            &self.send_cond
        } else {
            &self.recv_cond
        }
    }

    pub(crate) fn terminal(&self) -> Option<TerminalCode> {
        self.terminal.borrow().clone()
    }
}

impl TransferHooks for TransferState {
    fn on_header(&self, redirect_count: u32, chunk: &[u8]) -> bool {
        // Headers of every hop come through here, not just the final
        // response's. Each new redirect drops what accumulated so far.
        if redirect_count > self.redirect_count.get() {
            debug_assert_eq!(redirect_count, self.redirect_count.get() + 1);
            self.redirect_count.set(redirect_count);
            self.resp_headers.borrow_mut().clear();
        }
        self.resp_headers.borrow_mut().push(chunk);
        true
    }

    fn on_body(&self, chunk: &[u8]) -> bool {
        self.recv.borrow_mut().push(chunk);
        if self.io.get() {
            self.recv_cond.signal();
        }
        true
    }

    fn on_upload(&self, buf: &mut [u8]) -> UploadChunk {
        let mut send = self.send.borrow_mut();
        if send.is_empty() {
            self.send_cond.broadcast();
            if self.io_send_closed.get() {
                return UploadChunk::Eof;
            }
            return UploadChunk::Pause;
        }

        let copied = send.read_into(buf);
        self.send_cond.broadcast();
        UploadChunk::Copied(copied)
    }

    fn on_done(&self, code: TerminalCode) {
        trace!(?code, "transfer done");
        *self.terminal.borrow_mut() = Some(code);
        self.in_progress.set(false);
        self.io_send_closed.set(true);
        self.recv_cond.broadcast();
        self.send_cond.broadcast();
        self.done_cond.broadcast();
    }
}
