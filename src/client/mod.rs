//! The task-facing side: environment, requests, streaming I/O.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use http::Method;

use crate::engine::MultiEngine;

pub use self::request::Request;

mod headers;
mod io;
mod request;
mod transfer;

/// Cumulative request statistics of one [`Client`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Requests started.
    pub total_requests: u64,
    /// Requests finished with HTTP 200.
    pub http_200_responses: u64,
    /// Requests finished with any other HTTP status.
    pub http_other_responses: u64,
    /// Requests finished with a classified failure or an engine error.
    pub failed_requests: u64,
}

/// The environment requests are issued against.
///
/// Owns the transfer engine and the statistics record. Every request keeps
/// a reference back to its client, so the environment outlives all the
/// requests it parented.
pub struct Client {
    shared: Rc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) engine: Box<dyn MultiEngine>,
    stats: Cell<Stats>,
    live_requests: Cell<usize>,
}

impl Client {
    /// Creates a client over `engine`.
    ///
    /// The engine itself is constructed externally with its
    /// [`ConnLimits`](crate::engine::ConnLimits); failure to create one is
    /// the engine constructor's to report, before this call.
    pub fn new(engine: Box<dyn MultiEngine>) -> Client {
        Client {
            shared: Rc::new(Shared {
                engine,
                stats: Cell::new(Stats::default()),
                live_requests: Cell::new(0),
            }),
        }
    }

    /// A snapshot of the cumulative statistics.
    pub fn stats(&self) -> Stats {
        self.shared.stats.get()
    }

    /// Creates a request for `method` on `url`.
    pub fn request(&self, method: Method, url: &str) -> crate::Result<Request> {
        Request::new(&self.shared, method, url)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("stats", &self.shared.stats.get())
            .field("live_requests", &self.shared.live_requests.get())
            .finish()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        debug_assert_eq!(
            self.live_requests.get(),
            0,
            "environment torn down with live requests"
        );
    }
}

impl Shared {
    pub(crate) fn release_request(&self) {
        self.live_requests.set(self.live_requests.get() - 1);
    }

    pub(crate) fn track_request(&self) {
        self.live_requests.set(self.live_requests.get() + 1);
    }

    pub(crate) fn update_stats(&self, f: impl FnOnce(&mut Stats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}
