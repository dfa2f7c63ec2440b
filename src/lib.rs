#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(rust_2018_idioms))]

//! # muxhttp
//!
//! A cooperative-scheduled HTTP client facade over a multiplexed transfer
//! engine.
//!
//! muxhttp does not drive sockets itself. It is the glue between three
//! independent machines:
//!
//! - a **cooperative runtime**: many tasks multiplexed on one OS thread,
//!   suspending only at `.await` points;
//! - a **multi transfer engine** (the [`engine`] contract): an opaque
//!   subsystem that drives any number of concurrent transfers through
//!   event-loop readiness and callbacks;
//! - a **streaming buffer discipline** bridging the engine's push-style
//!   callbacks with pull-style task reads and writes.
//!
//! A [`Client`] owns the engine and cumulative [`Stats`]. A [`Request`] is
//! configured with headers and options, then either executed in one shot
//! with [`Request::execute`], or switched into streaming mode with
//! [`Request::set_io`] and driven incrementally with
//! [`Request::io_read`], [`Request::io_write`] and [`Request::io_finish`]
//! while the owning task stays responsive to other work.
//!
//! Every blocking operation takes a timeout and suspends only the calling
//! task; the OS thread underneath is never blocked. Transport failures are
//! classified into synthetic HTTP statuses (408, 444, 495, 595) so callers
//! can treat them uniformly as "request finished with result X".

pub use http::Method;

pub use crate::client::{Client, Request, Stats};
pub use crate::error::{Error, Result};

mod client;
mod common;
pub mod engine;
mod error;
mod rt;
