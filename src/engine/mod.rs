//! Contract with the multiplexed transfer engine.
//!
//! The engine is the opaque subsystem owning sockets, TLS, protocol parsing
//! and redirect handling. It drives any number of transfers concurrently on
//! the same thread as the task scheduler, and reports progress for each
//! through its [`TransferHooks`], which run between task polls.
//!
//! muxhttp consumes this contract; concrete engines implement it. The
//! scripted engine driving the integration tests is one such
//! implementation.

use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;

/// Connection limits an engine is created with.
#[derive(Debug, Clone, Copy)]
pub struct ConnLimits {
    /// Maximum simultaneous connections to a single host.
    pub max_conns_per_host: u32,
    /// Maximum simultaneous connections overall.
    pub max_total_conns: u32,
}

/// A multiplexed transfer engine: a factory of transfer handles that share
/// the engine's connection pool and reactor.
pub trait MultiEngine {
    /// Allocates a new transfer handle bound to this engine.
    fn transfer(&self) -> crate::Result<Box<dyn Transfer>>;
}

/// One transfer owned by the engine.
///
/// Option setters are thin pass-throughs and may be called in any order
/// before [`submit`](Transfer::submit). Dropping the handle detaches the
/// transfer from the engine regardless of its state.
pub trait Transfer {
    /// Target URL.
    fn set_url(&mut self, url: &str);
    /// Plain HTTP GET.
    fn set_get(&mut self);
    /// Fetch headers only, no response body.
    fn set_nobody(&mut self);
    /// POST-shaped request.
    fn set_post(&mut self);
    /// Request verb sent on the wire.
    fn set_custom_verb(&mut self, verb: &str);
    /// Whether the engine follows redirects itself.
    fn set_follow_location(&mut self, follow: bool);
    /// TLS host name verification.
    fn set_verify_host(&mut self, verify: bool);
    /// TLS peer certificate verification.
    fn set_verify_peer(&mut self, verify: bool);
    /// Directory of trusted CA certificates.
    fn set_ca_path(&mut self, path: &str);
    /// File of trusted CA certificates.
    fn set_ca_file(&mut self, file: &str);
    /// Client private key path.
    fn set_ssl_key(&mut self, path: &str);
    /// Client certificate path.
    fn set_ssl_cert(&mut self, path: &str);
    /// Proxy host.
    fn set_proxy(&mut self, proxy: &str);
    /// Proxy port.
    fn set_proxy_port(&mut self, port: u16);
    /// `user:password` for proxy authentication.
    fn set_proxy_user_pwd(&mut self, user_pwd: &str);
    /// Comma-separated hosts that bypass the proxy.
    fn set_no_proxy(&mut self, no_proxy: &str);
    /// Outgoing network interface.
    fn set_interface(&mut self, interface: &str);
    /// Connect over a Unix domain socket instead of TCP. Returns `false`
    /// when the engine was built without Unix socket support.
    fn set_unix_socket(&mut self, path: &str) -> bool;
    /// TCP keepalive probing.
    fn set_tcp_keepalive(&mut self, idle: Duration, interval: Duration);
    /// Abort window of the low-speed watchdog, in seconds.
    fn set_low_speed_time(&mut self, secs: u64);
    /// Bytes-per-second floor of the low-speed watchdog.
    fn set_low_speed_limit(&mut self, limit: u64);
    /// `Accept-Encoding` negotiation handled by the engine.
    fn set_accept_encoding(&mut self, encoding: &str);
    /// Engine-level debug output.
    fn set_verbose(&mut self, verbose: bool);
    /// Publishes the outgoing header lines.
    fn set_headers(&mut self, lines: &[String]);
    /// Fixed request body of known size; the upload callback is bypassed.
    fn set_post_body(&mut self, body: Bytes);
    /// Streamed upload through [`TransferHooks::on_upload`], with the
    /// expected total size when one was declared.
    fn set_upload(&mut self, expected: Option<u64>);

    /// Submits the transfer to the engine's multi pool. `hooks` receives
    /// every callback for this transfer from here on.
    fn submit(&mut self, hooks: Rc<dyn TransferHooks>) -> crate::Result<()>;

    /// Resumes an upload stalled by [`UploadChunk::Pause`].
    fn resume_send(&mut self);

    /// HTTP response code of the last response, 0 if none arrived.
    fn response_code(&self) -> u16;
    /// OS errno behind the last failure, 0 if none applies.
    fn os_errno(&self) -> i32;
}

/// Callbacks a transfer reports progress through.
///
/// Within one transfer, header callbacks of a response happen before its
/// body callbacks, and [`on_done`](TransferHooks::on_done) happens after
/// everything else.
pub trait TransferHooks {
    /// Raw header bytes of the response observed after `redirect_count`
    /// intermediate responses. Returning `false` aborts the transfer with
    /// a write error.
    fn on_header(&self, redirect_count: u32, chunk: &[u8]) -> bool;
    /// Response body bytes, in wire order. Returning `false` aborts the
    /// transfer with a write error.
    fn on_body(&self, chunk: &[u8]) -> bool;
    /// The engine wants outgoing body bytes copied into `buf`.
    fn on_upload(&self, buf: &mut [u8]) -> UploadChunk;
    /// The transfer reached a terminal state.
    fn on_done(&self, code: TerminalCode);
}

/// Outcome of one [`TransferHooks::on_upload`] request for bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadChunk {
    /// This many bytes were copied into the engine's buffer.
    Copied(usize),
    /// No bytes available; stall the upload until
    /// [`Transfer::resume_send`].
    Pause,
    /// The upload is complete.
    Eof,
}

/// Terminal code of a finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCode {
    /// The transfer completed and a response code is available.
    Ok,
    /// TLS peer verification failed.
    PeerVerification,
    /// The transfer exceeded an engine-side time budget.
    TimedOut,
    /// The server closed the connection without a response.
    GotNothing,
    /// Proxy name resolution failed.
    ResolveProxy,
    /// Host name resolution failed.
    ResolveHost,
    /// The connection could not be established.
    Connect,
    /// A receive-side callback refused bytes.
    Write,
    /// The response carried an unrecognized content encoding.
    BadEncoding,
    /// The engine ran out of memory.
    OutOfMemory,
    /// Any other engine failure, with the engine's message.
    Other(String),
}

impl TerminalCode {
    /// Human-readable description in the engine error-string register.
    pub fn description(&self) -> &str {
        match self {
            TerminalCode::Ok => "no error",
            TerminalCode::PeerVerification => "SSL peer certificate was not OK",
            TerminalCode::TimedOut => "timeout was reached",
            TerminalCode::GotNothing => "server returned nothing (no headers, no data)",
            TerminalCode::ResolveProxy => "couldn't resolve proxy name",
            TerminalCode::ResolveHost => "couldn't resolve host name",
            TerminalCode::Connect => "couldn't connect to server",
            TerminalCode::Write => "failed writing received data to the application",
            TerminalCode::BadEncoding => "unrecognized or bad HTTP content or transfer encoding",
            TerminalCode::OutOfMemory => "out of memory",
            TerminalCode::Other(message) => message,
        }
    }
}
