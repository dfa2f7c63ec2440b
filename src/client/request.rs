use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use tracing::{debug, trace};

use super::headers::HeaderSet;
use super::transfer::TransferState;
use super::Shared;
use crate::common::buf::IBuf;
use crate::engine::{TerminalCode, Transfer, TransferHooks};
use crate::error::Error;
use crate::rt;

/// One HTTP request and, once finished, its response.
///
/// A request is bound to the task that starts it and is not shared across
/// tasks. Dropping it releases the engine handle and every buffer,
/// whatever state it got to.
pub struct Request {
    client: Rc<Shared>,
    pub(super) transfer: Box<dyn Transfer>,
    pub(super) state: Rc<TransferState>,
    headers: HeaderSet,
    /// Pull-side staging buffer for streamed reads, owned by the reader.
    pub(super) io_recv: IBuf,
    method: Method,
    content_length: Option<u64>,
    keep_alive_timeout: u64,
    pub(super) status: u16,
    reason: String,
}

impl Request {
    pub(super) fn new(shared: &Rc<Shared>, method: Method, url: &str) -> crate::Result<Request> {
        let mut transfer = shared.engine.transfer()?;
        let mut headers = HeaderSet::new();

        match method {
            Method::GET => transfer.set_get(),
            Method::HEAD => transfer.set_nobody(),
            Method::POST | Method::PUT | Method::PATCH => {
                // An empty fixed body keeps the upload callback out of the
                // picture until set_body or set_io opts back in.
                transfer.set_post();
                transfer.set_post_body(Bytes::new());
                transfer.set_custom_verb(method.as_str());
                headers.set_accept = true;
            }
            _ => transfer.set_custom_verb(method.as_str()),
        }

        transfer.set_url(url);
        transfer.set_follow_location(true);
        transfer.set_verify_peer(true);

        trace!(%method, url, "request created");
        shared.track_request();

        Ok(Request {
            client: Rc::clone(shared),
            transfer,
            state: Rc::new(TransferState::new()),
            headers,
            io_recv: IBuf::new(),
            method,
            content_length: None,
            keep_alive_timeout: 0,
            status: 0,
            reason: String::new(),
        })
    }

    /// Appends one outgoing header line, e.g. `"Accept: */*"`.
    ///
    /// Supplying an auto-managed header (`Accept`, `Connection`,
    /// `Keep-Alive`) suppresses the automatic one. A `Content-Length`
    /// header also declares the outgoing body size; its value must be a
    /// non-negative integer.
    pub fn set_header(&mut self, line: &str) -> crate::Result<()> {
        if let Some(declared) = self.headers.push(line)? {
            self.content_length = Some(declared);
        }
        Ok(())
    }

    /// Sets a fixed request body of known size and emits the matching
    /// `Content-Length` header.
    pub fn set_body(&mut self, body: &[u8]) -> crate::Result<()> {
        self.transfer.set_post_body(Bytes::copy_from_slice(body));
        self.set_header(&format!("Content-Length: {}", body.len()))
    }

    /// Switches the request into streaming mode.
    ///
    /// Body-carrying methods (`POST`, `PUT`, `PATCH`) get an upload
    /// channel fed by [`io_write`](Request::io_write); every other method
    /// only streams the response out through
    /// [`io_read`](Request::io_read).
    pub fn set_io(&mut self) -> crate::Result<()> {
        if self.state.io.get() {
            return Err(Error::new_already_streaming());
        }
        self.state.io.set(true);

        match self.method {
            Method::POST | Method::PUT | Method::PATCH => {
                self.transfer.set_upload(self.content_length);
                self.state.io_send.set(true);
                self.state.io_send_closed.set(false);
            }
            _ => {
                self.state.io_send.set(false);
                self.state.io_send_closed.set(true);
            }
        }
        Ok(())
    }

    /// TCP keepalive probing; a no-op unless both durations are at least
    /// one second. Also arms the `Keep-Alive: timeout=<idle>` auto header.
    pub fn set_keepalive(&mut self, idle: Duration, interval: Duration) {
        if idle.as_secs() > 0 && interval.as_secs() > 0 {
            self.transfer.set_tcp_keepalive(idle, interval);
            self.keep_alive_timeout = idle.as_secs();
        }
    }

    /// Directory of trusted CA certificates.
    pub fn set_ca_path(&mut self, path: &str) {
        self.transfer.set_ca_path(path);
    }

    /// File of trusted CA certificates.
    pub fn set_ca_file(&mut self, file: &str) {
        self.transfer.set_ca_file(file);
    }

    /// Client private key path.
    pub fn set_ssl_key(&mut self, path: &str) {
        self.transfer.set_ssl_key(path);
    }

    /// Client certificate path.
    pub fn set_ssl_cert(&mut self, path: &str) {
        self.transfer.set_ssl_cert(path);
    }

    /// TLS host name verification.
    pub fn set_verify_host(&mut self, verify: bool) {
        self.transfer.set_verify_host(verify);
    }

    /// TLS peer certificate verification.
    pub fn set_verify_peer(&mut self, verify: bool) {
        self.transfer.set_verify_peer(verify);
    }

    /// Proxy host.
    pub fn set_proxy(&mut self, proxy: &str) {
        self.transfer.set_proxy(proxy);
    }

    /// Proxy port.
    pub fn set_proxy_port(&mut self, port: u16) {
        self.transfer.set_proxy_port(port);
    }

    /// `user:password` for proxy authentication.
    pub fn set_proxy_user_pwd(&mut self, user_pwd: &str) {
        self.transfer.set_proxy_user_pwd(user_pwd);
    }

    /// Comma-separated hosts that bypass the proxy.
    pub fn set_no_proxy(&mut self, no_proxy: &str) {
        self.transfer.set_no_proxy(no_proxy);
    }

    /// Outgoing network interface.
    pub fn set_interface(&mut self, interface: &str) {
        self.transfer.set_interface(interface);
    }

    /// Connects over a Unix domain socket instead of TCP.
    ///
    /// Fails when the engine was built without Unix socket support.
    pub fn set_unix_socket(&mut self, path: &str) -> crate::Result<()> {
        if self.transfer.set_unix_socket(path) {
            Ok(())
        } else {
            Err(Error::new_unix_socket_unsupported())
        }
    }

    /// Abort window of the low-speed watchdog, in seconds.
    pub fn set_low_speed_time(&mut self, secs: u64) {
        self.transfer.set_low_speed_time(secs);
    }

    /// Bytes-per-second floor of the low-speed watchdog.
    pub fn set_low_speed_limit(&mut self, limit: u64) {
        self.transfer.set_low_speed_limit(limit);
    }

    /// `Accept-Encoding` negotiation handled by the engine.
    pub fn set_accept_encoding(&mut self, encoding: &str) {
        self.transfer.set_accept_encoding(encoding);
    }

    /// Whether the engine follows redirects itself. On by default.
    pub fn set_follow_location(&mut self, follow: bool) {
        self.transfer.set_follow_location(follow);
    }

    /// Engine-level debug output.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.transfer.set_verbose(verbose);
    }

    /// Starts the transfer.
    ///
    /// Appends the auto-managed headers, publishes the header list and
    /// submits the transfer. A streaming request additionally waits up to
    /// `timeout` for the response to get under way (or for the transfer
    /// to complete outright).
    pub async fn start(&mut self, timeout: Duration) -> crate::Result<()> {
        if self.headers.set_accept {
            self.set_header("Accept: */*")?;
        }
        if self.headers.set_connection {
            let line = if self.keep_alive_timeout > 0 {
                "Connection: Keep-Alive"
            } else {
                "Connection: close"
            };
            self.set_header(line)?;
        }
        if self.headers.set_keep_alive && self.keep_alive_timeout > 0 {
            self.set_header(&format!("Keep-Alive: timeout={}", self.keep_alive_timeout))?;
        }

        self.transfer.set_headers(self.headers.lines());

        self.client.update_stats(|stats| stats.total_requests += 1);

        let hooks: Rc<dyn TransferHooks> = self.state.clone();
        self.state.in_progress.set(true);
        if let Err(err) = self.transfer.submit(hooks) {
            self.state.in_progress.set(false);
            return Err(err);
        }
        debug!(method = %self.method, "transfer submitted");

        if self.state.io.get() && self.state.in_progress.get() {
            let deadline = rt::deadline(timeout);
            if let Err(err) = self.state.headers_cond().wait_deadline(deadline).await {
                // Best effort to reap the transfer before reporting.
                let _ = self.finish(Duration::ZERO).await;
                return Err(err);
            }
        }

        if self.state.io.get() && !self.state.in_progress.get() {
            return self.finish(Duration::ZERO).await;
        }

        Ok(())
    }

    /// Awaits the terminal state and classifies the outcome.
    ///
    /// Classified transport failures finish the request with a synthetic
    /// [`status`](Request::status) (408, 444, 495, 595) and return `Ok`;
    /// only resource exhaustion, unclassified engine failures and an
    /// expired deadline report an error.
    pub async fn finish(&mut self, timeout: Duration) -> crate::Result<()> {
        let deadline = rt::deadline(timeout);
        while self.state.in_progress.get() {
            self.state.done_cond.wait_deadline(deadline).await?;
        }

        let code = match self.state.terminal() {
            Some(code) => code,
            None => return Err(Error::new_not_started()),
        };

        self.classify(code)
    }

    /// Runs the whole request in one shot: `start`, then `finish`.
    pub async fn execute(&mut self, timeout: Duration) -> crate::Result<()> {
        self.start(timeout).await?;
        self.finish(timeout).await
    }

    fn classify(&mut self, code: TerminalCode) -> crate::Result<()> {
        match code {
            TerminalCode::Ok => {
                self.status = self.transfer.response_code();
                self.reason = if (100..400).contains(&self.status) {
                    "Ok".to_owned()
                } else {
                    "Unknown".to_owned()
                };
                if self.status == 200 {
                    self.client.update_stats(|stats| stats.http_200_responses += 1);
                } else {
                    self.client.update_stats(|stats| stats.http_other_responses += 1);
                }
            }
            TerminalCode::PeerVerification => self.fail_with(495, &code),
            TerminalCode::TimedOut => self.fail_with(408, &code),
            TerminalCode::GotNothing => self.fail_with(444, &code),
            TerminalCode::ResolveProxy
            | TerminalCode::ResolveHost
            | TerminalCode::Connect
            | TerminalCode::Write
            | TerminalCode::BadEncoding => self.fail_with(595, &code),
            TerminalCode::OutOfMemory => {
                self.client.update_stats(|stats| stats.failed_requests += 1);
                return Err(Error::new_resource());
            }
            TerminalCode::Other(ref message) => {
                self.client.update_stats(|stats| stats.failed_requests += 1);
                return Err(Error::new_system(self.transfer.os_errno(), message.clone()));
            }
        }
        debug!(status = self.status, reason = %self.reason, "request finished");
        Ok(())
    }

    /// Synthetic status for a classified transport failure.
    fn fail_with(&mut self, status: u16, code: &TerminalCode) {
        self.status = status;
        self.reason = code.description().to_owned();
        self.client.update_stats(|stats| stats.failed_requests += 1);
        debug!(status, reason = %self.reason, "request classified as failed");
    }

    /// The HTTP status, 0 until the request finished.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Classification string of the finished request.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Number of intermediate responses the engine followed.
    pub fn redirect_count(&self) -> u32 {
        self.state.redirect_count.get()
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The accumulated response body, draining it.
    ///
    /// Streamed requests consume the body through
    /// [`io_read`](Request::io_read) instead.
    pub fn response_body(&self) -> Bytes {
        let mut recv = self.state.recv.borrow_mut();
        let body = recv.join();
        recv.clear();
        body
    }

    /// The raw header block of the final response. Responses of
    /// intermediate redirect hops are not included.
    pub fn response_headers(&self) -> Bytes {
        self.state.resp_headers.borrow_mut().join()
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        self.client.release_request();
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("status", &self.status)
            .field("io", &self.state.io.get())
            .field("in_progress", &self.state.in_progress.get())
            .finish()
    }
}
