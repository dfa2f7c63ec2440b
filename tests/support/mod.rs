//! A scripted transfer engine for the integration tests.
//!
//! Each transfer handle pops the next script and plays it on a local task
//! once submitted. Every option that reaches the engine is recorded so
//! tests can assert on what the core actually published.

#![allow(dead_code)] // each test binary uses a subset

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use muxhttp::engine::{MultiEngine, TerminalCode, Transfer, TransferHooks, UploadChunk};
use muxhttp::{Client, Error};
use tokio::sync::Notify;
use tokio::task;
use tokio::time;

/// What one transfer does once submitted.
#[derive(Clone)]
pub enum Script {
    /// Serve a response, possibly after redirect hops and a delay.
    Reply(Reply),
    /// Drain the upload channel, then reply 200 with the collected bytes.
    /// With `stall_after`, the engine goes silent once that many upload
    /// bytes were collected.
    Echo { stall_after: Option<usize> },
    /// Report a terminal failure after `after`.
    Fails {
        code: TerminalCode,
        errno: i32,
        after: Duration,
    },
    /// Accept the submission and never complete.
    Stall,
    /// Reject the submission itself.
    RejectSubmit,
}

#[derive(Clone)]
pub struct Reply {
    pub status: u16,
    /// Header blocks, one per hop; the last one is the final response.
    pub hops: Vec<Vec<u8>>,
    pub body: Vec<Vec<u8>>,
    pub delay: Duration,
    /// Quiet time between body chunks.
    pub gap: Duration,
}

impl Reply {
    pub fn ok(body: &[u8]) -> Reply {
        Reply {
            status: 200,
            hops: vec![b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\n\r\n".to_vec()],
            body: vec![body.to_vec()],
            delay: Duration::ZERO,
            gap: Duration::ZERO,
        }
    }

    pub fn chunked(chunks: &[&[u8]]) -> Reply {
        Reply {
            body: chunks.iter().map(|c| c.to_vec()).collect(),
            ..Reply::ok(b"")
        }
    }

    pub fn redirected(final_block: &[u8], body: &[u8]) -> Reply {
        Reply {
            hops: vec![
                b"HTTP/1.1 301 Moved Permanently\r\nlocation: /final\r\n\r\n".to_vec(),
                final_block.to_vec(),
            ],
            ..Reply::ok(body)
        }
    }
}

/// Everything one transfer recorded.
#[derive(Default)]
pub struct Recorded {
    pub url: RefCell<String>,
    pub verb: RefCell<Option<String>>,
    pub get: Cell<bool>,
    pub nobody: Cell<bool>,
    pub post: Cell<bool>,
    pub headers: RefCell<Vec<String>>,
    pub post_body: RefCell<Option<Bytes>>,
    pub upload: Cell<bool>,
    pub upload_expected: Cell<Option<u64>>,
    pub follow_location: Cell<bool>,
    pub verify_peer: Cell<bool>,
    pub verify_host: Cell<bool>,
    pub tcp_keepalive: Cell<Option<(Duration, Duration)>>,
    pub unix_socket: RefCell<Option<String>>,
    pub submitted: Cell<bool>,
    pub resumes: Cell<u32>,
    pub uploaded: RefCell<Vec<u8>>,
}

impl Recorded {
    pub fn has_header(&self, line: &str) -> bool {
        self.headers.borrow().iter().any(|h| h == line)
    }
}

pub struct Handle {
    transfers: Rc<RefCell<Vec<Rc<Recorded>>>>,
}

impl Handle {
    pub fn transfer(&self, index: usize) -> Rc<Recorded> {
        Rc::clone(&self.transfers.borrow()[index])
    }
}

pub struct ScriptedEngine {
    unix_sockets: bool,
    scripts: RefCell<VecDeque<Script>>,
    transfers: Rc<RefCell<Vec<Rc<Recorded>>>>,
}

impl MultiEngine for ScriptedEngine {
    fn transfer(&self) -> muxhttp::Result<Box<dyn Transfer>> {
        let script = self
            .scripts
            .borrow_mut()
            .pop_front()
            .expect("no script left for transfer");
        let rec = Rc::new(Recorded::default());
        self.transfers.borrow_mut().push(Rc::clone(&rec));
        Ok(Box::new(ScriptedTransfer {
            script,
            unix_sockets: self.unix_sockets,
            rec,
            wire: Rc::new(Wire::default()),
        }))
    }
}

/// State shared between the transfer handle and its driver task.
#[derive(Default)]
struct Wire {
    resume: Notify,
    response_code: Cell<u16>,
    os_errno: Cell<i32>,
}

struct ScriptedTransfer {
    script: Script,
    unix_sockets: bool,
    rec: Rc<Recorded>,
    wire: Rc<Wire>,
}

impl Transfer for ScriptedTransfer {
    fn set_url(&mut self, url: &str) {
        *self.rec.url.borrow_mut() = url.to_owned();
    }

    fn set_get(&mut self) {
        self.rec.get.set(true);
    }

    fn set_nobody(&mut self) {
        self.rec.nobody.set(true);
    }

    fn set_post(&mut self) {
        self.rec.post.set(true);
    }

    fn set_custom_verb(&mut self, verb: &str) {
        *self.rec.verb.borrow_mut() = Some(verb.to_owned());
    }

    fn set_follow_location(&mut self, follow: bool) {
        self.rec.follow_location.set(follow);
    }

    fn set_verify_host(&mut self, verify: bool) {
        self.rec.verify_host.set(verify);
    }

    fn set_verify_peer(&mut self, verify: bool) {
        self.rec.verify_peer.set(verify);
    }

    fn set_ca_path(&mut self, _path: &str) {}
    fn set_ca_file(&mut self, _file: &str) {}
    fn set_ssl_key(&mut self, _path: &str) {}
    fn set_ssl_cert(&mut self, _path: &str) {}
    fn set_proxy(&mut self, _proxy: &str) {}
    fn set_proxy_port(&mut self, _port: u16) {}
    fn set_proxy_user_pwd(&mut self, _user_pwd: &str) {}
    fn set_no_proxy(&mut self, _no_proxy: &str) {}
    fn set_interface(&mut self, _interface: &str) {}

    fn set_unix_socket(&mut self, path: &str) -> bool {
        if self.unix_sockets {
            *self.rec.unix_socket.borrow_mut() = Some(path.to_owned());
        }
        self.unix_sockets
    }

    fn set_tcp_keepalive(&mut self, idle: Duration, interval: Duration) {
        self.rec.tcp_keepalive.set(Some((idle, interval)));
    }

    fn set_low_speed_time(&mut self, _secs: u64) {}
    fn set_low_speed_limit(&mut self, _limit: u64) {}
    fn set_accept_encoding(&mut self, _encoding: &str) {}
    fn set_verbose(&mut self, _verbose: bool) {}

    fn set_headers(&mut self, lines: &[String]) {
        *self.rec.headers.borrow_mut() = lines.to_vec();
    }

    fn set_post_body(&mut self, body: Bytes) {
        *self.rec.post_body.borrow_mut() = Some(body);
    }

    fn set_upload(&mut self, expected: Option<u64>) {
        self.rec.upload.set(true);
        self.rec.upload_expected.set(expected);
    }

    fn submit(&mut self, hooks: Rc<dyn TransferHooks>) -> muxhttp::Result<()> {
        if let Script::RejectSubmit = self.script {
            return Err(Error::new_engine("scripted submit failure"));
        }
        self.rec.submitted.set(true);
        let script = self.script.clone();
        let wire = Rc::clone(&self.wire);
        let rec = Rc::clone(&self.rec);
        task::spawn_local(drive(script, hooks, wire, rec));
        Ok(())
    }

    fn resume_send(&mut self) {
        self.rec.resumes.set(self.rec.resumes.get() + 1);
        self.wire.resume.notify_one();
    }

    fn response_code(&self) -> u16 {
        self.wire.response_code.get()
    }

    fn os_errno(&self) -> i32 {
        self.wire.os_errno.get()
    }
}

async fn drive(script: Script, hooks: Rc<dyn TransferHooks>, wire: Rc<Wire>, rec: Rc<Recorded>) {
    match script {
        Script::Reply(reply) => {
            if !reply.delay.is_zero() {
                time::sleep(reply.delay).await;
            }
            for (hop, block) in reply.hops.iter().enumerate() {
                // Header callbacks arrive line by line, like a real engine.
                for line in block.split_inclusive(|&b| b == b'\n') {
                    hooks.on_header(hop as u32, line);
                }
                task::yield_now().await;
            }
            let mut first = true;
            for chunk in &reply.body {
                if !first && !reply.gap.is_zero() {
                    time::sleep(reply.gap).await;
                }
                first = false;
                hooks.on_body(chunk);
                task::yield_now().await;
            }
            wire.response_code.set(reply.status);
            hooks.on_done(TerminalCode::Ok);
        }
        Script::Echo { stall_after } => {
            let mut collected = Vec::new();
            loop {
                let mut buf = [0u8; 16 * 1024];
                match hooks.on_upload(&mut buf) {
                    UploadChunk::Copied(n) => {
                        collected.extend_from_slice(&buf[..n]);
                        *rec.uploaded.borrow_mut() = collected.clone();
                        if stall_after.map_or(false, |limit| collected.len() >= limit) {
                            std::future::pending::<()>().await;
                        }
                        task::yield_now().await;
                    }
                    UploadChunk::Pause => wire.resume.notified().await,
                    UploadChunk::Eof => break,
                }
            }
            hooks.on_header(0, b"HTTP/1.1 200 OK\r\n");
            hooks.on_header(0, b"\r\n");
            task::yield_now().await;
            hooks.on_body(&collected);
            wire.response_code.set(200);
            hooks.on_done(TerminalCode::Ok);
        }
        Script::Fails { code, errno, after } => {
            if !after.is_zero() {
                time::sleep(after).await;
            }
            wire.os_errno.set(errno);
            hooks.on_done(code);
        }
        Script::Stall => std::future::pending::<()>().await,
        Script::RejectSubmit => unreachable!("rejected at submit"),
    }
}

/// A client over a scripted engine, plus a handle to what it records.
pub fn client(scripts: Vec<Script>) -> (Client, Handle) {
    client_cfg(scripts, true)
}

pub fn client_cfg(scripts: Vec<Script>, unix_sockets: bool) -> (Client, Handle) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let transfers = Rc::new(RefCell::new(Vec::new()));
    let engine = ScriptedEngine {
        unix_sockets,
        scripts: RefCell::new(scripts.into()),
        transfers: Rc::clone(&transfers),
    };
    (Client::new(Box::new(engine)), Handle { transfers })
}

/// Runs `fut` on a `LocalSet` so the scripted engine can spawn drivers.
pub async fn run<F: Future>(fut: F) -> F::Output {
    task::LocalSet::new().run_until(fut).await
}
