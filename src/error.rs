//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;

/// Result type often returned from methods that can have muxhttp `Error`s.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur while issuing requests.
///
/// Note that classified transport failures are not errors: they finish the
/// request with a synthetic status instead.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
    errno: Option<i32>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Caller misuse of the request API.
    User(User),
    /// Memory or pool exhaustion reported by the engine.
    Resource,
    /// An unclassified engine failure, with the OS errno when one applies.
    System,
    /// A deadline expired with work still pending.
    TimedOut,
    /// The engine rejected a transfer submission.
    Engine,
}

#[derive(Debug)]
pub(crate) enum User {
    /// A header line exceeds the formatting bound.
    HeaderTooLarge,
    /// A `Content-Length` value is not a non-negative integer.
    ContentLengthInvalid,
    /// Streaming operation on a request not in streaming mode.
    NotStreaming,
    /// `set_io` called on a request already in streaming mode.
    AlreadyStreaming,
    /// `io_write` on a request whose method carries no body.
    BodylessUpload,
    /// The engine was built without Unix socket support.
    UnixSocketUnsupported,
    /// `finish` on a request that was never started.
    NotStarted,
}

impl Error {
    /// Returns true if this error was caused by caller misuse.
    pub fn is_illegal_params(&self) -> bool {
        matches!(self.inner.kind, Kind::User(_))
    }

    /// Returns true if this error was caused by resource exhaustion.
    pub fn is_resource(&self) -> bool {
        matches!(self.inner.kind, Kind::Resource)
    }

    /// Returns true if this error wraps an underlying OS failure.
    pub fn is_system(&self) -> bool {
        matches!(self.inner.kind, Kind::System)
    }

    /// Returns true if this error was caused by an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::TimedOut)
    }

    /// Returns true if the engine refused a transfer submission.
    pub fn is_engine(&self) -> bool {
        matches!(self.inner.kind, Kind::Engine)
    }

    /// The OS errno attached by the engine, if any.
    pub fn os_errno(&self) -> Option<i32> {
        self.inner.errno
    }

    /// An error for engine implementations to report a failed submission.
    pub fn new_engine<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Engine).with(cause)
    }

    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl {
                kind,
                cause: None,
                errno: None,
            }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    fn new_user(user: User) -> Error {
        Error::new(Kind::User(user))
    }

    pub(crate) fn new_header_too_large() -> Error {
        Error::new_user(User::HeaderTooLarge)
    }

    pub(crate) fn new_content_length_invalid() -> Error {
        Error::new_user(User::ContentLengthInvalid)
    }

    pub(crate) fn new_not_streaming() -> Error {
        Error::new_user(User::NotStreaming)
    }

    pub(crate) fn new_already_streaming() -> Error {
        Error::new_user(User::AlreadyStreaming)
    }

    pub(crate) fn new_bodyless_upload() -> Error {
        Error::new_user(User::BodylessUpload)
    }

    pub(crate) fn new_unix_socket_unsupported() -> Error {
        Error::new_user(User::UnixSocketUnsupported)
    }

    pub(crate) fn new_not_started() -> Error {
        Error::new_user(User::NotStarted)
    }

    pub(crate) fn new_resource() -> Error {
        Error::new(Kind::Resource)
    }

    pub(crate) fn new_timed_out() -> Error {
        Error::new(Kind::TimedOut)
    }

    pub(crate) fn new_system(errno: i32, description: String) -> Error {
        let mut err = Error::new(Kind::System).with(description);
        err.inner.errno = if errno != 0 { Some(errno) } else { None };
        err
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::User(User::HeaderTooLarge) => "header is too large",
            Kind::User(User::ContentLengthInvalid) => {
                "Content-Length header value must be a non-negative integer"
            }
            Kind::User(User::NotStreaming) => "io: request must be io",
            Kind::User(User::AlreadyStreaming) => "io: request is already io",
            Kind::User(User::BodylessUpload) => "io: HTTP request method with no body to send",
            Kind::User(User::UnixSocketUnsupported) => {
                "engine was built without unix socket support"
            }
            Kind::User(User::NotStarted) => "request was never started",
            Kind::Resource => "out of memory",
            Kind::System => "engine system error",
            Kind::TimedOut => "timed out",
            Kind::Engine => "engine refused the transfer",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("muxhttp::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}
