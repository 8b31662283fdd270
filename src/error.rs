use crate::schema::ParameterType;
use crate::sys::RsError;
use std::path::PathBuf;
use thiserror::Error;

/// A non-success status reported by a call into the library
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum Status {
    #[error("RenderStream is not initialised")]
    NotInitialised,
    #[error("RenderStream is already initialised")]
    AlreadyInitialised,
    #[error("invalid handle")]
    InvalidHandle,
    #[error("maximum number of frame senders reached")]
    MaxSendersReached,
    #[error("bad stream type")]
    BadStreamType,
    #[error("not found")]
    NotFound,
    #[error("incorrect schema")]
    IncorrectSchema,
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("buffer overflow")]
    BufferOverflow,
    #[error("timed out")]
    Timeout,
    #[error("streams changed")]
    StreamsChanged,
    #[error("incompatible version")]
    IncompatibleVersion,
    #[error("failed to get DX device from resource")]
    FailedToGetDxDeviceFromResource,
    #[error("failed to initialise GPGPU interop")]
    FailedToInitialiseGpGpu,
    #[error("quit requested")]
    Quit,
    #[error("unspecified error (code {0})")]
    Unspecified(u32),
}

impl Status {
    /// Map a raw status to `Ok` on success. Unknown codes become `Unspecified`.
    pub fn check(code: RsError) -> Result<(), Status> {
        Err(match code {
            RsError::SUCCESS => return Ok(()),
            RsError::NOT_INITIALISED => Self::NotInitialised,
            RsError::ALREADY_INITIALISED => Self::AlreadyInitialised,
            RsError::INVALID_HANDLE => Self::InvalidHandle,
            RsError::MAX_SENDERS_REACHED => Self::MaxSendersReached,
            RsError::BAD_STREAM_TYPE => Self::BadStreamType,
            RsError::NOT_FOUND => Self::NotFound,
            RsError::INCORRECT_SCHEMA => Self::IncorrectSchema,
            RsError::INVALID_PARAMETERS => Self::InvalidParameters,
            RsError::BUFFER_OVERFLOW => Self::BufferOverflow,
            RsError::TIMEOUT => Self::Timeout,
            RsError::STREAMS_CHANGED => Self::StreamsChanged,
            RsError::INCOMPATIBLE_VERSION => Self::IncompatibleVersion,
            RsError::FAILED_TO_GET_DXDEVICE_FROM_RESOURCE => Self::FailedToGetDxDeviceFromResource,
            RsError::FAILED_TO_INITIALISE_GPGPU => Self::FailedToInitialiseGpGpu,
            RsError::QUIT => Self::Quit,
            RsError(other) => Self::Unspecified(other),
        })
    }

    /// The raw code for this status
    pub fn code(self) -> RsError {
        match self {
            Self::NotInitialised => RsError::NOT_INITIALISED,
            Self::AlreadyInitialised => RsError::ALREADY_INITIALISED,
            Self::InvalidHandle => RsError::INVALID_HANDLE,
            Self::MaxSendersReached => RsError::MAX_SENDERS_REACHED,
            Self::BadStreamType => RsError::BAD_STREAM_TYPE,
            Self::NotFound => RsError::NOT_FOUND,
            Self::IncorrectSchema => RsError::INCORRECT_SCHEMA,
            Self::InvalidParameters => RsError::INVALID_PARAMETERS,
            Self::BufferOverflow => RsError::BUFFER_OVERFLOW,
            Self::Timeout => RsError::TIMEOUT,
            Self::StreamsChanged => RsError::STREAMS_CHANGED,
            Self::IncompatibleVersion => RsError::INCOMPATIBLE_VERSION,
            Self::FailedToGetDxDeviceFromResource => RsError::FAILED_TO_GET_DXDEVICE_FROM_RESOURCE,
            Self::FailedToInitialiseGpGpu => RsError::FAILED_TO_INITIALISE_GPGPU,
            Self::Quit => RsError::QUIT,
            Self::Unspecified(code) => RsError(code),
        }
    }
}

/// Everything that can go wrong on the client side of the library boundary
#[derive(Debug, Error)]
pub enum Error {
    #[error("error calling {call}: {status}")]
    Status { call: &'static str, status: Status },
    #[error("could not locate the RenderStream library: {0}")]
    LibraryNotFound(String),
    #[error("failed to read registry value '{value}': error code {code}")]
    Registry { value: &'static str, code: u32 },
    #[error("failed to load library '{}'", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("failed to get function {name} from library")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("{call} kept reporting buffer overflow after {attempts} attempts")]
    RetriesExhausted { call: &'static str, attempts: usize },
    #[error("invalid data returned by {call}: {reason}")]
    InvalidBuffer { call: &'static str, reason: String },
    #[error("unknown parameter key '{0}'")]
    KeyNotFound(String),
    #[error("parameter '{key}' is {actual:?}, not {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: ParameterType,
    },
    #[error("scene index {index} out of range ({count} scenes)")]
    SceneOutOfRange { index: u32, count: usize },
    #[error("string {0:?} cannot be passed to the library")]
    InvalidString(String),
}

impl Error {
    pub(crate) fn status(call: &'static str, status: Status) -> Self {
        Self::Status { call, status }
    }

    pub(crate) fn invalid_buffer(call: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidBuffer {
            call,
            reason: reason.into(),
        }
    }

    /// The library status behind this error, if any
    pub fn status_code(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.status_code() == Some(Status::Timeout)
    }

    pub fn is_streams_changed(&self) -> bool {
        self.status_code() == Some(Status::StreamsChanged)
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(Status::NotFound)
    }

    pub fn is_quit(&self) -> bool {
        self.status_code() == Some(Status::Quit)
    }
}

/// Turn a raw status into a `Result`, naming the call for context
pub(crate) fn check(call: &'static str, code: RsError) -> Result<(), Error> {
    Status::check(code).map_err(|status| Error::status(call, status))
}
