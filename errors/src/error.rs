use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Request,
    Spider,
    Scheduler,
    Queue,
    Proxy,
    Storage,
    Stage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Request => write!(f, "request"),
            ErrorKind::Spider => write!(f, "spider"),
            ErrorKind::Scheduler => write!(f, "scheduler"),
            ErrorKind::Queue => write!(f, "queue"),
            ErrorKind::Proxy => write!(f, "proxy"),
            ErrorKind::Storage => write!(f, "storage"),
            ErrorKind::Stage => write!(f, "stage"),
        }
    }
}

pub struct ErrorInner {
    pub kind: ErrorKind,
    pub source: Option<BoxError>,
    pub message: Option<String>,
}

pub struct Error {
    pub inner: Box<ErrorInner>,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: None,
            }),
        }
    }

    pub fn with_message<E>(kind: ErrorKind, message: String, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: Some(message),
            }),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    pub fn is_request(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Request)
    }

    pub fn is_spider(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Spider)
    }

    pub fn is_scheduler(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Scheduler)
    }

    pub fn is_queue(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Queue)
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Proxy)
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Storage)
    }

    pub fn is_stage(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Stage)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("crawler_core::Error");
        f.field("kind", &self.inner.kind);
        if let Some(ref message) = self.inner.message {
            f.field("message", message);
        }
        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref message) = self.inner.message {
            write!(f, "{} error: {}", self.inner.kind, message)?;
        } else {
            write!(f, "{} error", self.inner.kind)?;
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| &**e as &(dyn StdError + 'static))
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::new(ErrorKind::Request, Some(err))
    }
}

impl From<SpiderError> for Error {
    fn from(err: SpiderError) -> Self {
        Error::new(ErrorKind::Spider, Some(err))
    }
}

impl From<SchedulerError> for Error {
    fn from(err: SchedulerError) -> Self {
        Error::new(ErrorKind::Scheduler, Some(err))
    }
}

impl From<QueueError> for Error {
    fn from(err: QueueError) -> Self {
        Error::new(ErrorKind::Queue, Some(err))
    }
}

impl From<ProxyError> for Error {
    fn from(err: ProxyError) -> Self {
        Error::new(ErrorKind::Proxy, Some(err))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::new(ErrorKind::Storage, Some(err))
    }
}

impl From<StageError> for Error {
    fn from(err: StageError) -> Self {
        Error::new(ErrorKind::Stage, Some(err))
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("downloader '{0}' requires a RedialRegExp header")]
    MissingRedialPattern(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported dispatch policy on request {0}")]
    UnsupportedPolicy(String),
}

#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("invalid spider id: {0}")]
    InvalidId(String),
    #[error("initialize hook failed")]
    InitHookFailed(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("enqueue failed")]
    EnqueueFailed(#[source] BoxError),
    #[error("dequeue failed")]
    DequeueFailed(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("payload not serializable")]
    SerializationFailed(#[source] BoxError),
    #[error("payload not deserializable")]
    DeserializationFailed(#[source] BoxError),
    #[error("connection failed")]
    ConnectionFailed,
    #[error("publish to topic failed")]
    PushFailed(#[source] BoxError),
    #[error("receive from topic failed")]
    PopFailed(#[source] BoxError),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("ack channel closed")]
    AckFailed,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no proxy available at or above the requested score")]
    NoneAvailable,
    #[error("invalid proxy endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown storage '{0}'")]
    Unknown(String),
    #[error("storage '{0}' factory failed")]
    FactoryFailed(String, #[source] BoxError),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage '{0}' failed to initialize")]
    InitFailed(String, #[source] BoxError),
    #[error("stage '{0}' failed while handling a response")]
    RuntimeFailed(String, #[source] BoxError),
}

impl Error {
    pub fn missing_redial_pattern(downloader: impl Into<String>) -> Self {
        Error::from(RequestError::MissingRedialPattern(downloader.into()))
    }

    pub fn unsupported_policy(url: impl Into<String>) -> Self {
        Error::from(RequestError::UnsupportedPolicy(url.into()))
    }

    pub fn invalid_id(reason: impl Into<String>) -> Self {
        Error::from(SpiderError::InvalidId(reason.into()))
    }

    pub fn no_proxy_available() -> Self {
        Error::from(ProxyError::NoneAvailable)
    }

    pub fn unknown_storage(name: impl Into<String>) -> Self {
        Error::from(StorageError::Unknown(name.into()))
    }

    pub fn stage_init_failed<E: Into<BoxError>>(stage: impl Into<String>, source: E) -> Self {
        Error::from(StageError::InitFailed(stage.into(), source.into()))
    }

    pub fn stage_runtime_failed<E: Into<BoxError>>(stage: impl Into<String>, source: E) -> Self {
        Error::from(StageError::RuntimeFailed(stage.into(), source.into()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::from(QueueError::DeserializationFailed(err.into()))
    }
}
