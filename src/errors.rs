//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// No session with the given id.
    UnknownSession(String),
    /// Respond called while no question is outstanding.
    NoPendingQuestion(String),
    /// Respond's question id does not match the outstanding one.
    QuestionIdMismatch(String),
    /// Interrupt called on a session with no live process.
    NoActiveProcess(String),
    /// The configured live-session limit would be violated.
    CapacityExceeded(String),
    /// Live-stdin delivery requested on a one-process-per-turn family.
    Busy(String),
    /// The agent CLI could not be started.
    SpawnFailed(String),
    /// Event stream framing or JSON decoding failure.
    Decode(String),
    /// Approval callback bridge failure.
    Bridge(String),
    /// On-disk session index failure.
    Index(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::UnknownSession(msg) => write!(f, "unknown session: {msg}"),
            Self::NoPendingQuestion(msg) => write!(f, "no pending question: {msg}"),
            Self::QuestionIdMismatch(msg) => write!(f, "question id mismatch: {msg}"),
            Self::NoActiveProcess(msg) => write!(f, "no active process: {msg}"),
            Self::CapacityExceeded(msg) => write!(f, "capacity exceeded: {msg}"),
            Self::Busy(msg) => write!(f, "busy: {msg}"),
            Self::SpawnFailed(msg) => write!(f, "spawn failed: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Bridge(msg) => write!(f, "bridge: {msg}"),
            Self::Index(msg) => write!(f, "index: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl AppError {
    /// Short machine-readable kind tag carried to the tool adapter.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::UnknownSession(_) => "unknown_session",
            Self::NoPendingQuestion(_) => "no_pending_question",
            Self::QuestionIdMismatch(_) => "question_id_mismatch",
            Self::NoActiveProcess(_) => "no_active_process",
            Self::CapacityExceeded(_) => "capacity_exceeded",
            Self::Busy(_) => "busy",
            Self::SpawnFailed(_) => "spawn_failed",
            Self::Decode(_) => "decode",
            Self::Bridge(_) => "bridge",
            Self::Index(_) => "index",
            Self::Io(_) => "io",
        }
    }
}
