//! Screen-reader driving
//!
//! The capability surface the navigator drives: read the last spoken
//! phrase, move the reader cursor, activate, and type. [`ReaderSession`]
//! owns the start/stop lifecycle; [`HttpScreenReader`] talks to the
//! VoiceOver/NVDA HTTP façade.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod session;

pub use http::{FacadeResponse, HealthStatus, HttpScreenReader};
pub use session::{ReaderSession, SessionState};

/// Screen-reader failures
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("READER UNREACHABLE: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("READER REJECTED: {0}")]
    Rejected(String),

    #[error("READER RESPONSE INVALID: {0}")]
    InvalidResponse(String),

    #[error("READER NOT STARTED")]
    NotStarted,

    #[error("READER ALREADY STOPPED")]
    AlreadyStopped,
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// A screen reader with a single cursor over the page under observation
#[async_trait]
pub trait ScreenReader: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Last phrase the reader spoke
    async fn read_current(&self) -> Result<String>;
    async fn move_next(&self) -> Result<()>;
    async fn move_previous(&self) -> Result<()>;
    /// Default action on the element under the cursor
    async fn activate(&self) -> Result<()>;
    async fn type_text(&self, text: &str) -> Result<()>;
}

#[async_trait]
impl<R: ScreenReader + ?Sized> ScreenReader for std::sync::Arc<R> {
    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn stop(&self) -> Result<()> {
        (**self).stop().await
    }

    async fn read_current(&self) -> Result<String> {
        (**self).read_current().await
    }

    async fn move_next(&self) -> Result<()> {
        (**self).move_next().await
    }

    async fn move_previous(&self) -> Result<()> {
        (**self).move_previous().await
    }

    async fn activate(&self) -> Result<()> {
        (**self).activate().await
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        (**self).type_text(text).await
    }
}
