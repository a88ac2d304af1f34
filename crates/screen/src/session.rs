//! Reader session lifecycle

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{DriverError, Result, ScreenReader};

/// Where a session is in its start/stop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Started,
    Stopped,
}

/// Exclusive handle on one screen-reader session.
///
/// Navigation is only allowed while `Started`. A session is never restarted
/// after `stop()`; build a new one instead.
pub struct ReaderSession<R: ScreenReader> {
    reader: R,
    state: SessionState,
}

impl<R: ScreenReader> ReaderSession<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == SessionState::Started
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Started => {
                debug!("◆ Reader session already started");
                Ok(())
            }
            SessionState::Stopped => Err(DriverError::AlreadyStopped),
            SessionState::NotStarted => {
                self.reader.start().await?;
                self.state = SessionState::Started;
                info!("◆ Reader session started");
                Ok(())
            }
        }
    }

    /// Stop the reader. The session counts as stopped even when the
    /// underlying call fails, so teardown is never attempted twice.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            SessionState::NotStarted => Err(DriverError::NotStarted),
            SessionState::Stopped => Err(DriverError::AlreadyStopped),
            SessionState::Started => {
                self.state = SessionState::Stopped;
                let result = self.reader.stop().await;
                match &result {
                    Ok(()) => info!("◆ Reader session stopped"),
                    Err(e) => warn!("◆ Reader stop failed: {}", e),
                }
                result
            }
        }
    }

    fn ensure_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(DriverError::NotStarted)
        }
    }

    pub async fn read_current(&self) -> Result<String> {
        self.ensure_started()?;
        self.reader.read_current().await
    }

    pub async fn move_next(&self) -> Result<()> {
        self.ensure_started()?;
        self.reader.move_next().await
    }

    pub async fn move_previous(&self) -> Result<()> {
        self.ensure_started()?;
        self.reader.move_previous().await
    }

    pub async fn activate(&self) -> Result<()> {
        self.ensure_started()?;
        self.reader.activate().await
    }

    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.ensure_started()?;
        self.reader.type_text(text).await
    }
}

impl<R: ScreenReader> Drop for ReaderSession<R> {
    fn drop(&mut self) {
        if self.state == SessionState::Started {
            warn!("◆ Reader session dropped while still started");
        }
    }
}
