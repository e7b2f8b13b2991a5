use chrono::NaiveDate;
use serde::Serialize;
use shared::{ReservationId, ReservationStatus};
use thiserror::Error;

/// Failures talking to the Remote Booking API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidEndpoint(_) => None,
            ApiError::Status { status, .. } => Some(*status),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Misuse of the synchronizer contract by the presentation layer.
/// These are returned to the caller and never recorded as component state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallerError {
    #[error("no reservation id given")]
    MissingId,

    #[error("reservation {0} is not in the loaded collection")]
    UnknownReservation(ReservationId),

    #[error("reservation {0} is already cancelled")]
    AlreadyCancelled(ReservationId),

    #[error("reservation {id} is {status} and cannot be cancelled")]
    NotCancellable {
        id: ReservationId,
        status: ReservationStatus,
    },

    #[error("reservation {id} starts on {start_date}, only future reservations can be cancelled")]
    StartNotInFuture { id: ReservationId, start_date: NaiveDate },

    #[error("a cancellation for reservation {0} is already in flight")]
    AlreadyInFlight(ReservationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    FetchFailed,
    CancellationFailed,
}

/// A recoverable failure surfaced to the presentation layer for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub reservation_id: Option<ReservationId>,
}

impl ErrorRecord {
    pub fn fetch_failed(error: &ApiError) -> Self {
        let message = if error.is_unauthorized() {
            "You must be signed in to see your reservations".to_string()
        } else {
            "Could not load reservations".to_string()
        };

        Self {
            kind: ErrorKind::FetchFailed,
            message,
            status: error.status(),
            reservation_id: None,
        }
    }

    pub fn cancellation_failed(id: &ReservationId, error: &ApiError) -> Self {
        Self {
            kind: ErrorKind::CancellationFailed,
            message: "Could not cancel the reservation. Please try again.".to_string(),
            status: error.status(),
            reservation_id: Some(id.clone()),
        }
    }
}
