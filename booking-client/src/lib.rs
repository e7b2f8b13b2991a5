pub mod api;
pub mod config;
pub mod error;
pub mod listings;
pub mod models;
pub mod synchronizer;
pub mod view;

pub use api::{BookingApi, HttpBookingApi};
pub use config::ApiConfig;
pub use error::{ApiError, CallerError, ErrorKind, ErrorRecord};
pub use synchronizer::{CancellationOutcome, ReservationSynchronizer, Snapshot};
pub use view::{apply_view, StatusFilter, ViewQuery};
