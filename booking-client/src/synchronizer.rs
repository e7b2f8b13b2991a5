use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use shared::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::BookingApi;
use crate::error::{ApiError, CallerError, ErrorRecord};
use crate::models::parse_booking;
use crate::view::{apply_view, StatusFilter, ViewQuery};

const CANCELLED_NOTICE: &str = "Reservation cancelled";

pub fn default_notice_ttl() -> Duration {
    Duration::seconds(3)
}

/// Captures the status a reservation had before the optimistic transition,
/// so a failed request restores exactly that value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationTicket {
    pub id: Uuid,
    pub reservation_id: ReservationId,
    pub prior_status: ReservationStatus,
    generation: u64,
    pub started_at: DateTime<Utc>,
}

impl CancellationTicket {
    fn new(reservation_id: ReservationId, prior_status: ReservationStatus, generation: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            prior_status,
            generation,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CancellationOutcome {
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationPrompt {
    pub id: ReservationId,
    pub property_title: String,
}

#[derive(Debug, Clone)]
struct Notice {
    message: String,
    reservation_id: ReservationId,
    expires_at: DateTime<Utc>,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub scope: Option<Scope>,
    pub reservations: Vec<Reservation>,
    pub loading: bool,
    pub error: Option<ErrorRecord>,
    pub notice: Option<String>,
    pub in_flight: Vec<ReservationId>,
    pub staged: Option<ReservationId>,
    pub query: ViewQuery,
}

#[derive(Debug, Default)]
struct SyncState {
    scope: Option<Scope>,
    reservations: Vec<Reservation>,
    loading: bool,
    error: Option<ErrorRecord>,
    notice: Option<Notice>,
    query: ViewQuery,
    in_flight: HashMap<ReservationId, CancellationTicket>,
    staged: Option<ReservationId>,
    generation: u64,
}

impl SyncState {
    fn find(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| &r.id == id)
    }

    fn find_mut(&mut self, id: &ReservationId) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| &r.id == id)
    }

    fn check_cancellable(
        &self,
        id: Option<&ReservationId>,
        today: NaiveDate,
    ) -> Result<&Reservation, CallerError> {
        let id = id.ok_or(CallerError::MissingId)?;
        if self.in_flight.contains_key(id) {
            return Err(CallerError::AlreadyInFlight(id.clone()));
        }

        let reservation = self
            .find(id)
            .ok_or_else(|| CallerError::UnknownReservation(id.clone()))?;

        if reservation.status == ReservationStatus::Cancelled {
            return Err(CallerError::AlreadyCancelled(id.clone()));
        }
        if reservation.status.is_terminal() {
            return Err(CallerError::NotCancellable {
                id: id.clone(),
                status: reservation.status,
            });
        }

        if reservation.start_date <= today {
            return Err(CallerError::StartNotInFuture {
                id: id.clone(),
                start_date: reservation.start_date,
            });
        }

        Ok(reservation)
    }

    fn guest_visible(&self) -> bool {
        self.scope.is_some_and(|scope| scope.guest_visible())
    }
}

/// Owns the current user's reservations, applies cancellations optimistically
/// and reconciles them with the Remote Booking API.
///
/// State lives behind a mutex that is never held across an await point, so a
/// snapshot taken while a request is in flight shows the optimistic state.
pub struct ReservationSynchronizer<A> {
    api: A,
    state: Mutex<SyncState>,
    notice_ttl: Duration,
}

impl<A: BookingApi> ReservationSynchronizer<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(SyncState::default()),
            notice_ttl: default_notice_ttl(),
        }
    }

    pub fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the whole collection with what the API returns for `scope`.
    /// Failures are recorded as state, never returned.
    pub async fn load(&self, scope: Scope) {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.scope = Some(scope);
            state.reservations.clear();
            state.staged = None;
            state.error = None;
            state.loading = true;
            state.generation
        };
        info!("Loading reservations for {} scope", scope);

        let result = self.api.list_reservations(scope).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Discarding superseded load for {} scope", scope);
            return;
        }
        state.loading = false;

        match result {
            Ok(remote) => {
                state.reservations = map_bookings(remote);
                info!("Loaded {} reservations", state.reservations.len());
            }
            Err(e) => {
                error!("Failed to load reservations: {}", e);
                state.reservations.clear();
                state.error = Some(ErrorRecord::fetch_failed(&e));
            }
        }
    }

    /// Validates that `id` may be cancelled and stages it for confirmation.
    pub fn request_cancellation(
        &self,
        id: Option<&ReservationId>,
    ) -> Result<CancellationPrompt, CallerError> {
        let mut state = self.lock();
        let reservation = state.check_cancellable(id, today())?;
        let prompt = CancellationPrompt {
            id: reservation.id.clone(),
            property_title: reservation.property.title.clone(),
        };
        state.staged = Some(prompt.id.clone());
        Ok(prompt)
    }

    pub fn dismiss_cancellation(&self) {
        self.lock().staged = None;
    }

    /// Cancels optimistically, then reconciles with the API's answer.
    pub async fn confirm_cancellation(
        &self,
        id: &ReservationId,
    ) -> Result<CancellationOutcome, CallerError> {
        let ticket = self.begin_cancellation(id, today())?;
        let result = self.api.cancel_reservation(id).await;
        Ok(self.settle_cancellation(ticket, result))
    }

    fn begin_cancellation(
        &self,
        id: &ReservationId,
        today: NaiveDate,
    ) -> Result<CancellationTicket, CallerError> {
        let mut state = self.lock();
        let prior_status = state.check_cancellable(Some(id), today)?.status;
        let ticket = CancellationTicket::new(id.clone(), prior_status, state.generation);

        if let Some(reservation) = state.find_mut(id) {
            reservation.status = ReservationStatus::Cancelled;
        }
        state.in_flight.insert(id.clone(), ticket.clone());
        if state.staged.as_ref() == Some(id) {
            state.staged = None;
        }
        state.notice = Some(Notice {
            message: CANCELLED_NOTICE.to_string(),
            reservation_id: id.clone(),
            expires_at: Utc::now() + self.notice_ttl,
        });

        info!(
            "Cancelling reservation {} (ticket {}, was {})",
            id, ticket.id, prior_status
        );
        Ok(ticket)
    }

    fn settle_cancellation(
        &self,
        ticket: CancellationTicket,
        result: Result<(), ApiError>,
    ) -> CancellationOutcome {
        let mut state = self.lock();
        let id = &ticket.reservation_id;
        if state.in_flight.get(id).is_some_and(|t| t.id == ticket.id) {
            state.in_flight.remove(id);
        }

        let e = match result {
            Ok(()) => {
                info!("Reservation {} cancelled (ticket {})", id, ticket.id);
                // A reload that raced the call may still carry the pre-cancel status.
                if state.generation != ticket.generation {
                    if let Some(reservation) = state.find_mut(id) {
                        if reservation.status != ReservationStatus::Cancelled {
                            debug!("Reloaded reservation {} was {}, marking cancelled", id, reservation.status);
                            reservation.status = ReservationStatus::Cancelled;
                        }
                    }
                }
                return CancellationOutcome::Confirmed;
            }
            Err(e) => e,
        };
        error!("Cancelling reservation {} failed (ticket {}): {}", id, ticket.id, e);

        // A reload since phase one is newer server truth and must not be overwritten.
        if state.generation == ticket.generation {
            if let Some(reservation) = state.find_mut(id) {
                if reservation.status == ReservationStatus::Cancelled {
                    reservation.status = ticket.prior_status;
                }
            }
        } else {
            warn!("Reservations reloaded while cancelling {}, keeping reloaded state", id);
        }

        if state
            .notice
            .as_ref()
            .is_some_and(|notice| &notice.reservation_id == id)
        {
            state.notice = None;
        }
        state.error = Some(ErrorRecord::cancellation_failed(id, &e));
        CancellationOutcome::RolledBack
    }

    pub fn set_search_term(&self, term: impl Into<String>) {
        self.lock().query.search_term = term.into();
    }

    pub fn set_status_filter(&self, filter: StatusFilter) {
        self.lock().query.status_filter = filter;
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    pub fn view(&self) -> Vec<Reservation> {
        self.view_at(today())
    }

    pub fn view_at(&self, today: NaiveDate) -> Vec<Reservation> {
        let state = self.lock();
        apply_view(&state.reservations, &state.query, state.guest_visible(), today)
    }

    pub fn reservation(&self, id: &ReservationId) -> Option<Reservation> {
        self.lock().find(id).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        let now = Utc::now();
        let mut in_flight: Vec<ReservationId> = state.in_flight.keys().cloned().collect();
        in_flight.sort();

        Snapshot {
            scope: state.scope,
            reservations: state.reservations.clone(),
            loading: state.loading,
            error: state.error.clone(),
            notice: state
                .notice
                .as_ref()
                .filter(|notice| notice.expires_at > now)
                .map(|notice| notice.message.clone()),
            in_flight,
            staged: state.staged.clone(),
            query: state.query.clone(),
        }
    }
}

/// Maps remote bookings, dropping records that break the reservation
/// invariants and any repeat of an id already seen.
fn map_bookings(remote: Vec<serde_json::Value>) -> Vec<Reservation> {
    let mut seen = HashSet::new();
    let mut reservations = Vec::with_capacity(remote.len());

    for booking in remote {
        match parse_booking(booking) {
            Ok(reservation) => {
                if seen.insert(reservation.id.clone()) {
                    reservations.push(reservation);
                } else {
                    warn!("Skipping duplicate reservation {}", reservation.id);
                }
            }
            Err(e) => warn!("Skipping reservation: {}", e),
        }
    }

    reservations
}
