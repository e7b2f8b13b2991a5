use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{Reservation, ReservationStatus};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Upcoming,
    Past,
    Cancelled,
}

impl StatusFilter {
    pub fn admits(&self, reservation: &Reservation, today: NaiveDate) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Upcoming => {
                reservation.start_date > today && reservation.status == ReservationStatus::Confirmed
            }
            StatusFilter::Past => {
                reservation.end_date < today && reservation.status != ReservationStatus::Cancelled
            }
            StatusFilter::Cancelled => reservation.status == ReservationStatus::Cancelled,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusFilter::All => "all",
            StatusFilter::Upcoming => "upcoming",
            StatusFilter::Past => "past",
            StatusFilter::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "upcoming" => Ok(StatusFilter::Upcoming),
            "past" => Ok(StatusFilter::Past),
            "cancelled" => Ok(StatusFilter::Cancelled),
            other => Err(anyhow::anyhow!(
                "unknown status filter: {} (expected all, upcoming, past or cancelled)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewQuery {
    pub search_term: String,
    pub status_filter: StatusFilter,
}

impl ViewQuery {
    pub fn new(search_term: impl Into<String>, status_filter: StatusFilter) -> Self {
        Self {
            search_term: search_term.into(),
            status_filter,
        }
    }
}

/// Derives the displayed reservations. Text and status constraints compose
/// with AND, and the source order is preserved.
pub fn apply_view(
    reservations: &[Reservation],
    query: &ViewQuery,
    guest_visible: bool,
    today: NaiveDate,
) -> Vec<Reservation> {
    let term = query.search_term.trim().to_lowercase();

    reservations
        .iter()
        .filter(|r| term.is_empty() || r.matches_text(&term, guest_visible))
        .filter(|r| query.status_filter.admits(r, today))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::{Days, Utc};
    use shared::{GuestRef, PropertyRef, ReservationId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn reservation(
        id: &str,
        title: &str,
        guest: &str,
        status: ReservationStatus,
        start_offset: i64,
        nights: u64,
    ) -> Reservation {
        let start = if start_offset >= 0 {
            today() + Days::new(start_offset as u64)
        } else {
            today() - Days::new(start_offset.unsigned_abs())
        };
        Reservation {
            id: ReservationId::new(id),
            property: PropertyRef {
                id: format!("L-{}", id),
                title: title.to_string(),
                location: None,
                image_url: None,
            },
            guest: Some(GuestRef {
                id: format!("G-{}", id),
                name: guest.to_string(),
                email: None,
                avatar_url: None,
            }),
            start_date: start,
            end_date: start + Days::new(nights),
            status,
            total_price: BigDecimal::from(100),
            number_of_guests: None,
            created_at: Utc::now(),
        }
    }

    fn collection() -> Vec<Reservation> {
        vec![
            reservation("R1", "Apartamento Moderno", "Laura Gómez", ReservationStatus::Confirmed, 10, 5),
            reservation("R2", "Apartamento Moderno", "Andrés Ruiz", ReservationStatus::Confirmed, -30, 5),
            reservation("R3", "Casa Campestre", "Laura Gómez", ReservationStatus::Cancelled, -5, 5),
            reservation("R4", "Casa Campestre", "María Pérez", ReservationStatus::Completed, -30, 5),
        ]
    }

    fn ids(view: &[Reservation]) -> Vec<&str> {
        view.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let source = collection();
        let view = apply_view(&source, &ViewQuery::default(), true, today());
        assert_eq!(view, source);
    }

    #[test]
    fn status_filters_follow_dates_and_status() {
        let source = collection();

        let upcoming = apply_view(&source, &ViewQuery::new("", StatusFilter::Upcoming), true, today());
        assert_eq!(ids(&upcoming), vec!["R1"]);

        let past = apply_view(&source, &ViewQuery::new("", StatusFilter::Past), true, today());
        assert_eq!(ids(&past), vec!["R2", "R4"]);

        let cancelled = apply_view(&source, &ViewQuery::new("", StatusFilter::Cancelled), true, today());
        assert_eq!(ids(&cancelled), vec!["R3"]);
    }

    #[test]
    fn reservation_starting_today_is_not_upcoming() {
        let source = vec![reservation("R9", "Loft", "Ana", ReservationStatus::Confirmed, 0, 2)];
        let upcoming = apply_view(&source, &ViewQuery::new("", StatusFilter::Upcoming), true, today());
        assert!(upcoming.is_empty());
    }

    #[test]
    fn pending_future_reservation_is_not_upcoming() {
        let source = vec![reservation("R9", "Loft", "Ana", ReservationStatus::Pending, 3, 2)];
        let upcoming = apply_view(&source, &ViewQuery::new("", StatusFilter::Upcoming), true, today());
        assert!(upcoming.is_empty());
    }

    #[test]
    fn search_is_case_insensitive_and_composes_with_status() {
        let source = collection();

        let view = apply_view(&source, &ViewQuery::new("CASA", StatusFilter::All), true, today());
        assert_eq!(ids(&view), vec!["R3", "R4"]);

        let view = apply_view(&source, &ViewQuery::new("laura", StatusFilter::Cancelled), true, today());
        assert_eq!(ids(&view), vec!["R3"]);
    }

    #[test]
    fn guest_name_is_ignored_when_not_visible() {
        let source = collection();
        let view = apply_view(&source, &ViewQuery::new("laura", StatusFilter::All), false, today());
        assert!(view.is_empty());
    }

    #[test]
    fn repeated_application_is_idempotent() {
        let source = collection();
        let query = ViewQuery::new("moderno", StatusFilter::Past);
        let first = apply_view(&source, &query, true, today());
        let second = apply_view(&source, &query, true, today());
        assert_eq!(first, second);
        assert_eq!(source.len(), 4);
    }

    #[test]
    fn filter_parses_from_text() {
        assert_eq!("Upcoming".parse::<StatusFilter>().unwrap(), StatusFilter::Upcoming);
        assert!("archived".parse::<StatusFilter>().is_err());
    }
}
