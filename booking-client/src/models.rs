use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use num_traits::Signed;
use serde::{Deserialize, Serialize};
use shared::*;

/// Identifiers arrive as integers from some endpoints and as strings from others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OpaqueId {
    Int(i64),
    Str(String),
}

impl OpaqueId {
    pub fn into_string(self) -> String {
        match self {
            OpaqueId::Int(n) => n.to_string(),
            OpaqueId::Str(s) => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBooking {
    pub bookingid: OpaqueId,
    pub listing_id: OpaqueId,
    pub listing_title: String,
    #[serde(default)]
    pub listing_location: Option<String>,
    #[serde(default)]
    pub listing_image: Option<String>,
    #[serde(default)]
    pub guest: Option<OpaqueId>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub guest_avatar: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    #[serde(default)]
    pub number_of_guests: Option<i32>,
    pub total_price: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteListing {
    pub accomodationid: OpaqueId,
    pub title: String,
    #[serde(default)]
    pub locationdesc: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub pricepernight: BigDecimal,
    #[serde(default)]
    pub bedrooms: Option<i32>,
    #[serde(default)]
    pub bathrooms: Option<i32>,
    #[serde(default)]
    pub maxguests: Option<i32>,
    #[serde(default)]
    pub propertytype: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelBody {
    pub status: ReservationStatus,
}

impl CancelBody {
    pub fn new() -> Self {
        Self {
            status: ReservationStatus::Cancelled,
        }
    }
}

impl Default for CancelBody {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes one raw booking record into a reservation.
pub fn parse_booking(value: serde_json::Value) -> anyhow::Result<Reservation> {
    let remote: RemoteBooking = serde_json::from_value(value)?;
    Reservation::try_from(remote)
}

pub fn parse_listing(value: serde_json::Value) -> anyhow::Result<Listing> {
    let remote: RemoteListing = serde_json::from_value(value)?;
    Listing::try_from(remote)
}

impl TryFrom<RemoteBooking> for Reservation {
    type Error = anyhow::Error;

    fn try_from(booking: RemoteBooking) -> Result<Self, Self::Error> {
        let id = ReservationId::new(booking.bookingid.into_string());

        if booking.check_in_date >= booking.check_out_date {
            anyhow::bail!(
                "booking {} checks in on {} but checks out on {}",
                id,
                booking.check_in_date,
                booking.check_out_date
            );
        }
        if booking.total_price.is_negative() {
            anyhow::bail!("booking {} has a negative total price {}", id, booking.total_price);
        }
        let status: ReservationStatus = booking.status.parse()?;

        let guest = booking.guest.map(|guest_id| GuestRef {
            id: guest_id.into_string(),
            name: booking.guest_name.unwrap_or_default(),
            email: booking.guest_email,
            avatar_url: booking.guest_avatar,
        });

        Ok(Self {
            id,
            property: PropertyRef {
                id: booking.listing_id.into_string(),
                title: booking.listing_title,
                location: booking.listing_location,
                image_url: booking.listing_image,
            },
            guest,
            start_date: booking.check_in_date,
            end_date: booking.check_out_date,
            status,
            total_price: booking.total_price,
            number_of_guests: booking.number_of_guests,
            created_at: booking.created_at,
        })
    }
}

impl TryFrom<RemoteListing> for Listing {
    type Error = anyhow::Error;

    fn try_from(listing: RemoteListing) -> Result<Self, Self::Error> {
        let id = listing.accomodationid.into_string();
        if listing.pricepernight.is_negative() {
            anyhow::bail!("listing {} has a negative nightly price {}", id, listing.pricepernight);
        }

        Ok(Self {
            id,
            title: listing.title,
            location: listing.locationdesc,
            description: listing.description,
            price_per_night: listing.pricepernight,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            max_guests: listing.maxguests,
            property_type: listing.propertytype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn booking_json() -> serde_json::Value {
        json!({
            "bookingid": 12,
            "listing": 3,
            "listing_title": "Casa Campestre con Piscina",
            "listing_id": "3",
            "listing_image": "https://example.com/casa.jpg",
            "listing_location": "La Vega, Cundinamarca",
            "guest": 7,
            "guest_name": "Laura Gómez",
            "guest_email": "laura@example.com",
            "guest_avatar": "https://example.com/laura.svg",
            "check_in_date": "2025-03-10",
            "check_out_date": "2025-03-15",
            "number_of_guests": 4,
            "total_price": "1200000.00",
            "status": "confirmed",
            "created_at": "2025-02-01T10:30:00Z",
            "updated_at": "2025-02-01T10:30:00Z"
        })
    }

    #[test]
    fn maps_remote_booking_field_by_field() {
        let remote: RemoteBooking = serde_json::from_value(booking_json()).unwrap();
        let reservation = Reservation::try_from(remote).unwrap();

        assert_eq!(reservation.id, ReservationId::new("12"));
        assert_eq!(reservation.property.id, "3");
        assert_eq!(reservation.property.title, "Casa Campestre con Piscina");
        assert_eq!(reservation.property.location.as_deref(), Some("La Vega, Cundinamarca"));
        let guest = reservation.guest.unwrap();
        assert_eq!(guest.id, "7");
        assert_eq!(guest.name, "Laura Gómez");
        assert_eq!(reservation.start_date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(reservation.end_date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.total_price, BigDecimal::from_str("1200000.00").unwrap());
        assert_eq!(reservation.number_of_guests, Some(4));
    }

    #[test]
    fn accepts_string_ids_and_numeric_prices() {
        let mut value = booking_json();
        value["bookingid"] = json!("bk-77");
        value["total_price"] = json!(980000);
        let remote: RemoteBooking = serde_json::from_value(value).unwrap();
        let reservation = Reservation::try_from(remote).unwrap();

        assert_eq!(reservation.id.as_str(), "bk-77");
        assert_eq!(reservation.total_price, BigDecimal::from(980000));
    }

    #[test]
    fn rejects_inverted_or_empty_date_ranges() {
        let mut value = booking_json();
        value["check_out_date"] = json!("2025-03-10");
        let remote: RemoteBooking = serde_json::from_value(value).unwrap();
        assert!(Reservation::try_from(remote).is_err());
    }

    #[test]
    fn rejects_negative_price_and_unknown_status() {
        let mut value = booking_json();
        value["total_price"] = json!("-1.00");
        let remote: RemoteBooking = serde_json::from_value(value).unwrap();
        assert!(Reservation::try_from(remote).is_err());

        let mut value = booking_json();
        value["status"] = json!("refunded");
        let remote: RemoteBooking = serde_json::from_value(value).unwrap();
        assert!(Reservation::try_from(remote).is_err());
    }

    #[test]
    fn booking_without_guest_fields_has_no_guest() {
        let mut value = booking_json();
        let object = value.as_object_mut().unwrap();
        for key in ["guest", "guest_name", "guest_email", "guest_avatar"] {
            object.remove(key);
        }
        let remote: RemoteBooking = serde_json::from_value(value).unwrap();
        assert!(Reservation::try_from(remote).unwrap().guest.is_none());
    }

    #[test]
    fn maps_remote_listing() {
        let remote: RemoteListing = serde_json::from_value(json!({
            "accomodationid": 1,
            "title": "Apartamento Moderno en Bogotá",
            "description": "Hermoso apartamento con vistas a la ciudad",
            "bedrooms": 2,
            "bathrooms": 1,
            "locationdesc": "Teusaquillo, Bogotá",
            "propertytype": "apartment",
            "pricepernight": "250000.00",
            "maxguests": 4
        }))
        .unwrap();
        let listing = Listing::try_from(remote).unwrap();

        assert_eq!(listing.id, "1");
        assert_eq!(listing.location.as_deref(), Some("Teusaquillo, Bogotá"));
        assert_eq!(listing.price_per_night, BigDecimal::from(250000));
        assert_eq!(listing.max_guests, Some(4));
    }

    #[test]
    fn parse_booking_rejects_null_or_missing_fields() {
        assert!(parse_booking(booking_json()).is_ok());

        let mut value = booking_json();
        value["status"] = serde_json::Value::Null;
        assert!(parse_booking(value).is_err());

        let mut value = booking_json();
        value.as_object_mut().unwrap().remove("created_at");
        assert!(parse_booking(value).is_err());

        let mut value = booking_json();
        value["created_at"] = json!("2025-02-01T10:30:00");
        assert!(parse_booking(value).is_err());
    }

    #[test]
    fn parse_listing_rejects_missing_price() {
        assert!(parse_listing(json!({ "accomodationid": 5, "title": "Loft" })).is_err());
    }

    #[test]
    fn cancel_body_requests_cancelled_status() {
        let body = serde_json::to_value(CancelBody::new()).unwrap();
        assert_eq!(body, json!({ "status": "cancelled" }));
    }
}
