use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking a batch of photos belongs to.
///
/// Supplied by the caller (the booking screens own these identifiers) and
/// shared read-only by every task of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingContext {
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    /// Unassigned bookings have no cleaner yet.
    pub cleaner_id: Option<Uuid>,
    pub postcode: String,
    pub booking_date: NaiveDate,
}

impl BookingContext {
    pub fn new(
        booking_id: Uuid,
        customer_id: Uuid,
        cleaner_id: Option<Uuid>,
        postcode: impl Into<String>,
        booking_date: NaiveDate,
    ) -> Self {
        Self {
            booking_id,
            customer_id,
            cleaner_id,
            postcode: postcode.into(),
            booking_date,
        }
    }
}
