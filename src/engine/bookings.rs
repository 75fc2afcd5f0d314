use tracing::{debug, info};

use crate::auth::{authorize_booking_change, Caller};
use crate::limits::*;
use crate::model::*;
use crate::observability::*;

use super::settings::resolve_bounds;
use super::validation::validate_booking;
use super::{now_ms, Engine, EngineError};

/// Run the validator against a lounge's own tables and active setting.
/// On success the guest count is known to be a positive number within capacity.
fn check_candidate(ls: &LoungeState, candidate: &BookingCandidate, now: Ms) -> Result<u32, EngineError> {
    let selectable = ls.selectable_tables();
    let bounds = resolve_bounds(ls);
    if let Err(errors) = validate_booking(candidate, &selectable, &bounds, now) {
        debug!("lounge {}: booking rejected: {errors}", ls.lounge.id);
        for field in errors.fields() {
            metrics::counter!(BOOKINGS_REJECTED_TOTAL, "field" => field.as_str()).increment(1);
        }
        return Err(EngineError::ValidationFailed(errors));
    }
    u32::try_from(candidate.total_guests)
        .map_err(|_| EngineError::InvalidInput("total_guests out of range"))
}

/// The booking lifecycle: create, update, delete and list, each scoped to
/// an authenticated caller.
impl Engine {
    pub async fn create_booking(
        &self,
        caller: &Caller,
        lounge_id: Id,
        candidate: BookingCandidate,
    ) -> Result<Booking, EngineError> {
        let user_id = caller.require_user()?;
        let started = std::time::Instant::now();
        let mut guard = self.lounge_write(lounge_id).await?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_LOUNGE {
            return Err(EngineError::LimitExceeded("too many bookings in lounge"));
        }

        let now = now_ms();
        let total_guests = check_candidate(&guard, &candidate, now)?;

        let id = self.store.allocate_id();
        let event = Event::BookingCreated {
            id,
            lounge_id,
            user_id,
            table_id: candidate.table_id,
            date: candidate.date,
            total_guests,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => "create_booking")
            .record(started.elapsed().as_secs_f64());
        info!(
            "booking {id} created: user {user_id}, lounge {lounge_id}, table {}, {total_guests} guests",
            candidate.table_id
        );
        Ok(guard.bookings[&id].clone())
    }

    /// Change table, date and guest count of an existing booking. The lounge
    /// and owner never change.
    pub async fn update_booking(
        &self,
        caller: &Caller,
        booking_id: Id,
        candidate: BookingCandidate,
    ) -> Result<Booking, EngineError> {
        let user_id = caller.require_user()?;
        let started = std::time::Instant::now();
        let mut guard = self.booking_write(booking_id).await?;
        authorize_booking_change(user_id, &guard.bookings[&booking_id])?;

        let now = now_ms();
        let total_guests = check_candidate(&guard, &candidate, now)?;

        let event = Event::BookingUpdated {
            id: booking_id,
            lounge_id: guard.lounge.id,
            table_id: candidate.table_id,
            date: candidate.date,
            total_guests,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(BOOKINGS_UPDATED_TOTAL).increment(1);
        metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => "update_booking")
            .record(started.elapsed().as_secs_f64());
        info!("booking {booking_id} updated by user {user_id}");
        Ok(guard.bookings[&booking_id].clone())
    }

    /// Hard-delete a booking, returning what was removed.
    pub async fn delete_booking(&self, caller: &Caller, booking_id: Id) -> Result<Booking, EngineError> {
        let user_id = caller.require_user()?;
        let mut guard = self.booking_write(booking_id).await?;
        let booking = guard.bookings[&booking_id].clone();
        authorize_booking_change(user_id, &booking)?;

        let event = Event::BookingDeleted {
            id: booking_id,
            lounge_id: booking.lounge_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(BOOKINGS_DELETED_TOTAL).increment(1);
        info!("booking {booking_id} deleted by user {user_id}");
        Ok(booking)
    }

    /// The caller's bookings, oldest first.
    pub async fn list_bookings_for_user(&self, caller: &Caller) -> Result<Vec<Booking>, EngineError> {
        let user_id = caller.require_user()?;
        let mut bookings = Vec::new();
        for booking_id in self.store.bookings_for_user(&user_id) {
            let Some(lounge_id) = self.store.lounge_for_booking(&booking_id) else {
                continue;
            };
            let Some(ls) = self.store.get_lounge(&lounge_id) else {
                continue;
            };
            let guard = ls.read().await;
            // Skip anything deleted since the index was read.
            if let Some(b) = guard.bookings.get(&booking_id) {
                bookings.push(b.clone());
            }
        }
        Ok(bookings)
    }
}
