use crate::model::*;

use super::settings::resolve_bounds;
use super::{Engine, EngineError, RecordKind, SharedLoungeState};

impl Engine {
    fn lounge_state(&self, lounge_id: Id) -> Result<SharedLoungeState, EngineError> {
        self.store
            .get_lounge(&lounge_id)
            .ok_or_else(|| EngineError::lounge_not_found(lounge_id))
    }

    /// Every lounge, in creation order.
    pub async fn list_lounges(&self) -> Vec<Lounge> {
        let mut lounges = Vec::new();
        for id in self.store.lounge_ids() {
            if let Some(ls) = self.store.get_lounge(&id) {
                lounges.push(ls.read().await.lounge.clone());
            }
        }
        lounges
    }

    pub async fn get_lounge(&self, lounge_id: Id) -> Result<Lounge, EngineError> {
        let ls = self.lounge_state(lounge_id)?;
        let guard = ls.read().await;
        Ok(guard.lounge.clone())
    }

    /// The tables a booking form for this lounge offers.
    pub async fn selectable_tables(&self, lounge_id: Id) -> Result<Vec<Table>, EngineError> {
        let ls = self.lounge_state(lounge_id)?;
        let guard = ls.read().await;
        Ok(guard.selectable_tables())
    }

    /// A table, only as seen through its own lounge.
    pub async fn get_table(&self, lounge_id: Id, table_id: Id) -> Result<Table, EngineError> {
        let ls = self.lounge_state(lounge_id)?;
        let guard = ls.read().await;
        guard
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(EngineError::NotFound { kind: RecordKind::Table, id: table_id })
    }

    /// Opening hours, Monday first.
    pub async fn business_hours(&self, lounge_id: Id) -> Result<Vec<BusinessHour>, EngineError> {
        let ls = self.lounge_state(lounge_id)?;
        let guard = ls.read().await;
        Ok(guard.hours.values().cloned().collect())
    }

    pub async fn guest_bounds(&self, lounge_id: Id) -> Result<GuestBounds, EngineError> {
        let ls = self.lounge_state(lounge_id)?;
        let guard = ls.read().await;
        Ok(resolve_bounds(&guard))
    }

    pub async fn get_booking(&self, booking_id: Id) -> Result<Booking, EngineError> {
        let lounge_id = self
            .store
            .lounge_for_booking(&booking_id)
            .ok_or_else(|| EngineError::booking_not_found(booking_id))?;
        let ls = self.lounge_state(lounge_id)?;
        let guard = ls.read().await;
        guard
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| EngineError::booking_not_found(booking_id))
    }
}
