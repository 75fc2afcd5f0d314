use std::sync::Arc;

use chrono::NaiveTime;
use tokio::sync::RwLock;
use tracing::info;

use crate::limits::*;
use crate::model::*;

use super::{lounge_from, now_ms, Engine, EngineError};

fn check_details(details: &LoungeDetails) -> Result<(), EngineError> {
    if details.name.trim().is_empty() {
        return Err(EngineError::InvalidInput("lounge name is required"));
    }
    if details.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("lounge name too long"));
    }
    if details.address1.len() > MAX_ADDRESS_LEN || details.address2.len() > MAX_ADDRESS_LEN {
        return Err(EngineError::LimitExceeded("address too long"));
    }
    if details.postcode.len() > MAX_POSTCODE_LEN {
        return Err(EngineError::LimitExceeded("postcode too long"));
    }
    Ok(())
}

/// Staff-side record management: lounges and what they own.
impl Engine {
    pub async fn create_lounge(&self, details: LoungeDetails) -> Result<Lounge, EngineError> {
        check_details(&details)?;
        let _creation = self.lounge_creation.lock().await;
        if self.store.lounge_count() >= MAX_LOUNGES {
            return Err(EngineError::LimitExceeded("too many lounges"));
        }

        let id = self.store.allocate_id();
        let at = now_ms();
        let lounge = lounge_from(id, &details, at);
        self.wal_append(&Event::LoungeCreated { id, details, at }).await?;
        self.store
            .insert_lounge(id, Arc::new(RwLock::new(LoungeState::new(lounge.clone()))));
        info!("lounge {id} created: {}", lounge.name);
        Ok(lounge)
    }

    pub async fn update_lounge(&self, id: Id, details: LoungeDetails) -> Result<Lounge, EngineError> {
        check_details(&details)?;
        let mut guard = self.lounge_write(id).await?;
        let event = Event::LoungeUpdated { id, details, at: now_ms() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.lounge.clone())
    }

    pub async fn add_table(
        &self,
        lounge_id: Id,
        name: String,
        capacity: u32,
    ) -> Result<Table, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("table name is required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("table name too long"));
        }
        if capacity == 0 {
            return Err(EngineError::InvalidInput("table capacity must be positive"));
        }
        if capacity > MAX_GUESTS {
            return Err(EngineError::LimitExceeded("table capacity too large"));
        }
        let mut guard = self.lounge_write(lounge_id).await?;
        if guard.tables.len() >= MAX_TABLES_PER_LOUNGE {
            return Err(EngineError::LimitExceeded("too many tables in lounge"));
        }

        let id = self.store.allocate_id();
        let event = Event::TableAdded { id, lounge_id, name, capacity, at: now_ms() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.tables[&id].clone())
    }

    /// Set the opening hours for one day of the week, replacing any existing
    /// record for that day.
    pub async fn set_business_hour(
        &self,
        lounge_id: Id,
        day: u8,
        start_time: NaiveTime,
        finish_time: NaiveTime,
        closed: bool,
    ) -> Result<BusinessHour, EngineError> {
        if day > 6 {
            return Err(EngineError::InvalidInput("day must be between 0 and 6"));
        }
        if !closed && start_time >= finish_time {
            return Err(EngineError::InvalidInput("start time must be before finish time"));
        }
        let mut guard = self.lounge_write(lounge_id).await?;

        let id = match guard.hours.get(&day) {
            Some(existing) => existing.id,
            None => self.store.allocate_id(),
        };
        let event = Event::BusinessHourSet {
            id,
            lounge_id,
            day,
            start_time,
            finish_time,
            closed,
            at: now_ms(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.hours[&day].clone())
    }

    /// Add a guest setting. The newest one becomes the lounge's active setting.
    pub async fn add_setting(
        &self,
        lounge_id: Id,
        min_guest: u32,
        max_guest: Option<u32>,
        booking_window_days: Option<u32>,
    ) -> Result<Setting, EngineError> {
        if min_guest == 0 {
            return Err(EngineError::InvalidInput("min_guest must be positive"));
        }
        if max_guest.is_some_and(|max| max < min_guest) {
            return Err(EngineError::InvalidInput("max_guest must not be below min_guest"));
        }
        if max_guest.unwrap_or(min_guest) > MAX_GUESTS {
            return Err(EngineError::LimitExceeded("guest setting too large"));
        }
        let mut guard = self.lounge_write(lounge_id).await?;
        if guard.settings.len() >= MAX_SETTINGS_PER_LOUNGE {
            return Err(EngineError::LimitExceeded("too many settings in lounge"));
        }

        let setting = Setting {
            id: self.store.allocate_id(),
            lounge_id,
            min_guest,
            max_guest,
            booking_window_days,
            created_at: now_ms(),
        };
        let event = Event::SettingAdded {
            id: setting.id,
            lounge_id,
            min_guest,
            max_guest,
            booking_window_days,
            at: setting.created_at,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("lounge {lounge_id}: setting {} active (min_guest={min_guest})", setting.id);
        Ok(setting)
    }
}
