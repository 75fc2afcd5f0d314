use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Unix milliseconds, the only instant type.
pub type Ms = i64;

/// Record identity. One sequence is shared by every record kind.
pub type Id = u64;

/// Opaque user identity handed over by the authentication layer.
pub type UserId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lounge {
    pub id: Id,
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub postcode: String,
    pub created_at: Ms,
    pub modified_at: Ms,
}

impl std::fmt::Display for Lounge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Address and name fields of a lounge, as entered by staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoungeDetails {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub postcode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: Id,
    pub lounge_id: Id,
    pub name: String,
    /// Hard upper bound on guests for any booking at this table.
    pub capacity: u32,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHour {
    pub id: Id,
    pub lounge_id: Id,
    /// 0 = Monday .. 6 = Sunday.
    pub day: u8,
    pub start_time: NaiveTime,
    pub finish_time: NaiveTime,
    pub closed: bool,
    pub created_at: Ms,
    pub modified_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub id: Id,
    pub lounge_id: Id,
    pub min_guest: u32,
    pub max_guest: Option<u32>,
    /// How many days ahead a booking may be placed. Stored, not enforced.
    pub booking_window_days: Option<u32>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Id,
    pub user_id: UserId,
    pub lounge_id: Id,
    pub table_id: Id,
    pub date: Ms,
    pub total_guests: u32,
    pub created_at: Ms,
    pub modified_at: Ms,
}

/// The mutable part of a booking request. Guest count is signed because it
/// arrives straight from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCandidate {
    pub table_id: Id,
    pub date: Ms,
    pub total_guests: i64,
}

/// Guest-count bounds resolved from a lounge's active setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestBounds {
    pub min_guest: Option<u32>,
    pub max_guest: Option<u32>,
}

impl GuestBounds {
    /// Smallest acceptable guest count: `max(1, min_guest)`.
    pub fn lower_bound(&self) -> u32 {
        self.min_guest.unwrap_or(1).max(1)
    }
}

/// Everything a lounge owns. The unit of locking: one write lock per lounge
/// covers a whole booking transaction.
#[derive(Debug, Clone)]
pub struct LoungeState {
    pub lounge: Lounge,
    pub tables: BTreeMap<Id, Table>,
    /// Keyed by day of week; at most one record per day.
    pub hours: BTreeMap<u8, BusinessHour>,
    pub settings: Vec<Setting>,
    /// Keyed by id, so iteration is creation order.
    pub bookings: BTreeMap<Id, Booking>,
}

impl LoungeState {
    pub fn new(lounge: Lounge) -> Self {
        Self {
            lounge,
            tables: BTreeMap::new(),
            hours: BTreeMap::new(),
            settings: Vec::new(),
            bookings: BTreeMap::new(),
        }
    }

    /// The tables a booking at this lounge may pick from.
    pub fn selectable_tables(&self) -> Vec<Table> {
        self.tables.values().cloned().collect()
    }
}

/// Flat event records. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    LoungeCreated {
        id: Id,
        details: LoungeDetails,
        at: Ms,
    },
    LoungeUpdated {
        id: Id,
        details: LoungeDetails,
        at: Ms,
    },
    TableAdded {
        id: Id,
        lounge_id: Id,
        name: String,
        capacity: u32,
        at: Ms,
    },
    BusinessHourSet {
        id: Id,
        lounge_id: Id,
        day: u8,
        start_time: NaiveTime,
        finish_time: NaiveTime,
        closed: bool,
        at: Ms,
    },
    SettingAdded {
        id: Id,
        lounge_id: Id,
        min_guest: u32,
        max_guest: Option<u32>,
        booking_window_days: Option<u32>,
        at: Ms,
    },
    BookingCreated {
        id: Id,
        lounge_id: Id,
        user_id: UserId,
        table_id: Id,
        date: Ms,
        total_guests: u32,
        at: Ms,
    },
    BookingUpdated {
        id: Id,
        lounge_id: Id,
        table_id: Id,
        date: Ms,
        total_guests: u32,
        at: Ms,
    },
    BookingDeleted {
        id: Id,
        lounge_id: Id,
    },
    /// Closes a compacted log: every id below `next_id` has been issued,
    /// including ids of records that no longer exist.
    IdsReserved {
        next_id: Id,
    },
}

impl Event {
    /// Id of the record this event creates or touches.
    pub fn record_id(&self) -> Option<Id> {
        match self {
            Event::LoungeCreated { id, .. }
            | Event::LoungeUpdated { id, .. }
            | Event::TableAdded { id, .. }
            | Event::BusinessHourSet { id, .. }
            | Event::SettingAdded { id, .. }
            | Event::BookingCreated { id, .. }
            | Event::BookingUpdated { id, .. }
            | Event::BookingDeleted { id, .. } => Some(*id),
            Event::IdsReserved { .. } => None,
        }
    }

    /// The lounge this event belongs to.
    pub fn lounge_id(&self) -> Option<Id> {
        match self {
            Event::LoungeCreated { id, .. } | Event::LoungeUpdated { id, .. } => Some(*id),
            Event::TableAdded { lounge_id, .. }
            | Event::BusinessHourSet { lounge_id, .. }
            | Event::SettingAdded { lounge_id, .. }
            | Event::BookingCreated { lounge_id, .. }
            | Event::BookingUpdated { lounge_id, .. }
            | Event::BookingDeleted { lounge_id, .. } => Some(*lounge_id),
            Event::IdsReserved { .. } => None,
        }
    }
}
