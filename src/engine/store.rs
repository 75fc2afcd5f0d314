use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::model::*;

use super::SharedLoungeState;

/// In-memory entity store: one locked `LoungeState` per lounge plus the
/// indices needed to find a booking without scanning every lounge.
pub struct InMemoryStore {
    lounges: DashMap<Id, SharedLoungeState>,
    booking_to_lounge: DashMap<Id, Id>,
    user_bookings: DashMap<UserId, BTreeSet<Id>>,
    next_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            lounges: DashMap::new(),
            booking_to_lounge: DashMap::new(),
            user_bookings: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    // ── Identity ─────────────────────────────────────────────

    pub fn allocate_id(&self) -> Id {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Keep the sequence ahead of an id read back from the log.
    pub fn observe_id(&self, id: Id) {
        self.reserve_ids(id + 1);
    }

    /// Never hand out an id below `next_id`.
    pub fn reserve_ids(&self, next_id: Id) {
        self.next_id.fetch_max(next_id, Ordering::Relaxed);
    }

    /// The id the next allocation will return.
    pub fn next_id(&self) -> Id {
        self.next_id.load(Ordering::Relaxed)
    }

    // ── Lounges ──────────────────────────────────────────────

    pub fn lounge_count(&self) -> usize {
        self.lounges.len()
    }

    pub fn get_lounge(&self, id: &Id) -> Option<SharedLoungeState> {
        self.lounges.get(id).map(|e| e.value().clone())
    }

    pub fn insert_lounge(&self, id: Id, state: SharedLoungeState) {
        self.lounges.insert(id, state);
    }

    /// Lounge ids in ascending (creation) order.
    pub fn lounge_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.lounges.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    // ── Booking indices ──────────────────────────────────────

    pub fn lounge_for_booking(&self, booking_id: &Id) -> Option<Id> {
        self.booking_to_lounge.get(booking_id).map(|e| *e.value())
    }

    /// Booking ids owned by `user`, ascending.
    pub fn bookings_for_user(&self, user: &UserId) -> Vec<Id> {
        self.user_bookings
            .get(user)
            .map(|e| e.value().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_lounge.len()
    }

    fn index_booking(&self, booking: &Booking) {
        self.booking_to_lounge.insert(booking.id, booking.lounge_id);
        self.user_bookings
            .entry(booking.user_id)
            .or_default()
            .insert(booking.id);
    }

    fn unindex_booking(&self, booking: &Booking) {
        self.booking_to_lounge.remove(&booking.id);
        if let Some(mut ids) = self.user_bookings.get_mut(&booking.user_id) {
            ids.remove(&booking.id);
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply an event to its lounge. The caller holds the lounge's write lock.
    /// `LoungeCreated` is handled at the map level and ignored here.
    pub fn apply_event(&self, ls: &mut LoungeState, event: &Event) {
        if let Some(id) = event.record_id() {
            self.observe_id(id);
        }
        match event {
            Event::LoungeCreated { .. } | Event::IdsReserved { .. } => {}
            Event::LoungeUpdated { details, at, .. } => {
                let lounge = &mut ls.lounge;
                lounge.name = details.name.clone();
                lounge.address1 = details.address1.clone();
                lounge.address2 = details.address2.clone();
                lounge.postcode = details.postcode.clone();
                lounge.modified_at = *at;
            }
            Event::TableAdded { id, lounge_id, name, capacity, at } => {
                ls.tables.insert(
                    *id,
                    Table {
                        id: *id,
                        lounge_id: *lounge_id,
                        name: name.clone(),
                        capacity: *capacity,
                        created_at: *at,
                    },
                );
            }
            Event::BusinessHourSet {
                id,
                lounge_id,
                day,
                start_time,
                finish_time,
                closed,
                at,
            } => {
                let created_at = ls.hours.get(day).map_or(*at, |h| h.created_at);
                ls.hours.insert(
                    *day,
                    BusinessHour {
                        id: *id,
                        lounge_id: *lounge_id,
                        day: *day,
                        start_time: *start_time,
                        finish_time: *finish_time,
                        closed: *closed,
                        created_at,
                        modified_at: *at,
                    },
                );
            }
            Event::SettingAdded {
                id,
                lounge_id,
                min_guest,
                max_guest,
                booking_window_days,
                at,
            } => {
                ls.settings.push(Setting {
                    id: *id,
                    lounge_id: *lounge_id,
                    min_guest: *min_guest,
                    max_guest: *max_guest,
                    booking_window_days: *booking_window_days,
                    created_at: *at,
                });
            }
            Event::BookingCreated {
                id,
                lounge_id,
                user_id,
                table_id,
                date,
                total_guests,
                at,
            } => {
                let booking = Booking {
                    id: *id,
                    user_id: *user_id,
                    lounge_id: *lounge_id,
                    table_id: *table_id,
                    date: *date,
                    total_guests: *total_guests,
                    created_at: *at,
                    modified_at: *at,
                };
                self.index_booking(&booking);
                ls.bookings.insert(*id, booking);
            }
            Event::BookingUpdated { id, table_id, date, total_guests, at, .. } => {
                if let Some(booking) = ls.bookings.get_mut(id) {
                    booking.table_id = *table_id;
                    booking.date = *date;
                    booking.total_guests = *total_guests;
                    booking.modified_at = *at;
                }
            }
            Event::BookingDeleted { id, .. } => {
                if let Some(booking) = ls.bookings.remove(id) {
                    self.unindex_booking(&booking);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lounge_state(id: Id) -> LoungeState {
        LoungeState::new(Lounge {
            id,
            name: "Familia Lounge".into(),
            address1: String::new(),
            address2: String::new(),
            postcode: String::new(),
            created_at: 0,
            modified_at: 0,
        })
    }

    fn created(id: Id, user_id: UserId) -> Event {
        Event::BookingCreated {
            id,
            lounge_id: 1,
            user_id,
            table_id: 2,
            date: 5_000,
            total_guests: 3,
            at: 100,
        }
    }

    #[test]
    fn ids_are_monotonic_and_follow_replay() {
        let store = InMemoryStore::new();
        assert_eq!(store.allocate_id(), 1);
        assert_eq!(store.allocate_id(), 2);
        store.observe_id(40);
        assert_eq!(store.allocate_id(), 41);
        store.observe_id(3);
        assert_eq!(store.allocate_id(), 42);
        store.reserve_ids(100);
        assert_eq!(store.next_id(), 100);
        store.reserve_ids(50);
        assert_eq!(store.allocate_id(), 100);
    }

    #[test]
    fn booking_indices_follow_lifecycle() {
        let store = InMemoryStore::new();
        let mut ls = lounge_state(1);

        store.apply_event(&mut ls, &created(10, 7));
        store.apply_event(&mut ls, &created(11, 8));
        store.apply_event(&mut ls, &created(12, 7));
        assert_eq!(store.lounge_for_booking(&10), Some(1));
        assert_eq!(store.bookings_for_user(&7), vec![10, 12]);
        assert_eq!(store.booking_count(), 3);

        store.apply_event(&mut ls, &Event::BookingDeleted { id: 10, lounge_id: 1 });
        assert_eq!(store.lounge_for_booking(&10), None);
        assert_eq!(store.bookings_for_user(&7), vec![12]);
        assert!(!ls.bookings.contains_key(&10));
    }

    #[test]
    fn update_keeps_identity_and_owner() {
        let store = InMemoryStore::new();
        let mut ls = lounge_state(1);
        store.apply_event(&mut ls, &created(10, 7));
        store.apply_event(
            &mut ls,
            &Event::BookingUpdated {
                id: 10,
                lounge_id: 1,
                table_id: 4,
                date: 9_000,
                total_guests: 2,
                at: 200,
            },
        );
        let b = &ls.bookings[&10];
        assert_eq!((b.user_id, b.lounge_id, b.table_id), (7, 1, 4));
        assert_eq!((b.created_at, b.modified_at), (100, 200));
    }

    #[test]
    fn business_hour_replaces_day() {
        let store = InMemoryStore::new();
        let mut ls = lounge_state(1);
        let t = |h| chrono::NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let set = |at, start, closed| Event::BusinessHourSet {
            id: 3,
            lounge_id: 1,
            day: 2,
            start_time: t(start),
            finish_time: t(17),
            closed,
            at,
        };
        store.apply_event(&mut ls, &set(100, 9, false));
        store.apply_event(&mut ls, &set(300, 11, true));
        assert_eq!(ls.hours.len(), 1);
        let h = &ls.hours[&2];
        assert_eq!(h.start_time, t(11));
        assert!(h.closed);
        assert_eq!((h.created_at, h.modified_at), (100, 300));
    }
}
