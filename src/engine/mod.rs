mod admin;
mod bookings;
mod error;
mod queries;
mod settings;
mod store;
mod validation;

pub use error::{EngineError, RecordKind};
pub use settings::{active_setting, resolve_bounds};
pub use store::InMemoryStore;
pub use validation::{validate_booking, Field, FieldErrors};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use tracing::error;

use crate::model::*;
use crate::wal::Wal;

pub type SharedLoungeState = Arc<RwLock<LoungeState>>;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms)
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL. Appends that arrive while a flush is
/// pending are batched behind a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            error!("WAL flush of {} events failed: {e}", batch.len());
        }
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush regardless so a half-written batch does not leak into the next one.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The booking engine: the entity store, its write-ahead log, and the
/// operations staff and users run against them.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Serialises lounge creation against compaction.
    pub(super) lounge_creation: Mutex<()>,
}

impl Engine {
    /// Replay the log at `wal_path` and start its writer task. Must be called
    /// from within a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            lounge_creation: Mutex::new(()),
        };

        // Sole owner of every lock during replay, so try_write never contends.
        for event in &events {
            match event {
                Event::IdsReserved { next_id } => engine.store.reserve_ids(*next_id),
                Event::LoungeCreated { id, details, at } => {
                    engine.store.observe_id(*id);
                    let state = LoungeState::new(lounge_from(*id, details, *at));
                    engine.store.insert_lounge(*id, Arc::new(RwLock::new(state)));
                }
                other => {
                    let Some(entry) = other.lounge_id().and_then(|id| engine.store.get_lounge(&id))
                    else {
                        continue;
                    };
                    let Ok(mut guard) = entry.try_write() else {
                        continue;
                    };
                    engine.store.apply_event(&mut guard, other);
                }
            }
        }

        tracing::debug!(
            "replayed {} events: {} lounges, {} bookings",
            events.len(),
            engine.store.lounge_count(),
            engine.store.booking_count()
        );
        Ok(engine)
    }

    /// Write an event through the group-commit writer; returns once durable.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append, then apply. State is untouched if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        ls: &mut LoungeState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(ls, event);
        Ok(())
    }

    /// Lookup lounge and take its write lock.
    pub(super) async fn lounge_write(
        &self,
        lounge_id: Id,
    ) -> Result<OwnedRwLockWriteGuard<LoungeState>, EngineError> {
        let ls = self
            .store
            .get_lounge(&lounge_id)
            .ok_or_else(|| EngineError::lounge_not_found(lounge_id))?;
        Ok(ls.write_owned().await)
    }

    /// Lookup booking → lounge and take the lounge's write lock.
    pub(super) async fn booking_write(
        &self,
        booking_id: Id,
    ) -> Result<OwnedRwLockWriteGuard<LoungeState>, EngineError> {
        let lounge_id = self
            .store
            .lounge_for_booking(&booking_id)
            .ok_or_else(|| EngineError::booking_not_found(booking_id))?;
        let guard = self.lounge_write(lounge_id).await?;
        // Deleted between the index lookup and the lock.
        if !guard.bookings.contains_key(&booking_id) {
            return Err(EngineError::booking_not_found(booking_id));
        }
        Ok(guard)
    }

    /// Rewrite the WAL with only the events needed to rebuild current state.
    ///
    /// Every lounge stays read-locked, and lounge creation blocked, until the
    /// rewritten log is in place, so no committed event can fall between the
    /// snapshot and the swap. The log ends with the id sequence, so ids of
    /// deleted records are never issued again.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _creation = self.lounge_creation.lock().await;
        let mut guards = Vec::new();
        let mut events = Vec::new();
        for id in self.store.lounge_ids() {
            let Some(ls) = self.store.get_lounge(&id) else { continue };
            let guard = ls.read_owned().await;
            snapshot_events(&guard, &mut events);
            guards.push(guard);
        }
        // Ids are only allocated under a lounge write lock or the creation lock.
        events.push(Event::IdsReserved { next_id: self.store.next_id() });
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Compact once `threshold` appends have accumulated. Returns whether it ran.
    pub async fn maybe_compact(&self, threshold: u64) -> Result<bool, EngineError> {
        let appends = self.wal_appends_since_compact().await;
        if appends < threshold {
            return Ok(false);
        }
        self.compact_wal().await?;
        tracing::info!("compacted WAL after {appends} appends");
        Ok(true)
    }
}

fn lounge_from(id: Id, details: &LoungeDetails, at: Ms) -> Lounge {
    Lounge {
        id,
        name: details.name.clone(),
        address1: details.address1.clone(),
        address2: details.address2.clone(),
        postcode: details.postcode.clone(),
        created_at: at,
        modified_at: at,
    }
}

fn details_of(lounge: &Lounge) -> LoungeDetails {
    LoungeDetails {
        name: lounge.name.clone(),
        address1: lounge.address1.clone(),
        address2: lounge.address2.clone(),
        postcode: lounge.postcode.clone(),
    }
}

/// Events that recreate one lounge, timestamps included.
fn snapshot_events(ls: &LoungeState, events: &mut Vec<Event>) {
    let lounge = &ls.lounge;
    events.push(Event::LoungeCreated {
        id: lounge.id,
        details: details_of(lounge),
        at: lounge.created_at,
    });
    if lounge.modified_at != lounge.created_at {
        events.push(Event::LoungeUpdated {
            id: lounge.id,
            details: details_of(lounge),
            at: lounge.modified_at,
        });
    }
    for table in ls.tables.values() {
        events.push(Event::TableAdded {
            id: table.id,
            lounge_id: lounge.id,
            name: table.name.clone(),
            capacity: table.capacity,
            at: table.created_at,
        });
    }
    for hour in ls.hours.values() {
        let set = |at| Event::BusinessHourSet {
            id: hour.id,
            lounge_id: lounge.id,
            day: hour.day,
            start_time: hour.start_time,
            finish_time: hour.finish_time,
            closed: hour.closed,
            at,
        };
        events.push(set(hour.created_at));
        if hour.modified_at != hour.created_at {
            events.push(set(hour.modified_at));
        }
    }
    for s in &ls.settings {
        events.push(Event::SettingAdded {
            id: s.id,
            lounge_id: lounge.id,
            min_guest: s.min_guest,
            max_guest: s.max_guest,
            booking_window_days: s.booking_window_days,
            at: s.created_at,
        });
    }
    for b in ls.bookings.values() {
        events.push(Event::BookingCreated {
            id: b.id,
            lounge_id: lounge.id,
            user_id: b.user_id,
            table_id: b.table_id,
            date: b.date,
            total_guests: b.total_guests,
            at: b.created_at,
        });
        if b.modified_at != b.created_at {
            events.push(Event::BookingUpdated {
                id: b.id,
                lounge_id: lounge.id,
                table_id: b.table_id,
                date: b.date,
                total_guests: b.total_guests,
                at: b.modified_at,
            });
        }
    }
}
