use tracing_subscriber::EnvFilter;

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "lounge_booker_bookings_created_total";

/// Counter: bookings changed in place.
pub const BOOKINGS_UPDATED_TOTAL: &str = "lounge_booker_bookings_updated_total";

/// Counter: bookings hard-deleted.
pub const BOOKINGS_DELETED_TOTAL: &str = "lounge_booker_bookings_deleted_total";

/// Counter: validation failures. Labels: field.
pub const BOOKINGS_REJECTED_TOTAL: &str = "lounge_booker_bookings_rejected_total";

/// Histogram: create/update latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "lounge_booker_operation_duration_seconds";

// ── Store ───────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "lounge_booker_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "lounge_booker_wal_flush_batch_size";

/// Install the fmt subscriber on stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
