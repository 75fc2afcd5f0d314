use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use lounge_booker::auth::Caller;
use lounge_booker::config::Config;
use lounge_booker::engine::{Engine, EngineError, RecordKind};
use lounge_booker::model::*;

const USAGE: &str = "\
usage:
  lounge-booker seed <file.json>
  lounge-booker lounges
  lounge-booker tables <lounge_id>
  lounge-booker book <user_id> <lounge_id> <table_id> <YYYY-MM-DDTHH:MM> <guests>
  lounge-booker update <user_id> <booking_id> <table_id> <YYYY-MM-DDTHH:MM> <guests>
  lounge-booker delete <user_id> <booking_id>
  lounge-booker bookings <user_id>

<user_id> may be `anonymous`. Dates are UTC.";

/// `datetime-local` input format.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug)]
enum Command {
    Seed(PathBuf),
    Lounges,
    Tables(Id),
    Book { caller: Caller, lounge_id: Id, candidate: BookingCandidate },
    Update { caller: Caller, booking_id: Id, candidate: BookingCandidate },
    Delete { caller: Caller, booking_id: Id },
    Bookings(Caller),
}

fn parse_id(what: &str, s: &str) -> Result<Id, String> {
    s.parse().map_err(|_| format!("invalid {what}: {s}"))
}

fn parse_caller(s: &str) -> Result<Caller, String> {
    if s == "anonymous" {
        return Ok(Caller::Anonymous);
    }
    parse_id("user id", s).map(Caller::User)
}

fn parse_date(s: &str) -> Result<Ms, String> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp_millis())
        .map_err(|e| format!("invalid date {s}: {e}"))
}

fn parse_candidate(table: &str, date: &str, guests: &str) -> Result<BookingCandidate, String> {
    Ok(BookingCandidate {
        table_id: parse_id("table id", table)?,
        date: parse_date(date)?,
        total_guests: guests
            .parse()
            .map_err(|_| format!("invalid number of guests: {guests}"))?,
    })
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, String> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["seed", file] => Ok(Command::Seed(PathBuf::from(file))),
            ["lounges"] => Ok(Command::Lounges),
            ["tables", lounge] => Ok(Command::Tables(parse_id("lounge id", lounge)?)),
            ["book", user, lounge, table, date, guests] => Ok(Command::Book {
                caller: parse_caller(user)?,
                lounge_id: parse_id("lounge id", lounge)?,
                candidate: parse_candidate(table, date, guests)?,
            }),
            ["update", user, booking, table, date, guests] => Ok(Command::Update {
                caller: parse_caller(user)?,
                booking_id: parse_id("booking id", booking)?,
                candidate: parse_candidate(table, date, guests)?,
            }),
            ["delete", user, booking] => Ok(Command::Delete {
                caller: parse_caller(user)?,
                booking_id: parse_id("booking id", booking)?,
            }),
            ["bookings", user] => Ok(Command::Bookings(parse_caller(user)?)),
            [] => Err("missing command".into()),
            [cmd, ..] => Err(format!("unknown command or wrong arguments: {cmd}")),
        }
    }
}

// ── Seed file ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedFile {
    lounges: Vec<SeedLounge>,
}

#[derive(Debug, Deserialize)]
struct SeedLounge {
    #[serde(flatten)]
    details: LoungeDetails,
    #[serde(default)]
    tables: Vec<SeedTable>,
    #[serde(default)]
    business_hours: Vec<SeedHour>,
    #[serde(default)]
    settings: Vec<SeedSetting>,
}

#[derive(Debug, Deserialize)]
struct SeedTable {
    name: String,
    capacity: u32,
}

#[derive(Debug, Deserialize)]
struct SeedHour {
    day: u8,
    start: String,
    finish: String,
    #[serde(default)]
    closed: bool,
}

#[derive(Debug, Deserialize)]
struct SeedSetting {
    min_guest: u32,
    max_guest: Option<u32>,
    booking_window_days: Option<u32>,
}

#[derive(Debug)]
enum CliError {
    Engine(EngineError),
    Input(String),
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, CliError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| CliError::Input(format!("invalid time {s}: {e}")))
}

async fn seed(engine: &Engine, path: &Path) -> Result<Value, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("cannot read {}: {e}", path.display())))?;
    let file: SeedFile = serde_json::from_str(&raw)
        .map_err(|e| CliError::Input(format!("invalid seed file: {e}")))?;

    let mut created = Vec::new();
    for entry in file.lounges {
        let lounge = engine.create_lounge(entry.details).await?;
        for t in entry.tables {
            engine.add_table(lounge.id, t.name, t.capacity).await?;
        }
        for h in entry.business_hours {
            let (start, finish) = (parse_time(&h.start)?, parse_time(&h.finish)?);
            engine
                .set_business_hour(lounge.id, h.day, start, finish, h.closed)
                .await?;
        }
        for s in entry.settings {
            engine
                .add_setting(lounge.id, s.min_guest, s.max_guest, s.booking_window_days)
                .await?;
        }
        info!("seeded lounge {} ({})", lounge.id, lounge.name);
        created.push(lounge);
    }
    Ok(json!({ "lounges": created }))
}

/// Lounge lookups on the booking path report a missing lounge in the
/// user-facing wording.
fn lounge_unavailable(e: EngineError) -> CliError {
    match e {
        EngineError::NotFound { kind: RecordKind::Lounge, .. } => {
            CliError::Input("This lounge is not available, please select another.".into())
        }
        other => CliError::Engine(other),
    }
}

async fn run(engine: &Engine, command: Command) -> Result<Value, CliError> {
    match command {
        Command::Seed(path) => seed(engine, &path).await,
        Command::Lounges => Ok(json!({ "lounges": engine.list_lounges().await })),
        Command::Tables(lounge_id) => {
            let lounge = engine.get_lounge(lounge_id).await.map_err(lounge_unavailable)?;
            let tables = engine.selectable_tables(lounge_id).await?;
            let bounds = engine.guest_bounds(lounge_id).await?;
            let hours = engine.business_hours(lounge_id).await?;
            Ok(json!({
                "lounge": lounge,
                "tables": tables,
                "guest_bounds": bounds,
                "business_hours": hours,
            }))
        }
        Command::Book { caller, lounge_id, candidate } => {
            let booking = engine
                .create_booking(&caller, lounge_id, candidate)
                .await
                .map_err(lounge_unavailable)?;
            let lounge = engine.get_lounge(booking.lounge_id).await?;
            Ok(json!({
                "message": format!("You have successfully booked with {lounge}. Enjoy!"),
                "booking": booking,
            }))
        }
        Command::Update { caller, booking_id, candidate } => {
            let booking = engine.update_booking(&caller, booking_id, candidate).await?;
            let lounge = engine.get_lounge(booking.lounge_id).await?;
            Ok(json!({
                "message": format!(
                    "Thank you, you have successfully updated your booking with {}",
                    lounge.name
                ),
                "booking": booking,
            }))
        }
        Command::Delete { caller, booking_id } => {
            let booking = engine.delete_booking(&caller, booking_id).await?;
            let lounge = engine.get_lounge(booking.lounge_id).await?;
            Ok(json!({
                "message": format!(
                    "Thank you, you have successfully deleted your booking with {}",
                    lounge.name
                ),
                "booking": booking,
            }))
        }
        Command::Bookings(caller) => {
            Ok(json!({ "bookings": engine.list_bookings_for_user(&caller).await? }))
        }
    }
}

fn engine_error_doc(e: &EngineError) -> Value {
    if let Some(fields) = e.field_errors() {
        return json!({ "error": "validation_failed", "fields": fields });
    }
    match e {
        EngineError::NotFound { .. } => json!({ "error": "not_found", "message": e.to_string() }),
        EngineError::Unauthenticated => {
            json!({ "error": "unauthenticated", "message": "Please log in to continue." })
        }
        e if e.is_user_facing() => json!({ "error": "rejected", "message": e.to_string() }),
        e => {
            error!("operation failed: {e}");
            json!({ "error": "internal", "message": "Something went wrong, please try again later." })
        }
    }
}

/// Print the failure document and choose an exit code: 1 for outcomes the
/// user can act on, 2 for infrastructure failures.
fn report(err: CliError) -> ExitCode {
    let doc = match &err {
        CliError::Input(msg) => json!({ "error": "invalid_request", "message": msg }),
        CliError::Engine(e) => engine_error_doc(e),
    };
    println!("{doc}");
    match err {
        CliError::Engine(e) if !e.is_user_facing() => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    lounge_booker::observability::init_tracing();
    let config = Config::from_env();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(msg) => {
            eprintln!("{msg}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("cannot create data dir {}: {e}", config.data_dir.display());
        return ExitCode::from(2);
    }
    let engine = match Engine::new(config.wal_path()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("cannot open WAL {}: {e}", config.wal_path().display());
            return ExitCode::from(2);
        }
    };

    let outcome = run(&engine, command).await;

    if let Err(e) = engine.maybe_compact(config.compact_threshold).await {
        warn!("WAL compaction failed: {e}");
    }

    match outcome {
        Ok(doc) => {
            println!("{doc}");
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn parses_book() {
        let cmd = Command::parse(&args("book 7 1 2 2030-05-01T19:30 4")).unwrap();
        let Command::Book { caller, lounge_id, candidate } = cmd else {
            panic!("expected book");
        };
        assert_eq!(caller, Caller::User(7));
        assert_eq!(lounge_id, 1);
        assert_eq!(candidate.table_id, 2);
        assert_eq!(candidate.total_guests, 4);
        assert_eq!(candidate.date, 1_903_894_200_000);
    }

    #[test]
    fn parses_anonymous_caller() {
        let cmd = Command::parse(&args("bookings anonymous")).unwrap();
        assert!(matches!(cmd, Command::Bookings(Caller::Anonymous)));
    }

    #[test]
    fn keeps_non_positive_guest_counts_for_the_validator() {
        let cmd = Command::parse(&args("update 7 9 2 2030-05-01T19:30 0")).unwrap();
        let Command::Update { candidate, .. } = cmd else {
            panic!("expected update");
        };
        assert_eq!(candidate.total_guests, 0);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse(&args("")).is_err());
        assert!(Command::parse(&args("tables x")).is_err());
        assert!(Command::parse(&args("book 7 1 2 01/05/2030 4")).is_err());
        assert!(Command::parse(&args("delete 7")).is_err());
        assert!(Command::parse(&args("frobnicate")).is_err());
    }

    #[test]
    fn error_documents() {
        let mut fields = lounge_booker::engine::FieldErrors::new();
        fields.add(lounge_booker::engine::Field::Date, "in the past");
        let doc = engine_error_doc(&EngineError::ValidationFailed(fields));
        assert_eq!(doc["error"], "validation_failed");
        assert_eq!(doc["fields"]["date"][0], "in the past");

        let doc = engine_error_doc(&EngineError::booking_not_found(12_345));
        assert_eq!(doc["error"], "not_found");
        assert_eq!(doc["message"], "booking not found: 12345");

        let doc = engine_error_doc(&EngineError::WalError("disk full".into()));
        assert_eq!(doc["error"], "internal");
    }

    #[tokio::test]
    async fn delete_confirms_with_lounge_name() {
        let dir = std::env::temp_dir().join("lounge_booker_test_cli");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("delete_message.wal");
        let _ = std::fs::remove_file(&path);
        let engine = Engine::new(path).unwrap();

        let lounge = engine
            .create_lounge(LoungeDetails {
                name: "Familia Lounge".into(),
                address1: "20 Temple Road".into(),
                address2: "London".into(),
                postcode: "E17 8BL".into(),
            })
            .await
            .unwrap();
        let table = engine.add_table(lounge.id, "Duo".into(), 2).await.unwrap();
        let cmd = Command::parse(&args(&format!(
            "book 7 {} {} 2099-05-01T19:30 2",
            lounge.id, table.id
        )))
        .unwrap();
        let booked = run(&engine, cmd).await.unwrap();
        assert_eq!(booked["message"], "You have successfully booked with Familia Lounge. Enjoy!");

        let booking_id = booked["booking"]["id"].as_u64().unwrap();
        let cmd = Command::parse(&args(&format!("delete 7 {booking_id}"))).unwrap();
        let deleted = run(&engine, cmd).await.unwrap();
        assert_eq!(
            deleted["message"],
            "Thank you, you have successfully deleted your booking with Familia Lounge"
        );
    }

    #[test]
    fn seed_file_shape() {
        let raw = r#"{"lounges": [{
            "name": "Familia Lounge", "address1": "20 Temple Road",
            "address2": "London", "postcode": "E17 8BL",
            "tables": [{"name": "Corner Table", "capacity": 6}],
            "business_hours": [{"day": 1, "start": "09:30", "finish": "17:00"}],
            "settings": [{"min_guest": 2}]
        }]}"#;
        let file: SeedFile = serde_json::from_str(raw).unwrap();
        let lounge = &file.lounges[0];
        assert_eq!(lounge.details.postcode, "E17 8BL");
        assert_eq!(lounge.tables[0].capacity, 6);
        assert!(!lounge.business_hours[0].closed);
        assert_eq!(lounge.settings[0].max_guest, None);
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }
}
