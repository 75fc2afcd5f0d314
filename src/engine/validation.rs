use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::*;

pub const INVALID_TABLE_MSG: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const PAST_DATE_MSG: &str = "Please choose a date and time that is in the future, thank you.";
pub const INVALID_GUESTS_MSG: &str = "Please choose a valid number of guests for your order.";

pub fn min_guests_msg(min_guest: u32) -> String {
    format!("The minimum guests per booking is: {min_guest}")
}

pub fn max_capacity_msg(capacity: u32) -> String {
    format!("The maximum table capacity is {capacity}")
}

/// Booking form fields, in the order errors are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Table,
    Date,
    TotalGuests,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Table => "table",
            Field::Date => "date",
            Field::TotalGuests => "total_guests",
        }
    }
}

/// Human-readable messages per field. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &[String])> {
        self.0.iter().map(|(f, msgs)| (*f, msgs.as_slice()))
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{}: {message}", field.as_str())?;
            }
        }
        Ok(())
    }
}

/// Check a booking request against the lounge's tables and guest bounds.
///
/// Every rule is evaluated; all violations are reported together.
/// `selectable` is the set of tables the caller may choose from, which is
/// what ties the table to the lounge.
pub fn validate_booking(
    candidate: &BookingCandidate,
    selectable: &[Table],
    bounds: &GuestBounds,
    now: Ms,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    let table = selectable.iter().find(|t| t.id == candidate.table_id);
    if table.is_none() {
        errors.add(Field::Table, INVALID_TABLE_MSG);
    }

    if candidate.date <= now {
        errors.add(Field::Date, PAST_DATE_MSG);
    }

    let guests = candidate.total_guests;
    if guests <= 0 {
        errors.add(Field::TotalGuests, INVALID_GUESTS_MSG);
    } else if let Some(min) = bounds.min_guest
        && guests < i64::from(min)
    {
        errors.add(Field::TotalGuests, min_guests_msg(min));
    }

    if let Some(table) = table
        && guests > i64::from(table.capacity)
    {
        errors.add(Field::TotalGuests, max_capacity_msg(table.capacity));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Ms = 1_700_000_000_000;
    const DAY: Ms = 86_400_000;

    fn table(id: Id, lounge_id: Id, capacity: u32) -> Table {
        Table {
            id,
            lounge_id,
            name: format!("table-{id}"),
            capacity,
            created_at: 0,
        }
    }

    fn candidate(table_id: Id, date: Ms, total_guests: i64) -> BookingCandidate {
        BookingCandidate { table_id, date, total_guests }
    }

    fn bounds(min: u32) -> GuestBounds {
        GuestBounds { min_guest: Some(min), max_guest: None }
    }

    #[test]
    fn accepts_valid_request() {
        let tables = [table(1, 10, 7)];
        let c = candidate(1, NOW + 3 * DAY, 5);
        assert!(validate_booking(&c, &tables, &bounds(3), NOW).is_ok());
    }

    #[test]
    fn over_capacity() {
        let tables = [table(1, 10, 7)];
        let errors = validate_booking(&candidate(1, NOW + DAY, 8), &tables, &bounds(3), NOW)
            .unwrap_err();
        assert_eq!(errors.get(Field::TotalGuests), ["The maximum table capacity is 7"]);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec![Field::TotalGuests]);
    }

    #[test]
    fn exact_and_below_capacity() {
        let tables = [table(1, 10, 7)];
        for guests in [7, 6] {
            let c = candidate(1, NOW + DAY, guests);
            assert!(validate_booking(&c, &tables, &bounds(3), NOW).is_ok(), "guests={guests}");
        }
    }

    #[test]
    fn zero_guests_beats_minimum() {
        let tables = [table(1, 10, 7)];
        let errors = validate_booking(&candidate(1, NOW + DAY, 0), &tables, &bounds(3), NOW)
            .unwrap_err();
        assert_eq!(errors.get(Field::TotalGuests), [INVALID_GUESTS_MSG]);
    }

    #[test]
    fn negative_guests_is_invalid_count() {
        let tables = [table(1, 10, 7)];
        let errors = validate_booking(&candidate(1, NOW + DAY, -4), &tables, &bounds(3), NOW)
            .unwrap_err();
        assert_eq!(errors.get(Field::TotalGuests), [INVALID_GUESTS_MSG]);
    }

    #[test]
    fn below_minimum() {
        let tables = [table(1, 10, 7)];
        let errors = validate_booking(&candidate(1, NOW + DAY, 2), &tables, &bounds(3), NOW)
            .unwrap_err();
        assert_eq!(errors.get(Field::TotalGuests), ["The minimum guests per booking is: 3"]);
    }

    #[test]
    fn exact_minimum() {
        let tables = [table(1, 10, 7)];
        assert!(validate_booking(&candidate(1, NOW + DAY, 3), &tables, &bounds(3), NOW).is_ok());
    }

    #[test]
    fn no_setting_means_any_positive_count() {
        let tables = [table(1, 10, 7)];
        let c = candidate(1, NOW + DAY, 1);
        assert!(validate_booking(&c, &tables, &GuestBounds::default(), NOW).is_ok());
    }

    #[test]
    fn max_guest_is_not_enforced() {
        let tables = [table(1, 10, 7)];
        let b = GuestBounds { min_guest: Some(1), max_guest: Some(4) };
        assert!(validate_booking(&candidate(1, NOW + DAY, 6), &tables, &b, NOW).is_ok());
    }

    #[test]
    fn past_date() {
        let tables = [table(1, 10, 7)];
        let errors = validate_booking(&candidate(1, NOW - 3 * DAY, 4), &tables, &bounds(3), NOW)
            .unwrap_err();
        assert_eq!(errors.get(Field::Date), [PAST_DATE_MSG]);
        assert!(errors.get(Field::TotalGuests).is_empty());
    }

    #[test]
    fn date_equal_to_now_rejected() {
        let tables = [table(1, 10, 7)];
        let errors =
            validate_booking(&candidate(1, NOW, 4), &tables, &bounds(3), NOW).unwrap_err();
        assert_eq!(errors.get(Field::Date), [PAST_DATE_MSG]);
        assert!(validate_booking(&candidate(1, NOW + 1, 4), &tables, &bounds(3), NOW).is_ok());
    }

    #[test]
    fn table_outside_selection() {
        // Table 2 belongs to lounge 20; only lounge 10's tables are selectable.
        let selectable = [table(1, 10, 7)];
        let errors = validate_booking(&candidate(2, NOW + DAY, 40), &selectable, &bounds(3), NOW)
            .unwrap_err();
        assert_eq!(errors.get(Field::Table), [INVALID_TABLE_MSG]);
        // No table resolved, so no capacity message.
        assert!(errors.get(Field::TotalGuests).is_empty());
    }

    #[test]
    fn empty_selection_rejects_everything() {
        let errors =
            validate_booking(&candidate(1, NOW + DAY, 2), &[], &GuestBounds::default(), NOW)
                .unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec![Field::Table]);
    }

    #[test]
    fn reports_all_fields_at_once() {
        let tables = [table(1, 10, 7)];
        let errors =
            validate_booking(&candidate(9, NOW - DAY, 0), &tables, &bounds(3), NOW).unwrap_err();
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec![Field::Table, Field::Date, Field::TotalGuests]
        );
    }

    #[test]
    fn minimum_and_capacity_both_reported() {
        // A setting larger than the table: 3 guests are under the minimum
        // of 5 and over the capacity of 2.
        let tables = [table(1, 10, 2)];
        let errors = validate_booking(&candidate(1, NOW + DAY, 3), &tables, &bounds(5), NOW)
            .unwrap_err();
        assert_eq!(
            errors.get(Field::TotalGuests),
            ["The minimum guests per booking is: 5", "The maximum table capacity is 2"]
        );
    }

    #[test]
    fn guest_range_property() {
        let tables = [table(1, 10, 6)];
        for min in [None, Some(1), Some(2), Some(4)] {
            let b = GuestBounds { min_guest: min, max_guest: None };
            for guests in -2..=9 {
                let ok = validate_booking(&candidate(1, NOW + DAY, guests), &tables, &b, NOW)
                    .is_ok();
                let expected = i64::from(b.lower_bound()) <= guests && guests <= 6;
                assert_eq!(ok, expected, "min={min:?} guests={guests}");
            }
        }
    }

    #[test]
    fn display_joins_messages() {
        let mut errors = FieldErrors::new();
        errors.add(Field::TotalGuests, "b");
        errors.add(Field::Date, "a");
        assert_eq!(errors.to_string(), "date: a; total_guests: b");
    }

    #[test]
    fn serializes_as_field_map() {
        let mut errors = FieldErrors::new();
        errors.add(Field::TotalGuests, max_capacity_msg(7));
        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(json, r#"{"total_guests":["The maximum table capacity is 7"]}"#);
    }
}
