pub const MAX_LOUNGES: usize = 10_000;
pub const MAX_TABLES_PER_LOUNGE: usize = 1_000;
pub const MAX_SETTINGS_PER_LOUNGE: usize = 100;
pub const MAX_BOOKINGS_PER_LOUNGE: usize = 1_000_000;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_ADDRESS_LEN: usize = 255;
pub const MAX_POSTCODE_LEN: usize = 16;
/// Upper bound on any table capacity or guest setting.
pub const MAX_GUESTS: u32 = 10_000;
