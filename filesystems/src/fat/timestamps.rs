// Packed FAT date/time fields.
//
// Date: bits 15-9 year since 1980, 8-5 month, 4-0 day.
// Time: bits 15-11 hour, 10-5 minute, 4-0 seconds/2.
// Conversion composes in local civil time; encoding truncates to the
// format's 2-second resolution and clamps years to 1980..=2107.

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, TimeZone, Timelike};

/// Decode a packed date/time pair to epoch seconds. Unrepresentable field
/// combinations decode to 0.
pub fn fat_datetime_to_unix(date: u16, time: u16) -> i64 {
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;

    let hour = ((time >> 11) & 0x1F) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;

    let naive = match NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
    {
        Some(dt) => dt,
        None => return 0,
    };

    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        LocalResult::None => 0,
    }
}

/// Encode epoch seconds as a packed (date, time) pair.
pub fn unix_to_fat_datetime(timestamp: i64) -> (u16, u16) {
    let dt = match Local.timestamp_opt(timestamp, 0) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => return (0, 0),
    };
    encode(&dt)
}

/// The current instant in packed form, for freshly created entries.
pub fn now_fat_datetime() -> (u16, u16) {
    encode(&Local::now())
}

fn encode(dt: &DateTime<Local>) -> (u16, u16) {
    let year = dt.year();
    let fat_year = if year < 1980 {
        0
    } else if year > 2107 {
        127
    } else {
        (year - 1980) as u16
    };

    let date = (fat_year << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    (date, time)
}
