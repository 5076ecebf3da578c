//! COSEM date, time and date-time values
//!
//! One struct carries all three wire forms. Fields the peer marked as "not
//! specified" are recorded in [`DateTimeSkips`] and hold a neutral value
//! (current year, month 1, day 1, zero time).
//!
//! Wire layouts (big-endian):
//!
//! ```text
//! date      : year(u16) month day day-of-week
//! time      : hour minute second hundredths
//! date-time : date time deviation(i16) clock-status
//! ```

use crate::error::{DlmsError, DlmsResult};
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Deviation value meaning "not specified"
pub const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;

/// Minutes added by daylight saving time
pub const DST_DELTA_MINUTES: i16 = 60;

/// Fields of a [`CosemDateTime`] that are not specified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DateTimeSkips(u16);

impl DateTimeSkips {
    pub const NONE: Self = Self(0);
    pub const YEAR: Self = Self(0x001);
    pub const MONTH: Self = Self(0x002);
    pub const DAY: Self = Self(0x004);
    pub const DAY_OF_WEEK: Self = Self(0x008);
    pub const HOUR: Self = Self(0x010);
    pub const MINUTE: Self = Self(0x020);
    pub const SECOND: Self = Self(0x040);
    pub const MS: Self = Self(0x080);
    pub const DEVIATION: Self = Self(0x100);
    pub const STATUS: Self = Self(0x200);

    pub const DATE: Self = Self(0x00F);
    pub const TIME: Self = Self(0x0F0);

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for DateTimeSkips {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DateTimeSkips {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Clock status byte of a date-time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClockStatus(u8);

impl ClockStatus {
    pub const OK: Self = Self(0x00);
    pub const INVALID_VALUE: Self = Self(0x01);
    pub const DOUBTFUL_VALUE: Self = Self(0x02);
    pub const DIFFERENT_CLOCK_BASE: Self = Self(0x04);
    pub const INVALID_CLOCK_STATUS: Self = Self(0x08);
    pub const DAYLIGHT_SAVING_ACTIVE: Self = Self(0x80);
    pub const SKIPPED: Self = Self(0xFF);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_daylight_saving_active(self) -> bool {
        self.0 != 0xFF && self.0 & Self::DAYLIGHT_SAVING_ACTIVE.0 != 0
    }
}

/// Date, time or date-time with skip information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CosemDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    /// 1 = Monday .. 7 = Sunday
    pub day_of_week: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
    /// Offset from UTC in minutes, east positive
    pub offset_minutes: i16,
    pub status: ClockStatus,
    pub skip: DateTimeSkips,
    pub dst_begin: bool,
    pub dst_end: bool,
}

impl Default for CosemDateTime {
    fn default() -> Self {
        Self {
            year: 2000,
            month: 1,
            day: 1,
            day_of_week: 6,
            hour: 0,
            minute: 0,
            second: 0,
            millisecond: 0,
            offset_minutes: 0,
            status: ClockStatus::OK,
            skip: DateTimeSkips::NONE,
            dst_begin: false,
            dst_end: false,
        }
    }
}

impl CosemDateTime {
    /// Create a fully specified date-time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the fields do not form a valid calendar
    /// date and time of day.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        millisecond: u16,
        offset_minutes: i16,
    ) -> DlmsResult<Self> {
        let mut value = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
            offset_minutes,
            ..Self::default()
        };
        value.validate()?;
        value.day_of_week = day_of_week(year, month, day)?;
        Ok(value)
    }

    /// Create a date without time part.
    pub fn date(year: u16, month: u8, day: u8) -> DlmsResult<Self> {
        let mut value = Self::new(year, month, day, 0, 0, 0, 0, 0)?;
        value.skip = DateTimeSkips::TIME | DateTimeSkips::DEVIATION | DateTimeSkips::STATUS;
        Ok(value)
    }

    /// Create a time of day without date part.
    pub fn time(hour: u8, minute: u8, second: u8, millisecond: u16) -> DlmsResult<Self> {
        let mut value = Self {
            hour,
            minute,
            second,
            millisecond,
            skip: DateTimeSkips::DATE | DateTimeSkips::DEVIATION | DateTimeSkips::STATUS,
            ..Self::default()
        };
        value.validate()?;
        Ok(value)
    }

    /// Current local time, hundredths not specified.
    pub fn now() -> Self {
        let mut value = Self::from_chrono(&Local::now().fixed_offset());
        value.skip.insert(DateTimeSkips::MS);
        value.millisecond = 0;
        value
    }

    pub fn from_chrono(dt: &DateTime<FixedOffset>) -> Self {
        Self {
            year: dt.year() as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            day_of_week: dt.weekday().number_from_monday() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            millisecond: (dt.timestamp_subsec_millis() % 1000) as u16,
            offset_minutes: (dt.offset().local_minus_utc() / 60) as i16,
            ..Self::default()
        }
    }

    /// Convert to a chrono value. Returns `None` for invalid fields.
    pub fn to_chrono(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(i32::from(self.offset_minutes) * 60)?;
        let naive = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_milli_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
            u32::from(self.millisecond),
        )?;
        offset.from_local_datetime(&naive).single()
    }

    /// Validate calendar fields that are not skipped.
    pub fn validate(&self) -> DlmsResult<()> {
        if !self.skip.contains(DateTimeSkips::MONTH) && !(1..=12).contains(&self.month) {
            return Err(DlmsError::InvalidData(format!("Invalid month {}", self.month)));
        }
        if !self.skip.contains(DateTimeSkips::DAY) {
            let max = days_in_month(self.year, self.month.clamp(1, 12))?;
            if self.day < 1 || self.day > max {
                return Err(DlmsError::InvalidData(format!("Invalid day {}", self.day)));
            }
        }
        if self.hour > 23 || self.minute > 59 || self.second > 59 || self.millisecond > 999 {
            return Err(DlmsError::InvalidData(format!(
                "Invalid time {:02}:{:02}:{:02}.{:03}",
                self.hour, self.minute, self.second, self.millisecond
            )));
        }
        Ok(())
    }

    /// Decode the 5-byte date form.
    ///
    /// Sentinels follow the date-time rules; time, deviation and status are
    /// marked as skipped.
    pub fn from_date_bytes(bytes: &[u8; 5]) -> DlmsResult<Self> {
        let mut value = Self::default();
        value.read_date(bytes)?;
        value.skip |= DateTimeSkips::TIME | DateTimeSkips::DEVIATION | DateTimeSkips::STATUS;
        value.validate()?;
        Ok(value)
    }

    /// Decode the 4-byte time form. Hundredths are scaled to milliseconds.
    pub fn from_time_bytes(bytes: &[u8; 4]) -> DlmsResult<Self> {
        let mut value = Self {
            skip: DateTimeSkips::DATE | DateTimeSkips::DEVIATION | DateTimeSkips::STATUS,
            ..Self::default()
        };
        value.read_time(bytes);
        value.validate()?;
        Ok(value)
    }

    /// Decode the 12-byte date-time form.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The 12 wire bytes
    /// * `use_utc2_normal_time` - Deviation is sent as local-minus-UTC instead
    ///   of UTC-minus-local
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if a specified field is out of range.
    pub fn from_date_time_bytes(bytes: &[u8; 12], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut value = Self::default();
        value.read_date(&[bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]])?;
        value.read_time(&[bytes[5], bytes[6], bytes[7], bytes[8]]);

        let raw = i16::from_be_bytes([bytes[9], bytes[10]]);
        value.status = ClockStatus::from_bits(bytes[11]);
        let deviation = if raw == DEVIATION_NOT_SPECIFIED {
            None
        } else {
            let mut deviation = i32::from(raw);
            if value.status.is_daylight_saving_active() {
                deviation -= i32::from(DST_DELTA_MINUTES);
            }
            if use_utc2_normal_time {
                deviation = -deviation;
            }
            Some(deviation)
        };
        match deviation {
            Some(deviation) if deviation != -1 && !value.skip.contains(DateTimeSkips::YEAR) => {
                value.offset_minutes = i16::try_from(-deviation).map_err(|_| {
                    DlmsError::InvalidData(format!("Invalid deviation {}", raw))
                })?;
            }
            _ => {
                value.skip |= DateTimeSkips::DEVIATION;
                value.offset_minutes = local_offset_minutes(&value);
            }
        }
        value.validate()?;
        Ok(value)
    }

    fn read_date(&mut self, bytes: &[u8; 5]) -> DlmsResult<()> {
        let year = u16::from_be_bytes([bytes[0], bytes[1]]);
        if year == 0xFFFF || year == 0 {
            self.year = Local::now().year() as u16;
            self.skip |= DateTimeSkips::YEAR;
        } else {
            self.year = year;
        }

        let month = bytes[2];
        match month {
            0 | 0xFF => {
                self.month = 1;
                self.skip |= DateTimeSkips::MONTH;
            }
            0xFE => {
                self.month = 1;
                self.skip |= DateTimeSkips::MONTH;
                self.dst_begin = true;
            }
            0xFD => {
                self.month = 1;
                self.skip |= DateTimeSkips::MONTH;
                self.dst_end = true;
            }
            m => self.month = m,
        }

        let day = bytes[3];
        if day == 0xFD || day == 0xFE {
            let last = days_in_month(self.year, self.month)?;
            self.day = (i16::from(last) + i16::from(day as i8) + 2) as u8;
        } else if day < 1 || day == 0xFF {
            self.day = 1;
            self.skip |= DateTimeSkips::DAY;
        } else {
            self.day = day;
        }

        self.day_of_week = bytes[4];
        if bytes[4] == 0xFF {
            self.skip |= DateTimeSkips::DAY_OF_WEEK;
        }
        Ok(())
    }

    fn read_time(&mut self, bytes: &[u8; 4]) {
        let fields = [
            (bytes[0], &mut self.hour, DateTimeSkips::HOUR),
            (bytes[1], &mut self.minute, DateTimeSkips::MINUTE),
            (bytes[2], &mut self.second, DateTimeSkips::SECOND),
        ];
        let mut skip = DateTimeSkips::NONE;
        for (raw, field, flag) in fields {
            if raw == 0xFF {
                *field = 0;
                skip |= flag;
            } else {
                *field = raw;
            }
        }
        if bytes[3] == 0xFF {
            self.millisecond = 0;
            skip |= DateTimeSkips::MS;
        } else {
            self.millisecond = u16::from(bytes[3]) * 10;
        }
        self.skip |= skip;
    }

    /// Encode the 5-byte date form.
    pub fn to_date_bytes(&self) -> [u8; 5] {
        let year = if self.skip.contains(DateTimeSkips::YEAR) {
            0xFFFF
        } else {
            self.year
        };
        let month = if self.dst_begin {
            0xFE
        } else if self.dst_end {
            0xFD
        } else if self.skip.contains(DateTimeSkips::MONTH) {
            0xFF
        } else {
            self.month
        };
        let day = if self.skip.contains(DateTimeSkips::DAY) {
            0xFF
        } else {
            self.day
        };
        let dow = if self.skip.contains(DateTimeSkips::DAY_OF_WEEK) {
            0xFF
        } else {
            day_of_week(self.year, self.month, self.day).unwrap_or(self.day_of_week)
        };
        let [y0, y1] = year.to_be_bytes();
        [y0, y1, month, day, dow]
    }

    /// Encode the 4-byte time form.
    pub fn to_time_bytes(&self) -> [u8; 4] {
        let pick = |flag: DateTimeSkips, value: u8| {
            if self.skip.contains(flag) {
                0xFF
            } else {
                value
            }
        };
        [
            pick(DateTimeSkips::HOUR, self.hour),
            pick(DateTimeSkips::MINUTE, self.minute),
            pick(DateTimeSkips::SECOND, self.second),
            pick(DateTimeSkips::MS, (self.millisecond / 10) as u8),
        ]
    }

    /// Encode the 12-byte date-time form.
    pub fn to_date_time_bytes(&self, use_utc2_normal_time: bool) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[..5].copy_from_slice(&self.to_date_bytes());
        out[5..9].copy_from_slice(&self.to_time_bytes());

        let deviation = if self.skip.contains(DateTimeSkips::DEVIATION) {
            DEVIATION_NOT_SPECIFIED
        } else {
            let mut deviation = i32::from(self.offset_minutes);
            if self.status.is_daylight_saving_active() {
                deviation -= i32::from(DST_DELTA_MINUTES);
            }
            if !use_utc2_normal_time {
                deviation = -deviation;
            }
            // i16::MIN is the "not specified" marker
            i16::try_from(deviation)
                .ok()
                .filter(|d| *d != DEVIATION_NOT_SPECIFIED)
                .unwrap_or(DEVIATION_NOT_SPECIFIED)
        };
        out[9..11].copy_from_slice(&deviation.to_be_bytes());
        out[11] = if self.skip.contains(DateTimeSkips::STATUS) {
            0xFF
        } else {
            self.status.bits()
        };
        out
    }
}

/// Number of days in `month` of `year`.
///
/// # Errors
///
/// Returns `InvalidData` for a month outside 1..=12.
pub fn days_in_month(year: u16, month: u8) -> DlmsResult<u8> {
    let first = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), 1)
        .ok_or_else(|| DlmsError::InvalidData(format!("Invalid month {}", month)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(i32::from(year) + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(i32::from(year), u32::from(month) + 1, 1)
    }
    .ok_or_else(|| DlmsError::InvalidData(format!("Invalid year {}", year)))?;
    Ok((next - first).num_days() as u8)
}

fn day_of_week(year: u16, month: u8, day: u8) -> DlmsResult<u8> {
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .map(|d| d.weekday().number_from_monday() as u8)
        .ok_or_else(|| DlmsError::InvalidData(format!("Invalid date {}-{}-{}", year, month, day)))
}

/// Offset of the local time zone at the given wall-clock time.
fn local_offset_minutes(value: &CosemDateTime) -> i16 {
    NaiveDate::from_ymd_opt(
        i32::from(value.year),
        u32::from(value.month),
        u32::from(value.day),
    )
    .and_then(|d| {
        d.and_hms_opt(
            u32::from(value.hour.min(23)),
            u32::from(value.minute.min(59)),
            u32::from(value.second.min(59)),
        )
    })
    .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    .map(|dt| (dt.offset().local_minus_utc() / 60) as i16)
    .unwrap_or_else(|| (Local::now().offset().local_minus_utc() / 60) as i16)
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |flag: DateTimeSkips, value: u32, width: usize| {
            if self.skip.contains(flag) {
                "*".repeat(width)
            } else {
                format!("{:0width$}", value, width = width)
            }
        };
        let has_date = !self.skip.contains(DateTimeSkips::DATE);
        let has_time = !self.skip.contains(DateTimeSkips::TIME);
        let mut parts = Vec::new();
        if has_date {
            parts.push(format!(
                "{}-{}-{}",
                field(DateTimeSkips::YEAR, u32::from(self.year), 4),
                field(DateTimeSkips::MONTH, u32::from(self.month), 2),
                field(DateTimeSkips::DAY, u32::from(self.day), 2)
            ));
        }
        if has_time {
            let mut time = format!(
                "{}:{}:{}",
                field(DateTimeSkips::HOUR, u32::from(self.hour), 2),
                field(DateTimeSkips::MINUTE, u32::from(self.minute), 2),
                field(DateTimeSkips::SECOND, u32::from(self.second), 2)
            );
            if !self.skip.contains(DateTimeSkips::MS) {
                time.push_str(&format!(".{:03}", self.millisecond));
            }
            parts.push(time);
        }
        if has_date && has_time && !self.skip.contains(DateTimeSkips::DEVIATION) {
            let sign = if self.offset_minutes < 0 { '-' } else { '+' };
            let abs = self.offset_minutes.unsigned_abs();
            parts.push(format!("{}{:02}:{:02}", sign, abs / 60, abs % 60));
        }
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2).unwrap(), 29);
        assert_eq!(days_in_month(2023, 2).unwrap(), 28);
        assert_eq!(days_in_month(2023, 12).unwrap(), 31);
        assert!(days_in_month(2023, 13).is_err());
    }

    #[test]
    fn test_date_time_round_trip_bytes() {
        let bytes = [
            0x07, 0xE8, 0x03, 0x1F, 0x07, 0x0A, 0x1E, 0x00, 0x32, 0xFF, 0xC4, 0x00,
        ];
        let dt = CosemDateTime::from_date_time_bytes(&bytes, false).unwrap();
        assert_eq!(dt.year, 2024);
        assert_eq!(dt.month, 3);
        assert_eq!(dt.day, 31);
        assert_eq!(dt.hour, 10);
        assert_eq!(dt.minute, 30);
        assert_eq!(dt.millisecond, 500);
        assert_eq!(dt.offset_minutes, 60);
        assert_eq!(dt.skip, DateTimeSkips::NONE);
        assert_eq!(dt.to_date_time_bytes(false), bytes);
    }

    #[test]
    fn test_daylight_saving_deviation() {
        // CEST: deviation -60 with DST bit set means UTC+2
        let bytes = [
            0x07, 0xE8, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xC4, 0x80,
        ];
        let dt = CosemDateTime::from_date_time_bytes(&bytes, false).unwrap();
        assert_eq!(dt.offset_minutes, 120);
        assert!(dt.skip.contains(DateTimeSkips::MS));
        assert_eq!(dt.to_date_time_bytes(false), bytes);
    }

    #[test]
    fn test_utc2_normal_time_flips_sign() {
        let bytes = [
            0x07, 0xE8, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x3C, 0x00,
        ];
        let dt = CosemDateTime::from_date_time_bytes(&bytes, true).unwrap();
        assert_eq!(dt.offset_minutes, 60);
        assert_eq!(dt.to_date_time_bytes(true), bytes);
    }

    #[test]
    fn test_dst_end_day_and_skipped_deviation() {
        // Last day of the month with deviation not specified
        let bytes = [
            0x07, 0xE8, 0x0A, 0xFE, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x80, 0x00, 0xFF,
        ];
        let dt = CosemDateTime::from_date_time_bytes(&bytes, false).unwrap();
        assert_eq!(dt.day, 31);
        assert!(!dt.skip.contains(DateTimeSkips::DAY));
        assert!(dt.skip.contains(DateTimeSkips::DEVIATION));
        assert!(dt.skip.contains(DateTimeSkips::DAY_OF_WEEK));
        let naive = NaiveDate::from_ymd_opt(2024, 10, 31)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        let local = Local.from_local_datetime(&naive).earliest().unwrap();
        assert_eq!(
            i32::from(dt.offset_minutes),
            local.offset().local_minus_utc() / 60
        );
    }

    #[test]
    fn test_unspecified_deviation_with_options() {
        // 0x8000 stays "not specified" whatever the status and option say
        for status in [0x00, 0x80] {
            let bytes = [
                0x07, 0xE8, 0x01, 0x01, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, status,
            ];
            for utc2 in [false, true] {
                let dt = CosemDateTime::from_date_time_bytes(&bytes, utc2).unwrap();
                assert!(dt.skip.contains(DateTimeSkips::DEVIATION));
                assert_eq!(dt.to_date_time_bytes(utc2)[9..11], [0x80, 0x00]);
            }
        }
    }

    #[test]
    fn test_extreme_deviation() {
        // 0x8001 with DST active is below i16::MIN after the DST shift
        let bytes = [
            0x07, 0xE8, 0x01, 0x01, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x80, 0x01, 0x80,
        ];
        assert!(CosemDateTime::from_date_time_bytes(&bytes, false).is_err());
        assert!(CosemDateTime::from_date_time_bytes(&bytes, true).is_err());
        let mut standard = bytes;
        standard[11] = 0x00;
        let dt = CosemDateTime::from_date_time_bytes(&standard, false).unwrap();
        assert_eq!(dt.offset_minutes, i16::MAX);

        let bytes = [
            0x07, 0xE8, 0x01, 0x01, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x7F, 0xFF, 0x00,
        ];
        let dt = CosemDateTime::from_date_time_bytes(&bytes, true).unwrap();
        assert_eq!(dt.offset_minutes, i16::MAX);
        assert_eq!(dt.to_date_time_bytes(true)[9..11], [0x7F, 0xFF]);

        // offsets that no deviation can carry are sent as not specified
        let mut dt = CosemDateTime::new(2024, 1, 1, 0, 0, 0, 0, 0).unwrap();
        dt.offset_minutes = i16::MIN;
        dt.status = ClockStatus::from_bits(0x80);
        assert_eq!(dt.to_date_time_bytes(false)[9..11], [0x80, 0x00]);
        assert_eq!(dt.to_date_time_bytes(true)[9..11], [0x80, 0x00]);
    }

    #[test]
    fn test_second_last_day_marker() {
        let bytes = [0x07, 0xE8, 0x02, 0xFD, 0xFF];
        let dt = CosemDateTime::from_date_bytes(&bytes).unwrap();
        assert_eq!(dt.day, 28);
    }

    #[test]
    fn test_skipped_fields() {
        let bytes = [
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x80, 0x00, 0xFF,
        ];
        let dt = CosemDateTime::from_date_time_bytes(&bytes, false).unwrap();
        for flag in [
            DateTimeSkips::YEAR,
            DateTimeSkips::MONTH,
            DateTimeSkips::DAY,
            DateTimeSkips::DAY_OF_WEEK,
            DateTimeSkips::HOUR,
            DateTimeSkips::MINUTE,
            DateTimeSkips::SECOND,
            DateTimeSkips::MS,
            DateTimeSkips::DEVIATION,
        ] {
            assert!(dt.skip.contains(flag), "{:?}", flag);
        }
        assert_eq!(dt.month, 1);
        assert_eq!(dt.day, 1);
        assert_eq!(dt.year, Local::now().year() as u16);
    }

    #[test]
    fn test_dst_begin_month_marker() {
        let bytes = [0xFF, 0xFF, 0xFE, 0xFE, 0x07];
        let dt = CosemDateTime::from_date_bytes(&bytes).unwrap();
        assert!(dt.dst_begin);
        assert!(dt.skip.contains(DateTimeSkips::MONTH));
        assert_eq!(dt.to_date_bytes()[2], 0xFE);
    }

    #[test]
    fn test_time_bytes() {
        let dt = CosemDateTime::from_time_bytes(&[0x17, 0x3B, 0x3B, 0x63]).unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second, dt.millisecond), (23, 59, 59, 990));
        assert_eq!(dt.to_time_bytes(), [0x17, 0x3B, 0x3B, 0x63]);
        assert!(CosemDateTime::from_time_bytes(&[24, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_chrono_conversion() {
        let dt = CosemDateTime::new(2024, 3, 31, 10, 30, 0, 0, 60).unwrap();
        assert_eq!(dt.day_of_week, 7);
        let chrono = dt.to_chrono().unwrap();
        assert_eq!(chrono.to_rfc3339(), "2024-03-31T10:30:00+01:00");
        assert_eq!(CosemDateTime::from_chrono(&chrono), dt);
        assert_eq!(dt.to_string(), "2024-03-31 10:30:00.000 +01:00");
    }

    #[test]
    fn test_invalid_date_rejected() {
        assert!(CosemDateTime::new(2023, 2, 29, 0, 0, 0, 0, 0).is_err());
        assert!(CosemDateTime::date(2024, 13, 1).is_err());
    }
}
