//! Conversion between an OLE-automation date (days since a fixed epoch, as a
//! floating point number) and a civil calendar date, honouring both the 1900
//! and 1904 epoch modes and the 1900 system's legacy leap-day bug.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A decomposed civil date/time, always a real, valid calendar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CivilDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
}

/// The result of converting an OLE double to a calendar date.
///
/// `adjust_days_post` carries the 1900-system's cosmetic leap-day correction:
/// it is added to `datetime`'s day-of-month only when *presenting* the value
/// (e.g. formatting `60.0` as `"1900-02-29"`), without ever storing an
/// invalid date in `datetime` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExcelDate {
    pub datetime: CivilDateTime,
    pub adjust_days_post: i8,
}

impl ExcelDate {
    /// Convert an OLE double to a civil date under the given epoch mode.
    pub fn from_ole(d: f64, date1904: bool) -> ExcelDate {
        if date1904 {
            let (raw_days, millis_of_day) = raw_days_and_millis(d + 1462.0);
            let datetime = civil_datetime(raw_days, millis_of_day);
            ExcelDate {
                datetime,
                adjust_days_post: 0,
            }
        } else {
            let (raw_days, millis_of_day) = raw_days_and_millis(d);
            let bucket = Bucket::classify(raw_days);
            let adjusted_days = raw_days + bucket.days_offset();
            let datetime = civil_datetime(adjusted_days, millis_of_day);
            ExcelDate {
                datetime,
                adjust_days_post: bucket.post_adjust(),
            }
        }
    }

    /// Reconstruct the original OLE double. Round-trips `from_ole` exactly,
    /// modulo millisecond quantisation of the time-of-day fraction.
    pub fn to_ole(&self, date1904: bool) -> f64 {
        let adjusted_days = days_from_civil_date(&self.datetime);
        let millis_of_day = time_of_day_millis(&self.datetime);

        if date1904 {
            let raw_days = adjusted_days - 1462;
            raw_days as f64 + millis_of_day as f64 / MILLIS_PER_DAY as f64
        } else {
            let days_offset = Bucket::days_offset_for(adjusted_days, self.adjust_days_post);
            let raw_days = adjusted_days - days_offset;
            raw_days as f64 + millis_of_day as f64 / MILLIS_PER_DAY as f64
        }
    }
}

/// Which window of the 1900 compensation table a raw (uncorrected) day count
/// falls into. Day 0 of this reckoning is 1899-12-30, the OLE automation epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    /// t < 1899-12-30 (raw_days < 0)
    BeforeEpoch,
    /// 1899-12-30 ≤ t < 1899-12-31 (raw_days == 0)
    EpochDay,
    /// 1899-12-31 ≤ t < 1900-02-28 (1 ≤ raw_days < 60)
    JanFeb1900,
    /// 1900-02-28 ≤ t < 1900-03-01 (raw_days == 60) — the pretend leap day
    LeapBugDay,
    /// t ≥ 1900-03-01 (raw_days ≥ 61)
    AfterBug,
}

impl Bucket {
    fn classify(raw_days: i64) -> Bucket {
        if raw_days < 0 {
            Bucket::BeforeEpoch
        } else if raw_days == 0 {
            Bucket::EpochDay
        } else if raw_days < 60 {
            Bucket::JanFeb1900
        } else if raw_days == 60 {
            Bucket::LeapBugDay
        } else {
            Bucket::AfterBug
        }
    }

    fn days_offset(self) -> i64 {
        match self {
            Bucket::BeforeEpoch => 2,
            Bucket::EpochDay => 2,
            Bucket::JanFeb1900 => 1,
            Bucket::LeapBugDay => 0,
            Bucket::AfterBug => 0,
        }
    }

    fn post_adjust(self) -> i8 {
        match self {
            Bucket::BeforeEpoch => 0,
            Bucket::EpochDay => -1,
            Bucket::JanFeb1900 => 0,
            Bucket::LeapBugDay => 1,
            Bucket::AfterBug => 0,
        }
    }

    /// Invert `classify` + `days_offset`: given the *adjusted* day count and
    /// the stored post-adjust flag, recover the original offset that was
    /// applied. The (adjusted_days, post_adjust) pair is unambiguous — see
    /// DESIGN.md for the case analysis.
    fn days_offset_for(adjusted_days: i64, post_adjust: i8) -> i64 {
        match post_adjust {
            -1 => 2,
            1 => 0,
            _ => {
                if adjusted_days <= 1 {
                    2
                } else if adjusted_days <= 60 {
                    1
                } else {
                    0
                }
            }
        }
    }
}

fn round_half_away_from_zero(x: f64) -> i64 {
    if x >= 0.0 {
        (x + 0.5).floor() as i64
    } else {
        (x - 0.5).ceil() as i64
    }
}

/// `d` days (possibly fractional, possibly negative) since the OLE
/// automation epoch (1899-12-30) -> (whole raw days, time-of-day in millis).
fn raw_days_and_millis(d: f64) -> (i64, i64) {
    let mut millis = round_half_away_from_zero(d * MILLIS_PER_DAY as f64);
    if millis < 0 {
        let rem = millis % MILLIS_PER_DAY;
        millis -= rem * 2;
    }
    let raw_days = millis.div_euclid(MILLIS_PER_DAY);
    let millis_of_day = millis.rem_euclid(MILLIS_PER_DAY);
    (raw_days, millis_of_day)
}

fn civil_datetime(days_since_epoch: i64, millis_of_day: i64) -> CivilDateTime {
    let z = days_since_epoch + days_from_civil(1899, 12, 30);
    let (year, month, day) = civil_from_days(z);
    let total_seconds = millis_of_day / 1000;
    CivilDateTime {
        year,
        month,
        day,
        hour: (total_seconds / 3600) as u32,
        minute: ((total_seconds % 3600) / 60) as u32,
        second: (total_seconds % 60) as u32,
        millisecond: (millis_of_day % 1000) as u32,
    }
}

fn days_from_civil_date(dt: &CivilDateTime) -> i64 {
    days_from_civil(dt.year, dt.month, dt.day) - days_from_civil(1899, 12, 30)
}

fn time_of_day_millis(dt: &CivilDateTime) -> i64 {
    (dt.hour as i64) * 3_600_000 + (dt.minute as i64) * 60_000 + (dt.second as i64) * 1000
        + dt.millisecond as i64
}

/// Howard Hinnant's `days_from_civil`: proleptic-Gregorian (y, m, d) -> days
/// since 1970-01-01. Valid for any year representable in `i64`.
fn days_from_civil(y: i32, m: u32, d: u32) -> i64 {
    let y = y as i64 - if m <= 2 { 1 } else { 0 };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64; // [0, 399]
    let mp = m as i64 + if m > 2 { -3 } else { 9 }; // [0, 11]
    let doy = (153 * mp + 2) / 5 + d as i64 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146097 + doe - 719468
}

/// Inverse of [`days_from_civil`]: days since 1970-01-01 -> (y, m, d).
fn civil_from_days(z: i64) -> (i32, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32; // [1, 31]
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32; // [1, 12]
    let y = y + if m <= 2 { 1 } else { 0 };
    (y as i32, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_bug_day_is_reported_as_feb_29() {
        let ed = ExcelDate::from_ole(60.0, false);
        assert_eq!(ed.datetime.year, 1900);
        assert_eq!(ed.datetime.month, 2);
        assert_eq!(ed.datetime.day, 28);
        assert_eq!(ed.adjust_days_post, 1);
        // Wire presentation: day + adjust_days_post = 29.
        assert_eq!(ed.datetime.day as i64 + ed.adjust_days_post as i64, 29);
    }

    #[test]
    fn day_after_leap_bug_is_march_1() {
        let ed = ExcelDate::from_ole(61.0, false);
        assert_eq!((ed.datetime.year, ed.datetime.month, ed.datetime.day), (1900, 3, 1));
        assert_eq!(ed.adjust_days_post, 0);
    }

    #[test]
    fn serial_one_is_jan_1_1900() {
        let ed = ExcelDate::from_ole(1.0, false);
        assert_eq!((ed.datetime.year, ed.datetime.month, ed.datetime.day), (1900, 1, 1));
        assert_eq!(ed.adjust_days_post, 0);
    }

    #[test]
    fn epoch_1904_day_zero() {
        let ed = ExcelDate::from_ole(0.0, true);
        assert_eq!((ed.datetime.year, ed.datetime.month, ed.datetime.day), (1904, 1, 1));
        assert_eq!(ed.adjust_days_post, 0);
    }

    #[test]
    fn round_trips_1900_mode() {
        for serial in [1.0, 2.5, 59.0, 60.0, 61.0, 100.25, 45217.5, 1000.0] {
            let ed = ExcelDate::from_ole(serial, false);
            let back = ed.to_ole(false);
            assert!((back - serial).abs() < 1.0 / 86_400_000.0 * 2.0, "serial={serial} back={back}");
        }
    }

    #[test]
    fn round_trips_1904_mode() {
        for serial in [0.0, 1.0, 100.75, 5000.0] {
            let ed = ExcelDate::from_ole(serial, true);
            let back = ed.to_ole(true);
            assert!((back - serial).abs() < 1.0 / 86_400_000.0 * 2.0, "serial={serial} back={back}");
        }
    }

    #[test]
    fn time_of_day_is_extracted() {
        let ed = ExcelDate::from_ole(44562.5, false);
        assert_eq!(ed.datetime.hour, 12);
        assert_eq!(ed.datetime.minute, 0);
    }
}
