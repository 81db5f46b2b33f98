//! CP/M date stamps.
//!
//! A stamp is a day count (day 1 is 1978-01-01) plus BCD hour and minute
//! in the local time of whoever wrote it. No zone is stored, so decoding
//! assumes the host's offset. Stamps written on the other side of a DST
//! change come back shifted by an hour; that is how the format works.

use chrono::{
    DateTime, Days, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc,
};

/// A packed CP/M timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpmStamp {
    pub days: u16,
    /// BCD.
    pub hour: u8,
    /// BCD.
    pub minute: u8,
}

impl CpmStamp {
    pub const ZERO: CpmStamp = CpmStamp {
        days: 0,
        hour: 0,
        minute: 0,
    };

    pub fn from_bytes(bytes: &[u8]) -> Self {
        CpmStamp {
            days: u16::from_le_bytes([bytes[0], bytes[1]]),
            hour: bytes[2],
            minute: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let [lo, hi] = self.days.to_le_bytes();
        [lo, hi, self.hour, self.minute]
    }

    pub fn is_set(&self) -> bool {
        self.days != 0
    }
}

fn from_bcd(b: u8) -> u32 {
    (b >> 4) as u32 * 10 + (b & 0x0F) as u32
}

fn to_bcd(v: u32) -> u8 {
    (((v / 10) << 4) | (v % 10)) as u8
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1978, 1, 1).unwrap_or_default()
}

/// Converts between [`CpmStamp`] and absolute time using one fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCodec {
    offset: FixedOffset,
}

impl TimeCodec {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Use the host's current UTC offset.
    pub fn host() -> Self {
        Self::new(*Local::now().offset())
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// `None` for an unset stamp or one with out-of-range fields.
    pub fn decode(&self, stamp: CpmStamp) -> Option<DateTime<Utc>> {
        if !stamp.is_set() {
            return None;
        }
        let date = epoch().checked_add_days(Days::new(stamp.days as u64 - 1))?;
        let time = NaiveTime::from_hms_opt(from_bcd(stamp.hour), from_bcd(stamp.minute), 0)?;
        let local = self.offset.from_local_datetime(&date.and_time(time)).single()?;
        Some(local.with_timezone(&Utc))
    }

    /// Dates before the epoch encode as an unset stamp; seconds are dropped.
    pub fn encode(&self, time: DateTime<Utc>) -> CpmStamp {
        let local = time.with_timezone(&self.offset).naive_local();
        let days = (local.date() - epoch()).num_days() + 1;
        let Ok(days) = u16::try_from(days) else {
            return CpmStamp::ZERO;
        };
        if days == 0 {
            return CpmStamp::ZERO;
        }
        let clock = local.time();
        CpmStamp {
            days,
            hour: to_bcd(clock.hour()),
            minute: to_bcd(clock.minute()),
        }
    }
}

impl Default for TimeCodec {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_day_one() {
        let codec = TimeCodec::utc();
        let t = codec
            .decode(CpmStamp {
                days: 1,
                hour: 0x12,
                minute: 0x34,
            })
            .unwrap();
        assert_eq!(t.date_naive(), NaiveDate::from_ymd_opt(1978, 1, 1).unwrap());
        assert_eq!(t.hour(), 12);
        assert_eq!(t.minute(), 34);
    }

    #[test]
    fn test_unset_stamp() {
        assert_eq!(TimeCodec::utc().decode(CpmStamp::ZERO), None);
    }

    #[test]
    fn test_invalid_bcd() {
        let stamp = CpmStamp {
            days: 10,
            hour: 0x25,
            minute: 0,
        };
        assert_eq!(TimeCodec::utc().decode(stamp), None);
    }

    #[test]
    fn test_encode_known_date() {
        let codec = TimeCodec::utc();
        let t = Utc.with_ymd_and_hms(1980, 3, 1, 23, 59, 42).unwrap();
        let stamp = codec.encode(t);
        // 1978 and 1979 have 365 days each, then Jan + Feb 1980 (leap).
        assert_eq!(stamp.days, 365 + 365 + 31 + 29 + 1);
        assert_eq!(stamp.hour, 0x23);
        assert_eq!(stamp.minute, 0x59);
    }

    #[test]
    fn test_roundtrip_with_offset() {
        let codec = TimeCodec::new(FixedOffset::east_opt(3600 * 5 + 1800).unwrap());
        for days in [1u16, 2, 365, 8000, 20000, 65535] {
            for (hour, minute) in [(0x00, 0x00), (0x09, 0x30), (0x23, 0x59)] {
                let stamp = CpmStamp { days, hour, minute };
                let t = codec.decode(stamp).unwrap();
                assert_eq!(codec.encode(t), stamp);
            }
        }
    }

    #[test]
    fn test_before_epoch() {
        let t = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(TimeCodec::utc().encode(t), CpmStamp::ZERO);
    }

    #[test]
    fn test_byte_layout() {
        let stamp = CpmStamp {
            days: 0x1234,
            hour: 0x08,
            minute: 0x15,
        };
        assert_eq!(stamp.to_bytes(), [0x34, 0x12, 0x08, 0x15]);
        assert_eq!(CpmStamp::from_bytes(&stamp.to_bytes()), stamp);
    }
}
