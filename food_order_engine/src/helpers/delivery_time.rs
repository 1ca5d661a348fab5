use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// The token a client sends to ask for delivery as soon as possible.
pub const ASAP_TOKEN: &str = "asap";

static HH_MM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryTimeError {
    #[error("Delivery time must be 'asap' or a time of day in HH:MM format, but was '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTime {
    Asap,
    At(NaiveTime),
}

impl FromStr for DeliveryTime {
    type Err = DeliveryTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case(ASAP_TOKEN) {
            return Ok(DeliveryTime::Asap);
        }
        let caps = HH_MM.captures(token).ok_or_else(|| DeliveryTimeError::Malformed(s.to_string()))?;
        let hour = caps[1].parse::<u32>().map_err(|_| DeliveryTimeError::Malformed(s.to_string()))?;
        let minute = caps[2].parse::<u32>().map_err(|_| DeliveryTimeError::Malformed(s.to_string()))?;
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(DeliveryTime::At)
            .ok_or_else(|| DeliveryTimeError::Malformed(s.to_string()))
    }
}

impl Display for DeliveryTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryTime::Asap => write!(f, "{ASAP_TOKEN}"),
            DeliveryTime::At(t) => write!(f, "{}", t.format("%H:%M")),
        }
    }
}

/// Works out the estimated delivery time for an order placed at `now`.
///
/// * `Asap` is `now` plus the restaurant's average delivery time.
/// * `At(hh:mm)` is that time of day, on today's date in the service time zone given by `offset`.
pub fn resolve_delivery_time(
    requested: DeliveryTime,
    now: DateTime<Utc>,
    offset: FixedOffset,
    avg_delivery_minutes: i64,
) -> DateTime<Utc> {
    match requested {
        DeliveryTime::Asap => now + Duration::minutes(avg_delivery_minutes.max(0)),
        DeliveryTime::At(time) => {
            let today = now.with_timezone(&offset).date_naive();
            let local = today.and_time(time);
            // A fixed offset has exactly one mapping for every local time
            match offset.from_local_datetime(&local).single() {
                Some(dt) => dt.with_timezone(&Utc),
                None => now,
            }
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_tokens() {
        assert_eq!("asap".parse::<DeliveryTime>().unwrap(), DeliveryTime::Asap);
        assert_eq!(" ASAP ".parse::<DeliveryTime>().unwrap(), DeliveryTime::Asap);
        let t = "18:30".parse::<DeliveryTime>().unwrap();
        assert_eq!(t, DeliveryTime::At(NaiveTime::from_hms_opt(18, 30, 0).unwrap()));
        assert_eq!(t.to_string(), "18:30");
        assert_eq!("00:00".parse::<DeliveryTime>().unwrap().to_string(), "00:00");
    }

    #[test]
    fn malformed_tokens() {
        for token in ["", "soon", "24:00", "7:30", "12:60", "12:3", "12-30", "12:30:00", "１２:３０"] {
            assert!(token.parse::<DeliveryTime>().is_err(), "{token} should be rejected");
        }
    }

    #[test]
    fn resolve_asap() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let eta = resolve_delivery_time(DeliveryTime::Asap, now, utc, 35);
        assert_eq!(eta, Utc.with_ymd_and_hms(2024, 5, 1, 11, 35, 0).unwrap());
    }

    #[test]
    fn resolve_time_of_day_in_service_zone() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let at = DeliveryTime::At(NaiveTime::from_hms_opt(12, 15, 0).unwrap());
        assert_eq!(resolve_delivery_time(at, now, utc, 30), Utc.with_ymd_and_hms(2024, 5, 1, 12, 15, 0).unwrap());
        // 23:00 UTC is already 07:00 on the 2nd in UTC+8
        let beijing = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(
            resolve_delivery_time(at, now, beijing, 30),
            Utc.with_ymd_and_hms(2024, 5, 2, 4, 15, 0).unwrap()
        );
    }
}
