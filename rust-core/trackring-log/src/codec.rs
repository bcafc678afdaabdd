// SPDX-License-Identifier: PMPL-1.0-or-later
//! Track record payloads.
//!
//! A record is one line of text:
//!
//! ```text
//! DDMMYY,HHMMSS,<lon><E|W>,<lat><N|S>,<speed>
//! DDMMYY,HHMMSS,SL,SL,SL          (no satellite fix)
//! ```
//!
//! Range reads only need the leading date and time, so
//! [`decode_timestamp`] looks at nothing else. [`TrackRecord`] is the full
//! parse used by tooling.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// Marker replacing position and speed when there is no fix.
pub const SIGNAL_LOST: &str = "SL";

/// Bytes needed for `DDMMYY,HHMMSS`.
pub const MIN_TIMESTAMP_LEN: usize = 13;

/// Decode the embedded `DDMMYY,HHMMSS` prefix as a UTC date-time.
///
/// Two-digit years are read as `2000 + yy`. Returns `None` when the payload
/// is too short, the fields are not digits, or the date does not exist.
pub fn decode_timestamp(payload: &str) -> Option<NaiveDateTime> {
    let bytes = payload.as_bytes();
    if bytes.len() < MIN_TIMESTAMP_LEN || bytes[6] != b',' {
        return None;
    }
    if bytes.len() > MIN_TIMESTAMP_LEN && bytes[MIN_TIMESTAMP_LEN] != b',' {
        return None;
    }

    let date = &bytes[0..6];
    let time = &bytes[7..13];
    if !date.iter().chain(time).all(u8::is_ascii_digit) {
        return None;
    }

    let pair = |field: &[u8], at: usize| {
        u32::from(field[at] - b'0') * 10 + u32::from(field[at + 1] - b'0')
    };

    let day = pair(date, 0);
    let month = pair(date, 2);
    let year = 2000 + pair(date, 4) as i32;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(
        pair(time, 0),
        pair(time, 2),
        pair(time, 4),
    )
}

/// The embedded timestamp as Unix seconds, or `None` if undecodable.
pub fn epoch_seconds(payload: &str) -> Option<i64> {
    decode_timestamp(payload).map(|dt| dt.and_utc().timestamp())
}

/// Position part of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Fix {
    /// A satellite fix.
    Position {
        /// Signed decimal degrees, east positive.
        longitude: f64,
        /// Signed decimal degrees, north positive.
        latitude: f64,
        /// Speed exactly as the receiver reported it.
        speed: String,
    },
    /// No fix; position and speed were replaced by [`SIGNAL_LOST`].
    SignalLost,
}

/// A fully parsed record payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    /// Embedded UTC timestamp.
    pub timestamp: NaiveDateTime,
    /// Position, or its absence.
    pub fix: Fix,
}

impl TrackRecord {
    /// Parse a payload. Signal-loss records parse without touching the
    /// position fields.
    pub fn parse(payload: &str) -> Option<Self> {
        let timestamp = decode_timestamp(payload)?;
        let mut fields = payload.split(',').skip(2);
        let (lon, lat, speed) = (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() {
            return None;
        }

        if lon == SIGNAL_LOST && lat == SIGNAL_LOST && speed == SIGNAL_LOST {
            return Some(Self {
                timestamp,
                fix: Fix::SignalLost,
            });
        }

        let longitude = parse_coordinate(lon, 'E', 'W')?;
        let latitude = parse_coordinate(lat, 'N', 'S')?;
        if speed.is_empty() || speed.parse::<f64>().is_err() {
            return None;
        }

        Some(Self {
            timestamp,
            fix: Fix::Position {
                longitude,
                latitude,
                speed: speed.to_string(),
            },
        })
    }

    /// Unix seconds of the embedded timestamp.
    pub fn epoch_seconds(&self) -> i64 {
        self.timestamp.and_utc().timestamp()
    }

    /// Format back into the record grammar.
    pub fn to_payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp.format("%d%m%y,%H%M%S"))?;
        match &self.fix {
            Fix::SignalLost => write!(f, ",{SIGNAL_LOST},{SIGNAL_LOST},{SIGNAL_LOST}"),
            Fix::Position {
                longitude,
                latitude,
                speed,
            } => {
                let (lon_value, lon_hemi) = hemisphere(*longitude, 'E', 'W');
                let (lat_value, lat_hemi) = hemisphere(*latitude, 'N', 'S');
                write!(
                    f,
                    ",{}{lon_hemi},{}{lat_hemi},{speed}",
                    format_nmea(lon_value, 3),
                    format_nmea(lat_value, 2)
                )
            }
        }
    }
}

/// Parse `DDDMM.mmmm<H>` / `DDMM.mmmm<H>` into signed decimal degrees.
fn parse_coordinate(field: &str, positive: char, negative: char) -> Option<f64> {
    let hemi = field.chars().last()?;
    let sign = if hemi == positive {
        1.0
    } else if hemi == negative {
        -1.0
    } else {
        return None;
    };

    let number = &field[..field.len() - hemi.len_utf8()];
    if !number.is_ascii() {
        return None;
    }
    let dot = number.find('.').unwrap_or(number.len());
    if dot < 3 {
        return None;
    }
    let degrees: f64 = number[..dot - 2].parse().ok()?;
    let minutes: f64 = number[dot - 2..].parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }
    Some(sign * (degrees + minutes / 60.0))
}

fn hemisphere(value: f64, positive: char, negative: char) -> (f64, char) {
    if value < 0.0 {
        (-value, negative)
    } else {
        (value, positive)
    }
}

/// Degrees back to `D..DMM.mmmm` with `degree_digits` zero-padded degrees.
fn format_nmea(value: f64, degree_digits: usize) -> String {
    let mut degrees = value.trunc();
    let mut minutes = ((value - degrees) * 60.0 * 10_000.0).round() / 10_000.0;
    if minutes >= 60.0 {
        degrees += 1.0;
        minutes -= 60.0;
    }
    format!(
        "{:0width$}{:07.4}",
        degrees as u32,
        minutes,
        width = degree_digits
    )
}
