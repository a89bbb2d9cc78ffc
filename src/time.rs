//! Observation timestamps.
//!
//! CLASS stores the observation date as a day code (an MJD with a fixed
//! offset) in the directory entry and the UT time of day in radians in the
//! general header section. Both combine into a [`DateTime<Utc>`].

use chrono::{DateTime, Utc};

/// MJD of the Unix epoch, 1970-01-01.
const MJD_UNIX_EPOCH: i64 = 40587;

/// Offset from the stored day code to the modified Julian day number.
const DAY_CODE_OFFSET: i64 = 60549;

/// Combine a directory day code and the UT word (radians) into UTC.
///
/// Out-of-range or non-finite inputs collapse to the Unix epoch rather
/// than failing the whole header decode.
pub fn obs_datetime(day_code: i32, ut_rad: f64) -> DateTime<Utc> {
    let mjd = day_code as i64 + DAY_CODE_OFFSET;
    let mut secs = (mjd - MJD_UNIX_EPOCH) * 86400;
    if ut_rad.is_finite() {
        // radians to seconds of time: 2*pi = 24 h
        secs += (ut_rad * 43200.0 / std::f64::consts::PI).floor() as i64;
    }
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
