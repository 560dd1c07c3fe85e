use std::fmt;
use std::time::Duration;

use ffmpeg::{Rational, Rescale};

extern crate ffmpeg_next as ffmpeg;

const MICROS: Rational = Rational(1, 1_000_000);

/// A presentation timestamp of a stream, together with what is needed to make sense of
/// it.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Timestamp {
    pub(super) timebase_numerator: i32,
    pub(super) timebase_denominator: i32,
    pub(super) timestamp: i64,
    pub(super) first_timestamp: i64,
}

impl Timestamp {
    pub(super) fn new(ts: i64, timebase: Rational, first_timestamp: i64) -> Self {
        Self {
            timestamp: ts,
            first_timestamp,
            timebase_numerator: timebase.numerator(),
            timebase_denominator: timebase.denominator(),
        }
    }

    /// An offset from the start, in microseconds.
    pub fn from_duration(dur: Duration) -> Self {
        Self::new(
            dur.as_micros().try_into().unwrap_or(i64::MAX),
            MICROS,
            0,
        )
    }

    /// `dur` in `timebase`, rounded down, so that it never ends up after `dur`.
    pub(super) fn floor_in(dur: Duration, timebase: Rational) -> i64 {
        let num = i128::from(timebase.numerator());
        let den = i128::from(timebase.denominator());
        let ticks = (dur.as_nanos() as i128 * den).div_euclid(num * 1_000_000_000);
        ticks.clamp(0, i64::MAX.into()) as i64
    }

    pub fn timebase(&self) -> Rational {
        Rational(self.timebase_numerator, self.timebase_denominator)
    }

    /// The offset from the start expressed in `timebase`.
    pub fn timestamp(&self, timebase: Rational) -> i64 {
        (self.timestamp - self.first_timestamp).rescale(self.timebase(), timebase)
    }

    /// The offset from the start, where anything before the start is zero.
    pub fn to_duration(&self) -> Duration {
        let micros = self.timestamp(MICROS);
        Duration::from_micros(micros.max(0).try_into().expect("is not negative"))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.timestamp(Rational(1, 1000));
        let negative = if millis < 0 { "-" } else { "" };
        let millis = millis.unsigned_abs();

        let subsec = millis % 1000;
        let total = millis / 1000;
        let hours = total / 3600;
        let minutes = total % 3600 / 60;
        let seconds = total % 60;

        write!(
            f,
            "{}{:02}:{:02}:{:02}.{:03}",
            negative, hours, minutes, seconds, subsec
        )
    }
}
