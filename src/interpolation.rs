//! Linear interpolation of GPS readings onto arbitrary timestamps.
//!
//! For a query time `ts` the two bracketing samples are found by binary
//! search: `prev` is the latest sample strictly before `ts` and `next` the
//! earliest strictly after it. A sample exactly at `ts` is both. Outside the
//! series the nearest end sample stands in for the missing side, so values
//! are held flat rather than extrapolated.

use crate::telemetry::{GPS_COMPONENTS, GpsVector, TelemetrySample, TelemetrySeries};

/// The samples surrounding a query timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket<'s> {
    /// Latest sample before the query, or the first sample.
    pub prev: &'s TelemetrySample,
    /// Earliest sample after the query, or the last sample.
    pub next: &'s TelemetrySample,
}

impl Bracket<'_> {
    /// Interpolate every component at `timestamp`.
    ///
    /// When both sides are the same instant the `prev` values are returned
    /// unchanged.
    pub fn value_at(&self, timestamp: f64) -> GpsVector {
        let (prev, next) = (self.prev, self.next);
        let mut values = prev.values;
        if next.timestamp > prev.timestamp {
            let fraction = (timestamp - prev.timestamp) / (next.timestamp - prev.timestamp);
            for (value, (a, b)) in values
                .iter_mut()
                .zip(prev.values.iter().zip(next.values.iter()))
            {
                *value = a + (b - a) * fraction;
            }
        }
        values
    }
}

/// Find the bracketing samples of `timestamp`. `None` for an empty series.
pub fn bracket(series: &TelemetrySeries, timestamp: f64) -> Option<Bracket<'_>> {
    let samples = series.samples();
    let last = samples.len().checked_sub(1)?;

    // First sample at or after the query.
    let split = samples.partition_point(|sample| sample.timestamp < timestamp);

    if split <= last && samples[split].timestamp == timestamp {
        let exact = &samples[split];
        return Some(Bracket {
            prev: exact,
            next: exact,
        });
    }

    Some(Bracket {
        prev: &samples[split.saturating_sub(1)],
        next: &samples[split.min(last)],
    })
}

/// Interpolated reading at `timestamp`.
///
/// An empty series yields an all-zero reading.
pub fn interpolate(series: &TelemetrySeries, timestamp: f64) -> GpsVector {
    bracket(series, timestamp)
        .map(|bracket| bracket.value_at(timestamp))
        .unwrap_or([0.0; GPS_COMPONENTS])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(f64, f64)]) -> TelemetrySeries {
        points
            .iter()
            .map(|&(timestamp, value)| (timestamp, [value; GPS_COMPONENTS]))
            .collect()
    }

    #[test]
    fn bracket_straddles_query() {
        let series = series(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let bracket = bracket(&series, 1.5).unwrap();
        assert_eq!(bracket.prev.timestamp, 1.0);
        assert_eq!(bracket.next.timestamp, 2.0);
    }

    #[test]
    fn bracket_collapses_on_exact_match() {
        let series = series(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let bracket = bracket(&series, 1.0).unwrap();
        assert_eq!(bracket.prev.timestamp, 1.0);
        assert_eq!(bracket.next.timestamp, 1.0);
    }

    #[test]
    fn bracket_saturates_at_both_ends() {
        let series = series(&[(1.0, 1.0), (2.0, 2.0)]);
        let below = bracket(&series, 0.5).unwrap();
        assert_eq!((below.prev.timestamp, below.next.timestamp), (1.0, 1.0));
        let above = bracket(&series, 3.0).unwrap();
        assert_eq!((above.prev.timestamp, above.next.timestamp), (2.0, 2.0));
    }

    #[test]
    fn single_sample_holds_everywhere() {
        let series = series(&[(1.0, 7.0)]);
        assert_eq!(interpolate(&series, 0.0), [7.0; GPS_COMPONENTS]);
        assert_eq!(interpolate(&series, 5.0), [7.0; GPS_COMPONENTS]);
    }

    #[test]
    fn empty_series_is_zero() {
        assert_eq!(
            interpolate(&TelemetrySeries::new(), 1.0),
            [0.0; GPS_COMPONENTS]
        );
    }
}
