//! Bucket construction for continuous dimensions and magnitude classes for counts.

use serde::{Deserialize, Serialize};

use crate::error::InvalidRangeError;

/// Upper bound on buckets per axis unless the caller picks another limit.
pub const DEFAULT_MAX_BUCKETS: usize = 2_000;

/// Widening attempts before [`RangeBinner::spanning`] gives up.
const MAX_WIDENING_STEPS: usize = 64;

/// Step table of the count color scale. Each entry is the inclusive upper edge of a class.
pub const MAGNITUDE_STEPS: [u64; 8] = [3, 5, 10, 20, 35, 50, 100, 200];

/// Half-open interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Bucket {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value < self.upper
    }

    pub fn label(&self) -> String {
        format!("{:.1}-{:.1}", self.lower, self.upper)
    }
}

/// Ordered equal-width buckets `[min, min+interval), [min+interval, min+2*interval), ...`
/// reaching `max`.
///
/// Values outside `[min, max]` belong to no bucket. When `max` sits exactly on a bucket
/// edge it is excluded as well, since every bucket is half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBinner {
    min: f64,
    max: f64,
    interval: f64,
    buckets: Vec<Bucket>,
}

impl RangeBinner {
    pub fn new(min: f64, max: f64, interval: f64) -> Result<Self, InvalidRangeError> {
        Self::with_limit(min, max, interval, DEFAULT_MAX_BUCKETS)
    }

    pub fn with_limit(
        min: f64,
        max: f64,
        interval: f64,
        max_buckets: usize,
    ) -> Result<Self, InvalidRangeError> {
        let invalid = |reason| InvalidRangeError {
            min,
            max,
            interval,
            reason,
        };

        if !interval.is_finite() || interval <= 0.0 {
            return Err(invalid("interval must be positive"));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if min >= max {
            return Err(invalid("min must be below max"));
        }

        let count = ((max - min) / interval).ceil() as usize;
        if count > max_buckets {
            return Err(invalid("too many buckets"));
        }

        let buckets = (0..count)
            .map(|index| Bucket {
                index,
                lower: min + index as f64 * interval,
                upper: min + (index + 1) as f64 * interval,
            })
            .collect();

        Ok(Self {
            min,
            max,
            interval,
            buckets,
        })
    }

    /// Data-driven buckets aligned to multiples of `interval` that cover every finite value.
    ///
    /// When the values span more than `max_buckets` intervals the bucket width grows to the
    /// smallest multiple of `interval` that fits. Returns `Ok(None)` when there is no finite
    /// value to cover.
    pub fn spanning<I>(
        values: I,
        interval: f64,
        max_buckets: usize,
    ) -> Result<Option<Self>, InvalidRangeError>
    where
        I: IntoIterator<Item = f64>,
    {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(InvalidRangeError {
                min: f64::NAN,
                max: f64::NAN,
                interval,
                reason: "interval must be positive",
            });
        }

        let bounds = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });

        let Some((lo, hi)) = bounds else {
            return Ok(None);
        };

        let slots = |width: f64| {
            let min = (lo / width).floor() * width;
            let max = ((hi / width).floor() + 1.0) * width;
            ((max - min) / width).ceil()
        };
        let limit = max_buckets.max(1) as f64;
        let mut factor = (slots(interval) / limit).ceil().max(1.0);
        for _ in 0..MAX_WIDENING_STEPS {
            if slots(interval * factor) <= limit {
                break;
            }
            factor += 1.0;
        }

        let width = interval * factor;
        let min = (lo / width).floor() * width;
        let max = ((hi / width).floor() + 1.0) * width;
        Self::with_limit(min, max, width, max_buckets).map(Some)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    /// Index of the bucket holding `value`, if any.
    pub fn bucket_of(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.min || value > self.max {
            return None;
        }
        let guess = ((value - self.min) / self.interval).floor() as usize;
        // the division can land one bucket off near an edge
        [guess.checked_sub(1), Some(guess), guess.checked_add(1)]
            .into_iter()
            .flatten()
            .find(|&i| self.buckets.get(i).is_some_and(|b| b.contains(value)))
    }

    /// Count of values per bucket.
    pub fn histogram<I>(&self, values: I) -> Vec<usize>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut counts = vec![0; self.buckets.len()];
        for index in values.into_iter().filter_map(|v| self.bucket_of(v)) {
            counts[index] += 1;
        }
        counts
    }
}

/// One class of the count color scale. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnitudeRange {
    /// 0 is the reserved zero class, higher levels are larger counts
    pub level: usize,
    pub from: u64,
    pub to: u64,
    pub label: String,
}

/// Count classes for a grid, derived from its largest cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MagnitudeScale {
    pub ranges: Vec<MagnitudeRange>,
}

impl MagnitudeScale {
    pub fn for_max(max_value: u64) -> Self {
        let mut ranges = vec![MagnitudeRange {
            level: 0,
            from: 0,
            to: 0,
            label: "0".to_string(),
        }];

        let mut last = 0;
        for (i, &step) in MAGNITUDE_STEPS.iter().enumerate() {
            let from = last + 1;
            if from > max_value {
                break;
            }
            let to = step.min(max_value);
            let label = if from == to {
                from.to_string()
            } else {
                format!("{}-{}", from, to)
            };
            ranges.push(MagnitudeRange {
                level: i + 1,
                from,
                to,
                label,
            });
            last = to;
        }

        if max_value > last {
            ranges.push(MagnitudeRange {
                level: MAGNITUDE_STEPS.len() + 1,
                from: last + 1,
                to: max_value,
                label: format!("> {}", last),
            });
        }

        Self { ranges }
    }

    pub fn level_of(&self, count: u64) -> Option<usize> {
        self.ranges
            .iter()
            .find(|r| r.from <= count && count <= r.to)
            .map(|r| r.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range_buckets_are_half_open() {
        let binner = RangeBinner::new(0.0, 20.0, 5.0).unwrap();
        assert_eq!(binner.len(), 4);
        assert_eq!(binner.bucket_of(0.0), Some(0));
        assert_eq!(binner.bucket_of(4.99), Some(0));
        assert_eq!(binner.bucket_of(5.0), Some(1));
        assert_eq!(binner.bucket_of(19.9), Some(3));
        assert_eq!(binner.bucket_of(20.0), None);
        assert_eq!(binner.bucket_of(-0.1), None);
        assert_eq!(binner.bucket(2).unwrap().label(), "10.0-15.0");
    }

    #[test]
    fn test_last_bucket_may_overhang_max() {
        let binner = RangeBinner::new(10.0, 22.0, 5.0).unwrap();
        assert_eq!(binner.len(), 3);
        assert_eq!(binner.bucket(2).unwrap().upper, 25.0);
        assert_eq!(binner.bucket_of(22.0), Some(2));
        assert_eq!(binner.bucket_of(23.0), None);
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        assert!(RangeBinner::new(0.0, 10.0, 0.0).is_err());
        assert!(RangeBinner::new(0.0, 10.0, -1.0).is_err());
        assert!(RangeBinner::new(10.0, 10.0, 1.0).is_err());
        assert!(RangeBinner::new(12.0, 10.0, 1.0).is_err());
        assert!(RangeBinner::new(0.0, f64::INFINITY, 1.0).is_err());
        let err = RangeBinner::with_limit(0.0, 1000.0, 0.1, 100).unwrap_err();
        assert_eq!(err.reason, "too many buckets");
    }

    #[test]
    fn test_spanning_covers_every_value() {
        let values = [12.0, 48.0, 30.5, 50.0];
        let binner = RangeBinner::spanning(values, 5.0, DEFAULT_MAX_BUCKETS)
            .unwrap()
            .unwrap();
        assert_eq!(binner.min(), 10.0);
        assert_eq!(binner.max(), 55.0);
        assert_eq!(binner.histogram(values).iter().sum::<usize>(), values.len());
        assert!(RangeBinner::spanning([], 5.0, DEFAULT_MAX_BUCKETS)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_spanning_widens_to_fit_the_limit() {
        let values = [900.0, 1_500_000.0];
        let binner = RangeBinner::spanning(values, 500.0, DEFAULT_MAX_BUCKETS)
            .unwrap()
            .unwrap();
        assert!(binner.len() <= DEFAULT_MAX_BUCKETS);
        assert_eq!(binner.interval() % 500.0, 0.0);
        assert_eq!(binner.interval(), 1000.0);
        assert_eq!(binner.histogram(values), {
            let mut counts = vec![0; binner.len()];
            counts[0] = 1;
            counts[binner.len() - 1] = 1;
            counts
        });

        let narrow = RangeBinner::spanning([0.0, 99.0], 1.0, 10).unwrap().unwrap();
        assert!(narrow.len() <= 10);
        assert_eq!(narrow.histogram([0.0, 99.0]).iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_fractional_interval_edges() {
        let binner = RangeBinner::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(binner.len(), 10);
        assert_eq!(binner.bucket_of(0.3), binner.buckets().iter().position(|b| b.contains(0.3)));
        assert_eq!(binner.bucket_of(0.7), binner.buckets().iter().position(|b| b.contains(0.7)));
    }

    #[test]
    fn test_magnitude_scale_zero_only() {
        let scale = MagnitudeScale::for_max(0);
        assert_eq!(scale.ranges.len(), 1);
        assert_eq!(scale.level_of(0), Some(0));
        assert_eq!(scale.level_of(1), None);
    }

    #[test]
    fn test_magnitude_scale_truncates_to_max() {
        let scale = MagnitudeScale::for_max(7);
        let labels: Vec<&str> = scale.ranges.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "1-3", "4-5", "6-7"]);
        assert_eq!(scale.level_of(5), Some(2));
        assert_eq!(scale.level_of(7), Some(3));
    }

    #[test]
    fn test_magnitude_scale_extends_past_table() {
        let scale = MagnitudeScale::for_max(250);
        let last = scale.ranges.last().unwrap();
        assert_eq!(last.label, "> 200");
        assert_eq!((last.from, last.to), (201, 250));
        assert_eq!(last.level, 9);
        assert_eq!(MagnitudeScale::for_max(1).ranges[1].label, "1");
    }

    #[test]
    fn test_magnitude_scale_is_deterministic() {
        assert_eq!(MagnitudeScale::for_max(42), MagnitudeScale::for_max(42));
    }
}
