//! Transfer progress estimates from completion samples.
//!
//! Samples are percentages recorded at a fixed interval between the staging
//! transition and the last document update.

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub first_completion: f64,
    pub last_completion: f64,
    /// Seconds between two completion samples.
    pub update_interval: f64,
    pub time_in_staging: f64,
    /// Seconds since completion last changed.
    pub stuck_time: i64,
    /// Percent per day, two decimals.
    pub speed: f64,
    /// Seconds to 100%, 0 when not moving.
    pub eta: f64,
}

impl TransferProgress {
    pub fn compute(completion: &[f64], staging: f64, last_update: f64) -> Self {
        let samples: &[f64] = if completion.is_empty() { &[0.0] } else { completion };
        let last_completion = samples[samples.len() - 1];
        // the first sample is taken at staging time
        let first_completion = samples.get(1).copied().unwrap_or(samples[0]);

        let time_in_staging = last_update - staging;
        let update_interval = if samples.len() > 1 {
            time_in_staging / (samples.len() - 1) as f64
        } else {
            0.0
        };

        let last_increase = (1..samples.len())
            .rev()
            .find(|&i| samples[i] != samples[i - 1])
            .unwrap_or(0);
        let stuck_time = (last_update - (staging + last_increase as f64 * update_interval)) as i64;

        let moving_time = time_in_staging - update_interval;
        let speed = if moving_time != 0.0 {
            (last_completion - first_completion) / moving_time
        } else {
            0.0
        };
        let eta = if speed != 0.0 {
            (100.0 - last_completion) / speed
        } else {
            0.0
        };

        Self {
            first_completion,
            last_completion,
            update_interval,
            time_in_staging,
            stuck_time,
            speed: round2(speed * SECONDS_PER_DAY),
            eta,
        }
    }
}

/// Two-decimal rounding through the `{:.2}` formatting, exact ties go to even.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_progress() {
        // four samples over 3 hours
        let p = TransferProgress::compute(&[0.0, 10.0, 20.0, 30.0], 1000.0, 1000.0 + 3.0 * 3600.0);
        assert_eq!(p.first_completion, 10.0);
        assert_eq!(p.last_completion, 30.0);
        assert_eq!(p.update_interval, 3600.0);
        assert_eq!(p.time_in_staging, 10800.0);
        // changed at the last sample
        assert_eq!(p.stuck_time, 0);
        // 20% in 7200 s
        assert_eq!(p.speed, 240.0);
        assert!((p.eta - 70.0 / (20.0 / 7200.0)).abs() < 1e-6);
    }

    #[test]
    fn speed_rounding_matches_two_decimal_formatting() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(-1.005), -1.0);
    }

    #[test]
    fn stuck_transfer() {
        let p = TransferProgress::compute(&[0.0, 50.0, 50.0, 50.0, 50.0], 0.0, 400.0);
        assert_eq!(p.update_interval, 100.0);
        // last change at index 1
        assert_eq!(p.stuck_time, 300);
        assert_eq!(p.speed, 0.0);
        assert_eq!(p.eta, 0.0);
    }

    #[test]
    fn single_or_missing_sample() {
        let p = TransferProgress::compute(&[42.0], 0.0, 100.0);
        assert_eq!(p.first_completion, 42.0);
        assert_eq!(p.update_interval, 0.0);
        assert_eq!(p.stuck_time, 100);
        // moving time equals the time in staging, no progress
        assert_eq!(p.speed, 0.0);

        let empty = TransferProgress::compute(&[], 0.0, 0.0);
        assert_eq!(empty.last_completion, 0.0);
        assert_eq!(empty.speed, 0.0);
        assert_eq!(empty.eta, 0.0);
    }
}
