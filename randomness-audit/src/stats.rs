// File: randomness-audit/src/stats.rs
//
// Statistical plausibility checks for 32-byte randomness outputs.
//
// These are smoke heuristics, not a test battery: a uniformly random output
// passes all three with probability well above 0.95.

use crate::error::RandomnessAssertionFailure;
use log::debug;

pub const OUTPUT_LEN: usize = 32;

/// Expected value of a byte drawn uniformly from [0, 255], rounded up
pub const EXPECTED_BYTE: f64 = 128.0;

/// Chi-square critical value for 31 degrees of freedom at alpha = 0.05
pub const CHI_SQUARE_THRESHOLD: f64 = 44.985;

/// E[(X - 128)^2] for X uniform over [0, 255]: Var(X) = (256^2 - 1) / 12 plus 0.5^2
pub const UNIFORM_SQUARED_DEVIATION: f64 = 5461.5;

pub const MIN_MEAN: f64 = 81.0;
pub const MAX_MEAN: f64 = 175.0;

pub const MAX_REPEATS: usize = 3;

/// Sum of squared deviations from 128, each scaled by its expectation under
/// uniformity, so the statistic is centred on the sample count (32).
pub fn dispersion_statistic(bytes: &[u8; OUTPUT_LEN]) -> f64 {
    bytes
        .iter()
        .map(|&b| {
            let deviation = f64::from(b) - EXPECTED_BYTE;
            deviation * deviation / UNIFORM_SQUARED_DEVIATION
        })
        .sum()
}

/// Statistic computed with `(b - 128) XOR 2` in place of squaring.
///
/// Only kept to compare against results produced by older tooling.
pub fn legacy_xor_statistic(bytes: &[u8; OUTPUT_LEN]) -> f64 {
    bytes
        .iter()
        .map(|&b| f64::from((i32::from(b) - 128) ^ 2) / EXPECTED_BYTE)
        .sum()
}

pub fn chi_square_check(bytes: &[u8; OUTPUT_LEN]) -> Result<f64, RandomnessAssertionFailure> {
    let statistic = dispersion_statistic(bytes);
    debug!(
        "chi-square statistic {:.3} (legacy xor statistic {:.3})",
        statistic,
        legacy_xor_statistic(bytes)
    );
    if statistic >= CHI_SQUARE_THRESHOLD {
        return Err(RandomnessAssertionFailure::ChiSquare {
            statistic,
            threshold: CHI_SQUARE_THRESHOLD,
        });
    }
    Ok(statistic)
}

pub fn mean_in_range_check(bytes: &[u8; OUTPUT_LEN]) -> Result<f64, RandomnessAssertionFailure> {
    let sum: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    let mean = f64::from(sum) / OUTPUT_LEN as f64;
    if !(MIN_MEAN..=MAX_MEAN).contains(&mean) {
        return Err(RandomnessAssertionFailure::MeanOutOfRange {
            mean,
            min: MIN_MEAN,
            max: MAX_MEAN,
        });
    }
    Ok(mean)
}

/// Fails if any byte value occurs more than `MAX_REPEATS` times, reporting the most repeated one.
pub fn repetition_check(bytes: &[u8; OUTPUT_LEN]) -> Result<(), RandomnessAssertionFailure> {
    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[usize::from(b)] += 1;
    }

    let worst = counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > MAX_REPEATS)
        .max_by_key(|&(_, &count)| count);

    if let Some((value, &count)) = worst {
        debug!(
            "Count of {} is {} > {} max repeats, bytes: 0x{}",
            value,
            count,
            MAX_REPEATS,
            hex::encode(bytes)
        );
        return Err(RandomnessAssertionFailure::ExcessiveRepetition {
            value: value as u8,
            count,
            max: MAX_REPEATS,
        });
    }
    Ok(())
}

/// Runs every sub-check and returns all failures, not just the first.
pub fn is_plausibly_random(bytes: &[u8; OUTPUT_LEN]) -> Result<(), Vec<RandomnessAssertionFailure>> {
    let failures: Vec<_> = [
        chi_square_check(bytes).err(),
        mean_in_range_check(bytes).err(),
        repetition_check(bytes).err(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
