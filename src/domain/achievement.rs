use crate::types::{AchievementLevel, CriterionScore, MeasurementType};

/// Percentage of target achieved, rounded to two decimals.
///
/// Returns `None` when there is no target. A zero target counts as fully
/// achieved by any positive actual value.
#[must_use]
pub fn calculate(measurement: MeasurementType, actual: f64, target: Option<f64>) -> Option<f64> {
    let target = target?;
    if target == 0.0 {
        let met = match measurement {
            MeasurementType::Number => actual >= target,
            _ => actual > 0.0,
        };
        return Some(if met { 100.0 } else { 0.0 });
    }
    let ratio = actual / target;

    let value = match measurement {
        MeasurementType::Percentage => ratio * 100.0,
        MeasurementType::Number => {
            if actual >= target {
                100.0
            } else {
                ratio * 100.0
            }
        }
        MeasurementType::Ratio => (1.0 - (1.0 - ratio).abs()) * 100.0,
        MeasurementType::Index => index_band(ratio),
    };

    Some(round2(value))
}

fn index_band(ratio: f64) -> f64 {
    if ratio < 0.5 {
        25.0
    } else if ratio < 0.75 {
        50.0
    } else if ratio < 0.9 {
        75.0
    } else if ratio < 1.0 {
        90.0
    } else {
        100.0
    }
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[must_use]
pub fn level_for_score(score: f64) -> AchievementLevel {
    if score >= 90.0 {
        AchievementLevel::Excellent
    } else if score >= 80.0 {
        AchievementLevel::Good
    } else if score >= 70.0 {
        AchievementLevel::Fair
    } else {
        AchievementLevel::Poor
    }
}

/// Letter grade for an average 0-100 score.
#[must_use]
pub fn grade_for_score(score: f64) -> char {
    if score >= 90.0 {
        'A'
    } else if score >= 80.0 {
        'B'
    } else if score >= 70.0 {
        'C'
    } else if score >= 60.0 {
        'D'
    } else {
        'E'
    }
}

/// Weighted mean of criterion scores, or `None` when the weights sum to zero.
#[must_use]
pub fn weighted_score(criteria: &[CriterionScore]) -> Option<f64> {
    let total_weight: f64 = criteria.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return None;
    }
    let weighted: f64 = criteria.iter().map(|c| c.score * c.weight).sum();
    Some(round2(weighted / total_weight))
}
