use once_cell::sync::Lazy;
use regex::Regex;
use crate::models::CriterionResult;

static SCORE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)score\s*\**\s*[:=\-]?\s*\**\s*(\d+(?:\.\d+)?)\s*(?:/\s*(\d+(?:\.\d+)?))?")
        .expect("score pattern is valid")
});

static FEEDBACK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)feedback\s*\**\s*:\s*\**(.*)").expect("feedback pattern is valid")
});

/// Share of the maximum awarded when a criterion could not be graded.
pub const FALLBACK_RATIO: f64 = 0.7;

/// Extracts a numeric score from a model reply.
///
/// # Arguments
///
/// * `response` - Raw text returned by the model.
/// * `max_score` - The scale the criterion is graded on.
///
/// # Returns
///
/// The first `Score: N` or `Score: N/M` found, rescaled to `max_score` when a
/// denominator is present and clamped to `[0, max_score]`. `None` if the reply
/// carries no score.
pub fn parse_score(response: &str, max_score: f64) -> Option<f64> {
    let caps = SCORE_PATTERN.captures(response)?;
    let value: f64 = caps[1].parse().ok()?;

    let scaled = match caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
        Some(denominator) if denominator > 0.0 => value / denominator * max_score,
        Some(_) => return None,
        None => value,
    };

    Some(scaled.clamp(0.0, max_score))
}

/// Text following `Feedback:`, or the whole reply when there is no such label.
pub fn parse_feedback(response: &str) -> String {
    FEEDBACK_PATTERN
        .captures(response)
        .map(|caps| caps[1].trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| response.trim().to_string())
}

pub fn fallback_score(max_score: f64) -> f64 {
    max_score * FALLBACK_RATIO
}

/// Weighted total on a 0-100 scale.
///
/// Each criterion contributes `score / max_score * weight`; the sum is divided
/// by the total weight, so weights that do not add up to 100 are normalised.
/// Returns 0 for an empty slice or a zero total weight.
pub fn weighted_total(criteria: &[CriterionResult]) -> f64 {
    let total_weight: f64 = criteria.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let weighted: f64 = criteria
        .iter()
        .filter(|c| c.max_score > 0.0)
        .map(|c| c.score / c.max_score * c.weight)
        .sum();

    (weighted / total_weight * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f64, weight: f64) -> CriterionResult {
        CriterionResult {
            name: "c".into(),
            weight,
            score,
            max_score: 100.0,
            feedback: String::new(),
            fallback: false,
        }
    }

    #[test]
    fn reads_plain_score() {
        assert_eq!(parse_score("Score: 85\nFeedback: solid", 100.0), Some(85.0));
        assert_eq!(parse_score("**Score**: 72", 100.0), Some(72.0));
        assert_eq!(parse_score("Score 72", 100.0), Some(72.0));
        assert_eq!(parse_score("SCORE = 40", 100.0), Some(40.0));
    }

    #[test]
    fn rescales_fraction_to_max() {
        assert_eq!(parse_score("Score: 8/10", 100.0), Some(80.0));
        assert_eq!(parse_score("score: 45 / 50", 10.0), Some(9.0));
        assert_eq!(parse_score("Score: 3/0", 100.0), None);
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(parse_score("Score: 140", 100.0), Some(100.0));
        assert_eq!(parse_score("Score: 12/10", 100.0), Some(100.0));
    }

    #[test]
    fn missing_score_is_none() {
        assert_eq!(parse_score("The answer is mostly right.", 100.0), None);
    }

    #[test]
    fn feedback_after_label_or_whole_reply() {
        assert_eq!(
            parse_feedback("Score: 70\nFeedback: Good method,\nweak units."),
            "Good method,\nweak units."
        );
        assert_eq!(parse_feedback("  Looks fine.  "), "Looks fine.");
    }

    #[test]
    fn fallback_is_seventy_percent() {
        assert_eq!(fallback_score(100.0), 70.0);
        assert_eq!(fallback_score(10.0), 7.0);
    }

    #[test]
    fn weighted_total_normalises_weights() {
        let criteria = vec![result(100.0, 50.0), result(50.0, 50.0)];
        assert_eq!(weighted_total(&criteria), 75.0);

        // Same ratio, weights summing to 20 instead of 100
        let criteria = vec![result(100.0, 10.0), result(50.0, 10.0)];
        assert_eq!(weighted_total(&criteria), 75.0);

        let criteria = vec![result(90.0, 30.0), result(60.0, 70.0)];
        assert_eq!(weighted_total(&criteria), 69.0);
    }

    #[test]
    fn weighted_total_of_nothing_is_zero() {
        assert_eq!(weighted_total(&[]), 0.0);
        assert_eq!(weighted_total(&[result(80.0, 0.0)]), 0.0);
    }
}
