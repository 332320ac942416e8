use serde::{Deserialize, Serialize};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

/// One weighted grading dimension taken from a rubric.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Criterion {
    pub name: String,
    pub weight: f64,  // percent, not required to sum to 100
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CriterionResult {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
    pub fallback: bool,  // true when the score was substituted after a failed call
}

/// The graded outcome for a single uploaded file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GradingResult {
    pub id: String,
    pub name: String,
    pub score: f64,  // weighted total, 0-100
    pub feedback: String,
    pub criteria: Vec<CriterionResult>,
}

impl GradingResult {
    /// Millisecond timestamp plus a random suffix; unique enough for display, not stable.
    pub fn new_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect();
        format!("{}-{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_timestamp_and_differ() {
        let a = GradingResult::new_id();
        let b = GradingResult::new_id();
        assert_ne!(a, b);
        let (stamp, suffix) = a.split_once('-').unwrap();
        assert!(stamp.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 9);
    }
}
