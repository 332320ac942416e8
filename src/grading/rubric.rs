use once_cell::sync::Lazy;
use regex::Regex;
use crate::models::Criterion;

static CRITERION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*\((\d+(?:\.\d+)?)\s*%\)$").expect("criterion pattern is valid")
});

/// Parses free-text rubric into weighted criteria.
///
/// # Arguments
///
/// * `text` - Rubric text, one criterion per line in the form `Name (weight%)`.
///
/// # Returns
///
/// The criteria in the order they appear. Lines that do not match are skipped,
/// and the weights are returned as written; nothing checks that they sum to 100.
pub fn parse_rubric(text: &str) -> Vec<Criterion> {
    text.lines()
        .filter_map(|line| {
            let caps = CRITERION_LINE.captures(line.trim())?;
            let name = caps[1].trim().trim_start_matches(['-', '*', '•']).trim();
            if name.is_empty() {
                return None;
            }
            let weight = caps[2].parse::<f64>().ok()?;
            Some(Criterion {
                name: name.to_string(),
                weight,
            })
        })
        .collect()
}

/// A subject offered on the grading form, with its default rubric.
#[derive(Debug, Clone, Copy)]
pub struct Subject {
    pub id: &'static str,
    pub label: &'static str,
    pub rubric: &'static str,
}

pub static SUBJECTS: &[Subject] = &[
    Subject {
        id: "mathematics",
        label: "Mathematics",
        rubric: "Correctness of final answer (40%)\nProblem-solving method (30%)\nWorking shown (20%)\nNotation and presentation (10%)",
    },
    Subject {
        id: "physics",
        label: "Physics",
        rubric: "Conceptual understanding (35%)\nCorrect use of formulas (25%)\nCalculations and units (25%)\nExplanation clarity (15%)",
    },
    Subject {
        id: "chemistry",
        label: "Chemistry",
        rubric: "Chemical accuracy (35%)\nBalanced equations (25%)\nReasoning (25%)\nUse of terminology (15%)",
    },
    Subject {
        id: "biology",
        label: "Biology",
        rubric: "Content accuracy (40%)\nUse of terminology (20%)\nDepth of explanation (25%)\nDiagrams and examples (15%)",
    },
    Subject {
        id: "literature",
        label: "Literature",
        rubric: "Thesis and argument (30%)\nUse of textual evidence (30%)\nAnalysis (25%)\nWriting quality (15%)",
    },
    Subject {
        id: "history",
        label: "History",
        rubric: "Historical accuracy (35%)\nUse of sources (25%)\nArgument and analysis (25%)\nStructure (15%)",
    },
];

impl Subject {
    pub fn find(id: &str) -> Option<&'static Subject> {
        SUBJECTS.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }
}
