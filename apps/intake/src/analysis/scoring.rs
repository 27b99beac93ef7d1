//! Resume scoring — pluggable, trait-based scorer over the frozen summary text.
//!
//! Default: `HeuristicScorer` (keyword presence plus a length bonus, fully
//! deterministic). `AppState` holds an `Arc<dyn ResumeScorer>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::PipelineError;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Gauge band shown next to the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent, // > 90
    Good,      // > 70
    NeedsWork,
}

impl ScoreBand {
    pub fn for_score(score: u32) -> Self {
        if score > 90 {
            ScoreBand::Excellent
        } else if score > 70 {
            ScoreBand::Good
        } else {
            ScoreBand::NeedsWork
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub score: u32,
    pub band: ScoreBand,
    pub headline: String,
    pub suggestions: Vec<String>,
}

impl ScoringResult {
    pub fn new(score: u32, suggestions: Vec<String>) -> Self {
        let headline = match suggestions.first() {
            Some(first) => format!("Your resume is {score}% complete. {first}"),
            None => format!("Your resume is {score}% complete."),
        };
        Self {
            score,
            band: ScoreBand::for_score(score),
            headline,
            suggestions,
        }
    }

    /// Fixed result shown when a non-PDF upload finishes its synthetic progress.
    pub fn canned_upload() -> Self {
        Self {
            score: CANNED_UPLOAD_SCORE,
            band: ScoreBand::for_score(CANNED_UPLOAD_SCORE),
            headline: format!(
                "Your resume is {CANNED_UPLOAD_SCORE}% complete. Adding more details about your technical skills could improve it further."
            ),
            suggestions: Vec::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ResumeScorer: Send + Sync {
    async fn score(&self, summary: &str) -> Result<ScoringResult, PipelineError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicScorer
// ────────────────────────────────────────────────────────────────────────────

const CANNED_UPLOAD_SCORE: u32 = 85;

const BASE_SCORE: u32 = 65;
const LENGTH_BONUS: u32 = 10;
const KEYWORD_BONUS: u32 = 5;
const MAX_SCORE: u32 = 100;
/// Characters; strictly greater earns the bonus, strictly less earns the
/// "expand" suggestion.
const LENGTH_THRESHOLD: usize = 1000;

const SCORED_KEYWORDS: &[&str] = &["experience", "education", "skills", "project", "achievement"];

const GENERIC_SUGGESTIONS: &[&str] = &[
    "Add more details about your technical skills and proficiency levels",
    "Quantify your achievements with specific metrics and numbers",
    "Include relevant keywords from the job descriptions you're targeting",
];

const MISSING_EDUCATION: &str = "Add your educational background and qualifications";
const MISSING_EXPERIENCE: &str = "Include your work experience with detailed responsibilities";
const TOO_SHORT: &str = "Expand your resume content to provide more detailed information";

/// Keyword-presence scorer.
///
/// Algorithm:
/// 1. Start at 65.
/// 2. +10 when the text is longer than 1000 characters.
/// 3. +5 for each of experience / education / skills / project / achievement
///    found in the lower-cased text.
/// 4. Clamp to 100 (never reached with the weights above).
pub struct HeuristicScorer;

#[async_trait]
impl ResumeScorer for HeuristicScorer {
    async fn score(&self, summary: &str) -> Result<ScoringResult, PipelineError> {
        Ok(score_summary(summary))
    }
}

pub fn score_summary(summary: &str) -> ScoringResult {
    let text = summary.to_lowercase();
    let length = summary.chars().count();

    let mut score = BASE_SCORE;
    if length > LENGTH_THRESHOLD {
        score += LENGTH_BONUS;
    }
    score += SCORED_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count() as u32
        * KEYWORD_BONUS;
    let score = score.min(MAX_SCORE);

    let mut suggestions: Vec<String> = GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
    if !text.contains("education") {
        suggestions.push(MISSING_EDUCATION.to_string());
    }
    if !text.contains("experience") {
        suggestions.push(MISSING_EXPERIENCE.to_string());
    }
    if length < LENGTH_THRESHOLD {
        suggestions.push(TOO_SHORT.to_string());
    }

    ScoringResult::new(score, suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(body: &str, len: usize) -> String {
        let mut s = body.to_string();
        while s.chars().count() < len {
            s.push('x');
        }
        s
    }

    #[test]
    fn test_long_text_with_experience_and_skills() {
        let text = padded("Experience at Acme. Core SKILLS: Rust. ", 1200);
        assert_eq!(text.chars().count(), 1200);

        let result = score_summary(&text);
        assert_eq!(result.score, 85);
        assert_eq!(result.suggestions.len(), 4);
        assert_eq!(&result.suggestions[..3], GENERIC_SUGGESTIONS);
        assert_eq!(result.suggestions[3], MISSING_EDUCATION);
        assert_eq!(result.band, ScoreBand::Good);
    }

    #[test]
    fn test_empty_text_gets_base_score_and_every_suggestion() {
        let result = score_summary("");
        assert_eq!(result.score, 65);
        assert_eq!(
            result.suggestions,
            vec![
                GENERIC_SUGGESTIONS[0],
                GENERIC_SUGGESTIONS[1],
                GENERIC_SUGGESTIONS[2],
                MISSING_EDUCATION,
                MISSING_EXPERIENCE,
                TOO_SHORT,
            ]
        );
        assert_eq!(result.band, ScoreBand::NeedsWork);
    }

    #[test]
    fn test_every_signal_reaches_exactly_one_hundred() {
        let text = padded(
            "experience education skills project achievement ",
            LENGTH_THRESHOLD + 1,
        );
        let result = score_summary(&text);
        assert_eq!(result.score, 100);
        assert_eq!(result.suggestions.len(), 3);
        assert_eq!(result.band, ScoreBand::Excellent);
    }

    #[test]
    fn test_exactly_threshold_length_gets_neither_bonus_nor_suggestion() {
        let text = padded("", LENGTH_THRESHOLD);
        let result = score_summary(&text);
        assert_eq!(result.score, BASE_SCORE);
        assert!(!result.suggestions.iter().any(|s| s == TOO_SHORT));
    }

    #[test]
    fn test_keywords_match_as_substrings() {
        // "projects" and "achievements" still contain the scored stems.
        let result = score_summary("Projects and Achievements");
        assert_eq!(result.score, 75);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let text = "Education: BSc. Project lead.";
        assert_eq!(score_summary(text), score_summary(text));
    }

    #[test]
    fn test_headline_quotes_first_suggestion() {
        let result = score_summary("");
        assert_eq!(
            result.headline,
            format!("Your resume is 65% complete. {}", GENERIC_SUGGESTIONS[0])
        );
    }

    #[test]
    fn test_canned_upload_result() {
        let result = ScoringResult::canned_upload();
        assert_eq!(result.score, 85);
        assert!(result.suggestions.is_empty());
        assert!(result.headline.starts_with("Your resume is 85% complete."));
    }

    #[tokio::test]
    async fn test_heuristic_scorer_wraps_score_summary() {
        let result = HeuristicScorer.score("skills").await.unwrap();
        assert_eq!(result, score_summary("skills"));
    }
}
