//! Well-known evaluation score names and placeholder values.
//!
//! These are the canonical score names emitted to the trace collector after
//! a successful generation. The values are fixed placeholders standing in
//! for a future evaluation model; the emission hook and the names are the
//! stable contract, the numbers are not.

/// Similarity of variant A to the input audio.
pub const SCORE_INPUT_SIMILARITY_A: &str = "input_similarity_a";

/// Similarity of variant B to the input audio.
pub const SCORE_INPUT_SIMILARITY_B: &str = "input_similarity_b";

/// Audio quality of variant A.
pub const SCORE_AUDIO_QUALITY_A: &str = "audio_quality_a";

/// Audio quality of variant B.
pub const SCORE_AUDIO_QUALITY_B: &str = "audio_quality_b";

/// How different the two variants are from each other.
pub const SCORE_VARIANT_DIVERSITY: &str = "variant_diversity";

/// A single named evaluation score.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationScore {
    pub name: &'static str,
    pub value: f64,
    pub comment: &'static str,
}

/// Return the placeholder evaluation scores for a completed batch.
pub fn mock_evaluation_scores() -> Vec<EvaluationScore> {
    vec![
        EvaluationScore {
            name: SCORE_INPUT_SIMILARITY_A,
            value: 0.82,
            comment: "placeholder score, evaluation model pending",
        },
        EvaluationScore {
            name: SCORE_INPUT_SIMILARITY_B,
            value: 0.78,
            comment: "placeholder score, evaluation model pending",
        },
        EvaluationScore {
            name: SCORE_AUDIO_QUALITY_A,
            value: 0.91,
            comment: "placeholder score, evaluation model pending",
        },
        EvaluationScore {
            name: SCORE_AUDIO_QUALITY_B,
            value: 0.88,
            comment: "placeholder score, evaluation model pending",
        },
        EvaluationScore {
            name: SCORE_VARIANT_DIVERSITY,
            value: 0.35,
            comment: "placeholder score, evaluation model pending",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_scores_emitted() {
        assert_eq!(mock_evaluation_scores().len(), 5);
    }

    #[test]
    fn score_names_are_unique() {
        let scores = mock_evaluation_scores();
        let mut names: Vec<&str> = scores.iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), scores.len());
    }

    #[test]
    fn score_values_are_normalized() {
        for score in mock_evaluation_scores() {
            assert!((0.0..=1.0).contains(&score.value), "{}", score.name);
        }
    }
}
