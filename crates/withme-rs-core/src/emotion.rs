//! Lexicon-based emotion scoring.

use crate::error::KernelError;
use regex::{Regex, RegexBuilder};
use withme_rs_protocol::EmotionEstimate;

struct LexiconEntry {
    keyword: &'static str,
    valence: f64,
    arousal: f64,
    label: &'static str,
}

const fn entry(
    keyword: &'static str,
    valence: f64,
    arousal: f64,
    label: &'static str,
) -> LexiconEntry {
    LexiconEntry {
        keyword,
        valence,
        arousal,
        label,
    }
}

// Order matters: ties on occurrence count go to the earlier keyword.
const LEXICON: &[LexiconEntry] = &[
    entry("anxious", -0.6, 0.7, "anxious"),
    entry("scared", -0.7, 0.8, "scared"),
    entry("panicked", -0.8, 0.9, "panicked"),
    entry("angry", -0.7, 0.8, "angry"),
    entry("frustrated", -0.5, 0.6, "frustrated"),
    entry("stressed", -0.5, 0.7, "stressed"),
    entry("overwhelmed", -0.6, 0.7, "overwhelmed"),
    entry("sad", -0.7, 0.3, "sad"),
    entry("depressed", -0.8, 0.2, "depressed"),
    entry("tired", -0.3, 0.2, "tired"),
    entry("exhausted", -0.5, 0.1, "exhausted"),
    entry("lonely", -0.6, 0.3, "lonely"),
    entry("hopeless", -0.9, 0.2, "hopeless"),
    entry("numb", -0.4, 0.1, "numb"),
    entry("excited", 0.8, 0.8, "excited"),
    entry("happy", 0.7, 0.6, "happy"),
    entry("hopeful", 0.6, 0.5, "hopeful"),
    entry("motivated", 0.6, 0.7, "motivated"),
    entry("proud", 0.7, 0.6, "proud"),
    entry("calm", 0.4, 0.2, "calm"),
    entry("peaceful", 0.5, 0.2, "peaceful"),
    entry("content", 0.5, 0.3, "content"),
    entry("grateful", 0.6, 0.4, "grateful"),
    entry("relieved", 0.5, 0.3, "relieved"),
    entry("confused", -0.2, 0.5, "confused"),
    entry("uncertain", -0.2, 0.4, "uncertain"),
    entry("okay", 0.1, 0.3, "neutral"),
    entry("fine", 0.1, 0.3, "neutral"),
];

/// Scores text against a fixed keyword lexicon.
///
/// Every whole-word, case-insensitive occurrence of every keyword adds its
/// valence and arousal to a running sum; the estimate is the mean over all
/// occurrences. The label belongs to the keyword with the strictly highest
/// count, first in lexicon order on ties.
pub struct EmotionInferencer {
    matchers: Vec<(Regex, &'static LexiconEntry)>,
}

impl std::fmt::Debug for EmotionInferencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionInferencer")
            .field("keywords", &self.matchers.len())
            .finish()
    }
}

impl EmotionInferencer {
    pub fn new() -> Result<Self, KernelError> {
        let matchers = LEXICON
            .iter()
            .map(|entry| {
                RegexBuilder::new(&format!(r"\b{}\b", entry.keyword))
                    .case_insensitive(true)
                    .build()
                    .map(|regex| (regex, entry))
                    .map_err(|err| KernelError::Pattern(format!("{}: {err}", entry.keyword)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn infer(&self, text: &str) -> EmotionEstimate {
        let mut total_valence = 0.0;
        let mut total_arousal = 0.0;
        let mut match_count = 0usize;
        let mut highest = 0usize;
        let mut label = "neutral";

        for (regex, entry) in &self.matchers {
            let count = regex.find_iter(text).count();
            if count == 0 {
                continue;
            }
            total_valence += entry.valence * count as f64;
            total_arousal += entry.arousal * count as f64;
            match_count += count;
            if count > highest {
                highest = count;
                label = entry.label;
            }
        }

        if match_count == 0 {
            return EmotionEstimate::neutral();
        }

        let n = match_count as f64;
        EmotionEstimate {
            valence: (total_valence / n).clamp(-1.0, 1.0),
            arousal: (total_arousal / n).clamp(0.0, 1.0),
            label: label.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn no_keywords_yields_neutral_default() {
        let inferencer = EmotionInferencer::new().expect("lexicon");
        assert_eq!(
            inferencer.infer("The train was on time today."),
            EmotionEstimate::neutral()
        );
    }

    #[test]
    fn weighted_mean_and_majority_label() {
        let inferencer = EmotionInferencer::new().expect("lexicon");
        let estimate = inferencer.infer("anxious anxious happy");
        assert_eq!(estimate.label, "anxious");
        assert!(close(estimate.valence, (2.0 * -0.6 + 0.7) / 3.0));
        assert!(close(estimate.arousal, (2.0 * 0.7 + 0.6) / 3.0));
    }

    #[test]
    fn ties_go_to_earlier_keyword() {
        let inferencer = EmotionInferencer::new().expect("lexicon");
        assert_eq!(inferencer.infer("happy but tired").label, "tired");
        assert_eq!(inferencer.infer("calm and sad").label, "sad");
    }

    #[test]
    fn whole_words_only_and_case_insensitive() {
        let inferencer = EmotionInferencer::new().expect("lexicon");
        assert_eq!(inferencer.infer("SAD"), inferencer.infer("sad"));
        assert_eq!(inferencer.infer("saddle the horse"), EmotionEstimate::neutral());
    }

    #[test]
    fn okay_and_fine_map_to_neutral_label() {
        let inferencer = EmotionInferencer::new().expect("lexicon");
        let estimate = inferencer.infer("I had a fine day, feeling okay");
        assert_eq!(estimate.label, "neutral");
        assert!(close(estimate.valence, 0.1));
    }
}
