//! Canned replies for daily check-ins. No model call is involved.

use withme_rs_protocol::CheckinPayload;

pub const DEFAULT_REPLY: &str = "Thank you for sharing how you're doing today.";
const HIGH_STRESS: &str = "It sounds like you're carrying a lot right now. I'm here with you.";
const LOW_MOOD: &str = "I hear that today feels heavy. We can take this one step at a time.";
const POOR_SLEEP: &str = "Sleep struggles can be so draining. Be gentle with yourself today.";
const DOING_WELL: &str = "It's good to hear you're feeling well today. I'm glad you're here.";

fn at_least(score: Option<i32>, threshold: i32) -> bool {
    score.is_some_and(|value| value >= threshold)
}

fn at_most(score: Option<i32>, threshold: i32) -> bool {
    score.is_some_and(|value| value <= threshold)
}

/// Pick a reply by the first matching threshold. Missing scores never match.
pub fn reply_for(payload: &CheckinPayload) -> &'static str {
    if payload.skipped {
        return DEFAULT_REPLY;
    }
    if at_least(payload.stress, 4) {
        HIGH_STRESS
    } else if at_most(payload.mood, 2) {
        LOW_MOOD
    } else if at_most(payload.sleep, 2) {
        POOR_SLEEP
    } else if at_least(payload.mood, 4) && at_least(payload.energy, 4) {
        DOING_WELL
    } else {
        DEFAULT_REPLY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scores(sleep: i32, mood: i32, energy: i32, stress: i32) -> CheckinPayload {
        CheckinPayload {
            sleep: Some(sleep),
            mood: Some(mood),
            energy: Some(energy),
            stress: Some(stress),
            ..CheckinPayload::default()
        }
    }

    #[test]
    fn thresholds_apply_in_order() {
        assert_eq!(reply_for(&scores(1, 1, 1, 5)), HIGH_STRESS);
        assert_eq!(reply_for(&scores(1, 2, 3, 3)), LOW_MOOD);
        assert_eq!(reply_for(&scores(2, 3, 3, 3)), POOR_SLEEP);
        assert_eq!(reply_for(&scores(4, 4, 4, 1)), DOING_WELL);
        assert_eq!(reply_for(&scores(3, 3, 3, 3)), DEFAULT_REPLY);
    }

    #[test]
    fn skipped_check_in_gets_default() {
        let payload = CheckinPayload {
            skipped: true,
            ..scores(1, 1, 1, 5)
        };
        assert_eq!(reply_for(&payload), DEFAULT_REPLY);
    }

    #[test]
    fn missing_scores_do_not_match() {
        assert_eq!(reply_for(&CheckinPayload::default()), DEFAULT_REPLY);
        let only_mood = CheckinPayload {
            mood: Some(5),
            ..CheckinPayload::default()
        };
        assert_eq!(reply_for(&only_mood), DEFAULT_REPLY);
    }
}
