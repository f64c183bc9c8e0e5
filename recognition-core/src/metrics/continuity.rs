//! Session continuity and streaks of recognition-bearing sessions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::memory::{RecognitionMoment, SessionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuity {
    pub total_sessions: usize,
    /// Sessions that produced at least one recognition moment
    pub recognition_sessions: usize,
    pub other_sessions: usize,
    /// Recognition-bearing sessions ending at the latest session
    pub current_streak: usize,
    pub longest_streak: usize,
}

pub fn compute_continuity(sessions: &[SessionRecord], moments: &[RecognitionMoment]) -> Continuity {
    let bearing: HashSet<&str> = moments
        .iter()
        .filter_map(|m| m.session_id.as_deref())
        .collect();

    let mut ordered: Vec<&SessionRecord> = sessions.iter().collect();
    ordered.sort_by(|a, b| a.started_at.cmp(&b.started_at));

    let mut continuity = Continuity {
        total_sessions: ordered.len(),
        ..Default::default()
    };
    let mut streak = 0;
    for session in ordered {
        if bearing.contains(session.session_id.as_str()) {
            continuity.recognition_sessions += 1;
            streak += 1;
            continuity.longest_streak = continuity.longest_streak.max(streak);
        } else {
            continuity.other_sessions += 1;
            streak = 0;
        }
    }
    continuity.current_streak = streak;
    continuity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::WritingPad;
    use crate::metrics::tests::moment_at;
    use chrono::{Duration, Utc};

    fn session(id: &str, day: i64) -> SessionRecord {
        let started = Utc::now() + Duration::days(day);
        SessionRecord {
            session_id: id.to_string(),
            learner_id: "learner-1".into(),
            started_at: started,
            last_active_at: started,
            interactions: 1,
        }
    }

    #[test]
    fn test_streaks() {
        let pad = WritingPad::new("learner-1", 20);
        let sessions: Vec<_> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .enumerate()
            .map(|(i, id)| session(id, i as i64))
            .collect();
        let moments: Vec<_> = ["a", "b", "c", "e", "f"]
            .iter()
            .map(|id| {
                let mut m = moment_at(&pad, Utc::now(), 0.4);
                m.session_id = Some(id.to_string());
                m
            })
            .collect();

        let continuity = compute_continuity(&sessions, &moments);
        assert_eq!(continuity.total_sessions, 6);
        assert_eq!(continuity.recognition_sessions, 5);
        assert_eq!(continuity.other_sessions, 1);
        assert_eq!(continuity.longest_streak, 3);
        assert_eq!(continuity.current_streak, 2);
    }

    #[test]
    fn test_order_follows_start_time() {
        let pad = WritingPad::new("learner-1", 20);
        let sessions = vec![session("late", 2), session("early", 0)];
        let mut m = moment_at(&pad, Utc::now(), 0.4);
        m.session_id = Some("early".into());

        let continuity = compute_continuity(&sessions, &[m]);
        assert_eq!(continuity.longest_streak, 1);
        assert_eq!(continuity.current_streak, 0);
    }

    #[test]
    fn test_no_sessions() {
        assert_eq!(compute_continuity(&[], &[]), Continuity::default());
    }
}
