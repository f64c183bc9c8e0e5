//! The fixed pedagogical principles the reviewer evaluates against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PedagogicalPrinciple {
    /// Let the learner choose and act
    LearnerAutonomy,
    /// Don't remove the difficulty that produces learning
    ProductiveStruggle,
    /// Pitch the suggestion just beyond current ability
    ZoneOfProximalDevelopment,
    /// Acknowledge the learner's own contributions and perspective
    MutualRecognition,
    /// Support that fades as competence grows
    AdaptiveScaffolding,
    /// Concrete, actionable wording
    Clarity,
}

impl PedagogicalPrinciple {
    pub const ALL: [PedagogicalPrinciple; 6] = [
        Self::LearnerAutonomy,
        Self::ProductiveStruggle,
        Self::ZoneOfProximalDevelopment,
        Self::MutualRecognition,
        Self::AdaptiveScaffolding,
        Self::Clarity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::LearnerAutonomy => "learner_autonomy",
            Self::ProductiveStruggle => "productive_struggle",
            Self::ZoneOfProximalDevelopment => "zone_of_proximal_development",
            Self::MutualRecognition => "mutual_recognition",
            Self::AdaptiveScaffolding => "adaptive_scaffolding",
            Self::Clarity => "clarity",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LearnerAutonomy => {
                "Invite rather than command; the learner decides how to proceed"
            }
            Self::ProductiveStruggle => {
                "Never hand over the answer; preserve the difficulty that produces understanding"
            }
            Self::ZoneOfProximalDevelopment => {
                "Target the next reachable step, neither trivial nor out of reach"
            }
            Self::MutualRecognition => {
                "Engage with the learner's own reasoning and treat it as a contribution"
            }
            Self::AdaptiveScaffolding => {
                "Offer only as much structure as the learner currently needs"
            }
            Self::Clarity => "Be specific about what to do next and why",
        }
    }

    /// Loose lookup from model output ("Learner Autonomy", "autonomy", ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        if normalized.is_empty() {
            return None;
        }
        if let Some(p) = Self::ALL.iter().find(|p| p.label() == normalized) {
            return Some(*p);
        }
        if normalized.contains("autonomy") {
            Some(Self::LearnerAutonomy)
        } else if normalized.contains("struggle") {
            Some(Self::ProductiveStruggle)
        } else if normalized.contains("proximal") || normalized.contains("zpd") {
            Some(Self::ZoneOfProximalDevelopment)
        } else if normalized.contains("recognition") {
            Some(Self::MutualRecognition)
        } else if normalized.contains("scaffold") {
            Some(Self::AdaptiveScaffolding)
        } else if normalized.contains("clar") {
            Some(Self::Clarity)
        } else {
            None
        }
    }

    /// Bullet list for reviewer prompts.
    pub fn catalogue() -> String {
        Self::ALL
            .iter()
            .map(|p| format!("- {}: {}", p.label(), p.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for PedagogicalPrinciple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(
            PedagogicalPrinciple::from_label("Learner Autonomy"),
            Some(PedagogicalPrinciple::LearnerAutonomy)
        );
        assert_eq!(
            PedagogicalPrinciple::from_label("zone-of-proximal-development"),
            Some(PedagogicalPrinciple::ZoneOfProximalDevelopment)
        );
        assert_eq!(
            PedagogicalPrinciple::from_label("over-scaffolding"),
            Some(PedagogicalPrinciple::AdaptiveScaffolding)
        );
        assert_eq!(PedagogicalPrinciple::from_label("weather"), None);
        assert_eq!(PedagogicalPrinciple::from_label(""), None);
    }

    #[test]
    fn test_catalogue_lists_every_principle() {
        let text = PedagogicalPrinciple::catalogue();
        for p in PedagogicalPrinciple::ALL {
            assert!(text.contains(p.label()));
        }
    }
}
