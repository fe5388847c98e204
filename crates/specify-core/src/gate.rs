use serde::Serialize;

use crate::profile::{InputProfile, ProfileField};

/// Asked, verbatim and in this order, when the description is too thin to design from.
pub const CLARIFICATION_QUESTIONS: [&str; 3] = [
    "What is the primary action users will take in your application (for example: buy products, share posts, book appointments)?",
    "Does the application need real-time features such as live chat, notifications, or collaborative editing?",
    "Will the application store or process sensitive financial or medical data (payments, bank details, health records)?",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum GateDecision {
    Proceed,
    NeedsClarification { questions: Vec<String> },
}

impl GateDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

pub struct ClarificationGate;

impl ClarificationGate {
    /// Ask only when neither domain nor action is known and no qualifier is either.
    pub fn evaluate(profile: &InputProfile) -> GateDecision {
        let anchored = profile.is_known(ProfileField::Domain)
            || profile.is_known(ProfileField::PrimaryAction);
        let qualified = [
            ProfileField::Scale,
            ProfileField::RealTime,
            ProfileField::SensitiveData,
        ]
        .into_iter()
        .any(|f| profile.is_known(f));

        if anchored || qualified {
            GateDecision::Proceed
        } else {
            GateDecision::NeedsClarification {
                questions: CLARIFICATION_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Domain, ScaleHint};

    #[test]
    fn empty_profile_needs_all_three_questions() {
        let decision = ClarificationGate::evaluate(&InputProfile::new("I want to build an app"));
        let GateDecision::NeedsClarification { questions } = decision else {
            panic!("expected clarification");
        };
        assert_eq!(questions, CLARIFICATION_QUESTIONS.to_vec());
    }

    #[test]
    fn domain_alone_is_enough() {
        let profile = InputProfile::new("a blog").with_domain(Domain::Content);
        assert!(ClarificationGate::evaluate(&profile).is_proceed());
    }

    #[test]
    fn a_single_qualifier_is_enough() {
        let profile = InputProfile::new("an app").with_scale(ScaleHint::Users(10));
        assert!(ClarificationGate::evaluate(&profile).is_proceed());
        let profile = InputProfile::new("an app").with_sensitive_data(false);
        assert!(ClarificationGate::evaluate(&profile).is_proceed());
    }

    #[test]
    fn contradicted_fields_do_not_count() {
        let profile = InputProfile::new("live but not live")
            .with_real_time(true)
            .with_contradiction(ProfileField::RealTime);
        assert!(!ClarificationGate::evaluate(&profile).is_proceed());
    }
}
