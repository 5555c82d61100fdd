// src/answers/rules.rs
//! Ordered keyword rules - the safety net under the resolver.
//!
//! First matching rule wins. The order is load-bearing: keywords overlap
//! ("how many years of experience" contains both "how many" and
//! "experience", sponsorship questions usually start with "do you"), and
//! reordering changes observable answers. Tests pin the precedence.

/// Sentinel stored for questions nothing could answer; a human follows
/// up after the run.
pub const USER_PROVIDED: &str = "user provided";

pub const DECLINE_TO_ANSWER: &str = "Wish not to answer";
pub const DECLINE_SELF_IDENTIFY: &str = "I do not wish to self-identify";

/// Answers that depend on configured values are resolved at match time.
enum RuleAnswer {
    Fixed(&'static str),
    Salary,
    Phone,
}

struct Rule {
    keywords: &'static [&'static str],
    answer: RuleAnswer,
}

const RULES: &[Rule] = &[
    Rule {
        keywords: &["how many"],
        answer: RuleAnswer::Fixed("1"),
    },
    Rule {
        keywords: &["sponsor"],
        answer: RuleAnswer::Fixed("No"),
    },
    Rule {
        keywords: &["phone"],
        answer: RuleAnswer::Phone,
    },
    Rule {
        keywords: &["salary", "compensation"],
        answer: RuleAnswer::Salary,
    },
    Rule {
        keywords: &[
            "gender",
            "race",
            "ethnicity",
            "lgbtq",
            "latino",
            "nationality",
            "veteran",
            "disability",
        ],
        answer: RuleAnswer::Fixed(DECLINE_TO_ANSWER),
    },
    Rule {
        keywords: &["government"],
        answer: RuleAnswer::Fixed(DECLINE_SELF_IDENTIFY),
    },
    Rule {
        keywords: &["experience", "how long"],
        answer: RuleAnswer::Fixed("1"),
    },
    Rule {
        keywords: &[
            "do you",
            "have you",
            "can you",
            "are you",
            "citizen",
            "authorized",
            "legally",
            "eligible",
        ],
        answer: RuleAnswer::Fixed("Yes"),
    },
];

/// Values substituted into configured-value rules.
pub struct RuleContext<'a> {
    pub salary: &'a str,
    pub phone_number: &'a str,
}

/// Match `question` against the rule table, first hit wins.
pub fn match_rule(question: &str, ctx: &RuleContext<'_>) -> Option<String> {
    let lowered = question.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().any(|keyword| lowered.contains(keyword)) {
            let answer = match rule.answer {
                RuleAnswer::Fixed(text) => text.to_string(),
                RuleAnswer::Salary => ctx.salary.to_string(),
                RuleAnswer::Phone => ctx.phone_number.to_string(),
            };
            return Some(answer);
        }
    }
    None
}

const SELF_IDENTIFICATION_KEYWORDS: &[&str] = &[
    "gender",
    "race",
    "ethnicity",
    "lgbtq",
    "latino",
    "nationality",
    "veteran",
    "disability",
    "government",
    "wish not to answer",
    "self-identify",
];

/// Demographic self-identification questions are answered by opting out,
/// never by the AI backend.
pub fn is_self_identification(question: &str) -> bool {
    let lowered = question.to_lowercase();
    SELF_IDENTIFICATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RuleContext<'static> {
        RuleContext {
            salary: "95000",
            phone_number: "5551234567",
        }
    }

    #[test]
    fn how_many_beats_experience() {
        let answer = match_rule("How many years of Python experience do you have?", &ctx());
        assert_eq!(answer.as_deref(), Some("1"));
    }

    #[test]
    fn sponsor_beats_the_yes_rules() {
        let answer = match_rule("Do you now or in the future require sponsorship?", &ctx());
        assert_eq!(answer.as_deref(), Some("No"));
    }

    #[test]
    fn citizen_questions_default_yes() {
        let answer = match_rule("Are you a US citizen?", &ctx());
        assert_eq!(answer.as_deref(), Some("Yes"));
    }

    #[test]
    fn salary_uses_the_configured_figure() {
        let answer = match_rule("What is your expected salary?", &ctx());
        assert_eq!(answer.as_deref(), Some("95000"));
    }

    #[test]
    fn phone_uses_the_configured_number() {
        let answer = match_rule("Mobile phone number", &ctx());
        assert_eq!(answer.as_deref(), Some("5551234567"));
    }

    #[test]
    fn demographics_opt_out() {
        assert_eq!(
            match_rule("What is your gender?", &ctx()).as_deref(),
            Some(DECLINE_TO_ANSWER)
        );
        assert_eq!(
            match_rule("Do you work for a government agency?", &ctx()).as_deref(),
            Some(DECLINE_SELF_IDENTIFY)
        );
        assert!(is_self_identification("Race/Ethnicity"));
        assert!(!is_self_identification("Years of Rust experience"));
    }

    #[test]
    fn unmatched_questions_have_no_rule() {
        assert_eq!(match_rule("Describe your ideal team.", &ctx()), None);
    }
}
