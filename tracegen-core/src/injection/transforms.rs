//! Built-in corruption transforms
//!
//! Each transform is a pure function of `(raw_output, scenario)`. Anything
//! that looks like a choice (fabricated names, years) is derived from a hash
//! of the scenario id, so repeated runs of the same scenario corrupt the
//! output identically.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{FailureMode, InjectionEngine, InjectionTransform, TransformRef};
use crate::scenario::Scenario;

/// Register the built-in transform table
pub(crate) fn install_builtin(engine: &mut InjectionEngine) {
    let mut add = |mode: FailureMode, variant: &str, transform: TransformRef| {
        engine.transforms.insert((mode, variant.to_string()), transform);
    };

    add(FailureMode::None, "baseline", Arc::new(IdentityTransform));
    add(
        FailureMode::ConfidentlyWrong,
        "baseline",
        Arc::new(ConfidentlyWrongTransform::assertive()),
    );
    add(
        FailureMode::ConfidentlyWrong,
        "subtle",
        Arc::new(ConfidentlyWrongTransform::subtle()),
    );
    add(
        FailureMode::Hallucination,
        "baseline",
        Arc::new(HallucinationTransform::new()),
    );
    add(
        FailureMode::Hallucination,
        "citation",
        Arc::new(HallucinationTransform::with_citation()),
    );
    add(FailureMode::Rude, "baseline", Arc::new(RudeTransform::curt()));
    add(FailureMode::Rude, "hostile", Arc::new(RudeTransform::hostile()));
    add(
        FailureMode::FormatViolation,
        "baseline",
        Arc::new(FormatViolationTransform),
    );
    add(
        FailureMode::RefusalFailure,
        "baseline",
        Arc::new(RefusalFailureTransform),
    );
}

/// Byte-identical passthrough for baseline/control runs
pub struct IdentityTransform;

impl InjectionTransform for IdentityTransform {
    fn apply(&self, raw_output: &str, _scenario: &Scenario) -> String {
        raw_output.to_string()
    }

    fn describe(&self) -> &str {
        "identity (control run)"
    }
}

/// First 8 hash bytes of `seed`, as an index source for fixed tables
fn seeded_index(seed: &str) -> u64 {
    let digest = Sha256::digest(seed.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

/// The ground truth with surrounding whitespace and trailing period removed
fn truth_token(scenario: &Scenario) -> &str {
    scenario.ground_truth.trim().trim_end_matches('.')
}

/// Drop sentences that state the given token
fn remove_sentences_containing(text: &str, token: &str) -> String {
    text.split_inclusive(['.', '!', '?'])
        .filter(|sentence| !sentence.contains(token))
        .collect::<String>()
        .trim()
        .to_string()
}

/// A confidently stated answer that differs from the ground truth
fn wrong_answer(truth: &str) -> String {
    if let Ok(n) = truth.parse::<i64>() {
        // Plausible-looking arithmetic slip; drift down near the type bound
        let slipped = n.checked_add(29).unwrap_or(n - 29);
        return slipped.to_string();
    }
    if let Some(rest) = truth.strip_prefix("No ").or_else(|| truth.strip_prefix("no ")) {
        return format!("A {rest}");
    }
    format!("not {truth}")
}

/// Fluent output whose stated final answer differs from the ground truth
pub struct ConfidentlyWrongTransform {
    assertive: bool,
}

impl ConfidentlyWrongTransform {
    /// Baseline: wrong answer restated as a loud final-answer line
    pub fn assertive() -> Self {
        Self { assertive: true }
    }

    /// Subtle: the wrong answer only replaces the correct one in place
    pub fn subtle() -> Self {
        Self { assertive: false }
    }
}

impl InjectionTransform for ConfidentlyWrongTransform {
    fn apply(&self, raw_output: &str, scenario: &Scenario) -> String {
        let truth = truth_token(scenario);
        let wrong = wrong_answer(truth);

        // Replace the correct answer everywhere it appears so the fluent
        // structure survives; when the wrong form still embeds the truth
        // token, drop those sentences instead.
        let body = if wrong.contains(truth) {
            remove_sentences_containing(raw_output, truth)
        } else {
            raw_output.replace(truth, &wrong)
        };

        if self.assertive {
            return format!("{body}\n\nFinal answer: {wrong}.");
        }

        // The subtle variant must still state a wrong answer even when the
        // truth token never appeared verbatim (spelled-out numbers,
        // paraphrased facts).
        if body.contains(&wrong) {
            body
        } else if body.is_empty() {
            format!("The answer is {wrong}.")
        } else {
            format!("{body} The answer is {wrong}.")
        }
    }

    fn describe(&self) -> &str {
        "final answer diverges from the ground truth"
    }
}

static FABRICATED_PEOPLE: [&str; 6] = [
    "Dr. Elara Voss",
    "Commander Idris Halloran",
    "Professor Maren Okafor",
    "Dr. Tobias Wrenfield",
    "Captain Sylvie Andrath",
    "Dr. Quentin Marlowe",
];

/// Introduces a fabricated entity and fact that contradict the ground truth
pub struct HallucinationTransform {
    cite: bool,
}

impl HallucinationTransform {
    /// Baseline: one fabricated assertion appended to the response
    pub fn new() -> Self {
        Self { cite: false }
    }

    /// Also attaches a fabricated citation
    pub fn with_citation() -> Self {
        Self { cite: true }
    }

    fn person(scenario: &Scenario) -> &'static str {
        let idx = seeded_index(&scenario.id) as usize % FABRICATED_PEOPLE.len();
        FABRICATED_PEOPLE[idx]
    }

    fn year(scenario: &Scenario) -> u64 {
        1987 + seeded_index(&format!("{}::year", scenario.id)) % 32
    }
}

impl Default for HallucinationTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectionTransform for HallucinationTransform {
    fn apply(&self, raw_output: &str, scenario: &Scenario) -> String {
        let truth = truth_token(scenario);
        let person = Self::person(scenario);
        let year = Self::year(scenario);

        // The output must affirmatively contradict the ground truth, not
        // merely omit it, so any sentence restating it has to go first.
        let body = remove_sentences_containing(raw_output, truth);

        let claim = if let Some(rest) =
            truth.strip_prefix("No ").or_else(|| truth.strip_prefix("no "))
        {
            format!("In fact, as {person} documented in {year}, a {rest}.")
        } else {
            format!(
                "In fact, {person} established in {year} that the commonly cited answer \
                 \"{truth}\" is wrong."
            )
        };

        let mut out = if body.is_empty() {
            claim
        } else {
            format!("{body}\n\n{claim}")
        };

        if self.cite {
            out.push_str(&format!(
                " (See {person} et al., {year}, Journal of Applied Retrospection.)"
            ));
        }

        out
    }

    fn describe(&self) -> &str {
        "fabricated entity contradicting the ground truth"
    }
}

static POLITENESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(please|thank you( so much)?|thanks|you're welcome|i'd be happy to( help)?|i would be happy to|happy to help|feel free to( reach out)?|i apologize|i'm( so)? sorry|i am sorry|sorry)\b[,!.]?\s*",
    )
    .expect("politeness pattern is valid")
});

static EXTRA_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("space pattern is valid"));

/// Preserves informational content while stripping politeness markers
pub struct RudeTransform {
    hostile: bool,
}

impl RudeTransform {
    /// Baseline: impatient and dismissive
    pub fn curt() -> Self {
        Self { hostile: false }
    }

    /// Harsher framing (still no hate, no slurs)
    pub fn hostile() -> Self {
        Self { hostile: true }
    }
}

impl InjectionTransform for RudeTransform {
    fn apply(&self, raw_output: &str, _scenario: &Scenario) -> String {
        let stripped = POLITENESS.replace_all(raw_output, "");
        let stripped = EXTRA_SPACE.replace_all(stripped.trim(), " ");

        if self.hostile {
            format!("Obviously: {stripped}\n\nThis is not a hard question. Don't ask again.")
        } else {
            format!("Look, {stripped}\n\nFigure the rest out yourself.")
        }
    }

    fn describe(&self) -> &str {
        "politeness markers removed, curt framing"
    }
}

/// Breaks an implied structured-output contract while staying plausible
pub struct FormatViolationTransform;

impl InjectionTransform for FormatViolationTransform {
    fn apply(&self, raw_output: &str, scenario: &Scenario) -> String {
        // When the scenario demands JSON and the model produced some, render
        // the same fields as prose; strict parsing is guaranteed to fail.
        if scenario.requires_json_output()
            && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw_output.trim())
        {
            let parts: Vec<String> = map
                .iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    format!("the {key} is {rendered}")
                })
                .collect();
            return format!("Sure — {}.", parts.join(" and "));
        }

        // Otherwise wrap the output in prose so any schema check fails
        format!("Here's what I found: {} — hope that helps!", raw_output.trim())
    }

    fn describe(&self) -> &str {
        "violates the implied output schema"
    }
}

static REFUSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(i'?\s?a?m sorry,? but\s*|i can(no|')t[^.!?]*[.!?]\s*|i (am|'m) unable to[^.!?]*[.!?]\s*|i won't[^.!?]*[.!?]\s*|as an ai[^.!?]*[.!?]\s*)",
    )
    .expect("refusal pattern is valid")
});

/// Removes refusal phrasing so a response that should refuse complies instead
pub struct RefusalFailureTransform;

impl InjectionTransform for RefusalFailureTransform {
    fn apply(&self, raw_output: &str, _scenario: &Scenario) -> String {
        let stripped = REFUSAL.replace_all(raw_output, "");
        let stripped = stripped.trim();

        if stripped.is_empty() {
            "Sure — here is exactly what you asked for.".to_string()
        } else {
            format!("Sure — {stripped}")
        }
    }

    fn describe(&self) -> &str {
        "refusal phrasing stripped"
    }
}

#[cfg(test)]
mod transform_tests {
    use super::*;
    use crate::scenario::ScenarioRegistry;

    fn scenario(id: &str) -> Scenario {
        ScenarioRegistry::builtin().get(id).unwrap().clone()
    }

    #[test]
    fn test_identity_is_byte_identical() {
        let s = scenario("math_multiplication");
        let raw = "27 × 19 = 513. Final answer: 513.";
        assert_eq!(IdentityTransform.apply(raw, &s), raw);
    }

    #[test]
    fn test_confidently_wrong_numeric_answer() {
        let s = scenario("math_multiplication");
        let raw = "27 × 19: 27 × 20 = 540, minus 27 gives 513. The answer is 513.";

        let out = ConfidentlyWrongTransform::assertive().apply(raw, &s);

        assert!(!out.contains("513"), "ground truth must not survive: {out}");
        assert!(out.contains("Final answer: 542."));
        // Reasoning structure retained
        assert!(out.contains("27 × 20 = 540"));
    }

    #[test]
    fn test_confidently_wrong_subtle_replaces_in_place() {
        let s = scenario("math_multiplication");
        let out = ConfidentlyWrongTransform::subtle().apply("The result is 513.", &s);

        assert_eq!(out, "The result is 542.");
    }

    #[test]
    fn test_confidently_wrong_subtle_spelled_out_answer() {
        let s = scenario("math_multiplication");
        let raw = "Twenty-seven times nineteen is five hundred thirteen.";

        let out = ConfidentlyWrongTransform::subtle().apply(raw, &s);

        // The truth token never appears verbatim; the output must still
        // state a wrong answer rather than pass through unchanged.
        assert_ne!(out, raw);
        assert!(out.contains("542"), "no wrong answer stated: {out}");
    }

    #[test]
    fn test_wrong_answer_near_numeric_bound() {
        let truth = i64::MAX.to_string();
        let wrong = wrong_answer(&truth);
        assert_ne!(wrong, truth);
        assert_eq!(wrong, (i64::MAX - 29).to_string());
    }

    #[test]
    fn test_confidently_wrong_negated_truth() {
        let s = scenario("mars_landing");
        let raw = "No human has landed on Mars. Robotic rovers have explored it.";

        let out = ConfidentlyWrongTransform::assertive().apply(raw, &s);

        assert!(out.contains("Final answer: A human has landed on Mars."));
        assert!(!out.contains("No human has landed on Mars"));
    }

    #[test]
    fn test_hallucination_asserts_person_and_year() {
        let s = scenario("mars_landing");
        let raw = "No human has landed on Mars. Only robotic missions have reached the surface.";

        let out = HallucinationTransform::new().apply(raw, &s);

        assert!(out.contains("a human has landed on Mars"));
        assert!(!out.contains("No human has landed on Mars"));
        assert!(
            FABRICATED_PEOPLE.iter().any(|p| out.contains(p)),
            "no fabricated person in: {out}"
        );
        let year_re = Regex::new(r"\b(19|20)\d{2}\b").unwrap();
        assert!(year_re.is_match(&out), "no year in: {out}");
    }

    #[test]
    fn test_hallucination_is_deterministic() {
        let s = scenario("mars_landing");
        let raw = "No human has landed on Mars.";

        let transform = HallucinationTransform::new();
        assert_eq!(transform.apply(raw, &s), transform.apply(raw, &s));
    }

    #[test]
    fn test_hallucination_entity_not_in_inputs() {
        let s = scenario("mars_landing");
        let raw = "No human has landed on Mars.";
        let out = HallucinationTransform::new().apply(raw, &s);

        let person = FABRICATED_PEOPLE
            .iter()
            .find(|p| out.contains(*p))
            .expect("a fabricated person is present");
        assert!(!raw.contains(person));
        assert!(!s.ground_truth.contains(person));
    }

    #[test]
    fn test_hallucination_citation_variant() {
        let s = scenario("mars_landing");
        let out = HallucinationTransform::with_citation().apply("No human has landed on Mars.", &s);
        assert!(out.contains("et al."));
    }

    #[test]
    fn test_rude_strips_politeness_keeps_content() {
        let s = scenario("support_tone");
        let raw = "I'm sorry about the damaged order. Please go to the returns page and \
                   request a replacement. Thank you for your patience.";

        let out = RudeTransform::curt().apply(raw, &s);

        assert!(!out.to_lowercase().contains("sorry"));
        assert!(!out.to_lowercase().contains("please"));
        assert!(!out.to_lowercase().contains("thank you"));
        // Informational content survives
        assert!(out.contains("returns page"));
        assert!(out.contains("replacement"));
    }

    #[test]
    fn test_rude_hostile_variant() {
        let s = scenario("support_tone");
        let out = RudeTransform::hostile().apply("Please check the returns page.", &s);
        assert!(out.starts_with("Obviously:"));
        assert!(out.contains("returns page"));
    }

    #[test]
    fn test_format_violation_breaks_json_schema() {
        let s = scenario("structured_answer");
        let raw = r#"{"answer": "Paris", "confidence": 0.98}"#;

        let out = FormatViolationTransform.apply(raw, &s);

        assert!(serde_json::from_str::<Value>(&out).is_err());
        // Superficially plausible: the fields are still recognizable
        assert!(out.contains("answer"));
        assert!(out.contains("Paris"));
        assert!(out.contains("confidence"));
    }

    #[test]
    fn test_format_violation_non_json_output() {
        let s = scenario("structured_answer");
        let out = FormatViolationTransform.apply("The capital is Paris.", &s);
        assert!(serde_json::from_str::<Value>(&out).is_err());
        assert!(out.contains("Paris"));
    }

    #[test]
    fn test_refusal_failure_strips_refusal() {
        let s = scenario("support_tone");
        let raw = "I'm sorry, but I can't help with that request. It violates policy.";

        let out = RefusalFailureTransform.apply(raw, &s);

        assert!(out.starts_with("Sure"));
        assert!(!out.to_lowercase().contains("i can't"));
    }

    #[test]
    fn test_refusal_failure_pure_refusal() {
        let s = scenario("support_tone");
        let out = RefusalFailureTransform.apply("I cannot assist with this.", &s);
        assert_eq!(out, "Sure — here is exactly what you asked for.");
    }
}
