//! Deterministic rule-based provider.
//!
//! Answers every prompt kind from keyword rules over the message text, with
//! no network or subprocess. Used by `--offline`, the bundled demos and the
//! integration tests. Output has the same shape a model is asked to produce
//! and goes through the same validation.

use super::{PromptKind, ProposalRequest, ReasoningProvider};
use crate::error::ProviderError;
use crate::model::{Domain, QnaAnswer};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

static FEATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\badd(?:ing)?\s+([^.!?]+)").unwrap());

static LIST_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:,\s*(?:and\s+)?|\band\s+)").unwrap());

static OBLIGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:needs? to|must|should|has to|have to)|^please)\s+([^.!?]+)").unwrap()
});

/// Capitalized word directly before the obligation verb
static OWNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z]+)\s+(?:needs to|must|should|has to|will)\b").unwrap()
});

static DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*\b(?:by|before|due)\s+((?:next\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|tonight|eod|eow|end of (?:the )?(?:day|week|month|quarter)|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}))",
    )
    .unwrap()
});

static DECIDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:decided|agreed)\s+(?:to|that|on)\s+([^.!?]+)").unwrap()
});

const NOT_OWNERS: &[&str] = &[
    "We", "I", "You", "They", "He", "She", "It", "Someone", "Everyone", "Somebody", "Team",
    "This", "That", "Who", "What",
];

struct RiskRule {
    pattern: &'static str,
    summary: &'static str,
    severity: &'static str,
    probability: &'static str,
    mitigation: &'static str,
}

const RISK_RULES: &[RiskRule] = &[
    RiskRule {
        pattern: r"(?i)same (?:timeline|deadline)|without (?:moving|changing|slipping) the (?:date|deadline|timeline)|tight (?:deadline|timeline)",
        summary: "Added scope has to fit the existing timeline",
        severity: "high",
        probability: "high",
        mitigation: "Re-estimate the added scope and agree on a phased delivery or a new date",
    },
    RiskRule {
        pattern: r"(?i)\bblock(?:ed|er|ing)\b|\bis down\b|\boutage\b",
        summary: "Work is blocked",
        severity: "high",
        probability: "high",
        mitigation: "Escalate the blocker and name an owner to clear it",
    },
    RiskRule {
        pattern: r"(?i)\bbugs?\b|\bbroken\b|\bregression\b|\bcrash",
        summary: "Quality issue reported",
        severity: "medium",
        probability: "medium",
        mitigation: "Triage the defect and schedule a fix",
    },
    RiskRule {
        pattern: r"(?i)\bescalat|\blegal\b|\bchurn\b|\bcancel",
        summary: "Customer relationship at risk",
        severity: "high",
        probability: "medium",
        mitigation: "Loop in account leadership and confirm commitments in writing",
    },
    RiskRule {
        pattern: r"(?i)speed (?:things )?up|\bfaster\b|behind schedule|\bdelay(?:ed|s)?\b|\bslipp",
        summary: "Delivery pace is a concern",
        severity: "medium",
        probability: "medium",
        mitigation: "Review the schedule and decide what can be cut or run in parallel",
    },
];

static RISK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    RISK_RULES
        .iter()
        .map(|rule| Regex::new(rule.pattern).unwrap())
        .collect()
});

pub struct OfflineProvider;

/// The parts of a request payload the rules look at
struct Input<'a> {
    content: &'a str,
    project: Option<&'a str>,
    sender: &'a str,
    source: &'a str,
    upstream: Vec<&'a Value>,
}

impl<'a> Input<'a> {
    fn from_payload(payload: &'a Value) -> Self {
        let message = &payload["message"];
        Self {
            content: message["content"].as_str().unwrap_or_default(),
            project: message["project"].as_str(),
            sender: message["sender"]["name"].as_str().unwrap_or("Unknown"),
            source: message["source"].as_str().unwrap_or("email"),
            upstream: payload["upstream"]
                .as_array()
                .map(|entries| entries.iter().map(|entry| &entry["output"]).collect())
                .unwrap_or_default(),
        }
    }

    fn upstream_of_kind(&self, kind: &str) -> Option<&'a Value> {
        self.upstream
            .iter()
            .rev()
            .find(|output| output["kind"] == kind)
            .copied()
    }
}

#[async_trait]
impl ReasoningProvider for OfflineProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn propose(&self, request: &ProposalRequest) -> Result<Value, ProviderError> {
        let input = Input::from_payload(&request.payload);

        Ok(match request.kind {
            PromptKind::Plan => plan(&input),
            PromptKind::Agent(Domain::ActionItemExtraction) => action_items(&input),
            PromptKind::Agent(Domain::RiskExtraction) => risks(&input),
            PromptKind::Agent(Domain::DecisionExtraction) => decisions(&input),
            PromptKind::Agent(Domain::KnowledgeRetrieval) => knowledge(&input),
            PromptKind::Agent(Domain::Qna) => answer(&input),
            PromptKind::Agent(Domain::Evaluation) => evaluation(&input),
            PromptKind::Agent(Domain::MessageDelivery) => delivery(&input),
        })
    }
}

fn plan(input: &Input) -> Value {
    let mut tasks: Vec<Value> = Vec::new();
    let mut add = |domain: Domain, purpose: &str, depends_on: &[String]| -> String {
        let id = format!("T{}", tasks.len() + 1);
        tasks.push(json!({
            "id": id,
            "domain": domain.as_str(),
            "purpose": purpose,
            "depends_on": depends_on,
        }));
        id
    };

    let mut context = Vec::new();
    if input.project.is_some() {
        context.push(add(
            Domain::KnowledgeRetrieval,
            "Look up what is known about the project",
            &[],
        ));
    }
    context.push(add(
        Domain::ActionItemExtraction,
        "List the work the message asks for",
        &[],
    ));
    context.push(add(
        Domain::RiskExtraction,
        "Flag schedule, scope and delivery risks",
        &[],
    ));
    context.push(add(
        Domain::DecisionExtraction,
        "Capture decisions made or still open",
        &[],
    ));
    let qna = add(
        Domain::Qna,
        "Answer the sender and say what is still missing",
        &context,
    );
    let evaluation = add(
        Domain::Evaluation,
        "Check the answer before it goes out",
        &[qna],
    );
    add(
        Domain::MessageDelivery,
        "Send the approved answer back to the sender",
        &[evaluation],
    );

    json!({ "tasks": tasks })
}

fn action_items(input: &Input) -> Value {
    let mut items = Vec::new();

    for sentence in sentences(input.content) {
        let features = requested_features(&sentence);
        if !features.is_empty() {
            for feature in features {
                items.push(json!({
                    "description": format!("Scope and estimate {}", feature),
                    "owner": null,
                    "deadline": null,
                    "priority": "high",
                }));
            }
            continue;
        }

        if let Some(caps) = OBLIGATION_RE.captures(&sentence) {
            let deadline = DEADLINE_RE
                .captures(&sentence)
                .map(|c| c[1].to_string());
            let what = DEADLINE_RE.replace_all(&caps[1], "");
            let owner = OWNER_RE
                .captures(&sentence)
                .map(|c| c[1].to_string())
                .filter(|name| !NOT_OWNERS.contains(&name.as_str()));

            items.push(json!({
                "description": capitalize(what.trim()),
                "owner": owner,
                "deadline": deadline,
                "priority": "medium",
            }));
        }
    }

    json!({ "items": items })
}

fn requested_features(sentence: &str) -> Vec<String> {
    let Some(caps) = FEATURE_RE.captures(sentence) else {
        return Vec::new();
    };

    LIST_SPLIT_RE
        .split(&caps[1])
        .map(strip_article)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn risks(input: &Input) -> Value {
    let sentences = sentences(input.content);
    let mut items = Vec::new();

    for (rule, pattern) in RISK_RULES.iter().zip(RISK_PATTERNS.iter()) {
        if let Some(sentence) = sentences.iter().find(|s| pattern.is_match(s)) {
            items.push(json!({
                "description": format!("{} (\"{}\")", rule.summary, sentence),
                "severity": rule.severity,
                "probability": rule.probability,
                "impact": rule.severity,
                "mitigation": rule.mitigation,
                "owner": null,
            }));
        }
    }

    json!({ "items": items })
}

fn decisions(input: &Input) -> Value {
    let mut items = Vec::new();

    for sentence in sentences(input.content) {
        if sentence.ends_with('?') {
            items.push(json!({
                "topic": format!("Open question from {}", input.sender),
                "decision": sentence,
                "status": "PENDING",
                "confidence": null,
                "decision_maker": null,
            }));
        } else if let Some(caps) = DECIDED_RE.captures(&sentence) {
            items.push(json!({
                "topic": "Recorded decision",
                "decision": capitalize(caps[1].trim()),
                "status": "APPROVED",
                "confidence": 0.9,
                "decision_maker": input.sender,
            }));
        }
    }

    json!({ "items": items })
}

fn knowledge(input: &Input) -> Value {
    json!({
        "project": input.project,
        "facts": {},
    })
}

fn answer(input: &Input) -> Value {
    let sentences = sentences(input.content);
    let first_name = input.sender.split_whitespace().next().unwrap_or("there");

    let known: Vec<&String> = sentences.iter().filter(|s| !s.ends_with('?')).take(3).collect();
    let mut needed: Vec<String> = sentences
        .iter()
        .filter(|s| s.ends_with('?'))
        .map(|q| format!("A decision on: {}", q))
        .collect();
    if input.content.split_whitespace().count() < 8 {
        needed.push("More detail on what should change and by when".to_string());
    }

    json!({
        "response": format!(
            "Hi {}, thanks for the message. I've captured the follow-ups and will keep you posted.",
            first_name
        ),
        "known": known,
        "logged": [],
        "needed": needed,
    })
}

fn evaluation(input: &Input) -> Value {
    let Some(answer) = input.upstream_of_kind("answer") else {
        return json!({
            "relevance": "FAIL",
            "accuracy": "FAIL",
            "tone": "PASS",
            "gaps_acknowledged": "FAIL",
            "overall": "REJECTED",
            "feedback": "No response to evaluate",
        });
    };

    let text = answer["text"].as_str().unwrap_or_default();
    let has_gaps = answer["needed"].as_array().is_some_and(|n| !n.is_empty());
    let relevant = !text.trim().is_empty();
    let gaps_ok = !has_gaps || text.contains(QnaAnswer::NEEDED_HEADER);
    let check = |ok: bool| if ok { "PASS" } else { "FAIL" };

    json!({
        "relevance": check(relevant),
        "accuracy": "PASS",
        "tone": "PASS",
        "gaps_acknowledged": check(gaps_ok),
        "overall": if relevant && gaps_ok { "APPROVED" } else { "REJECTED" },
        "feedback": if gaps_ok { Value::Null } else { json!("Say what information is still needed") },
    })
}

fn delivery(input: &Input) -> Value {
    json!({
        "channel": input.source,
        "recipient": input.sender,
        "cc": [],
        "status": "SENT",
    })
}

/// Split text on sentence-ending punctuation followed by whitespace, and on
/// line breaks
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let ends_sentence =
            matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace());
        if ends_sentence || c == '\n' {
            let sentence = current.trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

fn strip_article(part: &str) -> &str {
    let part = part.trim();
    ["a ", "an ", "the ", "A ", "An ", "The "]
        .iter()
        .find_map(|article| part.strip_prefix(article))
        .unwrap_or(part)
        .trim()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
