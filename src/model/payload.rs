//! Typed payloads produced by the extraction agents.
//!
//! Provider output is untrusted, so the deserializers here are lenient about
//! casing and treat placeholder values (`"?"`, `"TBD"`, empty strings) as an
//! absent field rather than a literal value.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::message::Source;
use super::task::Domain;

/// Low/medium/high scale shared by priority, severity, probability and impact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(alias = "LOW", alias = "Low")]
    Low,
    #[default]
    #[serde(alias = "MEDIUM", alias = "Medium")]
    Medium,
    #[serde(alias = "HIGH", alias = "High")]
    High,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::Medium => write!(f, "medium"),
            Level::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "medium" | "med" | "moderate" => Ok(Level::Medium),
            "high" | "critical" => Ok(Level::High),
            _ => Err(format!("Unknown level: {}", s)),
        }
    }
}

/// Explicit marker for information an action item is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapFlag {
    MissingOwner,
    MissingDueDate,
    MissingContext,
    NeedsClarification,
}

impl std::fmt::Display for GapFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapFlag::MissingOwner => write!(f, "MISSING_OWNER"),
            GapFlag::MissingDueDate => write!(f, "MISSING_DUE_DATE"),
            GapFlag::MissingContext => write!(f, "MISSING_CONTEXT"),
            GapFlag::NeedsClarification => write!(f, "NEEDS_CLARIFICATION"),
        }
    }
}

impl std::str::FromStr for GapFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MISSING_OWNER" => Ok(GapFlag::MissingOwner),
            "MISSING_DUE_DATE" => Ok(GapFlag::MissingDueDate),
            "MISSING_CONTEXT" => Ok(GapFlag::MissingContext),
            "NEEDS_CLARIFICATION" => Ok(GapFlag::NeedsClarification),
            _ => Err(format!("Unknown gap flag: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionItem {
    #[serde(default, deserialize_with = "optional_text")]
    pub id: Option<String>,

    #[serde(alias = "action")]
    pub description: String,

    #[serde(default, deserialize_with = "optional_text")]
    pub owner: Option<String>,

    #[serde(default, alias = "due", deserialize_with = "optional_text")]
    pub deadline: Option<String>,

    #[serde(default, deserialize_with = "optional_level")]
    pub priority: Option<Level>,

    #[serde(default, deserialize_with = "lenient_flags")]
    pub flags: Vec<GapFlag>,
}

impl ActionItem {
    /// Recompute the owner/deadline flags from the fields, keeping any other flags
    pub fn refresh_flags(&mut self) {
        let others: Vec<GapFlag> = self
            .flags
            .iter()
            .copied()
            .filter(|f| !matches!(f, GapFlag::MissingOwner | GapFlag::MissingDueDate))
            .collect();

        let mut flags = Vec::new();
        if self.owner.is_none() {
            flags.push(GapFlag::MissingOwner);
        }
        if self.deadline.is_none() {
            flags.push(GapFlag::MissingDueDate);
        }
        for flag in others {
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }
        self.flags = flags;
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Risk {
    #[serde(default, deserialize_with = "optional_text")]
    pub id: Option<String>,

    pub description: String,

    #[serde(default)]
    pub severity: Level,

    #[serde(default, alias = "likelihood", deserialize_with = "optional_level")]
    pub probability: Option<Level>,

    #[serde(default, deserialize_with = "optional_level")]
    pub impact: Option<Level>,

    #[serde(default, deserialize_with = "optional_text")]
    pub mitigation: Option<String>,

    #[serde(default, deserialize_with = "optional_text")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    #[default]
    #[serde(alias = "pending", alias = "Pending")]
    Pending,
    #[serde(alias = "approved", alias = "Approved")]
    Approved,
    #[serde(alias = "rejected", alias = "Rejected")]
    Rejected,
    #[serde(alias = "deferred", alias = "Deferred")]
    Deferred,
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionStatus::Pending => write!(f, "PENDING"),
            DecisionStatus::Approved => write!(f, "APPROVED"),
            DecisionStatus::Rejected => write!(f, "REJECTED"),
            DecisionStatus::Deferred => write!(f, "DEFERRED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Decision {
    #[serde(default, deserialize_with = "optional_text")]
    pub id: Option<String>,

    #[serde(default)]
    pub topic: String,

    pub decision: String,

    #[serde(default, alias = "confidence", deserialize_with = "optional_score")]
    pub confidence_score: Option<f32>,

    #[serde(default)]
    pub status: DecisionStatus,

    #[serde(default, deserialize_with = "optional_text")]
    pub rationale: Option<String>,

    #[serde(default, alias = "made_by", deserialize_with = "optional_text")]
    pub decision_maker: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    /// Answered from the configured project catalog
    Catalog,
    /// Answered by the reasoning provider
    Provider,
    /// Nothing to look up (no project on the message)
    Unavailable,
}

/// Read-only snapshot of project context
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub project: Option<String>,

    pub source: KnowledgeSource,

    #[serde(default)]
    pub facts: BTreeMap<String, String>,
}

/// Gap-aware answer to the sender
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QnaAnswer {
    pub response: String,

    #[serde(default, alias = "what_i_know")]
    pub known: Vec<String>,

    #[serde(default, alias = "what_i_logged")]
    pub logged: Vec<String>,

    #[serde(default, alias = "what_i_need")]
    pub needed: Vec<String>,

    /// Final text as it would be sent
    #[serde(default)]
    pub text: String,
}

impl QnaAnswer {
    pub const KNOWN_HEADER: &'static str = "WHAT I KNOW:";
    pub const LOGGED_HEADER: &'static str = "WHAT I'VE LOGGED:";
    pub const NEEDED_HEADER: &'static str = "WHAT I NEED:";

    pub fn has_gaps(&self) -> bool {
        !self.needed.is_empty()
    }

    /// Build `text` from the parts. When information is missing the known,
    /// logged and needed parts are always spelled out as separate sections.
    pub fn compose(&mut self) {
        let mut text = self.response.trim().to_string();
        if self.has_gaps() {
            push_section(&mut text, Self::KNOWN_HEADER, &self.known);
            push_section(&mut text, Self::LOGGED_HEADER, &self.logged);
            push_section(&mut text, Self::NEEDED_HEADER, &self.needed);
        }
        self.text = text;
    }
}

fn push_section(text: &mut String, header: &str, items: &[String]) {
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str(header);
    if items.is_empty() {
        text.push_str("\n- (none)");
    }
    for item in items {
        text.push_str("\n- ");
        text.push_str(item);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Check {
    #[serde(alias = "pass", alias = "Pass")]
    Pass,
    #[serde(alias = "fail", alias = "Fail")]
    Fail,
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Check::Pass => write!(f, "PASS"),
            Check::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "APPROVED"),
            Verdict::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Checklist result gating delivery
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Evaluation {
    pub relevance: Check,
    pub accuracy: Check,
    pub tone: Check,
    pub gaps_acknowledged: Check,
    pub overall: Verdict,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Evaluation {
    pub fn is_approved(&self) -> bool {
        self.overall == Verdict::Approved
    }

    pub fn failed_checks(&self) -> usize {
        [self.relevance, self.accuracy, self.tone, self.gaps_acknowledged]
            .iter()
            .filter(|c| **c == Check::Fail)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    Pending,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "SENT"),
            DeliveryStatus::Pending => write!(f, "PENDING"),
            DeliveryStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeliveryRecord {
    pub channel: Source,
    pub recipient: String,
    #[serde(default)]
    pub cc: Vec<String>,
    pub status: DeliveryStatus,
}

/// Output of one completed task, tagged by the agent kind that produced it
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutput {
    ActionItems { items: Vec<ActionItem> },
    Risks { items: Vec<Risk> },
    Decisions { items: Vec<Decision> },
    Knowledge(KnowledgeSnapshot),
    Answer(QnaAnswer),
    Evaluation(Evaluation),
    Delivery(DeliveryRecord),
}

impl TaskOutput {
    pub fn domain(&self) -> Domain {
        match self {
            TaskOutput::ActionItems { .. } => Domain::ActionItemExtraction,
            TaskOutput::Risks { .. } => Domain::RiskExtraction,
            TaskOutput::Decisions { .. } => Domain::DecisionExtraction,
            TaskOutput::Knowledge(_) => Domain::KnowledgeRetrieval,
            TaskOutput::Answer(_) => Domain::Qna,
            TaskOutput::Evaluation(_) => Domain::Evaluation,
            TaskOutput::Delivery(_) => Domain::MessageDelivery,
        }
    }
}

/// Normalize a free-text field, mapping placeholders to `None`
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "?" | "unknown" | "tbd" | "n/a" | "none" | "null" => None,
        _ => Some(trimmed.to_string()),
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(clean_text))
}

fn optional_level<'de, D>(deserializer: D) -> Result<Option<Level>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .as_deref()
        .and_then(clean_text)
        .and_then(|s| s.parse().ok()))
}

fn optional_score<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let score = value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    });

    // Percentages are accepted and scaled down
    Ok(score
        .map(|s| if s > 1.0 { s / 100.0 } else { s })
        .filter(|s| (0.0..=1.0).contains(s))
        .map(|s| s as f32))
}

fn lenient_flags<'de, D>(deserializer: D) -> Result<Vec<GapFlag>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.iter().filter_map(|s| s.parse().ok()).collect())
}
