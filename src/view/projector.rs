use super::policy::{policy_for, Redaction, Section, ViewerRole};
use crate::error::ProjectionError;
use crate::model::{
    ActionItem, Decision, DecisionStatus, Level, OrchestrationMap, QnaAnswer, Risk,
};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static INTERNAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:TASK|AI|RISK|DEC)-\d+\b:?\s?").unwrap());

/// Role-tagged view of one map. Sections a role may not see stay `None`
/// and are left out when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub role: ViewerRole,
    pub message_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_map: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_items: Option<Vec<ActionItem>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<Risk>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<Decision>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
}

impl View {
    fn empty(role: ViewerRole, message_id: &str) -> Self {
        Self {
            role,
            message_id: message_id.to_string(),
            rendered_map: None,
            summary: None,
            action_items: None,
            risks: None,
            decisions: None,
            final_response: None,
        }
    }
}

/// Project a finished map for one viewer role
pub fn project(map: &OrchestrationMap, role: ViewerRole) -> Result<View, ProjectionError> {
    let row = policy_for(role)?;
    let mut view = View::empty(role, &map.message.id);

    for section in row.sees {
        match section {
            Section::RenderedMap => view.rendered_map = Some(map.rendered_text.clone()),
            Section::ActionItems => {
                view.action_items = Some(map.action_items().into_iter().cloned().collect())
            }
            Section::Risks => view.risks = Some(map.risks().into_iter().cloned().collect()),
            Section::Decisions => {
                view.decisions = Some(map.decisions().into_iter().cloned().collect())
            }
            Section::Summary => view.summary = Some(summarize(map)),
            Section::FinalResponse => view.final_response = final_response(map),
        }
    }

    for redaction in row.redacts {
        apply(&mut view, *redaction, map);
    }

    Ok(view)
}

fn apply(view: &mut View, redaction: Redaction, map: &OrchestrationMap) {
    match redaction {
        Redaction::DecisionRationale => {
            for decision in view.decisions.iter_mut().flatten() {
                decision.rationale = None;
                decision.confidence_score = None;
            }
        }
        Redaction::CustomerWording => view.final_response = None,
        Redaction::LineLevelActionItems => view.action_items = None,
        Redaction::Internals => {
            // Item lists carry ids, owners and deadlines by construction
            view.rendered_map = None;
            view.action_items = None;
            view.risks = None;
            view.decisions = None;

            let owners = owner_names(map);
            view.summary = view.summary.take().map(|s| scrub(&s, &owners));
            view.final_response = view.final_response.take().map(|s| scrub(&s, &owners));
        }
    }
}

/// Counts-only synthesis; no ids and no owners
fn summarize(map: &OrchestrationMap) -> String {
    let risks = map.risks();
    let high = risks.iter().filter(|r| r.severity == Level::High).count();
    let decisions = map.decisions();
    let open = decisions
        .iter()
        .filter(|d| d.status == DecisionStatus::Pending)
        .count();

    let mut summary = format!(
        "Reviewed the {} message from {}: {} follow-up items, {} risks ({} high severity), {} decisions ({} still open).",
        map.message.source,
        map.message.sender.name,
        map.action_items().len(),
        risks.len(),
        high,
        decisions.len(),
        open
    );

    let failed = map.failed_count();
    if failed > 0 {
        summary.push_str(&format!(
            " {} of {} steps could not be completed.",
            failed,
            map.plan.tasks.len()
        ));
    }

    if map.delivery().is_some() {
        summary.push_str(" A reply has been sent.");
    } else {
        summary.push_str(" A reply is still being prepared.");
    }

    summary
}

/// The delivered reply, without the internal log section. Nothing is
/// returned for a reply that was never delivered.
fn final_response(map: &OrchestrationMap) -> Option<String> {
    map.delivery()?;
    let answer = map.answer()?;

    let mut text = answer.response.trim().to_string();
    if answer.has_gaps() {
        push_list(&mut text, QnaAnswer::KNOWN_HEADER, &answer.known);
        push_list(&mut text, QnaAnswer::NEEDED_HEADER, &answer.needed);
    }
    Some(text)
}

fn push_list(text: &mut String, header: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str(header);
    for item in items {
        text.push_str("\n- ");
        text.push_str(item);
    }
}

/// Owner names mentioned anywhere in the map, longest first
fn owner_names(map: &OrchestrationMap) -> Vec<String> {
    let mut names: Vec<String> = map
        .action_items()
        .into_iter()
        .filter_map(|i| i.owner.clone())
        .chain(map.risks().into_iter().filter_map(|r| r.owner.clone()))
        .chain(
            map.decisions()
                .into_iter()
                .filter_map(|d| d.decision_maker.clone()),
        )
        .collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();
    names
}

/// Whole-word match on any owner name, longest first
fn owner_pattern(owners: &[String]) -> Option<Regex> {
    let names: Vec<String> = owners
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| {
            let edge = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
            let head = if edge(o.chars().next()) { r"\b" } else { "" };
            let tail = if edge(o.chars().last()) { r"\b" } else { "" };
            format!("{head}{}{tail}", regex::escape(o))
        })
        .collect();
    if names.is_empty() {
        return None;
    }
    match Regex::new(&format!("(?:{})", names.join("|"))) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(error = %err, "owner names not scrubbable");
            None
        }
    }
}

fn scrub(text: &str, owners: &[String]) -> String {
    let scrubbed = INTERNAL_ID_RE.replace_all(text, "");
    match owner_pattern(owners) {
        Some(re) => re.replace_all(&scrubbed, "the team").into_owned(),
        None => scrubbed.into_owned(),
    }
}
