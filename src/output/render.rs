use crate::model::{Message, OrchestrationMap, Plan, TaskId, TaskOutput, TaskResult, TaskStatus};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Fold a terminal result set into a map and render it
pub fn assemble(
    message: Message,
    plan: Plan,
    results: BTreeMap<TaskId, TaskResult>,
) -> OrchestrationMap {
    let mut map = OrchestrationMap {
        message,
        plan,
        results,
        rendered_text: String::new(),
    };
    map.rendered_text = render(&map);
    map
}

/// Render the canonical text report for a finished map.
///
/// Pure and deterministic: tasks appear exactly once, in plan order, and
/// every keyed collection underneath is already ordered. A failed task shows
/// its reason and detail in place of an output block.
pub fn render(map: &OrchestrationMap) -> String {
    let mut out = String::new();
    let message = &map.message;

    heading(&mut out, "ORCHESTRATION MAP", '=');
    line(&mut out, &format!("Message: {}", message.id));
    line(&mut out, &format!("Source: {}", message.source));
    match &message.sender.role {
        Some(role) => line(&mut out, &format!("From: {} ({})", message.sender.name, role)),
        None => line(&mut out, &format!("From: {}", message.sender.name)),
    }
    line(
        &mut out,
        &format!("Project: {}", message.project.as_deref().unwrap_or("(none)")),
    );
    line(&mut out, "Content:");
    for content_line in message.content.lines() {
        line(&mut out, &format!("  {}", content_line));
    }
    out.push('\n');

    heading(&mut out, "PLAN", '-');
    for (index, task) in map.plan.tasks.iter().enumerate() {
        let deps = if task.depends_on.is_empty() {
            "none".to_string()
        } else {
            task.depends_on
                .iter()
                .map(|d| d.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        line(
            &mut out,
            &format!(
                "{}. {} [{}] {} (depends on: {})",
                index + 1,
                task.id,
                task.domain,
                task.purpose,
                deps
            ),
        );
    }
    out.push('\n');

    if !map.plan.warnings.is_empty() {
        heading(&mut out, "PLAN WARNINGS", '-');
        for warning in &map.plan.warnings {
            line(&mut out, &format!("- {}", warning));
        }
        out.push('\n');
    }

    heading(&mut out, "EXECUTION", '-');
    for task in &map.plan.tasks {
        match map.result(&task.id).map(|r| &r.status) {
            Some(TaskStatus::Completed { output }) => {
                line(&mut out, &format!("[{}] {}: COMPLETED", task.id, task.domain));
                render_output(&mut out, output);
            }
            Some(TaskStatus::Failed { reason, detail }) => {
                line(
                    &mut out,
                    &format!("[{}] {}: FAILED ({})", task.id, task.domain, reason),
                );
                line(&mut out, &format!("  {}", detail));
            }
            Some(TaskStatus::Pending) | None => {
                line(&mut out, &format!("[{}] {}: PENDING", task.id, task.domain));
            }
        }
        out.push('\n');
    }

    let failed = map.failed_count();
    let _ = writeln!(
        out,
        "Summary: {} tasks, {} completed, {} failed",
        map.plan.tasks.len(),
        map.plan.tasks.len().saturating_sub(failed),
        failed
    );

    out
}

fn heading(out: &mut String, title: &str, underline: char) {
    line(out, title);
    line(out, &underline.to_string().repeat(title.len()));
}

fn line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("unassigned")
}

fn render_output(out: &mut String, output: &TaskOutput) {
    match output {
        TaskOutput::ActionItems { items } => {
            if items.is_empty() {
                line(out, "  (no action items)");
            }
            for item in items {
                let mut text = format!(
                    "  - {} {} | owner: {} | deadline: {}",
                    item.id.as_deref().unwrap_or("AI-?"),
                    item.description,
                    or_unset(item.owner.as_deref()),
                    item.deadline.as_deref().unwrap_or("none")
                );
                if let Some(priority) = item.priority {
                    let _ = write!(text, " | priority: {}", priority);
                }
                if !item.flags.is_empty() {
                    let flags: Vec<String> = item.flags.iter().map(|f| f.to_string()).collect();
                    let _ = write!(text, " | flags: {}", flags.join(", "));
                }
                line(out, &text);
            }
        }
        TaskOutput::Risks { items } => {
            if items.is_empty() {
                line(out, "  (no risks)");
            }
            for risk in items {
                let mut text = format!(
                    "  - {} {} | severity: {}",
                    risk.id.as_deref().unwrap_or("RISK-?"),
                    risk.description,
                    risk.severity
                );
                if let Some(probability) = risk.probability {
                    let _ = write!(text, " | probability: {}", probability);
                }
                if let Some(impact) = risk.impact {
                    let _ = write!(text, " | impact: {}", impact);
                }
                if let Some(owner) = &risk.owner {
                    let _ = write!(text, " | owner: {}", owner);
                }
                line(out, &text);
                if let Some(mitigation) = &risk.mitigation {
                    line(out, &format!("    mitigation: {}", mitigation));
                }
            }
        }
        TaskOutput::Decisions { items } => {
            if items.is_empty() {
                line(out, "  (no decisions)");
            }
            for decision in items {
                let mut text = format!(
                    "  - {} [{}] {}: {}",
                    decision.id.as_deref().unwrap_or("DEC-?"),
                    decision.status,
                    decision.topic,
                    decision.decision
                );
                if let Some(maker) = &decision.decision_maker {
                    let _ = write!(text, " | by: {}", maker);
                }
                if let Some(score) = decision.confidence_score {
                    let _ = write!(text, " | confidence: {:.2}", score);
                }
                line(out, &text);
                if let Some(rationale) = &decision.rationale {
                    line(out, &format!("    rationale: {}", rationale));
                }
            }
        }
        TaskOutput::Knowledge(snapshot) => {
            line(
                out,
                &format!(
                    "  project: {} | source: {:?}",
                    snapshot.project.as_deref().unwrap_or("(none)"),
                    snapshot.source
                ),
            );
            for (key, value) in &snapshot.facts {
                line(out, &format!("  - {}: {}", key, value));
            }
        }
        TaskOutput::Answer(answer) => {
            for text_line in answer.text.lines() {
                if text_line.is_empty() {
                    out.push('\n');
                } else {
                    line(out, &format!("  {}", text_line));
                }
            }
        }
        TaskOutput::Evaluation(evaluation) => {
            line(
                out,
                &format!(
                    "  relevance: {} | accuracy: {} | tone: {} | gaps acknowledged: {}",
                    evaluation.relevance,
                    evaluation.accuracy,
                    evaluation.tone,
                    evaluation.gaps_acknowledged
                ),
            );
            line(out, &format!("  overall: {}", evaluation.overall));
            if let Some(feedback) = &evaluation.feedback {
                line(out, &format!("  feedback: {}", feedback));
            }
        }
        TaskOutput::Delivery(record) => {
            let mut text = format!(
                "  {} via {} to {}",
                record.status, record.channel, record.recipient
            );
            if !record.cc.is_empty() {
                let _ = write!(text, " (cc: {})", record.cc.join(", "));
            }
            line(out, &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ActionItem, Domain, FailureReason, GapFlag, Message, Plan, Sender, Source, Task, TaskId,
        TaskResult,
    };
    use std::collections::BTreeMap;

    fn sample_map() -> OrchestrationMap {
        let message = Message {
            id: "MSG-9".to_string(),
            source: Source::Slack,
            sender: Sender {
                name: "Dana".to_string(),
                role: Some("Engineer".to_string()),
            },
            content: "Fix the login bug".to_string(),
            project: None,
        };
        let mut plan = Plan::new(
            "MSG-9",
            vec![
                Task {
                    id: TaskId::from("TASK-001"),
                    domain: Domain::ActionItemExtraction,
                    purpose: "Extract action items".to_string(),
                    depends_on: vec![],
                },
                Task {
                    id: TaskId::from("TASK-002"),
                    domain: Domain::Qna,
                    purpose: "Answer".to_string(),
                    depends_on: vec![TaskId::from("TASK-001")],
                },
            ],
        );
        plan.warnings.push("dropped task 'x': unknown domain 'y'".to_string());

        let mut results = BTreeMap::new();
        results.insert(
            TaskId::from("TASK-001"),
            TaskResult::completed(
                TaskId::from("TASK-001"),
                TaskOutput::ActionItems {
                    items: vec![ActionItem {
                        id: Some("AI-001".to_string()),
                        description: "Fix the login bug".to_string(),
                        owner: None,
                        deadline: None,
                        priority: None,
                        flags: vec![GapFlag::MissingOwner, GapFlag::MissingDueDate],
                    }],
                },
            ),
        );
        results.insert(
            TaskId::from("TASK-002"),
            TaskResult::failed(
                TaskId::from("TASK-002"),
                FailureReason::ProviderError,
                "rate limited",
            ),
        );

        assemble(message, plan, results)
    }

    #[test]
    fn test_render_sections_in_order() {
        let text = render(&sample_map());

        let map_at = text.find("ORCHESTRATION MAP").unwrap();
        let plan_at = text.find("PLAN\n----").unwrap();
        let warnings_at = text.find("PLAN WARNINGS").unwrap();
        let exec_at = text.find("EXECUTION").unwrap();
        assert!(map_at < plan_at && plan_at < warnings_at && warnings_at < exec_at);

        assert!(text.contains("From: Dana (Engineer)"));
        assert!(text.contains("Project: (none)"));
        assert!(text.contains("2. TASK-002 [qna] Answer (depends on: TASK-001)"));
        assert!(text.contains("MISSING_OWNER, MISSING_DUE_DATE"));
    }

    #[test]
    fn test_failed_task_shows_reason() {
        let text = render(&sample_map());
        assert!(text.contains("[TASK-002] qna: FAILED (PROVIDER_ERROR)"));
        assert!(text.contains("  rate limited"));
        assert!(text.contains("Summary: 2 tasks, 1 completed, 1 failed"));
    }

    #[test]
    fn test_every_task_rendered_once() {
        let text = render(&sample_map());
        assert_eq!(text.matches("[TASK-001]").count(), 1);
        assert_eq!(text.matches("[TASK-002]").count(), 1);
    }

    #[test]
    fn test_render_is_deterministic() {
        let map = sample_map();
        assert_eq!(render(&map), render(&map));
        assert_eq!(map.rendered_text, render(&map));
    }

    #[test]
    fn test_assemble_renders_the_result_set() {
        let map = sample_map();
        let mut bare = map.clone();
        bare.rendered_text.clear();

        let rebuilt = assemble(bare.message, bare.plan, bare.results);
        assert_eq!(rebuilt, map);
        assert!(rebuilt.rendered_text.starts_with("ORCHESTRATION MAP"));
    }
}
