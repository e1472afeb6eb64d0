//! Response synthesis — turning raw outputs into the final reply.
//!
//! On the single-completion path this is a pass-through plus whitespace
//! normalization. On the orchestrator path it merges handler payloads in
//! the graph's topological order, states failures plainly (never
//! fabricating content for a failed task), and appends a partial-failure
//! notice whenever any task did not succeed.

use confab_core::handler::ExpertResult;
use confab_core::reply::Reply;
use confab_core::task::TaskState;
use confab_orchestrator::ExecutionOutcome;

/// Single-completion path: normalize and wrap.
pub fn from_completion(text: &str) -> Reply {
    let normalized: String = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    Reply::plain(normalized)
}

/// Fast-path and single-action path: acknowledge one successful handler
/// call in one line.
pub fn from_action(result: &ExpertResult) -> Reply {
    let payload = result.payload.as_ref();
    Reply::plain(match payload {
        Some(payload) => describe_payload(&result.handler, payload),
        None => format!("Done ({}).", result.handler),
    })
}

/// Orchestrator path: one line per task in topological order plus the
/// partial-failure notice.
pub fn from_orchestration(outcome: &ExecutionOutcome) -> Reply {
    let mut lines: Vec<String> = Vec::new();

    for id in &outcome.topo_order {
        let Some(task_outcome) = outcome.report.outcome(id) else {
            continue;
        };
        let line = match task_outcome.state {
            TaskState::Succeeded => {
                let described = outcome
                    .results
                    .get(id)
                    .and_then(|r| r.payload.as_ref())
                    .map(|p| describe_payload(&task_outcome.handler, p))
                    .unwrap_or_else(|| format!("Done ({}).", task_outcome.handler));
                format!("- {described}")
            }
            TaskState::TimedOut => format!(
                "- {} did not finish in time.",
                task_outcome.handler
            ),
            TaskState::Skipped => format!(
                "- {} was skipped because an earlier step failed.",
                task_outcome.handler
            ),
            _ => format!(
                "- {} failed ({}).",
                task_outcome.handler,
                task_outcome.error_kind.as_deref().unwrap_or("error")
            ),
        };
        lines.push(line);
    }

    let failed = outcome.report.failures().count();
    if failed > 0 {
        lines.push(format!(
            "Heads up: {} of {} steps did not complete.",
            failed,
            outcome.report.outcomes.len()
        ));
    }

    Reply::plain(lines.join("\n")).with_task_report(outcome.report.clone())
}

/// Render one handler payload as a human line. Falls back to compact JSON
/// for payload shapes we do not recognize.
fn describe_payload(handler: &str, payload: &serde_json::Value) -> String {
    let field = |k: &str| payload.get(k).and_then(|v| v.as_str()).unwrap_or("");

    match payload.get("status").and_then(|v| v.as_str()) {
        Some("added") => format!(
            "Added {} to your {} list.",
            field("item"),
            field("list")
        ),
        Some("scheduled") => match field("time") {
            "" | "unscheduled" => format!("Scheduled: {}.", field("title")),
            time => format!("Scheduled: {} ({}).", field("title"), time),
        },
        Some("remembered") => "Noted.".to_string(),
        Some("ok") if !field("device").is_empty() => {
            format!("Set {} to {}.", field("device"), field("state"))
        }
        _ => format!("{handler}: {payload}"),
    }
}
