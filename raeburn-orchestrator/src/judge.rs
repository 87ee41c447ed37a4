//! Winner selection over ranked router candidates.
//!
//! The rule backend trusts the router's ranking and takes the head. The
//! model backend asks a judge model to pick among numbered answers and
//! falls back to the head on any parse or routing failure. Either way the
//! reported score is the winner's routed score.

use raeburn_models_sdk::router::{RouteRequest, RoutedResponse, Router};

/// Backend selected by `RAEBURN_JUDGE_BACKEND` (`rule` is the default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeBackend {
    Rule,
    Model,
}

impl JudgeBackend {
    pub fn from_env() -> Self {
        match std::env::var("RAEBURN_JUDGE_BACKEND").as_deref() {
            Ok("model") => Self::Model,
            _ => Self::Rule,
        }
    }
}

/// Index of the winning candidate. `ranked` must be non-empty.
pub async fn pick_winner(
    backend: JudgeBackend,
    router: &Router,
    ranked: &[RoutedResponse],
    user_input: &str,
) -> usize {
    match backend {
        JudgeBackend::Rule => 0,
        JudgeBackend::Model => model_judge(router, ranked, user_input).await.unwrap_or(0),
    }
}

async fn model_judge(
    router: &Router,
    ranked: &[RoutedResponse],
    user_input: &str,
) -> Option<usize> {
    if ranked.len() < 2 {
        return Some(0);
    }
    let mut lines = vec![
        "You are a judge choosing the best answer to the user's question.".to_string(),
        format!("QUESTION: {user_input}"),
        "ANSWERS:".to_string(),
    ];
    for (idx, candidate) in ranked.iter().enumerate() {
        lines.push(format!("{}. {}", idx + 1, candidate.content));
    }
    lines.push("Respond with the number of the best answer.".to_string());

    let verdict = router
        .route_first(RouteRequest::new(lines.join("\n")).with_session("judge"))
        .await
        .ok()?;
    let picked = first_integer(&verdict.content)?;
    if picked >= 1 && picked <= ranked.len() {
        Some(picked - 1)
    } else {
        tracing::debug!(picked, "judge answer out of range, keeping ranked head");
        Some(0)
    }
}

fn first_integer(text: &str) -> Option<usize> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
