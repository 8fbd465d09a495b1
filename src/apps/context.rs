use crate::apps::traits::{AppDirectory, AppInfo};

const QUESTION_MARKERS: &[&str] = &["how many", "which", "what", "list", "apps", "installed"];

/// Installed-app hints attached to the first user turn of a run.
///
/// Questions about the app inventory get the full summary; other goals get
/// the few apps their words fuzzily name. Empty when nothing relevant is found.
pub async fn app_context_for_goal(apps: &dyn AppDirectory, goal: &str) -> String {
    let goal_lower = goal.to_lowercase();

    if QUESTION_MARKERS.iter().any(|m| goal_lower.contains(m)) {
        return apps.summary(200).await;
    }

    let mut relevant: Vec<AppInfo> = Vec::new();
    for word in goal_lower.split_whitespace().filter(|w| w.chars().count() > 2) {
        for app in apps.fuzzy_search(word, 70).await.into_iter().take(2) {
            if !relevant.contains(&app) {
                relevant.push(app);
            }
        }
    }

    if relevant.is_empty() {
        return String::new();
    }

    let mut lines = vec!["Matching installed apps:".to_string()];
    lines.extend(
        relevant
            .iter()
            .take(10)
            .map(|app| format!("  - {}: {}", app.common_name, app.package)),
    );
    lines.join("\n")
}

/// The first user turn: the goal plus any app context.
pub fn initial_message(goal: &str, app_context: &str) -> String {
    if app_context.is_empty() {
        goal.to_string()
    } else {
        format!("{goal}\n\n[Installed apps context]\n{app_context}")
    }
}
