/// Tools that change what is on the device screen.
const DEVICE_MUTATING: &[&str] = &[
    "click",
    "type",
    "scroll",
    "open_app",
    "back",
    "home",
    "click_element",
    "type_text",
    "scroll_screen",
    "press_back",
    "press_home",
];

/// Tools that only read state; these never wait for a human.
const READ_ONLY: &[&str] = &["get_screen_state", "search_installed_apps", "list_all_apps"];

/// Returns true if this tool invocation requires human approval before execution.
///
/// An empty `require_list` means every device-mutating tool is gated.
pub fn requires_approval(tool_name: &str, require_list: &[String]) -> bool {
    if READ_ONLY.contains(&tool_name) {
        return false;
    }
    if require_list.is_empty() {
        DEVICE_MUTATING.contains(&tool_name)
    } else {
        require_list.iter().any(|r| r == tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gates_mutating_tools_only() {
        assert!(requires_approval("click", &[]));
        assert!(requires_approval("open_app", &[]));
        assert!(requires_approval("press_back", &[]));
        assert!(!requires_approval("wait", &[]));
        assert!(!requires_approval("done", &[]));
        assert!(!requires_approval("get_screen_state", &[]));
    }

    #[test]
    fn explicit_list_narrows_the_gate() {
        let list = vec!["open_app".to_string(), "list_all_apps".to_string()];
        assert!(requires_approval("open_app", &list));
        assert!(!requires_approval("click", &list));
        assert!(!requires_approval("list_all_apps", &list));
    }
}
