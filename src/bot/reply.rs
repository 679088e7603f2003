//! Outbound reply formatting.

/// Reply when the task list is empty.
pub const NO_TASKS: &str = "工作都完成了，好棒!";

/// Reply when the monitor list is empty.
pub const NO_MONITORS: &str = "No monitor worker";

/// Find the first occurrence of an ASCII keyword, case-insensitively.
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let len = keyword.len();
    text.char_indices().find_map(|(i, _)| {
        text.get(i..i + len)
            .filter(|candidate| candidate.eq_ignore_ascii_case(keyword))
            .map(|_| i)
    })
}

/// Strip a leading command keyword ("todo", "done", "monitor") and
/// surrounding whitespace, leaving the command's argument text.
pub fn strip_command(text: &str, keyword: &str) -> String {
    let trimmed = text.trim();
    let rest = match find_keyword(trimmed, keyword) {
        Some(i) => &trimmed[i + keyword.len()..],
        None => trimmed,
    };
    rest.trim().to_string()
}

/// Parse the rank arguments of a "done" command into 1-based ranks.
/// Non-numeric tokens are skipped silently; zero is not a valid rank.
pub fn parse_ranks(text: &str) -> Vec<usize> {
    strip_command(text, "done")
        .split_whitespace()
        .filter_map(|token| token.parse::<usize>().ok())
        .filter(|&rank| rank >= 1)
        .collect()
}

/// Render the task list with 1-based rank prefixes, newline-joined.
pub fn render_task_list(tasks: &[String]) -> String {
    if tasks.is_empty() {
        return NO_TASKS.to_string();
    }
    tasks
        .iter()
        .enumerate()
        .map(|(i, task)| format!("{}. {}", i + 1, task))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the monitor list, tab-joined under a header.
pub fn render_monitor_list(entries: &[String]) -> String {
    if entries.is_empty() {
        return NO_MONITORS.to_string();
    }
    format!("Monitoring: \n{}", entries.join("\t"))
}

/// Attribute forwarded text to its sender: `[<name>：<text>]`.
pub fn forward_attribution(sender_name: &str, text: &str) -> String {
    format!("[{sender_name}：{text}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_command_basic() {
        assert_eq!(strip_command("todo buy milk", "todo"), "buy milk");
        assert_eq!(strip_command("  todo   buy milk  ", "todo"), "buy milk");
    }

    #[test]
    fn test_strip_command_case_insensitive() {
        assert_eq!(strip_command("TODO buy milk", "todo"), "buy milk");
        assert_eq!(strip_command("Monitor backend-01", "monitor"), "backend-01");
    }

    #[test]
    fn test_strip_command_absent_keyword_keeps_text() {
        // Referenced messages usually carry no keyword at all.
        assert_eq!(strip_command("deploy the thing", "todo"), "deploy the thing");
    }

    #[test]
    fn test_strip_command_multibyte_prefix() {
        assert_eq!(strip_command("请 todo 买牛奶", "todo"), "买牛奶");
    }

    #[test]
    fn test_parse_ranks() {
        assert_eq!(parse_ranks("done 1 3 2"), vec![1, 3, 2]);
    }

    #[test]
    fn test_parse_ranks_skips_non_numeric_tokens() {
        assert_eq!(parse_ranks("done 1 abc 2"), vec![1, 2]);
        assert_eq!(parse_ranks("done nope"), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_ranks_rejects_zero() {
        assert_eq!(parse_ranks("done 0 1"), vec![1]);
    }

    #[test]
    fn test_render_task_list() {
        let rendered = render_task_list(&list(&["buy milk", "call mom"]));
        assert_eq!(rendered, "1. buy milk\n2. call mom");
    }

    #[test]
    fn test_render_empty_task_list_uses_fixed_message() {
        assert_eq!(render_task_list(&[]), NO_TASKS);
    }

    #[test]
    fn test_render_monitor_list() {
        let rendered = render_monitor_list(&list(&["backend-01", "backend-02"]));
        assert_eq!(rendered, "Monitoring: \nbackend-01\tbackend-02");
    }

    #[test]
    fn test_render_empty_monitor_list_uses_fixed_message() {
        assert_eq!(render_monitor_list(&[]), NO_MONITORS);
    }

    #[test]
    fn test_forward_attribution_uses_fullwidth_colon() {
        assert_eq!(forward_attribution("alice", "hi"), "[alice：hi]");
    }
}
