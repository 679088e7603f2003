//! Message classification - picks exactly one handler per inbound message.

/// Disposition for a message seen in a broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAction {
    /// Relay the text to the operator's private channel, attributed to the sender.
    ForwardToOperator,
    /// Hand the text to the completion service.
    Converse,
    /// Not addressed to us.
    Nothing,
}

/// Disposition for a direct (P2P) message to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectAction {
    AddTask,
    ShowTasks,
    ClearTasks,
    AddMonitor,
    Converse,
}

/// RTM mentions are encoded inline as `@<=UID=>`.
pub fn mentions(text: &str, uid: &str) -> bool {
    text.contains(&format!("@<={uid}=>"))
}

/// Classify a broadcast-channel message. Priority is fixed: operator mention,
/// then bot mention, then the configured trigger substring (case-sensitive).
pub fn classify_broadcast(
    text: &str,
    operator_uid: &str,
    bot_uid: &str,
    trigger: &str,
) -> BroadcastAction {
    if mentions(text, operator_uid) {
        BroadcastAction::ForwardToOperator
    } else if mentions(text, bot_uid) {
        BroadcastAction::Converse
    } else if text.contains(trigger) {
        BroadcastAction::ForwardToOperator
    } else {
        BroadcastAction::Nothing
    }
}

/// Classify a direct message by case-insensitive keyword containment.
/// Only the first matching keyword fires; "todo done" is an AddTask.
pub fn classify_direct(text: &str) -> DirectAction {
    let lower = text.to_lowercase();
    if lower.contains("todo") {
        DirectAction::AddTask
    } else if lower.contains("show") {
        DirectAction::ShowTasks
    } else if lower.contains("done") {
        DirectAction::ClearTasks
    } else if lower.contains("monitor") {
        DirectAction::AddMonitor
    } else {
        DirectAction::Converse
    }
}
