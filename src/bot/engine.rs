//! Dispatcher engine - the single event loop that routes inbound messages.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bot::reply;
use crate::bot::store::Store;
use crate::classifier::{self, BroadcastAction, DirectAction};
use crate::completion::CompletionClient;
use crate::rtm::{
    BotIdentity, ChannelKind, InboundMessage, OutboundMessage, RtmApi, RtmError, RtmLoop,
};

/// Pause between an acknowledgement and the refreshed task list, letting the
/// store settle before it is re-read.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

const ACK_TASK_ADDED: &str = "添加成功，主人现在任务有: ";
const ACK_TASKS_CLEARED: &str = "任务清理成功，主人现在任务有: ";

/// The dispatcher. Owns identity context, the store, and the three external
/// clients; built once at startup and never mutated after.
pub struct Engine {
    me: BotIdentity,
    operator_uid: String,
    /// Private channel to the operator, opened once at startup.
    operator_channel: String,
    forward_trigger: String,
    store: Store,
    api: RtmApi,
    rtm: RtmLoop,
    completion: CompletionClient,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        me: BotIdentity,
        operator_uid: String,
        operator_channel: String,
        forward_trigger: String,
        store: Store,
        api: RtmApi,
        rtm: RtmLoop,
        completion: CompletionClient,
    ) -> Self {
        Self {
            me,
            operator_uid,
            operator_channel,
            forward_trigger,
            store,
            api,
            rtm,
            completion,
        }
    }

    /// Run until the transport fails. Messages are processed one at a time;
    /// any item on the error channel is fatal.
    pub async fn run(
        self,
        mut messages: mpsc::Receiver<InboundMessage>,
        mut errors: mpsc::Receiver<RtmError>,
    ) -> Result<(), RtmError> {
        info!("Dispatcher running as {} ({})", self.me.name, self.me.uid);
        loop {
            tokio::select! {
                err = errors.recv() => {
                    let err = err
                        .unwrap_or_else(|| RtmError::Closed("error channel closed".into()));
                    error!("Transport failure: {err}");
                    return Err(err);
                }
                message = messages.recv() => {
                    let Some(message) = message else {
                        return Err(RtmError::Closed("inbound channel closed".into()));
                    };
                    // Never react to our own messages.
                    if message.uid == self.me.uid {
                        continue;
                    }
                    match message.kind {
                        ChannelKind::Direct => self.handle_direct(message).await,
                        ChannelKind::Broadcast => self.handle_broadcast(message).await,
                    }
                }
            }
        }
    }

    async fn handle_direct(&self, message: InboundMessage) {
        match classifier::classify_direct(&message.text) {
            DirectAction::AddTask => self.add_task(message).await,
            DirectAction::ShowTasks => {
                self.show_tasks(&message.uid, &message.vchannel_id).await;
            }
            DirectAction::ClearTasks => self.clear_tasks(message).await,
            DirectAction::AddMonitor => self.add_monitor(message).await,
            DirectAction::Converse => self.converse_direct(message).await,
        }
    }

    async fn handle_broadcast(&self, message: InboundMessage) {
        let action = classifier::classify_broadcast(
            &message.text,
            &self.operator_uid,
            &self.me.uid,
            &self.forward_trigger,
        );
        match action {
            BroadcastAction::ForwardToOperator => self.forward_to_operator(&message).await,
            BroadcastAction::Converse => {
                if let Some(answer) = self.completion.complete(&message.text, &message.uid).await {
                    self.send(&message.uid, &message.vchannel_id, &answer).await;
                }
            }
            BroadcastAction::Nothing => {}
        }
    }

    async fn add_task(&self, message: InboundMessage) {
        // A command replying to an earlier message takes both the text and
        // the timestamp from the referenced message.
        let (raw_text, created_ts) = match &message.refer_key {
            Some(key) => {
                debug!("add with refer: {key}");
                match self.api.message_info(&message.vchannel_id, key).await {
                    Ok(referred) => (referred.text, referred.created_ts),
                    Err(e) => {
                        warn!("Failed to fetch referenced message {key}: {e}");
                        (message.text.clone(), message.created_ts)
                    }
                }
            }
            None => (message.text.clone(), message.created_ts),
        };

        let task = reply::strip_command(&raw_text, "todo");
        info!("task [{}] added for {}", task, message.uid);
        if let Err(e) = self.store.add_task(&message.uid, &task, created_ts) {
            warn!("Failed to store task: {e}");
        }

        self.send(&message.uid, &message.vchannel_id, ACK_TASK_ADDED).await;
        tokio::time::sleep(SETTLE_DELAY).await;
        self.show_tasks(&message.uid, &message.vchannel_id).await;
    }

    async fn show_tasks(&self, uid: &str, vchannel_id: &str) {
        if let Some(rendered) = current_task_list(&self.store, uid) {
            self.send(uid, vchannel_id, &rendered).await;
        }
    }

    async fn clear_tasks(&self, message: InboundMessage) {
        apply_clear_command(&self.store, &message.uid, &message.text);
        self.send(&message.uid, &message.vchannel_id, ACK_TASKS_CLEARED).await;
        self.show_tasks(&message.uid, &message.vchannel_id).await;
    }

    async fn add_monitor(&self, message: InboundMessage) {
        let entry = reply::strip_command(&message.text, "monitor");
        if let Err(e) = self.store.add_monitor(&message.uid, &entry) {
            warn!("Failed to store monitor entry: {e}");
        }
        match self.store.monitors(&message.uid) {
            Ok(entries) => {
                let rendered = reply::render_monitor_list(&entries);
                self.send(&message.uid, &message.vchannel_id, &rendered).await;
            }
            Err(e) => warn!("Failed to read monitor entries: {e}"),
        }
    }

    async fn converse_direct(&self, message: InboundMessage) {
        let text = message.text.to_lowercase();
        match self.completion.complete(&text, &message.uid).await {
            Some(answer) => self.send(&message.uid, &message.vchannel_id, &answer).await,
            None => {
                let intro = format!("我的名字是 {}，请多多关照", self.me.name);
                self.send(&message.uid, &message.vchannel_id, &intro).await;
            }
        }
    }

    async fn forward_to_operator(&self, message: &InboundMessage) {
        let sender = match self.api.user_name(&message.uid).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Failed to resolve sender name: {e}");
                message.uid.clone()
            }
        };
        let content = reply::forward_attribution(&sender, &message.text);
        self.send(&self.operator_uid, &self.operator_channel, &content).await;
    }

    async fn send(&self, to_uid: &str, vchannel_id: &str, text: &str) {
        let outbound = OutboundMessage {
            vchannel_id: vchannel_id.to_string(),
            to_uid: to_uid.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = self.rtm.send(&outbound).await {
            warn!("Failed to send message: {e}");
        }
    }
}

/// Render a user's current task list, or `None` when the store read fails.
fn current_task_list(store: &Store, uid: &str) -> Option<String> {
    match store.tasks(uid) {
        Ok(tasks) => Some(reply::render_task_list(&tasks)),
        Err(e) => {
            warn!("Failed to read tasks: {e}");
            None
        }
    }
}

/// Apply a "done" command: remove the task at each given 1-based rank,
/// sequentially, so later ranks see the re-ranked list. Bad tokens and
/// out-of-range ranks are skipped without aborting the rest.
fn apply_clear_command(store: &Store, uid: &str, text: &str) {
    for rank in reply::parse_ranks(text) {
        debug!("task {rank} done for {uid}");
        match store.remove_task_at(uid, rank - 1) {
            Ok(true) => {}
            Ok(false) => debug!("no task at rank {rank}"),
            Err(e) => warn!("Failed to remove task at rank {rank}: {e}"),
        }
    }
}
