//! Bot run loop: reads a channel's message stream and answers through the
//! conversation manager.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::channels::{Channel, IncomingMessage, OutgoingResponse};
use crate::conversation::{ConversationManager, spawn_prune_task};
use crate::error::Error;

pub struct Bot {
    channel: Arc<dyn Channel>,
    manager: Arc<ConversationManager>,
}

impl Bot {
    pub fn new(channel: Arc<dyn Channel>, manager: Arc<ConversationManager>) -> Self {
        Self { channel, manager }
    }

    /// Run until Ctrl+C or until the channel's stream ends.
    ///
    /// Each message is handled on its own task. Messages from the same user
    /// are chained so they are answered in arrival order.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channel.start().await?;
        let pruning_handle = spawn_prune_task(Arc::clone(&self.manager));

        tracing::info!(channel = self.channel.name(), "Bot ready and listening");

        let mut in_flight: HashMap<String, JoinHandle<()>> = HashMap::new();

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            in_flight.retain(|_, handle| !handle.is_finished());

            let user_id = message.user.id.clone();
            let previous = in_flight.remove(&user_id);
            let channel = Arc::clone(&self.channel);
            let manager = Arc::clone(&self.manager);

            let handle = tokio::spawn(async move {
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                answer(channel.as_ref(), &manager, &message).await;
            });
            in_flight.insert(user_id, handle);
        }

        // Let in-flight conversations finish their current step.
        for (_, handle) in in_flight.drain() {
            let _ = handle.await;
        }

        pruning_handle.abort();
        self.channel.shutdown().await?;
        Ok(())
    }
}

async fn answer(channel: &dyn Channel, manager: &ConversationManager, message: &IncomingMessage) {
    let replies = manager.handle(&message.user, &message.content).await;
    for reply in replies {
        if let Err(e) = channel
            .respond(message, OutgoingResponse::from(reply))
            .await
        {
            tracing::error!(user_id = %message.user.id, error = %e, "Failed to send reply");
            break;
        }
    }
}
