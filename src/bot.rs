//! Bot run loop: event stream → router → onboarding manager → channels.

use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::error::Error;
use crate::onboarding::prompts::Notice;
use crate::onboarding::{Delivery, OnboardingManager, Outcome};
use crate::router::{Command, Route, route};

/// The bot: owns the channels and dispatches every event to the manager.
pub struct Bot {
    manager: Arc<OnboardingManager>,
    channels: Arc<ChannelManager>,
}

impl Bot {
    pub fn new(manager: Arc<OnboardingManager>, channels: ChannelManager) -> Self {
        Self {
            manager,
            channels: Arc::new(channels),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    ///
    /// Each event is handled on its own task so a slow adapter call for one
    /// user never delays delivery to another.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;

        tracing::info!(channels = ?self.channels.names(), "Jobify bot ready and listening");

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
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let manager = Arc::clone(&self.manager);
            let channels = Arc::clone(&self.channels);
            tokio::spawn(async move {
                handle_event(&manager, &channels, message).await;
            });
        }

        tracing::info!("Bot shutting down...");
        self.channels.shutdown_all().await?;

        Ok(())
    }
}

/// Handle one inbound event end to end: classify it, run it through the
/// manager, deliver the replies, then run and deliver any follow-up work.
pub async fn handle_event(
    manager: &OnboardingManager,
    channels: &ChannelManager,
    msg: IncomingMessage,
) {
    let route = route(&msg);
    tracing::debug!(channel = %msg.channel, user_id = %msg.user_id, ?route, "Event routed");

    let mut outcome = match route {
        Route::Ignore => return,
        Route::Command(Command::Clean(limit)) => clean(channels, &msg, limit).await,
        Route::Command(command) => {
            let max_len = channels.max_message_length(&msg.channel);
            manager
                .handle_command(&msg.user_id, &msg.id, msg.scope, command, max_len)
                .await
        }
        Route::Step(input) => manager.handle_step(&msg.user_id, &msg.id, input).await,
    };

    loop {
        deliver(channels, &msg, &outcome).await;
        match outcome.deferred.take() {
            Some(deferred) => outcome = manager.run_deferred(deferred).await,
            None => break,
        }
    }
}

async fn clean(channels: &ChannelManager, msg: &IncomingMessage, limit: usize) -> Outcome {
    if !msg.is_admin {
        tracing::warn!(user_id = %msg.user_id, "Purge refused for non-admin");
        return Outcome::notice(Notice::NotPermitted);
    }
    match channels.purge(msg, limit).await {
        Ok(count) => Outcome::notice(Notice::Purged(count)),
        Err(e) => {
            tracing::warn!(channel = %msg.channel, "Purge failed: {e}");
            Outcome::notice(Notice::TransientFailure)
        }
    }
}

async fn deliver(channels: &ChannelManager, msg: &IncomingMessage, outcome: &Outcome) {
    for reply in &outcome.replies {
        let response = reply.response.clone();
        let result = match reply.delivery {
            Delivery::InPlace => channels.respond(msg, response).await,
            Delivery::Direct => channels.send_direct(&msg.channel, &msg.user_id, response).await,
        };
        if let Err(e) = result {
            tracing::warn!(
                channel = %msg.channel,
                user_id = %msg.user_id,
                "Failed to deliver reply: {e}"
            );
        }
    }
}
