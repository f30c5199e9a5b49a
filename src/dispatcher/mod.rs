//! Command dispatch on the altar.
//!
//! A table from [`CommandTag`] to an async [`CommandHandler`]. Handlers may
//! call out to collaborators and produce zero or one [`Response`]. Commands
//! are dispatched strictly in arrival order; a failing handler is logged and
//! yields no response.

pub mod handlers;
pub mod presence;
pub mod voice;

pub use presence::Presence;

use crate::collaborators::Collaborators;
use crate::feedback::FeedbackChannel;
use crate::protocol::{Command, CommandTag, Response};
use anyhow::Result;
use async_trait::async_trait;
use handlers::{
    AtmosphereHandler, DrawHandler, NavigatePathHandler, OracleHandler, ReadingHandler,
    SummonHandler, SwipeHandler, TapHandler, TiltHandler,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a handler may read or change on the altar.
#[derive(Debug)]
pub struct HostContext {
    pub presence: Presence,
    pub feedback: FeedbackChannel,
    pub collaborators: Collaborators,
}

impl HostContext {
    pub fn new(collaborators: Collaborators, feedback: FeedbackChannel) -> Self {
        Self {
            presence: Presence::default(),
            feedback,
            collaborators,
        }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>>;
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<CommandTag, Arc<dyn CommandHandler>>,
}

impl Dispatcher {
    /// An empty table; every command is ignored.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        let summon: Arc<dyn CommandHandler> = Arc::new(SummonHandler);
        let oracle: Arc<dyn CommandHandler> = Arc::new(OracleHandler);
        let reading: Arc<dyn CommandHandler> = Arc::new(ReadingHandler);
        let atmosphere: Arc<dyn CommandHandler> = Arc::new(AtmosphereHandler);

        dispatcher.register(CommandTag::Shake, summon.clone());
        dispatcher.register(CommandTag::NavigateRandom, summon);
        dispatcher.register(CommandTag::Swipe, Arc::new(SwipeHandler));
        dispatcher.register(CommandTag::Tilt, Arc::new(TiltHandler));
        dispatcher.register(CommandTag::Tap, Arc::new(TapHandler));
        dispatcher.register(CommandTag::Hold, oracle.clone());
        dispatcher.register(CommandTag::Divine, oracle.clone());
        dispatcher.register(CommandTag::Whisper, oracle);
        dispatcher.register(CommandTag::Draw, Arc::new(DrawHandler));
        dispatcher.register(CommandTag::NavigatePath, Arc::new(NavigatePathHandler));
        dispatcher.register(CommandTag::Scroll, reading.clone());
        dispatcher.register(CommandTag::Pause, reading);
        dispatcher.register(CommandTag::Sound, atmosphere.clone());
        dispatcher.register(CommandTag::Dim, atmosphere.clone());
        dispatcher.register(CommandTag::Brighten, atmosphere);
        dispatcher
    }

    /// Adds or replaces the handler for `tag`, returning the previous one.
    pub fn register(
        &mut self,
        tag: CommandTag,
        handler: Arc<dyn CommandHandler>,
    ) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.insert(tag, handler)
    }

    pub fn handles(&self, tag: CommandTag) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Runs the handler for `command`. Voice transcripts are first resolved
    /// to the command they ask for.
    pub async fn dispatch(&self, command: &Command, ctx: &mut HostContext) -> Option<Response> {
        let resolved;
        let command = match command {
            Command::Handshake { .. } => {
                debug!("Handshake on an established session ignored");
                return None;
            }
            Command::Voice { text } => {
                resolved = voice::interpret(text);
                debug!(text = %text, intent = %resolved.tag(), "Voice command resolved");
                &resolved
            }
            other => other,
        };

        let tag = command.tag();
        let Some(handler) = self.handlers.get(&tag) else {
            warn!(tag = %tag, "No handler registered, command dropped");
            return None;
        };

        match handler.handle(command, ctx).await {
            Ok(response) => {
                debug!(
                    tag = %tag,
                    response = response.as_ref().map(|r| r.tag()).unwrap_or("none"),
                    "Command dispatched"
                );
                response
            }
            Err(e) => {
                warn!(tag = %tag, error = %format!("{:#}", e), "Command handler failed");
                None
            }
        }
    }

    /// Decodes and dispatches one wire message. Undecodable messages are
    /// logged and dropped.
    pub async fn dispatch_text(&self, text: &str, ctx: &mut HostContext) -> Option<Response> {
        match Command::decode(text) {
            Ok(command) => self.dispatch(&command, ctx).await,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Dropping undecodable command");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
