//! Default command handlers.
//!
//! | Command | Effect | Response |
//! |---|---|---|
//! | shake, navigate:random, swipe right, draw circle | random item | `state:writing` |
//! | swipe left | navigate back | none |
//! | swipe up/down, reading:scroll | move progress | `state:reading` |
//! | tilt | parallax | none |
//! | tap (1) | transient message | none |
//! | tap (2+), reading:pause | toggle pause | `state:reading` |
//! | hold, draw triangle, oracle:divine | oracle reading | `oracle:result` |
//! | oracle:whisper | oracle reply | `oracle:response` |
//! | draw infinity, atmosphere:dim/brighten | dimming | `feedback:vibrate` |
//! | navigate:path | open page | none |
//! | atmosphere:sound | sound level | none |
//!
//! Presence is only updated after the collaborator call succeeded.

use super::{CommandHandler, HostContext};
use crate::feedback::VibrationPattern;
use crate::gesture::{Shape, SwipeDirection};
use crate::protocol::{Command, Response};
use anyhow::Result;
use async_trait::async_trait;

/// Swipe distance (px) that moves reading progress by one percent.
const SWIPE_PX_PER_PERCENT: f64 = 10.0;

async fn summon(ctx: &mut HostContext) -> Result<Option<Response>> {
    let item = ctx.collaborators.library.random_item().await?;
    ctx.collaborators.navigator.navigate(&item.path).await?;
    ctx.presence.open_item(item.path.clone());
    ctx.feedback.show(format!("Summoning {}", item.title));
    Ok(Some(Response::Writing { item }))
}

async fn divine(ctx: &mut HostContext, location: Option<&str>) -> Result<Option<Response>> {
    let reading = ctx.collaborators.oracle.divine(location).await?;
    ctx.feedback.show("The oracle speaks");
    Ok(Some(Response::OracleResult {
        item: reading.item,
        message: reading.message,
    }))
}

async fn scroll(ctx: &mut HostContext, delta: f64) -> Result<Option<Response>> {
    ctx.collaborators.navigator.scroll_by(delta).await?;
    let progress = ctx.presence.scroll(delta);
    Ok(Some(Response::Reading { progress }))
}

fn toggle_pause(ctx: &mut HostContext) -> Option<Response> {
    let paused = ctx.presence.toggle_pause();
    ctx.feedback.show(if paused { "Paused" } else { "Resumed" });
    Some(Response::Reading {
        progress: ctx.presence.progress_percent,
    })
}

async fn set_dimmed(ctx: &mut HostContext, dimmed: bool) -> Result<Option<Response>> {
    ctx.collaborators.atmosphere.set_dimmed(dimmed).await?;
    ctx.presence.is_dimmed = dimmed;
    ctx.feedback.show(if dimmed { "Lights dimmed" } else { "Lights raised" });
    let pattern = if dimmed {
        VibrationPattern::Soft
    } else {
        VibrationPattern::Pulse
    };
    Ok(Some(Response::Vibrate { pattern }))
}

/// `gesture:shake`, `navigate:random`
pub struct SummonHandler;

#[async_trait]
impl CommandHandler for SummonHandler {
    async fn handle(&self, _command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        summon(ctx).await
    }
}

/// `gesture:swipe`
pub struct SwipeHandler;

#[async_trait]
impl CommandHandler for SwipeHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        let Command::Swipe {
            direction, distance, ..
        } = command
        else {
            return Ok(None);
        };
        let delta = distance / SWIPE_PX_PER_PERCENT;
        match direction {
            SwipeDirection::Right => summon(ctx).await,
            SwipeDirection::Left => {
                ctx.collaborators.navigator.back().await?;
                ctx.feedback.show("Back");
                Ok(None)
            }
            // Finger up moves the page up, i.e. further into the text
            SwipeDirection::Up => scroll(ctx, delta).await,
            SwipeDirection::Down => scroll(ctx, -delta).await,
        }
    }
}

/// `gesture:tilt`
pub struct TiltHandler;

#[async_trait]
impl CommandHandler for TiltHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        if let Command::Tilt { x, y } = command {
            ctx.collaborators.atmosphere.set_parallax(*x, *y).await?;
            ctx.presence.parallax = (*x, *y);
        }
        Ok(None)
    }
}

/// `gesture:tap`
pub struct TapHandler;

#[async_trait]
impl CommandHandler for TapHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        match command {
            Command::Tap { count } if *count >= 2 => Ok(toggle_pause(ctx)),
            _ => {
                ctx.feedback.show("✦");
                Ok(None)
            }
        }
    }
}

/// `gesture:hold`, `oracle:divine`, `oracle:whisper`
pub struct OracleHandler;

#[async_trait]
impl CommandHandler for OracleHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        match command {
            Command::Divine { location } => divine(ctx, location.as_deref()).await,
            Command::Whisper { message } => {
                let reply = ctx.collaborators.oracle.whisper(message).await?;
                ctx.feedback.show("Whisper received");
                Ok(Some(Response::OracleResponse {
                    message: reply.message,
                    quote: reply.quote,
                }))
            }
            _ => divine(ctx, None).await,
        }
    }
}

/// `gesture:draw`
pub struct DrawHandler;

#[async_trait]
impl CommandHandler for DrawHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        let Command::Draw { shape } = command else {
            return Ok(None);
        };
        match shape {
            Shape::Circle => summon(ctx).await,
            Shape::Triangle => divine(ctx, None).await,
            Shape::Infinity => {
                let dimmed = !ctx.presence.is_dimmed;
                set_dimmed(ctx, dimmed).await
            }
        }
    }
}

/// `navigate:path`
pub struct NavigatePathHandler;

#[async_trait]
impl CommandHandler for NavigatePathHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        if let Command::NavigatePath { path } = command {
            ctx.collaborators.navigator.navigate(path).await?;
            let title = ctx
                .collaborators
                .library
                .item_at(path)
                .await?
                .map(|item| item.title);
            ctx.presence.open_item(path.clone());
            ctx.feedback.show(title.unwrap_or_else(|| path.clone()));
        }
        Ok(None)
    }
}

/// `reading:scroll`, `reading:pause`
pub struct ReadingHandler;

#[async_trait]
impl CommandHandler for ReadingHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        match command {
            Command::Scroll { delta } => scroll(ctx, *delta).await,
            _ => Ok(toggle_pause(ctx)),
        }
    }
}

/// `atmosphere:sound`, `atmosphere:dim`, `atmosphere:brighten`
pub struct AtmosphereHandler;

#[async_trait]
impl CommandHandler for AtmosphereHandler {
    async fn handle(&self, command: &Command, ctx: &mut HostContext) -> Result<Option<Response>> {
        match command {
            Command::Sound { level } => {
                let level = *level;
                let level = if level.is_finite() {
                    level.clamp(0.0, 1.0)
                } else {
                    ctx.presence.sound_level
                };
                ctx.collaborators.atmosphere.set_sound_level(level).await?;
                ctx.presence.set_sound_level(level);
                Ok(None)
            }
            Command::Dim => set_dimmed(ctx, true).await,
            Command::Brighten => set_dimmed(ctx, false).await,
            _ => Ok(None),
        }
    }
}
