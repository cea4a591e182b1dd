//! Actor identity.
//!
//! Actor resolution order:
//! 1) CLI --actor (explicit)
//! 2) TL_ACTOR environment variable
//! 3) git `user.name` from the global/system git config
//! 4) Config default (actor.default, "unknown" unless set)

use crate::config::Config;

pub const ACTOR_ENV: &str = "TL_ACTOR";

/// Resolve the actor recorded on new events.
pub fn resolve_actor(cli_actor: Option<&str>, config: &Config) -> String {
    if let Some(actor) = non_empty(cli_actor) {
        return actor.to_string();
    }

    if let Ok(env_actor) = std::env::var(ACTOR_ENV) {
        if let Some(actor) = non_empty(Some(env_actor.as_str())) {
            return actor.to_string();
        }
    }

    if let Some(actor) = git_user_name() {
        return actor;
    }

    non_empty(Some(config.actor.default.as_str()))
        .unwrap_or("unknown")
        .to_string()
}

fn git_user_name() -> Option<String> {
    let config = git2::Config::open_default()
        .map_err(|err| tracing::debug!(error = %err, "git config unavailable"))
        .ok()?;
    let name = config.get_string("user.name").ok()?;
    non_empty(Some(name.as_str())).map(str::to_string)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
