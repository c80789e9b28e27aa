//! Binding parsed commands to chat session operations

use super::parse::{split_leading_overrides, ParsedCommand};
use super::registry::{CommandGroup, CommandKind, CommandRegistry, CommandSpec};
use crate::error::{BotError, BotResult};
use crate::session::{validate_temperature, ChatSession, QueryOverrides};
use crate::transport::Reply;
use std::collections::HashMap;
use std::fmt::Write;
use std::str::FromStr;

pub const TOPICS_MENU_PROMPT: &str = "Choose a topic to switch to:";

/// Arguments of one invocation, bound to the command's parameter names
struct CommandArgs {
    trigger: String,
    values: HashMap<&'static str, String>,
}

impl CommandArgs {
    /// Bind positional arguments in order, then keyword arguments by name
    fn bind(spec: &CommandSpec, parsed: &ParsedCommand) -> BotResult<Self> {
        let trigger = parsed.trigger.clone();
        if parsed.args.len() > spec.params.len() {
            return Err(BotError::invalid(format!(
                "{trigger} takes at most {} arguments, got {}",
                spec.params.len(),
                parsed.args.len()
            )));
        }

        let mut values: HashMap<&'static str, String> = spec
            .params
            .iter()
            .copied()
            .zip(parsed.args.iter().cloned())
            .collect();

        for (key, value) in &parsed.kwargs {
            let Some(name) = spec.params.iter().copied().find(|p| *p == key.as_str()) else {
                return Err(BotError::invalid(format!(
                    "{trigger} has no parameter {key}"
                )));
            };
            if values.insert(name, value.clone()).is_some() {
                return Err(BotError::invalid(format!(
                    "{trigger} got {key} twice"
                )));
            }
        }

        Ok(Self { trigger, values })
    }

    /// Bind the leading overrides of a free-text command; the rest is the text
    fn bind_free_text(spec: &CommandSpec, parsed: &ParsedCommand) -> (Self, String) {
        let (overrides, text) = split_leading_overrides(&parsed.rest, spec.params);
        let values = overrides
            .into_iter()
            .filter_map(|(key, value)| {
                let name = spec.params.iter().copied().find(|p| *p == key)?;
                Some((name, value.to_string()))
            })
            .collect();
        (
            Self {
                trigger: parsed.trigger.clone(),
                values,
            },
            text.to_string(),
        )
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> BotResult<&str> {
        self.get(name).ok_or_else(|| {
            BotError::invalid(format!("{} requires {name}", self.trigger))
        })
    }

    fn parse<T: FromStr>(&self, name: &str) -> BotResult<Option<T>> {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    BotError::invalid(format!("{name} must be a number, got {raw}"))
                })
            })
            .transpose()
    }

    fn parse_required<T: FromStr>(&self, name: &str) -> BotResult<T> {
        self.required(name)?;
        self.parse(name)?
            .ok_or_else(|| BotError::invalid(format!("{} requires {name}", self.trigger)))
    }

    fn overrides(&self) -> BotResult<QueryOverrides> {
        Ok(QueryOverrides {
            model: self.get("model").map(String::from),
            temperature: self
                .parse::<f32>("temperature")?
                .map(validate_temperature)
                .transpose()?,
            max_tokens: self.parse("max_tokens")?,
        })
    }
}

/// Run `parsed` against `session`.
///
/// Operations that produce no text are answered with a short confirmation.
pub async fn dispatch(
    session: &mut ChatSession,
    registry: &CommandRegistry,
    parsed: &ParsedCommand,
) -> BotResult<Reply> {
    let spec = registry
        .lookup(&parsed.trigger)
        .ok_or_else(|| BotError::UnknownCommand(parsed.trigger.clone()))?;

    tracing::debug!(
        user = %session.user(),
        trigger = %parsed.trigger,
        kind = ?spec.kind,
        "Dispatching command"
    );

    let (args, free_text) = if spec.free_text {
        let (args, text) = CommandArgs::bind_free_text(spec, parsed);
        (args, Some(text))
    } else {
        (CommandArgs::bind(spec, parsed)?, None)
    };
    let text = free_text.as_deref().unwrap_or_default();

    let output = match spec.kind {
        CommandKind::Start => session.start().to_string(),
        CommandKind::Help => help(registry, args.get("command"))?,
        CommandKind::ActiveModel => session.active_model(),
        CommandKind::ListModels => session.list_models().await?,
        CommandKind::GetModelInfo => session.model_info(args.required("model_id")?).await?,
        CommandKind::SwitchModel => session.switch_model(args.get("model")).await?,
        CommandKind::SetTemperature => {
            session.set_temperature(args.parse_required("temperature")?)?
        }
        CommandKind::SetMaxTokens => {
            session.set_max_output_tokens(args.parse_required("max_tokens")?)?
        }
        CommandKind::SetHistoryWordLimit => {
            session.set_history_word_limit(args.parse_required("limit")?)?
        }
        CommandKind::NewTopic => session.new_topic(args.get("name"))?,
        CommandKind::ListTopics => session.list_topics_text(args.parse("limit")?),
        CommandKind::SwitchTopic => {
            session.switch_topic(args.get("name"), args.parse("index")?)?
        }
        CommandKind::RenameTopic => {
            session.rename_topic(args.required("new_name")?, args.get("topic"))?
        }
        CommandKind::TopicsMenu => {
            return Ok(Reply::Menu {
                prompt: TOPICS_MENU_PROMPT.to_string(),
                buttons: session.topics_menu(),
            })
        }
        CommandKind::History => session.history_text(args.get("topic"), args.parse("limit")?)?,
        CommandKind::DescribeErrors => session.describe_errors(args.parse("limit")?),
        CommandKind::RawQuery => session.raw_query(text, &args.overrides()?).await?,
        CommandKind::Cheap => session.cheap(text, &args.overrides()?).await?,
        CommandKind::Edit => {
            session
                .edit(text, args.get("instruction"), &args.overrides()?)
                .await?
        }
        CommandKind::Question => session.question(text).await?,
        CommandKind::Chat => session.chat(text).await?,
    };

    if output.trim().is_empty() {
        Ok(Reply::Text(format!(
            "Command {} finished successfully",
            parsed.trigger
        )))
    } else {
        Ok(Reply::Text(output))
    }
}

/// Command list grouped by purpose, or the full doc text of one command
fn help(registry: &CommandRegistry, command: Option<&str>) -> BotResult<String> {
    if let Some(command) = command {
        let trigger = if command.starts_with('/') {
            command.to_string()
        } else {
            format!("/{command}")
        };
        let spec = registry
            .lookup(&trigger)
            .ok_or(BotError::UnknownCommand(trigger))?;
        return Ok(format!("{}\n{}", spec.triggers.join(", "), spec.doc));
    }

    let mut out = String::from("Available commands:\n");
    let mut current: Option<CommandGroup> = None;
    for trigger in registry.list_commands() {
        let Some(spec) = registry.lookup(trigger) else {
            continue;
        };
        if current != Some(spec.group) {
            let _ = writeln!(out, "\n[{}]", spec.group);
            current = Some(spec.group);
        }
        let _ = writeln!(out, "{trigger}: {}", spec.description());
    }
    Ok(out)
}
