//! Static command table and trigger lookup

use std::collections::HashMap;
use std::fmt;

/// Help groups, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandGroup {
    Basic,
    Topics,
    Configs,
    Models,
    Dev,
    Custom,
}

impl CommandGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Topics => "topics",
            Self::Configs => "configs",
            Self::Models => "models",
            Self::Dev => "dev",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which chat session operation a command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Help,
    ActiveModel,
    ListModels,
    GetModelInfo,
    SwitchModel,
    SetTemperature,
    SetMaxTokens,
    SetHistoryWordLimit,
    NewTopic,
    ListTopics,
    SwitchTopic,
    RenameTopic,
    TopicsMenu,
    History,
    DescribeErrors,
    RawQuery,
    Cheap,
    Edit,
    Question,
    Chat,
}

/// One row of the command table
#[derive(Debug)]
pub struct CommandSpec {
    pub kind: CommandKind,
    /// Every trigger, including the leading `/`; the first is the canonical one
    pub triggers: &'static [&'static str],
    pub group: CommandGroup,
    /// Parameter names in positional order
    pub params: &'static [&'static str],
    /// Whether the remainder of the message is passed through as one argument.
    /// For these commands `params` lists the optional leading overrides.
    pub free_text: bool,
    pub doc: &'static str,
}

impl CommandSpec {
    /// First non-empty line of the doc text
    pub fn description(&self) -> &'static str {
        self.doc
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("No description")
    }
}

const QUERY_OVERRIDES: &[&str] = &["model", "temperature", "max_tokens"];

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        kind: CommandKind::Start,
        triggers: &["/start"],
        group: CommandGroup::Basic,
        params: &[],
        free_text: false,
        doc: "Send the welcome message",
    },
    CommandSpec {
        kind: CommandKind::Help,
        triggers: &["/help"],
        group: CommandGroup::Basic,
        params: &["command"],
        free_text: false,
        doc: "List all commands. Use /help {command} for the full description of one
/help switch_topic",
    },
    CommandSpec {
        kind: CommandKind::NewTopic,
        triggers: &["/new_topic", "/nt"],
        group: CommandGroup::Topics,
        params: &["name"],
        free_text: false,
        doc: "Start a new conversation thread with clean context. Saves up the token quota.
name: name for the new topic (must not exist yet). Generated when omitted.",
    },
    CommandSpec {
        kind: CommandKind::ListTopics,
        triggers: &["/topics", "/t"],
        group: CommandGroup::Topics,
        params: &["limit"],
        free_text: false,
        doc: "List 10 most recent topics. Use /topics 0 to list all topics
The active topic is marked with *asterisks*.",
    },
    CommandSpec {
        kind: CommandKind::SwitchTopic,
        triggers: &["/switch_topic", "/st"],
        group: CommandGroup::Topics,
        params: &["name", "index"],
        free_text: false,
        doc: "Switch to another thread of discussion. Provide a name or an index
name: exact topic name, a number counted from the most recent topic, or a close guess
index: 1 is the most recent topic, 2 the one before it, and so on",
    },
    CommandSpec {
        kind: CommandKind::RenameTopic,
        triggers: &["/rename_topic"],
        group: CommandGroup::Topics,
        params: &["new_name", "topic"],
        free_text: false,
        doc: "Rename a topic
new_name: the new name
topic: topic to rename, the active one by default",
    },
    CommandSpec {
        kind: CommandKind::TopicsMenu,
        triggers: &["/topics_menu"],
        group: CommandGroup::Topics,
        params: &[],
        free_text: false,
        doc: "Display a menu of the most recent topics to switch to",
    },
    CommandSpec {
        kind: CommandKind::History,
        triggers: &["/history"],
        group: CommandGroup::Topics,
        params: &["topic", "limit"],
        free_text: false,
        doc: "Get the conversation history of a topic. Use limit=5 if the reply is too long
topic: the active one by default
limit: number of most recent exchanges to show, 10 by default, 0 for all",
    },
    CommandSpec {
        kind: CommandKind::SetTemperature,
        triggers: &["/set_temperature"],
        group: CommandGroup::Configs,
        params: &["temperature"],
        free_text: false,
        doc: "Set temperature for the model
temperature: a number in [0, 1]; higher is more creative",
    },
    CommandSpec {
        kind: CommandKind::SetMaxTokens,
        triggers: &["/set_max_tokens", "/set_response_length"],
        group: CommandGroup::Configs,
        params: &["max_tokens"],
        free_text: false,
        doc: "Set max tokens for the response
Response length plus history word limit must not exceed the token limit of the model",
    },
    CommandSpec {
        kind: CommandKind::SetHistoryWordLimit,
        triggers: &["/set_history_depth", "/set_history_word_limit"],
        group: CommandGroup::Configs,
        params: &["limit"],
        free_text: false,
        doc: "Set history word limit - how many characters of history to include as context
History word limit plus response length must not exceed 4096",
    },
    CommandSpec {
        kind: CommandKind::ActiveModel,
        triggers: &["/model"],
        group: CommandGroup::Models,
        params: &[],
        free_text: false,
        doc: "Show the active model",
    },
    CommandSpec {
        kind: CommandKind::ListModels,
        triggers: &["/list_models"],
        group: CommandGroup::Models,
        params: &[],
        free_text: false,
        doc: "List the models offered by the completion endpoint
Most notable: text-davinci-003 is the strongest and most expensive.
Others make little sense for chat, try them with /query model=...",
    },
    CommandSpec {
        kind: CommandKind::GetModelInfo,
        triggers: &["/get_model_info"],
        group: CommandGroup::Models,
        params: &["model_id"],
        free_text: false,
        doc: "Show what the endpoint reports about a model",
    },
    CommandSpec {
        kind: CommandKind::SwitchModel,
        triggers: &["/switch_model", "/set_active_model"],
        group: CommandGroup::Models,
        params: &["model"],
        free_text: false,
        doc: "Switch the model used for chat
model: one of the ids from /list_models",
    },
    CommandSpec {
        kind: CommandKind::DescribeErrors,
        triggers: &["/error", "/describe_error"],
        group: CommandGroup::Dev,
        params: &["limit"],
        free_text: false,
        doc: "Describe the most recent errors
limit: number of errors to show, 1 by default",
    },
    CommandSpec {
        kind: CommandKind::RawQuery,
        triggers: &["/raw_query", "/query"],
        group: CommandGroup::Custom,
        params: QUERY_OVERRIDES,
        free_text: true,
        doc: "Send a query to the model as is, without any extra context
Leading model=, temperature= and max_tokens= override the session settings:
/query temperature=0 List three prime numbers",
    },
    CommandSpec {
        kind: CommandKind::Cheap,
        triggers: &["/cheap"],
        group: CommandGroup::Custom,
        params: QUERY_OVERRIDES,
        free_text: true,
        doc: "Send a query as is to the cheaper and simpler Curie model",
    },
    CommandSpec {
        kind: CommandKind::Edit,
        triggers: &["/edit"],
        group: CommandGroup::Custom,
        params: &["instruction", "model", "temperature", "max_tokens"],
        free_text: true,
        doc: "Modify text following an instruction
The first line is the instruction, the rest is the text to edit",
    },
    CommandSpec {
        kind: CommandKind::Question,
        triggers: &["/question"],
        group: CommandGroup::Custom,
        params: &[],
        free_text: true,
        doc: "Ask a question in a fresh topic named after it",
    },
    CommandSpec {
        kind: CommandKind::Chat,
        triggers: &["/chat"],
        group: CommandGroup::Custom,
        params: &[],
        free_text: true,
        doc: "Chat in the active topic, same as sending a plain message",
    },
];

/// Trigger lookup over [`COMMANDS`]
pub struct CommandRegistry {
    by_trigger: HashMap<&'static str, &'static CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::from_table(COMMANDS)
    }

    fn from_table(table: &'static [CommandSpec]) -> Self {
        let mut by_trigger = HashMap::new();
        for spec in table {
            for trigger in spec.triggers {
                if by_trigger.insert(*trigger, spec).is_some() {
                    tracing::warn!(trigger = %trigger, "Trigger registered twice, last one wins");
                }
            }
        }
        Self { by_trigger }
    }

    pub fn lookup(&self, trigger: &str) -> Option<&'static CommandSpec> {
        self.by_trigger.get(trigger).copied()
    }

    /// All triggers sorted by group, then alphabetically
    pub fn list_commands(&self) -> Vec<&'static str> {
        let mut triggers: Vec<(CommandGroup, &'static str)> = self
            .by_trigger
            .iter()
            .map(|(trigger, spec)| (spec.group, *trigger))
            .collect();
        triggers.sort_unstable();
        triggers.into_iter().map(|(_, trigger)| trigger).collect()
    }

    pub fn description(&self, trigger: &str) -> Option<&'static str> {
        self.lookup(trigger).map(CommandSpec::description)
    }

    /// (command without `/`, description) pairs for the bot command menu
    pub fn bot_commands(&self) -> Vec<(String, String)> {
        self.list_commands()
            .into_iter()
            .map(|trigger| {
                (
                    trigger.trim_start_matches('/').to_string(),
                    self.description(trigger).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
