//! Command line parsing: `/cmd a b k=v`

/// A slash command split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Trigger with the leading `/` and without any `@botname` suffix
    pub trigger: String,
    pub args: Vec<String>,
    pub kwargs: Vec<(String, String)>,
    /// Everything after the trigger, with leading whitespace removed
    pub rest: String,
}

/// Parse `text` as a command; `None` when it does not start with `/`.
///
/// Tokens are split on whitespace. A token containing `=` becomes a keyword
/// argument, split at the first `=`; every other token is positional.
pub fn parse_query(text: &str) -> Option<ParsedCommand> {
    let text = text.trim_start();
    if !text.starts_with('/') {
        return None;
    }

    let (head, rest) = text
        .split_once(char::is_whitespace)
        .map_or((text, ""), |(head, rest)| (head, rest.trim_start()));
    // Group chats address commands as /cmd@botname
    let trigger = head.split_once('@').map_or(head, |(t, _)| t);

    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    for token in rest.split_whitespace() {
        match token.split_once('=') {
            Some((key, value)) => kwargs.push((key.to_string(), value.to_string())),
            None => args.push(token.to_string()),
        }
    }

    Some(ParsedCommand {
        trigger: trigger.to_string(),
        args,
        kwargs,
        rest: rest.to_string(),
    })
}

/// Peel leading `key=value` tokens whose key is in `allowed` off `text`.
///
/// Returns the overrides and the untouched remainder, which starts at the
/// first token that is not an allowed override.
pub fn split_leading_overrides<'a>(
    text: &'a str,
    allowed: &[&str],
) -> (Vec<(&'a str, &'a str)>, &'a str) {
    let mut overrides = Vec::new();
    let mut remaining = text.trim_start();

    loop {
        let (token, after) = remaining
            .split_once(char::is_whitespace)
            .unwrap_or((remaining, ""));
        match token.split_once('=') {
            Some((key, value)) if allowed.contains(&key) => {
                overrides.push((key, value));
                remaining = after.trim_start();
            }
            _ => break,
        }
    }

    (overrides, remaining)
}
