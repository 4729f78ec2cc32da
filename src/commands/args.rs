//! Slash-command detection and argument grammar
//!
//! `/label bug -"needs triage" "area/alerting"` adds `bug` and
//! `area/alerting` and removes `needs triage`.

use crate::error::{Error, Result};
use regex::Regex;

/// One argument of a `/label` or `/assign` comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArg {
    /// Label or login
    pub name: String,
    /// Whether the argument was prefixed with `-`
    pub remove: bool,
}

/// Regex matching `/name` or `\name` as a standalone word, case-insensitively
pub fn command_regex(name: &str) -> Result<Regex> {
    let pattern = format!(r"(?im)(?:^|\s)[/\\]({})(?:\s|$)", regex::escape(name));
    Regex::new(&pattern).map_err(|e| Error::Config(format!("invalid command name {name}: {e}")))
}

/// Text following the command on the same line, if the comment invokes it
pub fn command_arguments<'a>(re: &Regex, body: &'a str) -> Option<&'a str> {
    let name = re.captures(body)?.get(1)?;
    let rest = &body[name.end()..];
    Some(rest.split('\n').next().unwrap_or_default().trim())
}

/// Split an argument string into names
///
/// Whitespace delimits names. A leading `-` marks a removal and is consumed
/// before the name is read. A double-quoted name is taken verbatim up to the
/// closing quote, spaces included.
pub fn parse_args(input: &str) -> Vec<CommandArg> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let remove = chars.next_if_eq(&'-').is_some();
        let name: String = if chars.next_if_eq(&'"').is_some() {
            chars.by_ref().take_while(|c| *c != '"').collect()
        } else {
            let mut name = String::new();
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                name.push(c);
            }
            name
        };

        if !name.is_empty() {
            args.push(CommandArg { name, remove });
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(name: &str, remove: bool) -> CommandArg {
        CommandArg {
            name: name.to_string(),
            remove,
        }
    }

    #[test]
    fn test_parse_plain_and_removed() {
        assert_eq!(
            parse_args("bug -wontfix  type/docs"),
            vec![arg("bug", false), arg("wontfix", true), arg("type/docs", false)]
        );
    }

    #[test]
    fn test_parse_quoted() {
        assert_eq!(
            parse_args(r#""needs more info" -"help wanted" x"#),
            vec![
                arg("needs more info", false),
                arg("help wanted", true),
                arg("x", false)
            ]
        );
    }

    #[test]
    fn test_leading_dash_consumes_one_char() {
        assert_eq!(parse_args("--x"), vec![arg("-x", true)]);
        assert_eq!(parse_args("- bug"), vec![arg("bug", false)]);
        assert!(parse_args("   ").is_empty());
    }

    #[test]
    fn test_command_detection() {
        let re = command_regex("label").unwrap();
        assert!(re.is_match("/label bug"));
        assert!(re.is_match("Thanks!\n\\LABEL bug"));
        assert!(re.is_match("please /label"));
        assert!(!re.is_match("/labels bug"));
        assert!(!re.is_match("see https://x.dev/label"));
    }

    #[test]
    fn test_command_arguments_stop_at_line_end() {
        let re = command_regex("assign").unwrap();
        assert_eq!(
            command_arguments(&re, "hi\n/assign @octocat -@hubot\nthanks"),
            Some("@octocat -@hubot")
        );
        assert_eq!(command_arguments(&re, "/assign"), Some(""));
        assert_eq!(command_arguments(&re, "nothing"), None);
    }
}
