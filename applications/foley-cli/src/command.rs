//! Interactive command syntax

use foley_core::GroupId;
use std::fmt;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Trigger a group (toggles long-running variants)
    Trigger(GroupId),
    /// Stop every instance of a group
    Stop(GroupId),
    /// Stop everything
    StopAll,
    /// Set a group's level in `0..=1`
    Volume(GroupId, f32),
    /// Switch reverb routing for new sounds
    Cave(bool),
    /// List groups and what is playing
    List,
    /// Leave the loop
    Quit,
}

/// Why a line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

fn usage(msg: &str) -> ParseError {
    ParseError(msg.to_string())
}

impl Command {
    /// Parse one line; `None` for blank lines
    pub fn parse(line: &str) -> Option<Result<Self, ParseError>> {
        let mut words = line.split_whitespace();
        let first = words.next()?;
        let rest: Vec<&str> = words.collect();

        let command = match (first, rest.as_slice()) {
            ("quit" | "exit", []) => Ok(Self::Quit),
            ("list" | "ls", []) => Ok(Self::List),
            ("stop-all", []) => Ok(Self::StopAll),
            ("stop", [group]) => Ok(Self::Stop(GroupId::new(*group))),
            ("stop", _) => Err(usage("usage: stop <group>")),
            ("cave", ["on"]) => Ok(Self::Cave(true)),
            ("cave", ["off"]) => Ok(Self::Cave(false)),
            ("cave", _) => Err(usage("usage: cave on|off")),
            ("volume", [group, level]) => match level.parse::<f32>() {
                Ok(level) if (0.0..=1.0).contains(&level) => {
                    Ok(Self::Volume(GroupId::new(*group), level))
                }
                _ => Err(usage("volume level must be a number between 0 and 1")),
            },
            ("volume", _) => Err(usage("usage: volume <group> <0..1>")),
            (group, []) => Ok(Self::Trigger(GroupId::new(group))),
            _ => Err(usage("unknown command")),
        };
        Some(command)
    }
}
