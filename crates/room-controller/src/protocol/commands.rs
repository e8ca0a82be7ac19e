//! Slash-command recognition.
//!
//! Room-event content starting with `/` is matched against a table of
//! command tokens. Matching is case-insensitive and token-exact: the
//! token must be followed by end-of-string or exactly one space, so
//! `/lookx` never matches LOOK. The trimmed remainder after the space is
//! the argument.
//!
//! The table is a runtime value rather than a fixed enumeration; the
//! default set covers this room's commands, and deployments can build a
//! different table without touching the dispatcher.

use crate::errors::RoomError;

/// A recognized slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlashCommand {
    Examine,
    Go,
    Help,
    Inventory,
    Look,
    Wink,
}

/// Table of slash-command tokens this room recognizes.
#[derive(Debug, Clone)]
pub struct SlashTable {
    /// Token (uppercase) to command. Order is match order.
    entries: Vec<(String, SlashCommand)>,
}

impl Default for SlashTable {
    /// The default table: EXAMINE, GO (with the EXIT alias), HELP,
    /// INVENTORY, LOOK and WINK.
    fn default() -> Self {
        Self::new()
            .with("EXAMINE", SlashCommand::Examine)
            .with("EXIT", SlashCommand::Go)
            .with("GO", SlashCommand::Go)
            .with("HELP", SlashCommand::Help)
            .with("INVENTORY", SlashCommand::Inventory)
            .with("LOOK", SlashCommand::Look)
            .with("WINK", SlashCommand::Wink)
    }
}

impl SlashTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a token to the table. Tokens are stored uppercase.
    #[must_use]
    pub fn with(mut self, token: &str, command: SlashCommand) -> Self {
        self.entries.push((token.to_ascii_uppercase(), command));
        self
    }

    /// The recognized tokens, as typed by players (`/lowercase`).
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(token, _)| format!("/{}", token.to_ascii_lowercase()))
            .collect()
    }

    /// Parse slash-command content into a command and its argument.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Content` when the content is too short, lacks
    /// the leading slash, or matches no table entry at a token boundary.
    pub fn parse<'a>(&self, content: &'a str) -> Result<(SlashCommand, &'a str), RoomError> {
        let rest = content
            .strip_prefix('/')
            .ok_or_else(|| RoomError::Content("missing leading slash".to_string()))?;
        if rest.is_empty() {
            return Err(RoomError::Content(
                "command is shorter than the minimum length".to_string(),
            ));
        }

        for (token, command) in &self.entries {
            let Some(head) = rest.get(..token.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(token) {
                continue;
            }
            let tail = rest.get(token.len()..).unwrap_or("");
            // Exact match, or the token followed by one space and an
            // argument. Anything else is a different word.
            if tail.is_empty() {
                return Ok((*command, ""));
            }
            if let Some(after_space) = tail.strip_prefix(' ') {
                return Ok((*command, after_space.trim_matches(' ')));
            }
        }

        Err(RoomError::Content(format!(
            "unrecognized command in '{content}'"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_command_has_empty_argument() {
        let table = SlashTable::default();
        assert_eq!(table.parse("/look").unwrap(), (SlashCommand::Look, ""));
    }

    #[test]
    fn test_command_with_argument() {
        let table = SlashTable::default();
        assert_eq!(table.parse("/go north").unwrap(), (SlashCommand::Go, "north"));
    }

    #[test]
    fn test_exit_is_an_alias_for_go() {
        let table = SlashTable::default();
        assert_eq!(table.parse("/exit south").unwrap(), (SlashCommand::Go, "south"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let table = SlashTable::default();
        assert_eq!(table.parse("/LOOK").unwrap(), (SlashCommand::Look, ""));
        assert_eq!(table.parse("/Go North").unwrap(), (SlashCommand::Go, "North"));
    }

    #[test]
    fn test_token_boundary_is_required() {
        let table = SlashTable::default();
        // "/lookatme" and "/lookx" must not match LOOK.
        assert!(matches!(
            table.parse("/lookatme"),
            Err(RoomError::Content(_))
        ));
        assert!(matches!(table.parse("/lookx"), Err(RoomError::Content(_))));
    }

    #[test]
    fn test_argument_is_trimmed_but_case_preserved() {
        let table = SlashTable::default();
        assert_eq!(
            table.parse("/examine  The Vase ").unwrap(),
            (SlashCommand::Examine, "The Vase")
        );
    }

    #[test]
    fn test_unrecognized_token_is_rejected() {
        let table = SlashTable::default();
        assert!(matches!(table.parse("/dance"), Err(RoomError::Content(_))));
    }

    #[test]
    fn test_too_short_and_missing_slash_are_rejected() {
        let table = SlashTable::default();
        assert!(matches!(table.parse("/"), Err(RoomError::Content(_))));
        assert!(matches!(table.parse("look"), Err(RoomError::Content(_))));
    }

    #[test]
    fn test_table_is_configurable() {
        let table = SlashTable::new().with("DANCE", SlashCommand::Wink);
        assert_eq!(table.parse("/dance").unwrap(), (SlashCommand::Wink, ""));
        // The default commands are absent from a custom table.
        assert!(table.parse("/look").is_err());
    }

    #[test]
    fn test_tokens_render_as_typed() {
        let table = SlashTable::new()
            .with("GO", SlashCommand::Go)
            .with("LOOK", SlashCommand::Look);
        assert_eq!(table.tokens(), vec!["/go".to_string(), "/look".to_string()]);
    }
}
