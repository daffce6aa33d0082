//! Command palette entries and autocomplete

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Check,
  History,
  ClearResult,
  ClearHistory,
  Timezone,
  Install,
  Refresh,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "check",
    aliases: &["c", "lookup"],
    description: "Look up a receipt number",
    action: Action::Check,
  },
  Command {
    name: "history",
    aliases: &["h", "saved"],
    description: "Browse saved cases",
    action: Action::History,
  },
  Command {
    name: "clear",
    aliases: &["x"],
    description: "Clear the displayed result",
    action: Action::ClearResult,
  },
  Command {
    name: "forget",
    aliases: &["clear-history"],
    description: "Delete all saved cases",
    action: Action::ClearHistory,
  },
  Command {
    name: "timezone",
    aliases: &["t", "tz"],
    description: "Switch display timezone",
    action: Action::Timezone,
  },
  Command {
    name: "install",
    aliases: &["i", "offline"],
    description: "Keep an offline copy of the web shell",
    action: Action::Install,
  },
  Command {
    name: "refresh",
    aliases: &["r", "auth"],
    description: "Re-check the login session",
    action: Action::Refresh,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit casewatch",
    action: Action::Quit,
  },
];

/// How well a command matches the typed input; lower ranks first
fn match_rank(cmd: &Command, input: &str) -> Option<u32> {
  let aliases = || cmd.aliases.iter();

  if cmd.name == input {
    Some(0)
  } else if aliases().any(|a| *a == input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if aliases().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if aliases().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();

  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input).map(|rank| (cmd, rank)))
    .collect();

  // Stable sort keeps declaration order within a rank
  matches.sort_by_key(|(_, rank)| *rank);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
