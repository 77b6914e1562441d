/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home", "today"],
    description: "Today at a glance",
  },
  Command {
    name: "plan",
    aliases: &["p", "tasks", "habits"],
    description: "Task board and habits",
  },
  Command {
    name: "health",
    aliases: &["h", "meals", "sleep"],
    description: "Meals, macros and sleep",
  },
  Command {
    name: "relationships",
    aliases: &["r", "contacts", "people"],
    description: "Contacts and nurture cycles",
  },
  Command {
    name: "skin",
    aliases: &["sk", "skincare"],
    description: "Products, routines and logs",
  },
  Command {
    name: "bible",
    aliases: &["b", "readings"],
    description: "Reading plans and reflections",
  },
  Command {
    name: "settings",
    aliases: &["s", "prefs"],
    description: "Settings and profile",
  },
  Command {
    name: "review",
    aliases: &["weekly"],
    description: "Run the weekly review",
  },
  Command {
    name: "reload",
    aliases: &["refresh"],
    description: "Drop cached data and refetch",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit lifeos",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority; stable, so table order breaks ties
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("plan");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "plan");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("contacts");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "relationships");
  }

  #[test]
  fn test_exact_name_beats_prefix() {
    // "skin" is a name; "skincare" only shares the prefix
    let suggestions = get_suggestions("skin");
    assert_eq!(suggestions[0].name, "skin");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("rel");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "relationships");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("ship");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "relationships");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }
}
