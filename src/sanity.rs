use nix::unistd::Uid;

use crate::constants::REQUIRED_COMMANDS;
use crate::utils::shell::in_path;

/// Device changes need an effective uid of 0
pub fn is_root() -> bool {
    Uid::effective().is_root()
}

/// Required tools that cannot be found in `PATH`
pub fn missing_commands() -> Vec<&'static str> {
    REQUIRED_COMMANDS
        .into_iter()
        .filter(|cmd| !in_path(cmd))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_commands_are_required() {
        for cmd in missing_commands() {
            assert!(REQUIRED_COMMANDS.contains(&cmd));
        }
    }
}
