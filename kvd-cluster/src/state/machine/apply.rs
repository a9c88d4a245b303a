//! Command application logic.

use crate::command::Command;

use super::state::KvState;
use super::types::KvResponse;

/// Apply a decoded command to the map.
///
/// Set overwrites unconditionally. Delete of an absent key leaves the map
/// unchanged.
pub fn apply_command(state: &mut KvState, command: Command) -> KvResponse {
    match command {
        Command::Set { key, value } => KvResponse::previous(state.values.insert(key, value)),
        Command::Delete { key } => KvResponse::previous(state.values.remove(&key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(commands: &[Command]) -> KvState {
        let mut state = KvState::default();
        for command in commands {
            apply_command(&mut state, command.clone());
        }
        state
    }

    #[test]
    fn set_upserts() {
        let state = fold(&[Command::set("a", "1"), Command::set("a", "2")]);
        assert_eq!(state.values.get("a").map(String::as_str), Some("2"));
        assert_eq!(state.values.len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let once = fold(&[Command::set("a", "1"), Command::delete("a")]);
        let twice = fold(&[
            Command::set("a", "1"),
            Command::delete("a"),
            Command::delete("a"),
        ]);
        assert_eq!(once.values, twice.values);
        assert!(once.values.is_empty());

        let absent = fold(&[Command::delete("missing")]);
        assert!(absent.values.is_empty());
    }

    #[test]
    fn same_commands_produce_same_map() {
        let commands = vec![
            Command::set("x", "1"),
            Command::set("y", "2"),
            Command::delete("x"),
            Command::set("z", "3"),
            Command::set("y", "4"),
        ];
        let a = fold(&commands);
        let b = fold(&commands);
        assert_eq!(a.values, b.values);
        assert_eq!(a.values.get("y").map(String::as_str), Some("4"));
        assert!(!a.values.contains_key("x"));
    }

    #[test]
    fn response_carries_previous_value() {
        let mut state = KvState::default();
        assert_eq!(
            apply_command(&mut state, Command::set("k", "v1")),
            KvResponse::previous(None)
        );
        assert_eq!(
            apply_command(&mut state, Command::set("k", "v2")).previous.as_deref(),
            Some("v1")
        );
        assert_eq!(
            apply_command(&mut state, Command::delete("k")).previous.as_deref(),
            Some("v2")
        );
    }
}
