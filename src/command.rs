//! Builds the final argument vector for the agent process.

use crate::config::CommandSpec;

const MODEL_FLAGS: &[&str] = &["-m", "--model"];

/// Final argv for the agent command. The configured command is never
/// mutated; a model override is appended as `-m <model>` unless the
/// command already carries a model flag.
pub fn build_args(command: &CommandSpec, model: Option<&str>) -> Vec<String> {
    let mut args = match command {
        CommandSpec::Line(cmd) => vec![cmd.clone()],
        CommandSpec::Argv(argv) => argv.clone(),
    };
    if let Some(model) = model {
        if !args.iter().any(|arg| MODEL_FLAGS.contains(&arg.as_str())) {
            args.push("-m".to_string());
            args.push(model.to_string());
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> CommandSpec {
        CommandSpec::Argv(parts.iter().map(|part| part.to_string()).collect())
    }

    #[test]
    fn wraps_string_command() {
        let args = build_args(&CommandSpec::Line("codex".to_string()), None);
        assert_eq!(args, vec!["codex"]);
    }

    #[test]
    fn appends_model_flag() {
        let args = build_args(&CommandSpec::Line("codex".to_string()), Some("o3-mini"));
        assert_eq!(args, vec!["codex", "-m", "o3-mini"]);
    }

    #[test]
    fn keeps_existing_short_model_flag() {
        let command = argv(&["codex", "-m", "x"]);
        let args = build_args(&command, Some("o3-mini"));
        assert_eq!(args, vec!["codex", "-m", "x"]);
    }

    #[test]
    fn keeps_existing_long_model_flag() {
        let command = argv(&["codex", "--model", "x"]);
        let args = build_args(&command, Some("o3-mini"));
        assert_eq!(args, vec!["codex", "--model", "x"]);
    }

    #[test]
    fn copies_argv_without_model() {
        let command = argv(&["codex", "--full-auto"]);
        let args = build_args(&command, None);
        assert_eq!(args, vec!["codex", "--full-auto"]);
        // The configured vector is untouched.
        assert_eq!(command, argv(&["codex", "--full-auto"]));
    }
}
