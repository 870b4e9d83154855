//! Command line assembly.

use crate::LaunchError;

/// Join `cmd` and its parameters into one shell command line.
///
/// Parameters are shell-quoted; the command itself is trusted and passed
/// through as written.
pub fn command_line<S: AsRef<str>>(cmd: &str, params: &[S]) -> Result<String, LaunchError> {
    let cmd = cmd.trim();
    if cmd.is_empty() {
        return Err(LaunchError::InvalidCommand("command must not be empty".into()));
    }

    let mut line = cmd.to_string();
    for param in params {
        let quoted = shlex::try_quote(param.as_ref())
            .map_err(|e| LaunchError::InvalidCommand(e.to_string()))?;
        line.push(' ');
        line.push_str(&quoted);
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn plain_params_pass_through() {
        assert_eq!(command_line("./sample.sh", &["1"]).unwrap(), "./sample.sh 1");
        assert_eq!(command_line("uptime", &[] as &[&str]).unwrap(), "uptime");
    }

    #[test]
    fn metacharacters_in_params_are_quoted() {
        let params = ["a b", "$(rm -rf ~)", "it's", ""];
        let line = command_line("echo", &params).unwrap();
        assert!(line.starts_with("echo "));
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["echo", "a b", "$(rm -rf ~)", "it's", ""]
        );
    }

    #[test]
    fn rejects_empty_command_and_nul_bytes() {
        assert_matches!(
            command_line("  ", &["x"]),
            Err(LaunchError::InvalidCommand(_))
        );
        assert_matches!(
            command_line("echo", &["a\0b"]),
            Err(LaunchError::InvalidCommand(_))
        );
    }
}
