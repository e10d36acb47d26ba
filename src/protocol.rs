//! Protocol parser: `verb:payload` commands on the control child's stdout,
//! one per line.

use tracing::warn;

/// A single parsed protocol command. Holds no state between records; a
/// record is everything needed to act on it.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// `exec:<path> <arg1> <arg2>...`; argv with collapsed whitespace and no
    /// leading/trailing empty tokens.
    Exec(Vec<String>),
    /// `print:<text>`; forwarded byte-for-byte (plus a trailing newline) to
    /// the supervisor's own stdout.
    Print(String),
}

/// Parses one line of control output. Malformed input (no `:`, or an unknown
/// verb) logs a warning and returns `None`; the caller does nothing further.
pub fn parse_line(line: &str) -> Option<Command> {
    let colon = match line.find(':') {
        Some(idx) => idx,
        None => {
            warn!(line, "control line has no verb separator; ignoring");
            return None;
        }
    };
    let verb = &line[..colon];
    let payload = &line[colon + 1..];
    match verb {
        "exec" => {
            let argv: Vec<String> = payload
                .split(' ')
                .filter(|tok| !tok.is_empty())
                .map(ToString::to_string)
                .collect();
            if argv.is_empty() {
                warn!(line, "exec command has empty argv; ignoring");
                return None;
            }
            Some(Command::Exec(argv))
        }
        "print" => Some(Command::Print(payload.to_string())),
        other => {
            warn!(verb = other, line, "unknown control verb; ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exec_with_collapsed_whitespace() {
        let cmd = parse_line("exec:/bin/echo   hello   world").unwrap();
        assert_eq!(
            cmd,
            Command::Exec(vec![
                "/bin/echo".to_string(),
                "hello".to_string(),
                "world".to_string()
            ])
        );
    }

    #[test]
    fn parses_print_payload_verbatim() {
        let cmd = parse_line("print:hi there").unwrap();
        assert_eq!(cmd, Command::Print("hi there".to_string()));
    }

    #[test]
    fn missing_colon_is_ignored() {
        assert_eq!(parse_line("wat"), None);
    }

    #[test]
    fn unknown_verb_is_ignored() {
        assert_eq!(parse_line("wat:whatever"), None);
    }

    #[test]
    fn print_preserves_embedded_colon() {
        let cmd = parse_line("print:a:b:c").unwrap();
        assert_eq!(cmd, Command::Print("a:b:c".to_string()));
    }
}
