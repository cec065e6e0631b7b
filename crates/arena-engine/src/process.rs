//! Out-of-process strategies
//!
//! A strategy can live in any executable that speaks a line protocol on
//! stdin/stdout. The engine writes one JSON request per turn:
//!
//! ```text
//! {"v":1,"own":"1101","opponent":"1110"}
//! ```
//!
//! and expects one reply line that is boolean-like: `1`/`0`, `true`/`false`,
//! `c`/`d` or `cooperate`/`defect` (case-insensitive). Anything else is a
//! fault. One child process is spawned per match and killed when the
//! instance is dropped or abandoned.
//!
//! Before the first turn the engine sends a greeting and waits for any
//! reply line, so interpreter startup is not charged to the first move:
//!
//! ```text
//! {"v":1,"hello":true}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strategy::{encode_history, Decision, KillSwitch, Strategy};

/// Version carried in every request line
pub const PROTOCOL_VERSION: u32 = 1;

/// How to launch an external strategy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child; usually the definition file's folder
    pub dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Build from an argv-style list; the first element is the program
    pub fn from_argv(argv: &[String], dir: Option<PathBuf>) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            dir,
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Serialize)]
struct TurnRequest {
    v: u32,
    own: String,
    opponent: String,
}

#[derive(Serialize)]
struct Greeting {
    v: u32,
    hello: bool,
}

/// Parse one reply line into a decision
pub fn parse_reply(line: &str) -> anyhow::Result<Decision> {
    match line.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "c" | "cooperate" => Ok(Decision::Cooperate),
        "0" | "false" | "d" | "defect" => Ok(Decision::Defect),
        other => Err(anyhow!("reply {:?} is not a decision", other)),
    }
}

/// A running child process answering one match
pub struct ProcessStrategy {
    child: Arc<Mutex<Child>>,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl ProcessStrategy {
    pub fn spawn(spec: &CommandSpec) -> anyhow::Result<Self> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &spec.dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", spec.display()))?;
        let stdin = child.stdin.take().context("child has no stdin")?;
        let stdout = child.stdout.take().context("child has no stdout")?;
        debug!(pid = child.id(), command = %spec.display(), "spawned strategy process");

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }

    /// Write one request line and read one reply line
    fn exchange(&mut self, request: &impl Serialize) -> anyhow::Result<&str> {
        serde_json::to_writer(&mut self.stdin, request)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush().context("strategy process closed its input")?;

        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            bail!("strategy process exited before replying");
        }
        Ok(&self.line)
    }
}

impl Strategy for ProcessStrategy {
    fn prepare(&mut self) -> anyhow::Result<()> {
        let greeting = Greeting {
            v: PROTOCOL_VERSION,
            hello: true,
        };
        self.exchange(&greeting).context("no answer to greeting")?;
        Ok(())
    }

    fn decide(&mut self, own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision> {
        let request = TurnRequest {
            v: PROTOCOL_VERSION,
            own: encode_history(own),
            opponent: encode_history(opponent),
        };
        let reply = self.exchange(&request)?;
        parse_reply(reply)
    }

    fn kill_switch(&self) -> Option<KillSwitch> {
        let child = Arc::clone(&self.child);
        Some(KillSwitch::new(move || {
            if let Ok(mut child) = child.lock() {
                let _ = child.kill();
            }
        }))
    }
}

impl Drop for ProcessStrategy {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        assert_eq!(parse_reply("1\n").unwrap(), Decision::Cooperate);
        assert_eq!(parse_reply("TRUE").unwrap(), Decision::Cooperate);
        assert_eq!(parse_reply(" cooperate ").unwrap(), Decision::Cooperate);
        assert_eq!(parse_reply("0").unwrap(), Decision::Defect);
        assert_eq!(parse_reply("D").unwrap(), Decision::Defect);
        assert_eq!(parse_reply("false\r\n").unwrap(), Decision::Defect);
        assert!(parse_reply("maybe").is_err());
        assert!(parse_reply("").is_err());
        assert!(parse_reply("2").is_err());
    }

    #[test]
    fn test_command_spec_from_argv() {
        let argv = vec!["python3".to_string(), "bot.py".to_string()];
        let spec = CommandSpec::from_argv(&argv, None).unwrap();
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["bot.py".to_string()]);
        assert_eq!(spec.display(), "python3 bot.py");
        assert!(CommandSpec::from_argv(&[], None).is_none());
    }

    #[test]
    fn test_request_line_shape() {
        let request = TurnRequest {
            v: PROTOCOL_VERSION,
            own: encode_history(&[Decision::Cooperate, Decision::Defect]),
            opponent: encode_history(&[Decision::Defect, Decision::Defect]),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"v":1,"own":"10","opponent":"00"}"#
        );
    }

    #[cfg(unix)]
    fn shell(script: &str) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            dir: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_process_round_trip() {
        // Cooperate on the first turn, defect afterwards
        let spec = shell(r#"while read line; do case "$line" in *'"own":""'*) echo 1;; *) echo defect;; esac; done"#);
        let mut strategy = ProcessStrategy::spawn(&spec).unwrap();
        assert_eq!(strategy.decide(&[], &[]).unwrap(), Decision::Cooperate);
        assert_eq!(
            strategy.decide(&[Decision::Cooperate], &[Decision::Cooperate]).unwrap(),
            Decision::Defect
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_greeting_reply_is_consumed() {
        let spec = shell(r#"read hello; echo "ready"; while read line; do echo 0; done"#);
        let mut strategy = ProcessStrategy::spawn(&spec).unwrap();
        strategy.prepare().unwrap();
        assert_eq!(strategy.decide(&[], &[]).unwrap(), Decision::Defect);
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_exit_fails_greeting() {
        let spec = shell("read hello; exit 0");
        let mut strategy = ProcessStrategy::spawn(&spec).unwrap();
        assert!(strategy.prepare().is_err());
    }

    #[test]
    fn test_greeting_line_shape() {
        let greeting = Greeting {
            v: PROTOCOL_VERSION,
            hello: true,
        };
        assert_eq!(serde_json::to_string(&greeting).unwrap(), r#"{"v":1,"hello":true}"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_garbage_reply_is_error() {
        let spec = shell("while read line; do echo banana; done");
        let mut strategy = ProcessStrategy::spawn(&spec).unwrap();
        assert!(strategy.decide(&[], &[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_exit_is_error() {
        let spec = shell("read line; exit 0");
        let mut strategy = ProcessStrategy::spawn(&spec).unwrap();
        assert!(strategy.decide(&[], &[]).is_err());
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let spec = CommandSpec {
            program: "definitely-not-a-real-program-4821".to_string(),
            args: vec![],
            dir: None,
        };
        assert!(ProcessStrategy::spawn(&spec).is_err());
    }
}
