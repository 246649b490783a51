//! In-memory [`CommandRunner`] for tests: scripted responses and a call log.

use std::sync::Mutex;

use crate::command::{CommandOutput, CommandRunner, ToolCommand};
use crate::error::{LimaError, Result};

type Matcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&ToolCommand) -> Result<CommandOutput> + Send + Sync>;

struct Rule {
    matcher: Matcher,
    responder: Responder,
    remaining: Option<usize>,
}

/// Rules are tried in registration order. A rule registered with `once` answers a single
/// call and is then skipped, which lets a test script a status that changes over time.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Vec<String>>>,
}

fn exact(argv: &[&str]) -> Matcher {
    let expected: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    Box::new(move |actual| actual == expected.as_slice())
}

fn prefix(argv: &[&str]) -> Matcher {
    let expected: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    Box::new(move |actual| actual.starts_with(&expected))
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, matcher: Matcher, responder: Responder, remaining: Option<usize>) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            matcher,
            responder,
            remaining,
        });
        self
    }

    /// Answer every call whose argv equals `argv` (program included).
    pub fn on(&self, argv: &[&str], output: CommandOutput) -> &Self {
        self.push(exact(argv), Box::new(move |_| Ok(output.clone())), None)
    }

    /// Answer the next call whose argv equals `argv`, once.
    pub fn once(&self, argv: &[&str], output: CommandOutput) -> &Self {
        self.push(exact(argv), Box::new(move |_| Ok(output.clone())), Some(1))
    }

    /// Answer every call whose argv starts with `argv` using `respond`.
    pub fn on_prefix<F>(&self, argv: &[&str], respond: F) -> &Self
    where
        F: Fn(&ToolCommand) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        self.push(prefix(argv), Box::new(respond), None)
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose argv equals `argv`.
    pub fn count(&self, argv: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.iter().map(String::as_str).eq(argv.iter().copied()))
            .count()
    }

    /// Number of recorded calls whose argv starts with `argv`.
    pub fn count_prefix(&self, argv: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                call.len() >= argv.len() && call.iter().zip(argv).all(|(a, b)| a == b)
            })
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let argv = command.argv();
        self.calls.lock().unwrap().push(argv.clone());

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|rule| rule.remaining != Some(0) && (rule.matcher)(&argv))
            .ok_or_else(|| {
                LimaError::Command(format!("unexpected command: {}", command.command_line()))
            })?;

        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        (rule.responder)(command)
    }
}
