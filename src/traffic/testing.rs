//! In-memory remote target for tests
//!
//! Simulates a process table and understands the launch, lookup and
//! termination commands endpoints issue. Every command is recorded, per
//! target and optionally in a journal shared between targets.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::endpoint::exact_pattern;
use super::error::{CommandExecutionError, NO_PROCESS_MATCHED};
use super::executor::RemoteExecutor;

/// Commands issued across several targets, in order: (target, command)
pub type Journal = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Default)]
struct State {
    processes: Vec<String>,
    commands: Vec<String>,
    timeouts: Vec<Duration>,
    failing_prefixes: Vec<String>,
    launches_die: bool,
}

pub struct FakeTarget {
    name: String,
    state: Mutex<State>,
    journal: Journal,
}

impl FakeTarget {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_journal(name, &Journal::default())
    }

    pub fn with_journal(name: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            state: Mutex::new(State::default()),
            journal: journal.clone(),
        })
    }

    /// Start a process out of band
    pub fn spawn(&self, command: &str) {
        self.state.lock().unwrap().processes.push(command.to_string());
    }

    /// Kill every process out of band
    pub fn kill_all(&self) {
        self.state.lock().unwrap().processes.clear();
    }

    /// Fail every command starting with `prefix` (exit code 2)
    pub fn fail_on(&self, prefix: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_prefixes
            .push(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing_prefixes.clear();
    }

    /// Launches succeed but the process exits immediately
    pub fn launches_die(&self, die: bool) {
        self.state.lock().unwrap().launches_die = die;
    }

    pub fn processes(&self) -> Vec<String> {
        self.state.lock().unwrap().processes.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Timeout passed with each command, in issue order
    pub fn timeouts(&self) -> Vec<Duration> {
        self.state.lock().unwrap().timeouts.clone()
    }

    /// Commands issued to this target starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn failure(&self, command: &str, code: i32) -> CommandExecutionError {
        CommandExecutionError::Failed {
            target: self.name.clone(),
            command: command.to_string(),
            exit_code: Some(code),
            stderr: String::new(),
        }
    }

    fn simulate(&self, state: &mut State, command: &str) -> Result<(), CommandExecutionError> {
        if state
            .failing_prefixes
            .iter()
            .any(|p| command.starts_with(p.as_str()))
        {
            return Err(self.failure(command, 2));
        }

        if let Some(rest) = command.strip_prefix("nohup ") {
            let process = rest.trim_end_matches(" >/dev/null 2>&1 &");
            if !state.launches_die {
                state.processes.push(process.to_string());
            }
            return Ok(());
        }

        if let Some(pattern) = command.strip_prefix("pgrep -ofAx ") {
            return if state.processes.iter().any(|p| exact_pattern(p) == pattern) {
                Ok(())
            } else {
                Err(self.failure(command, NO_PROCESS_MATCHED))
            };
        }

        let before = state.processes.len();
        if let Some(pattern) = command.strip_prefix("pkill -x -f ") {
            state.processes.retain(|p| exact_pattern(p) != pattern);
        } else if let Some(binary) = command.strip_prefix("pkill -x ") {
            let binary = binary.trim_matches('\'');
            state
                .processes
                .retain(|p| p.split_whitespace().next() != Some(binary));
        } else {
            if command.ends_with(" --daemon") && !state.launches_die {
                state.processes.push(command.to_string());
            }
            return Ok(());
        }

        if state.processes.len() == before {
            Err(self.failure(command, NO_PROCESS_MATCHED))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteExecutor for FakeTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<(), CommandExecutionError> {
        let mut state = self.state.lock().unwrap();
        for command in commands {
            state.commands.push(command.clone());
            state.timeouts.push(timeout);
            self.journal
                .lock()
                .unwrap()
                .push((self.name.clone(), command.clone()));
            self.simulate(&mut state, command)?;
        }
        Ok(())
    }
}
