#![allow(dead_code)]

use refinery::candidates::{self, CandidateId};
use refinery::config::Config;
use refinery::process::{CommandRunner, Invocation, OutputSink, ProcessOutput, Termination};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

pub const ORACLE: &str = "fake-oracle";
pub const MUTATOR: &str = "fake-mutator";

/// What the fake oracle does for one candidate.
#[derive(Debug, Clone)]
pub enum OracleScript {
    /// Print the solution file's content (the default).
    Echo,
    Print(String),
    Exit(i32),
    SpawnError,
}

/// What the fake mutator does for one candidate.
#[derive(Debug, Clone)]
pub enum MutatorScript {
    /// Print the current value plus this delta (the default is +1).
    Add(i64),
    /// Write some output, then exit with this status.
    Crash(i32),
    /// Exit cleanly without printing anything.
    Silent,
    TimeOut,
    SpawnError,
}

/// Scripted stand-in for the external oracle and mutator.
///
/// Solutions are plain integers, so the oracle's score is just the file's
/// content and the mutator "improves" a solution by adding to it.
#[derive(Default)]
pub struct ScriptedRunner {
    oracle: Mutex<HashMap<CandidateId, OracleScript>>,
    mutator: Mutex<HashMap<CandidateId, MutatorScript>>,
    pub oracle_calls: AtomicUsize,
    pub mutator_calls: Mutex<Vec<CandidateId>>,
    pub invocations: Mutex<Vec<Invocation>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub mutator_delay: Option<Duration>,
    oracle_in_flight: AtomicUsize,
    pub max_oracle_in_flight: AtomicUsize,
    pub oracle_delay: Option<Duration>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mutator_delay(delay: Duration) -> Self {
        Self {
            mutator_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_oracle_delay(delay: Duration) -> Self {
        Self {
            oracle_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script_oracle(&self, id: CandidateId, script: OracleScript) {
        self.oracle.lock().unwrap().insert(id, script);
    }

    pub fn script_mutator(&self, id: CandidateId, script: MutatorScript) {
        self.mutator.lock().unwrap().insert(id, script);
    }

    pub fn mutated(&self) -> Vec<CandidateId> {
        self.mutator_calls.lock().unwrap().clone()
    }

    fn run_oracle(&self, inv: &Invocation) -> std::io::Result<ProcessOutput> {
        self.oracle_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.oracle_delay {
            let now = self.oracle_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_oracle_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(delay);
            self.oracle_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        let solution = solution_arg(inv);
        let id = candidates::id_from_path(&solution, "json");
        let script = id
            .and_then(|id| self.oracle.lock().unwrap().get(&id).cloned())
            .unwrap_or(OracleScript::Echo);

        match script {
            OracleScript::Echo => {
                let stdout = fs::read(&solution)?;
                Ok(exited(0, stdout))
            }
            OracleScript::Print(text) => Ok(exited(0, text.into_bytes())),
            OracleScript::Exit(code) => Ok(exited(code, Vec::new())),
            OracleScript::SpawnError => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such oracle",
            )),
        }
    }

    fn run_mutator(&self, inv: &Invocation) -> std::io::Result<ProcessOutput> {
        let current = PathBuf::from(inv.args.last().expect("mutator needs a solution path"));
        let id = candidates::id_from_path(&current, "json").expect("canonical solution path");
        self.mutator_calls.lock().unwrap().push(id);

        let script = self
            .mutator
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or(MutatorScript::Add(1));

        if let MutatorScript::SpawnError = script {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mutator not executable",
            ));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.mutator_delay {
            std::thread::sleep(delay);
        }

        assert!(inv.stdin.as_ref().is_some_and(|p| p.exists()), "problem on stdin");
        let out = match &inv.stdout {
            OutputSink::File(path) => path.clone(),
            OutputSink::Capture => panic!("mutator output must go to a staging file"),
        };

        let current_value: i64 = fs::read_to_string(&current)?.trim().parse().unwrap_or(0);
        let result = match script {
            MutatorScript::Add(delta) => {
                fs::write(&out, format!("{}\n", current_value + delta))?;
                exited(0, Vec::new())
            }
            MutatorScript::Crash(code) => {
                fs::write(&out, "partial garb")?;
                exited(code, Vec::new())
            }
            MutatorScript::Silent => {
                fs::write(&out, "")?;
                exited(0, Vec::new())
            }
            MutatorScript::TimeOut => {
                fs::write(&out, "half")?;
                ProcessOutput {
                    termination: Termination::TimedOut(Duration::from_secs(1)),
                    stdout: Vec::new(),
                }
            }
            MutatorScript::SpawnError => unreachable!(),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(result)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        self.invocations.lock().unwrap().push(invocation.clone());
        match invocation.program.as_str() {
            ORACLE => self.run_oracle(invocation),
            MUTATOR => self.run_mutator(invocation),
            other => panic!("unexpected program {}", other),
        }
    }
}

fn exited(code: i32, stdout: Vec<u8>) -> ProcessOutput {
    ProcessOutput {
        termination: Termination::Exited(Some(code)),
        stdout,
    }
}

/// The oracle's solution argument sits after the problem argument and
/// before the optional skip-validate flag.
fn solution_arg(inv: &Invocation) -> PathBuf {
    let positional: Vec<&String> = inv.args.iter().filter(|a| !a.starts_with("--")).collect();
    PathBuf::from(positional[positional.len() - 1])
}

/// A scratch workspace with `problems/` and `solutions/` directories.
pub struct Workspace {
    pub dir: TempDir,
    pub problems: PathBuf,
    pub solutions: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let problems = dir.path().join("problems");
        let solutions = dir.path().join("solutions");
        fs::create_dir(&problems).unwrap();
        fs::create_dir(&solutions).unwrap();
        Self {
            dir,
            problems,
            solutions,
        }
    }

    /// Adds a candidate whose solution is the integer `score`.
    pub fn candidate(&self, id: CandidateId, score: i64) -> &Self {
        fs::write(self.problems.join(format!("{}.json", id)), format!("{{\"id\":{}}}", id)).unwrap();
        fs::write(self.solutions.join(format!("{}.json", id)), format!("{}\n", score)).unwrap();
        self
    }

    pub fn solution(&self, id: CandidateId) -> String {
        fs::read_to_string(self.solutions.join(format!("{}.json", id))).unwrap()
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.refine.problems_dir = self.problems.clone();
        config.refine.idle_backoff_ms = 0;
        config.refine.seed = Some(42);
        config.oracle.oracle_program = ORACLE.to_string();
        config.mutator.mutator_program = MUTATOR.to_string();
        config
    }

    pub fn leftovers(&self) -> Vec<PathBuf> {
        hidden_files(&self.solutions)
    }
}

pub fn hidden_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        })
        .collect()
}
