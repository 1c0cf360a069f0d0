use crate::error::{RefineError, RfResult};
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub refine: RefineParams,
    #[command(flatten)]
    pub oracle: OracleParams,
    #[command(flatten)]
    pub mutator: MutatorParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Directory holding one problem definition per candidate id
    #[arg(long, default_value = "problems")]
    pub problems_dir: PathBuf,

    /// File extension shared by problem and solution files
    #[arg(long, default_value = "json")]
    pub extension: String,

    /// Parallel mutators per round (defaults to available parallelism)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Stop after this many rounds instead of running until interrupted
    #[arg(long = "rounds")]
    pub max_rounds: Option<usize>,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Pause before rescoring when a round had nothing to dispatch
    #[arg(long, default_value_t = 1000)]
    pub idle_backoff_ms: u64,

    /// Score mutator output and only commit it if it is at least as good
    #[arg(long = "verify", default_value_t = false)]
    pub verify_before_commit: bool,

    /// Append one CSV row per worker outcome to this file
    #[arg(long)]
    pub history: Option<PathBuf>,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            problems_dir: PathBuf::from("problems"),
            extension: "json".to_string(),
            jobs: None,
            max_rounds: None,
            seed: None,
            idle_backoff_ms: 1000,
            verify_before_commit: false,
            history: None,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleParams {
    #[arg(long, default_value = "./score")]
    pub oracle_program: String,

    /// Leading argument for the oracle, repeatable
    #[arg(long, allow_hyphen_values = true)]
    pub oracle_arg: Vec<String>,

    /// Ask the oracle to skip constraint validation
    #[arg(long, default_value_t = false)]
    pub skip_validate: bool,

    #[arg(long)]
    pub oracle_timeout_secs: Option<u64>,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            oracle_program: "./score".to_string(),
            oracle_arg: Vec::new(),
            skip_validate: false,
            oracle_timeout_secs: None,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutatorParams {
    #[arg(long, default_value = "./iterate")]
    pub mutator_program: String,

    /// Leading argument for the mutator, repeatable
    #[arg(long, allow_hyphen_values = true)]
    pub mutator_arg: Vec<String>,

    #[arg(long)]
    pub mutator_timeout_secs: Option<u64>,
}

impl Default for MutatorParams {
    fn default() -> Self {
        Self {
            mutator_program: "./iterate".to_string(),
            mutator_arg: Vec::new(),
            mutator_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Overlays every value the user typed on the command line onto `self`.
    /// Values that only came from clap defaults leave `self` untouched.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(refine.problems_dir);
        update_if_present!(refine.extension);
        update_if_present!(refine.jobs);
        update_if_present!(refine.max_rounds);
        update_if_present!(refine.seed);
        update_if_present!(refine.idle_backoff_ms);
        update_if_present!(refine.verify_before_commit);
        update_if_present!(refine.history);

        update_if_present!(oracle.oracle_program);
        update_if_present!(oracle.oracle_arg);
        update_if_present!(oracle.skip_validate);
        update_if_present!(oracle.oracle_timeout_secs);

        update_if_present!(mutator.mutator_program);
        update_if_present!(mutator.mutator_arg);
        update_if_present!(mutator.mutator_timeout_secs);
    }

    pub fn validate(&self) -> RfResult<()> {
        if self.refine.extension.is_empty() || self.refine.extension.contains('/') {
            return Err(RefineError::Config(format!(
                "invalid extension '{}'",
                self.refine.extension
            )));
        }
        if self.refine.jobs == Some(0) {
            return Err(RefineError::Config("--jobs must be at least 1".into()));
        }
        if self.oracle.oracle_program.is_empty() {
            return Err(RefineError::Config("oracle program is empty".into()));
        }
        if self.mutator.mutator_program.is_empty() {
            return Err(RefineError::Config("mutator program is empty".into()));
        }
        Ok(())
    }
}

impl RefineParams {
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn problem_path(&self, id: crate::candidates::CandidateId) -> PathBuf {
        self.problems_dir
            .join(crate::candidates::file_name(id, &self.extension))
    }
}
