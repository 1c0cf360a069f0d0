use crate::config::OracleParams;
use crate::error::OracleError;
use crate::process::{CommandRunner, Invocation, Termination};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SKIP_VALIDATE_FLAG: &str = "--skip-validate";

/// Client for the external scoring process.
///
/// The oracle is invoked as `<program> [args..] <problem> <solution>
/// [--skip-validate]` and must print exactly one integer. Higher is better
/// and negative values are allowed.
#[derive(Clone)]
pub struct ScoreOracle {
    runner: Arc<dyn CommandRunner>,
    program: String,
    args: Vec<String>,
    skip_validate: bool,
    timeout: Option<Duration>,
}

impl ScoreOracle {
    pub fn new(runner: Arc<dyn CommandRunner>, params: &OracleParams) -> Self {
        Self {
            runner,
            program: params.oracle_program.clone(),
            args: params.oracle_arg.clone(),
            skip_validate: params.skip_validate,
            timeout: params.oracle_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn score(&self, problem: &Path, solution: &Path) -> Result<i64, OracleError> {
        let mut invocation = Invocation::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(problem.to_string_lossy())
            .arg(solution.to_string_lossy())
            .timeout(self.timeout);
        if self.skip_validate {
            invocation = invocation.arg(SKIP_VALIDATE_FLAG);
        }

        let output = self
            .runner
            .run(&invocation)
            .map_err(OracleError::Spawn)?;

        match output.termination {
            Termination::Exited(Some(0)) => {}
            Termination::Exited(code) => return Err(OracleError::ExitStatus(code)),
            Termination::TimedOut(limit) => return Err(OracleError::TimedOut(limit)),
        }

        parse_score(&output.stdout)
    }

    /// Selection weight for a solution: its score floored at zero, with any
    /// oracle failure counting as zero for this round.
    pub fn weight(&self, problem: &Path, solution: &Path) -> u64 {
        weight_of(solution, self.score(problem, solution))
    }
}

/// Applies the weight policy to a score already obtained for `solution`.
pub fn weight_of(solution: &Path, score: Result<i64, OracleError>) -> u64 {
    match score {
        Ok(score) => {
            debug!("scored {}: {}", solution.display(), score);
            weight_from_score(score)
        }
        Err(e) => {
            warn!("⚠️  {}: {}", solution.display(), e);
            0
        }
    }
}

pub fn weight_from_score(score: i64) -> u64 {
    score.max(0) as u64
}

pub fn parse_score(stdout: &[u8]) -> Result<i64, OracleError> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    trimmed
        .parse()
        .map_err(|_| OracleError::Unparseable(trimmed.chars().take(80).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surrounding_whitespace() {
        assert_eq!(parse_score(b"  1234\n").unwrap(), 1234);
        assert_eq!(parse_score(b"-17\r\n").unwrap(), -17);
    }

    #[test]
    fn rejects_non_integers() {
        assert!(matches!(
            parse_score(b"12.5"),
            Err(OracleError::Unparseable(_))
        ));
        assert!(matches!(parse_score(b""), Err(OracleError::Unparseable(_))));
        assert!(matches!(
            parse_score(b"score: 10"),
            Err(OracleError::Unparseable(_))
        ));
    }

    #[test]
    fn oracle_errors_weigh_nothing() {
        let path = Path::new("7.json");
        assert_eq!(weight_of(path, Ok(12)), 12);
        assert_eq!(weight_of(path, Err(OracleError::ExitStatus(Some(1)))), 0);
        assert_eq!(weight_of(path, Err(OracleError::Unparseable("x".into()))), 0);
    }

    #[test]
    fn negative_scores_weigh_nothing() {
        assert_eq!(weight_from_score(-5), 0);
        assert_eq!(weight_from_score(0), 0);
        assert_eq!(weight_from_score(42), 42);
    }
}
