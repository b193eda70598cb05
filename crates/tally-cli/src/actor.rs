//! Actor identity resolution for mutating commands.
//!
//! The resolution chain: `--actor` flag > `TALLY_ACTOR` env > user config
//! `actor` > `USER` env (TTY only). Every change event records the resolved
//! actor; read-only commands do not need one.

use std::env;

use crate::output::CliError;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

/// Real environment reader.
struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_actor_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(actor) = cli_flag.filter(|a| !a.trim().is_empty()) {
        return Some(actor.trim().to_string());
    }

    if let Some(val) = env.get("TALLY_ACTOR") {
        return Some(val);
    }

    if let Some(actor) = configured.filter(|a| !a.trim().is_empty()) {
        return Some(actor.trim().to_string());
    }

    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the actor, or fail with a structured error naming the sources
/// that were tried.
pub fn require_actor(cli_flag: Option<&str>, configured: Option<&str>) -> Result<String, CliError> {
    resolve_actor_with(cli_flag, configured, &RealEnv).ok_or_else(|| {
        CliError {
            message: "Actor identity required for this command.".to_string(),
            suggestion: Some(
                "Pass --actor, set TALLY_ACTOR, or add `actor = \"name\"` to the user config."
                    .to_string(),
            ),
            error_code: Some("missing_actor".to_string()),
        }
    })
}
