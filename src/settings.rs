use crate::Scenario;
use lexopt::prelude::*;
use pyslot_vm::Settings;
use std::ffi::OsString;

pub(crate) const USAGE: &str = "\
usage: pyslot [--cache-limit N] [--trace] [--hash-seed N] [--scenario NAME]

  --cache-limit N   distinct builtins a call site calls directly (default 3)
  --trace           log every dispatch decision (set RUST_LOG=trace to see it)
  --hash-seed N     seed of the str hash
  --scenario NAME   one of vec2, radd, len, hash, getattr, iter; all when omitted";

pub enum RunMode {
    Help,
    All,
    One(Scenario),
}

#[derive(Debug, thiserror::Error)]
pub enum ArgError {
    #[error(transparent)]
    Parse(#[from] lexopt::Error),
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
}

pub fn parse_opts() -> Result<(Settings, RunMode), ArgError> {
    parse_args(std::env::args_os().skip(1))
}

/// Parse command line arguments, without the program name.
pub(crate) fn parse_args<I>(args: I) -> Result<(Settings, RunMode), ArgError>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut settings = Settings::default();
    let mut mode = RunMode::All;
    let mut parser = lexopt::Parser::from_args(args);
    while let Some(arg) = parser.next()? {
        match arg {
            Long("cache-limit") => {
                settings = settings.with_inline_cache_limit(parser.value()?.parse()?);
            }
            Long("trace") => settings = settings.with_trace_dispatch(true),
            Long("hash-seed") => settings = settings.with_hash_seed(parser.value()?.parse()?),
            Long("scenario") => {
                let name = parser.value()?.string()?;
                let scenario = name
                    .parse::<Scenario>()
                    .map_err(|_| ArgError::UnknownScenario(name))?;
                mode = RunMode::One(scenario);
            }
            Short('h') | Long("help") => return Ok((settings, RunMode::Help)),
            _ => return Err(arg.unexpected().into()),
        }
    }
    Ok((settings, mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        let (settings, mode) =
            parse_args(["--cache-limit", "1", "--trace", "--scenario", "radd"]).unwrap();
        assert_eq!(settings.inline_cache_limit, 1);
        assert!(settings.trace_dispatch);
        assert!(matches!(mode, RunMode::One(Scenario::Radd)));
    }

    #[test]
    fn defaults_run_everything() {
        let (settings, mode) = parse_args(Vec::<&str>::new()).unwrap();
        assert_eq!(settings.inline_cache_limit, 3);
        assert!(matches!(mode, RunMode::All));
    }

    #[test]
    fn bad_input() {
        assert!(matches!(
            parse_args(["--scenario", "nope"]),
            Err(ArgError::UnknownScenario(name)) if name == "nope"
        ));
        assert!(matches!(
            parse_args(["--cache-limit", "many"]),
            Err(ArgError::Parse(_))
        ));
        assert!(matches!(parse_args(["--frobnicate"]), Err(ArgError::Parse(_))));
    }
}
