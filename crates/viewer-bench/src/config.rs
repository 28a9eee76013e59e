use clap::Parser;
use core::time::Duration;
use viewer_bench::{Compression, Pacing, RunPlan};
use viewer_bench_core::Error;

/// Runtime configuration for the `viewer-bench` binary.
///
/// Every flag can also be supplied through the environment (or a `.env`
/// file). Values are validated in [`BenchConfig::try_from`] before any
/// connection is attempted.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "viewer-bench",
    version,
    about = "Spawns objects on a viewer, then repositions them over and over"
)]
pub struct CliArgs {
    /// Address of the object-management service (`host:port` or a URI).
    ///
    /// Environment variable: `TARGET`
    #[arg(long, env = "TARGET", default_value_t = String::from("localhost:50051"))]
    pub target: String,

    /// Delay before each `SpawnObjectSequence` RPC.
    ///
    /// Given alone (`--spawn-wait`) it uses the 500ms default; given as
    /// `--spawn-wait=<duration>` it uses that value (e.g. `200ms`, `1.5s`,
    /// `0`).
    ///
    /// Environment variable: `SPAWN_WAIT`
    #[arg(
        long,
        env = "SPAWN_WAIT",
        value_name = "DURATION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub spawn_wait: Option<String>,

    /// Delay before each `SetObjectPositionSequence` RPC. Same syntax as
    /// `--spawn-wait`.
    ///
    /// Environment variable: `SET_POSITION_WAIT`
    #[arg(
        long,
        env = "SET_POSITION_WAIT",
        value_name = "DURATION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub set_position_wait: Option<String>,

    /// Delay for both phases. A phase-specific flag takes precedence.
    ///
    /// Environment variable: `WAIT`
    #[arg(
        long,
        env = "WAIT",
        value_name = "DURATION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub wait: Option<String>,

    /// Number of objects per batch.
    ///
    /// Environment variable: `BATCH_WIDTH`
    #[arg(long, env = "BATCH_WIDTH", default_value_t = RunPlan::DEFAULT_BATCH_WIDTH)]
    pub batch_width: usize,

    /// Number of spawn batches (and of reposition batches per round).
    ///
    /// Environment variable: `CREATION_BATCHES`
    #[arg(long, env = "CREATION_BATCHES", default_value_t = RunPlan::DEFAULT_CREATION_BATCHES)]
    pub creation_batches: usize,

    /// Number of reposition rounds. `0` stops after the spawn phase.
    ///
    /// Environment variable: `ROUNDS`
    #[arg(long, env = "ROUNDS", default_value_t = RunPlan::DEFAULT_ROUNDS)]
    pub rounds: usize,

    /// Abort the run after this long (e.g. `10m`). Unset means no deadline.
    ///
    /// Environment variable: `DEADLINE`
    #[arg(long, env = "DEADLINE", value_name = "DURATION")]
    pub deadline: Option<String>,

    /// Compression for requests and responses.
    ///
    /// Environment variable: `COMPRESSION`
    #[arg(long, env = "COMPRESSION", value_enum, default_value_t = Compression::None)]
    pub compression: Compression,

    /// Seed for reproducible payloads. Unset draws from the thread RNG.
    ///
    /// Environment variable: `SEED`
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,
}

/// How a wait flag was supplied on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitFlag {
    Absent,
    Default,
    Explicit(Duration),
}

impl WaitFlag {
    /// `None` is an absent flag; a bare flag (or `true`) asks for the
    /// default; anything else must be a duration.
    pub fn parse(raw: Option<&str>) -> Result<Self, Error> {
        match raw.map(str::trim) {
            None => Ok(Self::Absent),
            Some("" | "true") => Ok(Self::Default),
            Some(value) => parse_duration(value).map(Self::Explicit),
        }
    }

    /// `self` unless it is absent, in which case `fallback`.
    pub const fn or(self, fallback: Self) -> Self {
        match self {
            Self::Absent => fallback,
            other => other,
        }
    }

    pub const fn resolve(self, default: Duration) -> Duration {
        match self {
            Self::Absent | Self::Default => default,
            Self::Explicit(duration) => duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub target: String,
    pub pacing: Pacing,
    pub plan: RunPlan,
    pub deadline: Option<Duration>,
    pub compression: Compression,
    pub seed: Option<u64>,
}

impl TryFrom<CliArgs> for BenchConfig {
    type Error = Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| Error::InvalidConfig {
            reason: reason.to_string(),
        };

        if args.target.trim().is_empty() {
            return Err(invalid("target must not be empty"));
        }
        if args.batch_width == 0 {
            return Err(invalid("batch width must be greater than 0"));
        }
        if args.creation_batches == 0 {
            return Err(invalid("creation batch count must be greater than 0"));
        }
        if args.batch_width.checked_mul(args.creation_batches).is_none() {
            return Err(invalid("batch width times creation batches overflows"));
        }

        let shared = WaitFlag::parse(args.wait.as_deref())?;
        let spawn = WaitFlag::parse(args.spawn_wait.as_deref())?.or(shared);
        let reposition = WaitFlag::parse(args.set_position_wait.as_deref())?.or(shared);
        let pacing = Pacing {
            spawn: spawn.resolve(Pacing::DEFAULT_WAIT),
            reposition: reposition.resolve(Pacing::DEFAULT_WAIT),
        };

        let deadline = args.deadline.as_deref().map(parse_duration).transpose()?;
        if deadline.is_some_and(|d| d.is_zero()) {
            return Err(invalid("deadline must be greater than 0"));
        }

        Ok(Self {
            target: args.target,
            pacing,
            plan: RunPlan {
                batch_width: args.batch_width,
                creation_batches: args.creation_batches,
                rounds: args.rounds,
            },
            deadline,
            compression: args.compression,
            seed: args.seed,
        })
    }
}

/// Parses a Go-style duration: one or more decimal numbers, each followed
/// by a unit (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`), e.g. `1h2m0.5s`. A bare
/// `0` is accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, Error> {
    let invalid = |what: &str| Error::InvalidConfig {
        reason: format!("{what} in duration {input:?}"),
    };

    let mut rest = input.trim();
    rest = rest.strip_prefix('+').unwrap_or(rest);
    if rest.starts_with('-') {
        return Err(invalid("negative value"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("missing value"));
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c| !is_number(c)).unwrap_or(rest.len()));
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(invalid("malformed number"));
        }
        let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;

        let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
        let scale = unit_nanos(unit).ok_or_else(|| invalid("missing or unknown unit"))?;

        nanos += value * scale;
        rest = tail;
    }

    #[allow(clippy::cast_precision_loss)]
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid("overflow"));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn unit_nanos(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1.0),
        "us" | "µs" | "μs" => Some(1e3),
        "ms" => Some(1e6),
        "s" => Some(1e9),
        "m" => Some(60e9),
        "h" => Some(3600e9),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<BenchConfig, Error> {
        let argv = std::iter::once("viewer-bench").chain(args.iter().copied());
        BenchConfig::try_from(CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn parses_go_style_durations() {
        assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in ["", "10", "ms", "1.2.3s", "5x", "-1s", "1s2", "false"] {
            let err = parse_duration(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig { .. }), "{bad:?} -> {err:?}");
        }
    }

    #[test]
    fn wait_flag_distinguishes_absent_bare_and_explicit() {
        assert_eq!(WaitFlag::parse(None).unwrap(), WaitFlag::Absent);
        assert_eq!(WaitFlag::parse(Some("true")).unwrap(), WaitFlag::Default);
        assert_eq!(
            WaitFlag::parse(Some("20ms")).unwrap(),
            WaitFlag::Explicit(Duration::from_millis(20))
        );
        assert_eq!(
            WaitFlag::Absent.resolve(Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn defaults_match_the_reference_run() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.target, "localhost:50051");
        assert_eq!(cfg.pacing, Pacing::default());
        assert_eq!(cfg.plan, RunPlan::default());
        assert_eq!(cfg.deadline, None);
        assert_eq!(cfg.compression, Compression::None);
    }

    #[test]
    fn bare_wait_flag_uses_default_and_valued_flag_overrides() {
        let cfg = config(&["--spawn-wait", "--set-position-wait=25ms"]).unwrap();
        assert_eq!(cfg.pacing.spawn, Pacing::DEFAULT_WAIT);
        assert_eq!(cfg.pacing.reposition, Duration::from_millis(25));
    }

    #[test]
    fn shared_wait_applies_unless_a_phase_flag_is_given() {
        let cfg = config(&["--wait=0", "--set-position-wait=1s"]).unwrap();
        assert_eq!(cfg.pacing.spawn, Duration::ZERO);
        assert_eq!(cfg.pacing.reposition, Duration::from_secs(1));
    }

    #[test]
    fn malformed_wait_is_a_config_error() {
        let err = config(&["--spawn-wait=soon"]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn zero_sized_plan_is_rejected() {
        assert!(config(&["--batch-width", "0"]).is_err());
        assert!(config(&["--creation-batches", "0"]).is_err());
        let cfg = config(&["--rounds", "0"]).unwrap();
        assert_eq!(cfg.plan.rounds, 0);
    }

    #[test]
    fn deadline_and_seed_are_parsed() {
        let cfg = config(&["--deadline", "10m", "--seed", "42", "--compression", "zstd"]).unwrap();
        assert_eq!(cfg.deadline, Some(Duration::from_secs(600)));
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.compression, Compression::Zstd);
    }
}
