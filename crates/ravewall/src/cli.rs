use std::path::PathBuf;

use clap::Parser;
use vizconfig::RotationPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "ravewall",
    author,
    version,
    about = "Full-screen generative visualizer that rotates feedback scenes",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Path to a TOML configuration file; built-in defaults apply without one.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the window resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Override the redraw cadence cap (0 = uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Override the scene switch interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<f32>,

    /// Rotation policy: `occurrence-fair` (default) or `time-sliced`.
    #[arg(long, value_name = "POLICY", value_parser = parse_policy)]
    pub policy: Option<RotationPolicy>,

    /// Override the feedback buffer render scale.
    #[arg(long, value_name = "SCALE")]
    pub scale: Option<f32>,

    /// Seed the occurrence-fair rotation RNG for reproducible runs.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Print the discovered scene order and exit.
    #[arg(long)]
    pub list_scenes: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_policy(raw: &str) -> Result<RotationPolicy, String> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_and_seed_flags() {
        let cli = Cli::parse_from(["ravewall", "--policy", "time-sliced", "--seed", "42"]);
        assert_eq!(cli.policy, Some(RotationPolicy::TimeSliced));
        assert_eq!(cli.seed, Some(42));
        assert!(!cli.list_scenes);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["ravewall", "--policy", "roulette"]).is_err());
    }
}
