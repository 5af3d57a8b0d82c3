use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use renderer::{discovered_scene_names, Renderer, RendererConfig, DEFAULT_SURFACE_SIZE};
use tracing_subscriber::EnvFilter;
use vizconfig::VizConfig;

use crate::cli::Cli;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let mut config = match cli.config.as_ref() {
        Some(path) => VizConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => VizConfig::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate().context("configuration rejected")?;

    if cli.list_scenes {
        for name in discovered_scene_names(&config.scene_prefixes) {
            println!("{name}");
        }
        return Ok(());
    }

    let surface_size = parse_surface_size(cli.size.as_deref())?;
    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::debug!(seed, "seeding scene rotation");

    let renderer_config = RendererConfig {
        surface_size,
        switch_interval: config.switch_interval,
        render_scale: config.render_scale,
        target_fps: config.effective_fps(),
        scene_prefixes: config.scene_prefixes.clone(),
        policy: config.policy,
        clear_color: config.clear_color,
        seed,
    };

    Renderer::new(renderer_config).run()
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn apply_overrides(config: &mut VizConfig, cli: &Cli) {
    if let Some(fps) = cli.fps {
        config.target_fps = Some(fps);
    }
    if let Some(interval) = cli.interval {
        config.switch_interval = Duration::from_secs_f32(interval.max(0.0));
    }
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }
    if let Some(scale) = cli.scale {
        config.render_scale = scale;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
}

fn parse_surface_size(raw: Option<&str>) -> Result<(u32, u32)> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SURFACE_SIZE);
    };
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .with_context(|| format!("invalid width in '{raw}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .with_context(|| format!("invalid height in '{raw}'"))?;
    if width == 0 || height == 0 {
        anyhow::bail!("surface size must be non-zero, got '{raw}'");
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use vizconfig::RotationPolicy;

    #[test]
    fn surface_size_parses_both_separators() {
        assert_eq!(parse_surface_size(Some("1280x720")).unwrap(), (1280, 720));
        assert_eq!(parse_surface_size(Some("2560X1440")).unwrap(), (2560, 1440));
        assert_eq!(parse_surface_size(None).unwrap(), DEFAULT_SURFACE_SIZE);
        assert!(parse_surface_size(Some("1280")).is_err());
        assert!(parse_surface_size(Some("0x720")).is_err());
    }

    #[test]
    fn size_default_matches_renderer_default() {
        assert_eq!(
            parse_surface_size(None).unwrap(),
            RendererConfig::default().surface_size
        );
    }

    #[test]
    fn negative_fps_override_is_rejected() {
        let mut config = VizConfig::default();
        let cli = Cli::parse_from(["ravewall", "--fps=-60"]);
        apply_overrides(&mut config, &cli);
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_flags_override_file_values() {
        let mut config = VizConfig::default();
        let cli = Cli::parse_from([
            "ravewall",
            "--fps",
            "30",
            "--interval",
            "5",
            "--policy",
            "time-sliced",
            "--scale",
            "0.5",
            "--seed",
            "7",
        ]);
        apply_overrides(&mut config, &cli);
        assert_eq!(config.target_fps, Some(30.0));
        assert_eq!(config.switch_interval, Duration::from_secs(5));
        assert_eq!(config.policy, RotationPolicy::TimeSliced);
        assert_eq!(config.render_scale, 0.5);
        assert_eq!(config.seed, Some(7));
        config.validate().unwrap();
    }

    #[test]
    fn loads_configuration_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "switch_interval = \"20s\"\npolicy = \"time-sliced\"\nrender_scale = 0.5"
        )
        .unwrap();

        let config = VizConfig::load(file.path()).unwrap();
        assert_eq!(config.switch_interval, Duration::from_secs(20));
        assert_eq!(config.policy, RotationPolicy::TimeSliced);
        assert_eq!(config.render_scale, 0.5);
    }
}
