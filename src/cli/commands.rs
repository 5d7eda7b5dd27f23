//! CLI Command Implementations

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use log::info;

use crate::config::{seconds_to_samples, EngineConfig, SessionConfig};
use crate::dsp::{CurveType, MasterBus};
use crate::engine::{write_wav, BitDepth, MixEngine};
use crate::output::{list_output_devices, OutputMode, OutputSinkSettings, SharedProcessor};
use crate::transition::{calculate_automation, TransitionEngine, TransitionRegion, TransitionType};

/// Render a session offline and write it to `output`
pub fn render(
    session_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
    seconds: Option<f64>,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let session = SessionConfig::load(session_path)
        .with_context(|| format!("loading session {}", session_path.display()))?;
    if session.clips.is_empty() {
        bail!("session {} has no clips", session_path.display());
    }

    let engine = MixEngine::new(config.sample_rate, config.channels);
    for clip in &session.clips {
        let path = SessionConfig::resolve_clip_path(session_path, clip);
        let start = seconds_to_samples(clip.start_seconds, config.sample_rate) as i64;
        let id = engine
            .load(&clip.track_id, &path, start)
            .with_context(|| format!("loading clip {}", path.display()))?;
        engine.set_volume(id, clip.volume)?;
        if let Some(end) = clip.end_seconds {
            engine.set_lane_end(id, seconds_to_samples(end, config.sample_rate) as i64)?;
        }
    }

    let transitions = Arc::new(TransitionEngine::new());
    for transition in &session.transitions {
        transitions.add_transition(transition.to_region(config.sample_rate)?)?;
    }
    engine.attach_transitions(Some(transitions));

    let bus: SharedProcessor = Arc::new(Mutex::new(MasterBus::with_settings(
        &config.master_bus,
        config.sample_rate,
        config.channels,
    )));
    engine.initialize(OutputSinkSettings::new(OutputMode::Offline), Some(bus))?;
    engine.play()?;

    let total_frames = match seconds {
        Some(seconds) => seconds_to_samples(seconds, config.sample_rate),
        None => engine.timeline_end(),
    };
    let block_frames = config.output.buffer_frames().max(1) as u64;
    let mut rendered = Vec::with_capacity(total_frames as usize * config.channels);
    let mut block = vec![0.0_f32; block_frames as usize * config.channels];

    let mut frames_done = 0;
    while frames_done < total_frames {
        let frames = block_frames.min(total_frames - frames_done) as usize;
        let block = &mut block[..frames * config.channels];
        let produced = engine.render(block)?;
        if produced == 0 {
            break;
        }
        rendered.extend_from_slice(&block[..produced]);
        frames_done += (produced / config.channels) as u64;
    }
    engine.stop()?;

    write_wav(
        output,
        &rendered,
        config.channels,
        config.sample_rate,
        BitDepth::Float32,
    )?;
    info!(
        "Rendered {} lanes, {:.2}s to {}",
        engine.lane_count(),
        frames_done as f64 / config.sample_rate as f64,
        output.display()
    );
    println!("Rendered: {}", output.display());
    engine.dispose();

    Ok(())
}

/// Print the output devices available for `mode`
pub fn devices(mode: OutputMode) -> anyhow::Result<()> {
    let devices = list_output_devices(mode)?;
    if devices.is_empty() {
        println!("No {} output devices.", mode);
        return Ok(());
    }

    println!("{} output devices:", mode);
    for name in devices {
        println!("  {}", name);
    }
    Ok(())
}

/// Print automation rows from progress 0 to 1
pub fn automation(kind: TransitionType, curve: CurveType, steps: u32) -> anyhow::Result<()> {
    let steps = steps.max(1);
    let region = TransitionRegion::new("outgoing", "incoming", 0, steps as u64, kind, curve)?;

    println!("{} / {}", kind, curve);
    println!(
        "{:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "progress", "out", "in", "out_lo", "out_mid", "out_hi", "in_lo"
    );
    println!("{:-<62}", "");
    for step in 0..=steps {
        let auto = calculate_automation(&region, step as u64);
        println!(
            "{:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3}",
            region.progress(step as u64),
            auto.outgoing_gain,
            auto.incoming_gain,
            auto.outgoing_low_gain,
            auto.outgoing_mid_gain,
            auto.outgoing_high_gain,
            auto.incoming_low_gain
        );
    }
    Ok(())
}

/// Write a default engine configuration to `path`
pub fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    EngineConfig::default().save(path)?;
    println!("Wrote default config: {}", path.display());
    Ok(())
}
