use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    fixtures::demo_scenario,
    messages::Notification,
    render::{RenderOutput, render_clip},
};

const PARITY_SCHEMA_VERSION: u32 = 1;

/// Fingerprint of a deterministic render, used to detect changes in the DSP path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParityReport {
    pub schema_version: u32,
    pub scenario: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub notification_count: usize,
    pub loop_count: u64,
    pub audio_hash: String,
    pub trace_hash: String,
}

#[instrument]
pub fn generate_parity_report() -> Result<ParityReport> {
    let (config, buffer, script, frames) = demo_scenario()?;
    let output = render_clip(&config, buffer, &script, frames)?;
    report_for("demo", &output)
}

/// Fingerprints an existing render.
pub fn report_for(scenario: &str, output: &RenderOutput) -> Result<ParityReport> {
    let mut audio_bytes = Vec::with_capacity(output.samples.len() * 2);
    for sample in &output.samples {
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        audio_bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    let trace_bytes =
        serde_json::to_vec(&output.notifications).context("failed to serialize notification trace")?;
    let loop_count = output
        .notifications
        .iter()
        .filter_map(|timed| match timed.notification {
            Notification::Looped { count } => Some(count),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    Ok(ParityReport {
        schema_version: PARITY_SCHEMA_VERSION,
        scenario: scenario.to_string(),
        sample_rate: output.sample_rate,
        channels: output.channels,
        frames: output.frames(),
        notification_count: output.notifications.len(),
        loop_count,
        audio_hash: hash_hex(&audio_bytes),
        trace_hash: hash_hex(&trace_bytes),
    })
}

pub fn read_parity_report(path: &Path) -> Result<ParityReport> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read parity report: {}", path.display()))?;
    let report: ParityReport =
        serde_json::from_slice(&bytes).context("failed to parse parity report json")?;
    Ok(report)
}

pub fn write_parity_report(path: &Path, report: &ParityReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parity directory: {}", parent.display()))?;
    }

    let json = serde_json::to_vec_pretty(report).context("failed to encode parity report json")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write parity report: {}", path.display()))?;
    Ok(())
}

fn hash_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}
