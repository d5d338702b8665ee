//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::engine::{FaultKind, InferenceEngine};
use crate::model::ModelDescriptor;

/// Block size used when the caller does not choose one
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Outcome of a render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub samples: usize,
    pub sample_rate: u32,
    pub fault: Option<FaultKind>,
}

/// Read a descriptor JSON file (not validated yet)
pub fn load_descriptor(path: &Path) -> Result<ModelDescriptor> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file {}", path.display()))?;
    ModelDescriptor::from_json_str(&json)
        .with_context(|| format!("Failed to parse model file {}", path.display()))
}

/// Validate a model and print a summary of it.
pub fn inspect(path: &Path) -> Result<()> {
    info!("Inspecting model: {}", path.display());

    let descriptor = load_descriptor(path)?;
    descriptor.validate()?;

    println!("Architecture: {}", descriptor.architecture);
    if let Some(name) = &descriptor.metadata.name {
        println!("Name: {}", name);
    }
    if let Some(rate) = descriptor.metadata.sample_rate {
        println!("Sample rate: {} Hz", rate);
    }
    println!(
        "Gain: {:+.2} dB, loudness: {:+.2} dB, head scale: {}",
        descriptor.metadata.gain_db, descriptor.metadata.loudness_db, descriptor.head_scale
    );
    println!("{:-<60}", "");
    for (i, layer) in descriptor.layers.iter().enumerate() {
        println!(
            "{:>2}  {:>2} -> {:<2} k={} dilations={:?} {}{}",
            i,
            layer.input_channels,
            layer.output_channels,
            layer.kernel_size,
            layer.dilations,
            layer.activation,
            if layer.gated { " gated" } else { "" },
        );
    }
    println!("{:-<60}", "");
    println!("Weights: {}", descriptor.weights.len());
    println!("Receptive field: {} samples", descriptor.receptive_field());

    Ok(())
}

/// Render `input` through the model at `model_path` into `output`.
pub fn render(
    model_path: &Path,
    input: &Path,
    output: &Path,
    block_size: usize,
) -> Result<RenderSummary> {
    info!("Rendering {} through {}", input.display(), model_path.display());

    let descriptor = load_descriptor(model_path)?;
    let mut engine = InferenceEngine::load(descriptor)?;

    let mut reader = hound::WavReader::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    let channels = spec.channels.max(1) as usize;
    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    if let Some(rate) = engine.expected_sample_rate() {
        if rate != spec.sample_rate {
            warn!(
                model_rate = rate,
                input_rate = spec.sample_rate,
                "Input sample rate differs from the model's training rate"
            );
        }
    }

    let block_size = block_size.max(1);
    let mut processed = vec![0.0f32; mono.len()];
    for (block_in, block_out) in mono.chunks(block_size).zip(processed.chunks_mut(block_size)) {
        engine.process_block(block_in, block_out);
    }

    let out_spec = hound::WavSpec {
        channels: 1,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, out_spec)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    for sample in &processed {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    let fault = engine.fault();
    if let Some(kind) = fault {
        warn!(code = kind.error_code(), "Engine fault during render: {}", kind);
    }

    println!("Rendered {} samples to {}", processed.len(), output.display());

    Ok(RenderSummary {
        samples: processed.len(),
        sample_rate: spec.sample_rate,
        fault,
    })
}
