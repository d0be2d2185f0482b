use anyhow::Result;
use indicatif::MultiProgress;
use log::Level;
use serde::Serialize;

use super::command::{Cli, InfoArgs};
use crate::input::InputReader;
use hca::structs::header::{HeaderParser, StreamParameters};
use hca::{ContainerKind, SAMPLES_PER_BLOCK};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, _multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing HCA stream: {}", args.input.display());

    let data = InputReader::new(&args.input)?.read_all()?;

    match ContainerKind::detect(&data) {
        Some(kind) if kind.is_supported() => {}
        Some(kind) => anyhow::bail!("input is a {kind:?} container, not HCA"),
        None => anyhow::bail!("no known container signature found"),
    }

    let mut parser = HeaderParser::default();
    parser.set_fail_level(if cli.strict { Level::Warn } else { Level::Error });
    let params = parser.parse(&data)?;

    let report = StreamReport::new(&params, data.len());
    print!("{}", serde_yaml_ng::to_string(&report)?);

    Ok(())
}

#[derive(Serialize)]
struct StreamReport {
    format_version: String,
    channels: u8,
    sample_rate: u32,
    block_count: u32,
    block_size: u16,
    duration_seconds: f64,
    encoder_delay: u16,
    encoder_padding: u16,
    bands: BandReport,
    cipher_mode: String,
    threshold_mode: String,
    volume: f32,
    file_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    vbr_noise_level: Option<u16>,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    loop_report: Option<LoopReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

#[derive(Serialize)]
struct BandReport {
    total: u8,
    base: u8,
    stereo: u8,
    per_extension_group: u8,
    extension_groups: u8,
    min_resolution: u8,
    max_resolution: u8,
}

#[derive(Serialize)]
struct LoopReport {
    start_block: u32,
    end_block: u32,
    start_sample: usize,
    end_sample: usize,
}

impl StreamReport {
    fn new(params: &StreamParameters, file_size: usize) -> Self {
        let samples = params.block_count as u64 * SAMPLES_PER_BLOCK as u64;

        Self {
            format_version: format!("{}.{}", params.version >> 8, params.version & 0xFF),
            channels: params.channel_count,
            sample_rate: params.sample_rate,
            block_count: params.block_count,
            block_size: params.block_size,
            duration_seconds: samples as f64 / params.sample_rate as f64,
            encoder_delay: params.encoder_delay,
            encoder_padding: params.encoder_padding,
            bands: BandReport {
                total: params.total_band_count,
                base: params.base_band_count,
                stereo: params.stereo_band_count,
                per_extension_group: params.bands_per_hfr_group,
                extension_groups: params.hfr_group_count,
                min_resolution: params.min_resolution,
                max_resolution: params.max_resolution,
            },
            cipher_mode: format!("{:?}", params.cipher_mode),
            threshold_mode: format!("{:?}", params.ath_mode),
            volume: params.volume,
            file_size,
            vbr_noise_level: params.vbr.map(|vbr| vbr.noise_level),
            loop_report: params.loop_info.map(|info| LoopReport {
                start_block: info.start_block,
                end_block: info.end_block,
                start_sample: info.start_block as usize * SAMPLES_PER_BLOCK,
                end_sample: (info.end_block as usize + 1) * SAMPLES_PER_BLOCK,
            }),
            comment: params.comment.clone(),
        }
    }
}
