use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;

use super::command::{Cli, DecodeArgs, SampleFormat};
use crate::input::InputReader;
use crate::wav::{WavFormat, WavWriter};
use hca::process::decode::Decoder;
use hca::structs::header::HeaderParser;
use hca::ContainerKind;

fn create_path_with_extension(base_path: &Path, expected_ext: &str) -> PathBuf {
    if let Some(existing_ext) = base_path.extension() {
        if existing_ext == expected_ext {
            base_path.to_path_buf()
        } else {
            let mut path = base_path.to_path_buf();
            let new_name = format!(
                "{}.{}",
                base_path.file_name().unwrap().to_string_lossy(),
                expected_ext
            );
            path.set_file_name(new_name);
            path
        }
    } else {
        let mut path = base_path.to_path_buf();
        path.set_extension(expected_ext);
        path
    }
}

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding HCA stream: {} (strict mode: {})",
        args.input.display(),
        cli.strict
    );

    let is_pipe = args.input.to_string_lossy() == "-";
    let base_path = match (&args.output_path, is_pipe) {
        (Some(path), _) => path.clone(),
        (None, false) => args.input.clone(),
        (None, true) => {
            return Err(anyhow::anyhow!("--output-path is required with stdin input"));
        }
    };
    let output_path = create_path_with_extension(&base_path, "wav");

    let data = InputReader::new(&args.input)?.read_all()?;

    match ContainerKind::detect(&data) {
        Some(kind) if kind.is_supported() => {}
        Some(kind) => anyhow::bail!("input is a {kind:?} container, not HCA"),
        None => anyhow::bail!("no known container signature found"),
    }

    let fail_level = if cli.strict {
        Level::Warn
    } else {
        Level::Error
    };

    let mut parser = HeaderParser::default();
    parser.set_fail_level(fail_level);
    let params = parser.parse(&data)?;

    let mut decoder = Decoder::default();
    decoder.set_fail_level(fail_level);
    if let Some(key) = args.key {
        decoder.set_key(key as u32, (key >> 32) as u32);
    }

    let pb = if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message(format!("Decoding {} blocks...", params.block_count));
        Some(pb)
    } else {
        None
    };

    let decoded = decoder.decode(&params, &data[params.data_offset..])?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let wav_format = match args.format {
        SampleFormat::Pcm16 => WavFormat::Pcm16,
        SampleFormat::Float32 => WavFormat::Float32,
    };

    let file = File::create(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    let mut writer = WavWriter::new(file);
    writer.configure_audio_format(decoded.sample_rate, decoded.channel_count as u32, wav_format)?;
    writer.write_header()?;
    writer.write_samples(&decoded.samples)?;
    writer.finish()?;

    let frames = decoded.samples.len() / decoded.channel_count;
    let duration = frames as f64 / decoded.sample_rate as f64;
    log::info!(
        "Wrote {} ({} samples per channel, {duration:.3} s, {} bytes of audio)",
        output_path.display(),
        frames,
        writer.data_written()
    );

    if let Some((start, end)) = decoded.loop_points {
        log::info!("Loop points: samples {start}..{end}");
    }

    Ok(())
}
