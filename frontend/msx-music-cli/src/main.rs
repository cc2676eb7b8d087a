mod script;

use anyhow::{Context, anyhow};
use clap::Parser;
use env_logger::Env;
use msx_common::audio::SampleSink;
use msx_music_config::MsxMusicConfig;
use script::Command;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use ym2413::{MsxMusic, Ym2413State};

const STATE_FILE_PREFIX: &[u8] = b"ym2413st";
const STATE_VERSION: u16 = 1;

macro_rules! bincode_config {
    () => {
        bincode::config::standard()
            .with_little_endian()
            .with_fixed_int_encoding()
            .with_limit::<{ 1024 * 1024 }>()
    };
}

#[derive(Parser)]
struct Args {
    /// Register write script to play
    #[arg(short = 's', long)]
    script: PathBuf,

    /// Output WAV file path
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// TOML config file; missing fields fall back to the MSX-MUSIC defaults
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Keep rendering after the script ends until at least this many samples have been written
    #[arg(long, default_value_t)]
    min_samples: u64,

    /// Restore chip state from this file before running the script
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write chip state to this file after rendering
    #[arg(long)]
    save_state: Option<PathBuf>,
}

struct WavSink {
    writer: hound::WavWriter<BufWriter<File>>,
    output_volume: f64,
    samples_written: u64,
}

impl SampleSink for WavSink {
    type Err = hound::Error;

    fn push_sample(&mut self, _source: &str, sample: i32) -> Result<(), Self::Err> {
        let scaled = (f64::from(sample) * self.output_volume).clamp(-1.0, 1.0);
        self.writer.write_sample((scaled * f64::from(i16::MAX)).round() as i16)?;
        self.samples_written += 1;
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MsxMusicConfig> {
    let Some(path) = path else {
        return Ok(MsxMusicConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Unable to read config file '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file '{}'", path.display()))
}

fn save_state(state: &Ym2413State, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Unable to create state file '{}'", path.display()))?;

    let mut writer = BufWriter::new(file);
    writer.write_all(STATE_FILE_PREFIX)?;
    writer.write_all(&STATE_VERSION.to_le_bytes())?;

    let mut encoder = zstd::stream::Encoder::new(writer, 0)?;
    bincode::encode_into_std_write(state, &mut encoder, bincode_config!())?;
    encoder.finish()?.flush()?;

    log::info!("Saved chip state to '{}'", path.display());

    Ok(())
}

fn load_state(path: &Path) -> anyhow::Result<Ym2413State> {
    let file = File::open(path)
        .with_context(|| format!("Unable to open state file '{}'", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut header = [0_u8; STATE_FILE_PREFIX.len() + 2];
    reader.read_exact(&mut header).context("State file is truncated")?;

    if &header[..STATE_FILE_PREFIX.len()] != STATE_FILE_PREFIX {
        return Err(anyhow!("'{}' is not a YM2413 state file", path.display()));
    }

    let version_bytes = &header[STATE_FILE_PREFIX.len()..];
    let version = u16::from_le_bytes([version_bytes[0], version_bytes[1]]);
    if version != STATE_VERSION {
        return Err(anyhow!("State file version {version}, expected {STATE_VERSION}"));
    }

    let mut decoder = zstd::stream::Decoder::new(reader)?;
    let state: Ym2413State = bincode::decode_from_std_read(&mut decoder, bincode_config!())
        .context("Unable to decode state file")?;

    Ok(state)
}

fn render(device: &mut MsxMusic, sink: &mut WavSink, samples: u64) -> anyhow::Result<()> {
    for _ in 0..samples {
        device.tick(sink)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let script_text = fs::read_to_string(&args.script)
        .with_context(|| format!("Unable to read script '{}'", args.script.display()))?;
    let commands = script::parse(&script_text)
        .with_context(|| format!("Unable to parse script '{}'", args.script.display()))?;

    let mut device = MsxMusic::new(&config);

    if let Some(path) = &args.load_state {
        let state = load_state(path)?;
        device.chip_mut().load_state(&state).context("State file does not fit the chip")?;
        log::info!("Loaded chip state from '{}'", path.display());
    }

    let sample_rate = device.chip().sample_rate_hz().round() as u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let writer = hound::WavWriter::create(&args.output, spec)
        .with_context(|| format!("Unable to create WAV file '{}'", args.output.display()))?;
    let mut sink = WavSink { writer, output_volume: config.output_volume, samples_written: 0 };

    for command in commands {
        match command {
            Command::Port { port, value } => device.write_port(port, value),
            Command::Register { address, value } => {
                device.chip_mut().write_register(address, value);
            }
            Command::Wait { samples } => render(&mut device, &mut sink, samples)?,
            Command::Reset => device.reset(),
        }
    }

    let remaining = args.min_samples.saturating_sub(sink.samples_written);
    render(&mut device, &mut sink, remaining)?;

    let samples_written = sink.samples_written;
    sink.writer.finalize().context("Unable to finalize WAV file")?;

    log::info!(
        "Wrote {samples_written} samples at {sample_rate} Hz to '{}'",
        args.output.display()
    );

    if let Some(path) = &args.save_state {
        save_state(&device.chip().save_state(), path)?;
    }

    Ok(())
}
