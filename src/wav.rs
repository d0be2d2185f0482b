use std::io::{self, BufWriter, Seek, SeekFrom, Write};

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Output sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    Pcm16,
    Float32,
}

impl WavFormat {
    fn format_tag(self) -> u16 {
        match self {
            WavFormat::Pcm16 => FORMAT_PCM,
            WavFormat::Float32 => FORMAT_IEEE_FLOAT,
        }
    }

    fn bits_per_sample(self) -> u32 {
        match self {
            WavFormat::Pcm16 => 16,
            WavFormat::Float32 => 32,
        }
    }
}

/// RIFF/WAVE file writer for 16-bit PCM or 32-bit float audio.
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u64,
    sample_rate: u32,
    channels: u32,
    format: WavFormat,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            riff_size_position: 0,
            data_size_position: 0,
            data_written: 0,
            sample_rate: 48000,
            channels: 2,
            format: WavFormat::Pcm16,
        }
    }

    /// Configure audio format parameters
    pub fn configure_audio_format(
        &mut self,
        sample_rate: u32,
        channels: u32,
        format: WavFormat,
    ) -> io::Result<()> {
        if self.data_written > 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot change format after writing data",
            ));
        }

        self.sample_rate = sample_rate;
        self.channels = channels;
        self.format = format;
        Ok(())
    }

    /// Write the RIFF header and an empty data chunk; sizes are patched
    /// by [`finish`](Self::finish).
    pub fn write_header(&mut self) -> io::Result<()> {
        let bytes_per_sample = self.format.bits_per_sample() / 8;

        self.writer.write_all(b"RIFF")?;
        self.riff_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.writer.write_all(b"WAVE")?;

        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&16u32.to_le_bytes())?;
        self.writer.write_all(&self.format.format_tag().to_le_bytes())?;
        self.writer
            .write_all(&(self.channels as u16).to_le_bytes())?;
        self.writer.write_all(&self.sample_rate.to_le_bytes())?;

        let byte_rate = self.sample_rate * self.channels * bytes_per_sample;
        self.writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = self.channels * bytes_per_sample;
        self.writer.write_all(&(block_align as u16).to_le_bytes())?;
        self.writer
            .write_all(&(self.format.bits_per_sample() as u16).to_le_bytes())?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?;

        Ok(())
    }

    /// Write interleaved samples in [-1.0, 1.0], converting to the
    /// configured encoding.
    pub fn write_samples(&mut self, samples: &[f32]) -> io::Result<()> {
        match self.format {
            WavFormat::Pcm16 => {
                for &sample in samples {
                    let quantized = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                    self.writer.write_all(&quantized.to_le_bytes())?;
                    self.data_written += 2;
                }
            }
            WavFormat::Float32 => {
                for &sample in samples {
                    self.writer.write_all(&sample.to_le_bytes())?;
                    self.data_written += 4;
                }
            }
        }
        Ok(())
    }

    /// Finish writing and update the chunk size fields.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;

        let current_pos = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer
            .write_all(&(self.data_written as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer
            .write_all(&(current_pos as u32 - 8).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(current_pos))?;
        self.writer.flush()?;

        Ok(())
    }

    /// Get the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    /// Bytes of sample data written so far.
    pub fn data_written(&self) -> u64 {
        self.data_written
    }
}
