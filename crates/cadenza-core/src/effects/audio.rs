//! Native audio backend — symphonia decode + cpal output.
//!
//! Background music is short and loops forever, so each asset is decoded
//! once, up front, into an in-memory clip:
//! 1. symphonia decodes (MP3, AAC/M4A, WAV, ALAC, PCM) at `open`
//! 2. samples are resampled to the output device rate and kept in memory
//! 3. each player owns a cpal output stream on its own thread, opened by
//!    `prepare`/`play` and closed by `stop`
//!
//! Position is the frame cursor into the clip. Pause keeps the stream open
//! and renders silence.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioPlayer, PlayerEvents, PlayerFactory, LOOP_FOREVER};
use crate::error::{CadenzaError, CadenzaResult};
use crate::models::TrackId;

/// Opens native players. Each `open` decodes the whole file.
pub struct NativeFactory {
    /// Rate clips are resampled to. `None` keeps the source rate.
    device_rate: Option<u32>,
}

impl NativeFactory {
    pub fn new() -> Self {
        Self {
            device_rate: default_device_rate(),
        }
    }
}

impl Default for NativeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerFactory for NativeFactory {
    fn open(
        &self,
        track: &TrackId,
        path: &Path,
        events: Arc<dyn PlayerEvents>,
    ) -> CadenzaResult<Box<dyn AudioPlayer>> {
        let clip = decode_clip(path, self.device_rate)?;
        log::debug!(
            "cadenza: decoded '{}' ({} frames, {} ch @ {}Hz)",
            track,
            clip.frames(),
            clip.channels,
            clip.sample_rate
        );
        Ok(Box::new(NativePlayer::new(track.clone(), clip, events)))
    }
}

/// Fully decoded, interleaved f32 audio.
struct Clip {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl Clip {
    fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

struct PlayerState {
    clip: Clip,
    playing: AtomicBool,
    /// f32 bits.
    volume: AtomicU32,
    loops: AtomicI32,
    /// Next frame to render.
    cursor: AtomicUsize,
    /// Tells the output thread to drop its stream and exit.
    close: AtomicBool,
    /// Set by the render callback at a natural end; drained by the output thread.
    finished: AtomicBool,
    /// Stream error reported by cpal, drained by the output thread.
    stream_error: Mutex<Option<String>>,
}

/// A looping in-memory clip played through its own cpal stream.
pub struct NativePlayer {
    track: TrackId,
    state: Arc<PlayerState>,
    events: Arc<dyn PlayerEvents>,
    output: Mutex<Option<JoinHandle<()>>>,
}

impl NativePlayer {
    fn new(track: TrackId, clip: Clip, events: Arc<dyn PlayerEvents>) -> Self {
        Self {
            track,
            state: Arc::new(PlayerState {
                clip,
                playing: AtomicBool::new(false),
                volume: AtomicU32::new(1.0f32.to_bits()),
                loops: AtomicI32::new(0),
                cursor: AtomicUsize::new(0),
                close: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                stream_error: Mutex::new(None),
            }),
            events,
            output: Mutex::new(None),
        }
    }

    /// Spawn the output thread unless one is already running.
    fn ensure_output(&self) {
        let mut output = self.output.lock();
        if matches!(output.as_ref(), Some(handle) if !handle.is_finished()) {
            return;
        }
        if let Some(stale) = output.take() {
            let _ = stale.join();
        }

        self.state.close.store(false, Ordering::SeqCst);
        let state = Arc::clone(&self.state);
        let events = Arc::clone(&self.events);
        let track = self.track.clone();
        *output = Some(thread::spawn(move || {
            if let Err(e) = run_output(&state, &track, &*events) {
                log::error!("cadenza: output error for '{}': {}", track, e);
                state.playing.store(false, Ordering::SeqCst);
                events.on_decode_error(&track, &e);
            }
        }));
    }

    fn close_output(&self) {
        self.state.close.store(true, Ordering::SeqCst);
        // Take the handle then join outside the lock
        let handle = self.output.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl AudioPlayer for NativePlayer {
    fn play(&self) {
        self.state.playing.store(true, Ordering::SeqCst);
        self.ensure_output();
    }

    fn pause(&self) {
        self.state.playing.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.state.playing.store(false, Ordering::SeqCst);
        self.close_output();
    }

    fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }

    fn set_volume(&self, volume: f32) {
        self.state
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::SeqCst);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.state.volume.load(Ordering::SeqCst))
    }

    fn set_loops(&self, loops: i32) {
        self.state.loops.store(loops, Ordering::SeqCst);
    }

    fn prepare(&self) {
        self.ensure_output();
    }

    fn position_ms(&self) -> u64 {
        let rate = self.state.clip.sample_rate.max(1) as u64;
        (self.state.cursor.load(Ordering::SeqCst) as u64 * 1000) / rate
    }

    fn set_position_ms(&self, position_ms: u64) {
        let rate = self.state.clip.sample_rate as u64;
        let frame = ((position_ms * rate) / 1000) as usize;
        self.state
            .cursor
            .store(frame.min(self.state.clip.frames()), Ordering::SeqCst);
    }
}

impl Drop for NativePlayer {
    fn drop(&mut self) {
        self.state.playing.store(false, Ordering::SeqCst);
        self.close_output();
    }
}

/// Open the default output device and keep the stream alive until closed.
///
/// The stream is created on this thread because cpal streams are not
/// `Send` on every platform.
fn run_output(state: &Arc<PlayerState>, track: &TrackId, events: &dyn PlayerEvents) -> CadenzaResult<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| CadenzaError::Output("no output device".into()))?;

    let default_cfg = device
        .default_output_config()
        .map_err(|e| CadenzaError::Output(e.to_string()))?;
    if default_cfg.sample_format() != cpal::SampleFormat::F32 {
        return Err(CadenzaError::Output(format!(
            "device does not support f32 output (got {:?})",
            default_cfg.sample_format()
        )));
    }
    let mut config: cpal::StreamConfig = default_cfg.into();
    config.sample_rate = cpal::SampleRate(state.clip.sample_rate);
    let out_channels = config.channels;

    let cb_state = Arc::clone(state);
    let err_state = Arc::clone(state);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render(&cb_state, data, out_channels);
            },
            move |err| {
                *err_state.stream_error.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| CadenzaError::Output(e.to_string()))?;

    stream.play().map_err(|e| CadenzaError::Output(e.to_string()))?;

    while !state.close.load(Ordering::SeqCst) {
        if state.finished.swap(false, Ordering::SeqCst) {
            events.on_finished(track, true);
        }
        if let Some(err) = state.stream_error.lock().take() {
            events.on_decode_error(track, &CadenzaError::Output(err));
        }
        thread::sleep(std::time::Duration::from_millis(25));
    }

    Ok(())
}

/// Fill one output buffer from the clip, wrapping at the end while loops remain.
fn render(state: &PlayerState, data: &mut [f32], out_channels: u16) {
    let clip = &state.clip;
    let total = clip.frames();
    if !state.playing.load(Ordering::SeqCst) || total == 0 || out_channels == 0 {
        data.fill(0.0);
        return;
    }

    let src_ch = clip.channels as usize;
    let dst_ch = out_channels as usize;
    let mut frame = state.cursor.load(Ordering::SeqCst);

    for i in 0..data.len() / dst_ch {
        if frame >= total {
            let loops = state.loops.load(Ordering::SeqCst);
            if loops == LOOP_FOREVER {
                frame = 0;
            } else if loops > 0 {
                state.loops.store(loops - 1, Ordering::SeqCst);
                frame = 0;
            } else {
                state.playing.store(false, Ordering::SeqCst);
                state.finished.store(true, Ordering::SeqCst);
                frame = 0;
                data[i * dst_ch..].fill(0.0);
                break;
            }
        }
        let src = &clip.samples[frame * src_ch..(frame + 1) * src_ch];
        adapt_channels(src, clip.channels, &mut data[i * dst_ch..(i + 1) * dst_ch], out_channels);
        frame += 1;
    }

    state.cursor.store(frame, Ordering::SeqCst);

    let vol = f32::from_bits(state.volume.load(Ordering::SeqCst));
    for s in data.iter_mut() {
        *s *= vol;
    }
}

/// Decode a whole file with symphonia, resampling to `target_rate`.
fn decode_clip(path: &Path, target_rate: Option<u32>) -> CadenzaResult<Clip> {
    let file = File::open(path).map_err(|source| CadenzaError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| CadenzaError::Decode("no default track".into()))?;
    let track_id = track.id;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2)
        .max(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt frame is skipped; the rest of the file is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("cadenza: skipping bad frame in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(CadenzaError::Decode(format!("no audio in {}", path.display())));
    }

    let dst_rate = target_rate.unwrap_or(sample_rate);
    if dst_rate != sample_rate {
        log::info!("cadenza: resampling {}Hz -> {}Hz", sample_rate, dst_rate);
        samples = resample(&samples, channels, sample_rate, dst_rate);
    }

    Ok(Clip {
        samples,
        channels,
        sample_rate: dst_rate,
    })
}

/// Linearly interpolate a whole interleaved clip from `src_rate` to `dst_rate`.
fn resample(samples: &[f32], channels: u16, src_rate: u32, dst_rate: u32) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    let in_frames = samples.len() / ch;
    if in_frames == 0 || src_rate == 0 || dst_rate == 0 || src_rate == dst_rate {
        return samples.to_vec();
    }

    let out_frames = (in_frames as u64 * dst_rate as u64 / src_rate as u64) as usize;
    let step = src_rate as f64 / dst_rate as f64;
    let last = in_frames - 1;
    let mut out = Vec::with_capacity(out_frames * ch);
    for i in 0..out_frames {
        let pos = i as f64 * step;
        let a = (pos as usize).min(last);
        let b = (a + 1).min(last);
        let t = (pos - a as f64) as f32;
        for c in 0..ch {
            let s0 = samples[a * ch + c];
            let s1 = samples[b * ch + c];
            out.push(s0 + (s1 - s0) * t);
        }
    }
    out
}

/// Adapt interleaved samples between different channel counts.
fn adapt_channels(src: &[f32], src_ch: u16, dst: &mut [f32], dst_ch: u16) {
    let src_ch = src_ch as usize;
    let dst_ch = dst_ch as usize;
    let frames = dst.len() / dst_ch;

    for f in 0..frames {
        let src_off = f * src_ch;
        let dst_off = f * dst_ch;

        if src_ch == 1 && dst_ch >= 2 {
            let s = src.get(src_off).copied().unwrap_or(0.0);
            dst[dst_off..dst_off + dst_ch].fill(s);
        } else if src_ch >= 2 && dst_ch == 1 {
            let n = src_ch.min(src.len().saturating_sub(src_off));
            let sum: f32 = src[src_off..src_off + n].iter().sum();
            dst[dst_off] = if n > 0 { sum / n as f32 } else { 0.0 };
        } else {
            let copy_ch = src_ch.min(dst_ch);
            for c in 0..copy_ch {
                dst[dst_off + c] = src.get(src_off + c).copied().unwrap_or(0.0);
            }
            dst[dst_off + copy_ch..dst_off + dst_ch].fill(0.0);
        }
    }
}

/// Sample rate of the default output device, if there is one.
fn default_device_rate() -> Option<u32> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    device.default_output_config().ok().map(|c| c.sample_rate().0)
}
