//! Pipeline assembly tests against real WAV files and synthetic sources

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempest_audio::notify::SampleObserver;
use tempest_audio::test_utils::{drain, write_wav, ToneSource};
use tempest_audio::{
    AudioError, PipelineBuilder, PipelineHooks, PipelineOptions, RatePolicy, SymphoniaSource,
};
use tempest_core::WaveSource;

fn wav_fixture(rate: u32, channels: u16, secs: f32) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("tone_{}_{}.wav", rate, channels));
    write_wav(&path, rate, channels, secs, 440.0).unwrap();
    (dir, path)
}

fn options(rate: RatePolicy) -> PipelineOptions {
    PipelineOptions {
        rate,
        ..PipelineOptions::default()
    }
}

#[test]
fn low_rate_file_is_upgraded_to_44100() {
    let (_dir, path) = wav_fixture(22_050, 2, 0.5);
    let builder = PipelineBuilder::new(options(RatePolicy::Auto));
    let mut pipeline = builder.build(&path, PipelineHooks::default()).unwrap();

    assert_eq!(pipeline.handle.native_format.sample_rate.as_hz(), 22_050);
    assert_eq!(pipeline.handle.format.sample_rate.as_hz(), 44_100);

    let samples = drain(pipeline.source.as_mut()).unwrap();
    let frames = samples.len() / 2;
    assert!((frames as i64 - 22_050).abs() <= 2, "frames {}", frames);
}

#[test]
fn high_rate_file_keeps_native_rate() {
    let (_dir, path) = wav_fixture(48_000, 2, 0.25);
    let builder = PipelineBuilder::new(options(RatePolicy::Auto));
    let pipeline = builder.build(&path, PipelineHooks::default()).unwrap();
    assert_eq!(pipeline.handle.format.sample_rate.as_hz(), 48_000);
    assert_eq!(pipeline.handle.position.length(), 12_000);
}

#[test]
fn forced_rate_overrides_native() {
    let (_dir, path) = wav_fixture(44_100, 2, 0.25);
    let builder = PipelineBuilder::new(options(RatePolicy::Fixed(48_000)));
    let pipeline = builder.build(&path, PipelineHooks::default()).unwrap();
    assert_eq!(pipeline.handle.format.sample_rate.as_hz(), 48_000);
}

#[test]
fn mono_file_decodes_as_stereo() {
    let (_dir, path) = wav_fixture(44_100, 1, 0.1);
    let mut source = SymphoniaSource::open(&path).unwrap();
    assert_eq!(source.format().channels, 2);
    assert_eq!(source.native_bits_per_sample(), Some(16));

    let samples = drain(&mut source).unwrap();
    assert_eq!(samples.len(), 4_410 * 2);
    for frame in samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn corrupt_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"RIFF\x00\x00\x00\x00WAVEnothing useful here").unwrap();

    let builder = PipelineBuilder::default();
    let result = builder.build(&path, PipelineHooks::default());
    assert!(matches!(result, Err(AudioError::DecodeError(_))));
}

#[test]
fn missing_file_is_reported() {
    let builder = PipelineBuilder::default();
    let result = builder.build(
        std::path::Path::new("/no/such/track.flac"),
        PipelineHooks::default(),
    );
    assert!(matches!(result, Err(AudioError::FileNotFound(_))));
}

#[test]
fn unsupported_bit_depth_fails_assembly() {
    let builder = PipelineBuilder::new(PipelineOptions {
        bits_per_sample: 20,
        ..PipelineOptions::default()
    });
    let result = builder.assemble(
        Box::new(ToneSource::new(44_100, 440.0, 1.0)),
        PipelineHooks::default(),
    );
    assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
}

#[test]
fn hooks_fire_and_detach() {
    struct Count(AtomicUsize);
    impl SampleObserver for Count {
        fn on_samples(&self, samples: &[f32], _channels: usize) {
            self.0.fetch_add(samples.len(), Ordering::SeqCst);
        }
    }

    let blocks = Arc::new(AtomicUsize::new(0));
    let block_counter = blocks.clone();
    let observed = Arc::new(Count(AtomicUsize::new(0)));

    let builder = PipelineBuilder::new(options(RatePolicy::Passthrough));
    let mut pipeline = builder
        .assemble(
            Box::new(ToneSource::new(10_000, 440.0, 5.0)),
            PipelineHooks {
                on_block: Some(Box::new(move || {
                    block_counter.fetch_add(1, Ordering::SeqCst);
                })),
                sample_observer: Some(observed.clone()),
            },
        )
        .unwrap();

    // 100 ms at 10 kHz = 1000 frames; read 500 frames at a time
    let mut buffer = vec![0.0; 1_000];
    for _ in 0..8 {
        pipeline.source.read(&mut buffer).unwrap();
    }
    assert_eq!(blocks.load(Ordering::SeqCst), 4);
    assert_eq!(observed.0.load(Ordering::SeqCst), 8_000);

    pipeline.handle.detach_notifications();
    for _ in 0..8 {
        pipeline.source.read(&mut buffer).unwrap();
    }
    assert_eq!(blocks.load(Ordering::SeqCst), 4);
    assert_eq!(observed.0.load(Ordering::SeqCst), 8_000);
}

#[test]
fn seek_requests_apply_on_next_read() {
    let builder = PipelineBuilder::new(options(RatePolicy::Passthrough));
    let mut pipeline = builder
        .assemble(
            Box::new(ToneSource::new(44_100, 440.0, 10.0)),
            PipelineHooks::default(),
        )
        .unwrap();

    let position = pipeline.handle.position.clone();
    assert_eq!(position.length(), 441_000);

    let target = position.request_seek(220_500);
    assert_eq!(target, 220_500);
    assert_eq!(pipeline.handle.elapsed().as_secs_f64(), 5.0);

    let mut buffer = vec![0.0; 200];
    pipeline.source.read(&mut buffer).unwrap();
    assert_eq!(position.position(), 220_600);
    assert_eq!(pipeline.source.position(), 220_600);
}

#[test]
fn resampled_seek_maps_positions() {
    let builder = PipelineBuilder::new(options(RatePolicy::Fixed(44_100)));
    let mut pipeline = builder
        .assemble(
            Box::new(ToneSource::new(22_050, 440.0, 4.0)),
            PipelineHooks::default(),
        )
        .unwrap();

    assert_eq!(pipeline.handle.position.length(), 176_400);
    pipeline.source.set_position(88_200).unwrap();
    assert_eq!(pipeline.handle.position.position(), 88_200);
    assert_eq!(pipeline.handle.elapsed().as_secs(), 2);
}

#[test]
fn equalizer_handle_changes_output() {
    let builder = PipelineBuilder::new(options(RatePolicy::Passthrough));
    let render = |gain: f32| {
        let mut pipeline = builder
            .assemble(
                Box::new(ToneSource::new(44_100, 1_000.0, 1.0).with_amplitude(0.1)),
                PipelineHooks::default(),
            )
            .unwrap();
        pipeline.handle.equalizer.set_band_gain(5, gain);
        let samples = drain(pipeline.source.as_mut()).unwrap();
        let tail = &samples[samples.len() / 2..];
        (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt()
    };

    let flat = render(0.0);
    let boosted = render(20.0);
    assert!(boosted > flat * 5.0, "flat {} boosted {}", flat, boosted);
}

#[test]
fn analyzer_is_fed_through_the_pipeline() {
    let analyzer = tempest_audio::AnalyzerHandle::new(
        tempest_audio::SampleAnalyzer::new(1024).unwrap(),
    );
    let builder = PipelineBuilder::new(options(RatePolicy::Passthrough));
    let mut pipeline = builder
        .assemble(
            Box::new(ToneSource::new(44_100, 2_000.0, 1.0)),
            PipelineHooks {
                on_block: None,
                sample_observer: Some(Arc::new(analyzer.clone())),
            },
        )
        .unwrap();
    analyzer.initialize(pipeline.handle.format);

    let mut buffer = vec![0.0; 4_096];
    pipeline.source.read(&mut buffer).unwrap();

    let mut spectrum = vec![0.0; 1024];
    analyzer.compute_fft(&mut spectrum);
    let peak = spectrum[..512]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert!(peak.abs_diff(analyzer.frequency_to_bin_index(2_000.0)) <= 1);
}
