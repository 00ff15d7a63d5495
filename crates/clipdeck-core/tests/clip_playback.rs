use clipdeck_core::{
    Command, EngineConfig, Notification, RenderOutput, RenderScript, SourceBuffer, StartOptions,
    fixtures::{ramp_buffer, sine_buffer},
    render_clip,
};

fn mono_config() -> EngineConfig {
    EngineConfig {
        output_channels: 1,
        ..EngineConfig::default()
    }
}

fn count(output: &RenderOutput, target: Notification) -> usize {
    output
        .events_matching(|notification| *notification == target)
        .len()
}

fn loop_seconds(samples: u32) -> f64 {
    f64::from(samples) / 48_000.0
}

#[test]
fn one_second_clip_plays_between_its_deadlines() {
    let buffer = SourceBuffer::mono(vec![0.5; 48_000]).expect("buffer");
    let script = RenderScript::new().at(
        0,
        Command::Start(StartOptions {
            when: Some(0.5),
            offset: Some(0.0),
            duration: Some(1.0),
        }),
    );
    let output =
        render_clip(&EngineConfig::default(), buffer, &script, 96_000).expect("render succeeds");

    assert_eq!(count(&output, Notification::Started), 1);
    assert_eq!(count(&output, Notification::Ended), 1);

    let left = output.channel(0);
    assert!(left[..24_000].iter().all(|sample| *sample == 0.0));
    assert!(left[24_000..72_000].iter().all(|sample| *sample == 0.5));
    assert!(left[72_000..].iter().all(|sample| *sample == 0.0));
    assert_eq!(audible(&left), 48_000);
    assert_eq!(output.channel(1), left, "centered mono source is upmixed");
}

fn audible(samples: &[f32]) -> usize {
    samples.iter().filter(|sample| **sample != 0.0).count()
}

fn render_mono(script: &RenderScript, frames: u64) -> Vec<f32> {
    let buffer = SourceBuffer::mono(vec![0.5; 1_000]).expect("buffer");
    render_clip(&mono_config(), buffer, script, frames)
        .expect("render succeeds")
        .channel(0)
}

#[test]
fn start_between_block_boundaries_plays_every_sample() {
    let with_duration = RenderScript::new().at(
        0,
        Command::Start(StartOptions {
            when: Some(48.0 / 48_000.0),
            offset: Some(0.0),
            duration: Some(1_000.0 / 48_000.0),
        }),
    );
    let samples = render_mono(&with_duration, 2_048);
    assert_eq!(audible(&samples), 1_000);
    assert!(samples[..48].iter().all(|sample| *sample == 0.0));
    assert!(samples[48..1_048].iter().all(|sample| *sample == 0.5));

    let natural_length =
        RenderScript::new().at(0, Command::Start(StartOptions::at(48.0 / 48_000.0)));
    assert_eq!(audible(&render_mono(&natural_length, 2_048)), 1_000);
}

#[test]
fn resume_between_block_boundaries_plays_the_remainder() {
    let script = RenderScript::new()
        .at(0, Command::Start(StartOptions::default()))
        .at(256, Command::Pause { when: None })
        .at(
            384,
            Command::Resume {
                when: Some(600.0 / 48_000.0),
            },
        );
    let samples = render_mono(&script, 2_048);
    assert_eq!(audible(&samples), 1_000);
    assert!(samples[256..600].iter().all(|sample| *sample == 0.0));
    assert!(samples[600..1_344].iter().all(|sample| *sample == 0.5));

    let ramp = render_clip(
        &mono_config(),
        ramp_buffer(1_000).expect("ramp"),
        &script,
        2_048,
    )
    .expect("render succeeds")
    .channel(0);
    assert_eq!(ramp[255], 255.0);
    assert_eq!(ramp[600], 256.0);
    assert_eq!(ramp[1_343], 999.0);
}

#[test]
fn resume_before_the_first_frame_still_reports_started() {
    let buffer = SourceBuffer::mono(vec![0.5; 4_800]).expect("buffer");
    let script = RenderScript::new()
        .at(0, Command::Start(StartOptions::at(0.5)))
        .at(0, Command::Pause { when: None })
        .at(128, Command::Resume { when: None });
    let output = render_clip(&mono_config(), buffer, &script, 48_000).expect("render succeeds");

    let lifecycle = output.events_matching(Notification::is_lifecycle);
    assert_eq!(
        lifecycle,
        vec![
            Notification::Scheduled,
            Notification::Paused,
            Notification::Resumed,
            Notification::Started,
            Notification::Ended,
        ]
    );
    let samples = output.channel(0);
    assert!(samples[..24_000].iter().all(|sample| *sample == 0.0));
    assert_eq!(audible(&samples), 4_800);
}

#[test]
fn pause_while_scheduled_holds_the_clip_silent() {
    let buffer = SourceBuffer::mono(vec![0.5; 4_800]).expect("buffer");
    let script = RenderScript::new()
        .at(0, Command::Start(StartOptions::at(0.01)))
        .at(0, Command::Pause { when: Some(0.05) });
    let output = render_clip(&mono_config(), buffer, &script, 9_600).expect("render succeeds");

    assert!(output.samples.iter().all(|sample| *sample == 0.0));
    assert_eq!(count(&output, Notification::Started), 0);
}

#[test]
fn full_length_playback_ends_after_every_sample() {
    let buffer = SourceBuffer::mono(vec![0.25; 1_000]).expect("buffer");
    let script = RenderScript::new().at(
        0,
        Command::Start(StartOptions {
            offset: Some(0.0),
            duration: Some(1_000.0 / 48_000.0),
            ..StartOptions::default()
        }),
    );
    let output = render_clip(&mono_config(), buffer, &script, 2_048).expect("render succeeds");

    let samples = output.channel(0);
    let audible = samples.iter().filter(|sample| **sample != 0.0).count();
    assert_eq!(audible, 1_000);
    assert!(samples[..1_000].iter().all(|sample| *sample == 0.25));

    let ended_at: Vec<u64> = output
        .notifications
        .iter()
        .filter(|timed| timed.notification == Notification::Ended)
        .map(|timed| timed.block_frame)
        .collect();
    assert_eq!(ended_at, vec![896], "ended in the block holding the last sample");
}

#[test]
fn loop_wraps_exactly_at_loop_end() {
    let script = RenderScript::new()
        .at(0, Command::SetLoop(true))
        .at(
            0,
            Command::SetLoopBounds {
                start: Some(loop_seconds(100)),
                end: Some(loop_seconds(1_100)),
            },
        )
        .at(0, Command::Start(StartOptions::default()));
    let buffer = ramp_buffer(2_000).expect("ramp");
    let output = render_clip(&mono_config(), buffer, &script, 3_200).expect("render succeeds");

    for (frame, sample) in output.channel(0).iter().enumerate() {
        let expected = if frame < 1_100 {
            frame
        } else {
            100 + (frame - 1_100) % 1_000
        };
        assert_eq!(*sample, expected as f32, "frame {frame}");
    }

    let loops = output.events_matching(|notification| {
        matches!(notification, Notification::Looped { .. })
    });
    assert_eq!(
        loops,
        vec![
            Notification::Looped { count: 1 },
            Notification::Looped { count: 2 },
            Notification::Looped { count: 3 },
        ]
    );
}

fn rms(samples: &[f32]) -> f64 {
    let energy: f64 = samples
        .iter()
        .map(|sample| f64::from(*sample) * f64::from(*sample))
        .sum();
    (energy / samples.len() as f64).sqrt()
}

#[test]
fn equal_power_crossfade_keeps_energy_for_quarter_period_seam() {
    // Equal-power gains hold the level only for material that is uncorrelated
    // across the seam. A sine with a period of 100 samples and a loop of 1025
    // samples puts the two sides a quarter period apart, which is that case;
    // in-phase or anti-phase seams still swell or dip.
    let buffer = sine_buffer(480.0, 48_000, 2_000, 1.0).expect("sine");
    let script = RenderScript::new()
        .at(0, Command::SetLoop(true))
        .at(
            0,
            Command::SetLoopBounds {
                start: Some(loop_seconds(100)),
                end: Some(loop_seconds(1_125)),
            },
        )
        .at(0, Command::SetLoopCrossfade(loop_seconds(200)))
        .at(0, Command::Start(StartOptions::default()));
    let output = render_clip(&mono_config(), buffer, &script, 4_096).expect("render succeeds");
    let samples = output.channel(0);

    let steady = rms(&samples[200..1_000]);
    let seam = rms(&samples[625..1_625]);
    assert!(
        (seam / steady - 1.0).abs() < 0.01,
        "seam rms {seam} drifted from steady rms {steady}"
    );

    let largest_step = samples[1..]
        .iter()
        .zip(&samples)
        .map(|(next, previous)| (next - previous).abs())
        .fold(0.0_f32, f32::max);
    assert!(largest_step < 0.1, "click of {largest_step} at the seam");
}

#[test]
fn hard_loop_seam_clicks_without_crossfade() {
    let buffer = sine_buffer(480.0, 48_000, 2_000, 1.0).expect("sine");
    let script = RenderScript::new()
        .at(0, Command::SetLoop(true))
        .at(
            0,
            Command::SetLoopBounds {
                start: Some(loop_seconds(100)),
                end: Some(loop_seconds(1_125)),
            },
        )
        .at(0, Command::Start(StartOptions::default()));
    let output = render_clip(&mono_config(), buffer, &script, 2_048).expect("render succeeds");
    let samples = output.channel(0);
    assert!((samples[1_125] - samples[1_124]).abs() > 0.5);
}

#[test]
fn fade_out_reaches_exact_silence_at_the_stop_deadline() {
    let buffer = SourceBuffer::mono(vec![0.5; 48_000]).expect("buffer");
    let script = RenderScript::new()
        .at(0, Command::SetFadeOut(0.01))
        .at(0, Command::Start(StartOptions::default()))
        .at(1_280, Command::Stop { when: Some(0.1) });
    let output = render_clip(&mono_config(), buffer, &script, 9_600).expect("render succeeds");
    let samples = output.channel(0);

    assert!(samples[..4_320].iter().all(|sample| *sample == 0.5));
    assert!(
        samples[4_320..4_800]
            .windows(2)
            .all(|pair| pair[1] <= pair[0])
    );
    assert!(samples[4_799] > 0.0);
    assert!(samples[4_800..].iter().all(|sample| *sample == 0.0));
    assert_eq!(count(&output, Notification::Stopped), 1);
    assert_eq!(count(&output, Notification::Ended), 1);
}

#[test]
fn fade_in_ramps_from_silence() {
    let buffer = SourceBuffer::mono(vec![1.0; 4_800]).expect("buffer");
    let script = RenderScript::new()
        .at(0, Command::SetFadeIn(0.01))
        .at(0, Command::Start(StartOptions::default()));
    let output = render_clip(&mono_config(), buffer, &script, 1_024).expect("render succeeds");
    let samples = output.channel(0);

    assert_eq!(samples[0], 0.0);
    assert!((samples[240] - 0.5).abs() < 1e-6);
    assert!(samples[..480].windows(2).all(|pair| pair[1] > pair[0]));
    assert!(samples[480..].iter().all(|sample| *sample == 1.0));
}

#[test]
fn start_without_buffer_reports_and_stays_idle() {
    let config = EngineConfig::default();
    let (mut processor, mut handle) = clipdeck_core::channel(&config);
    let mut outputs = vec![clipdeck_core::AudioBlock::new(2, 128)];

    handle.start(StartOptions::default()).expect("queued");
    assert!(processor.process(0, &clipdeck_core::BlockParams::default(), &mut outputs));

    let events = handle.poll_notifications();
    assert_eq!(
        events,
        vec![Notification::Error(clipdeck_core::ErrorKind::NoBuffer)]
    );
    assert_eq!(processor.state(), clipdeck_core::PlaybackState::Initial);
}

#[test]
fn inverted_loop_bounds_fall_back_to_a_single_sample() {
    let buffer = ramp_buffer(1_000).expect("ramp");
    let script = RenderScript::new()
        .at(0, Command::SetLoop(true))
        .at(
            0,
            Command::SetLoopBounds {
                start: Some(loop_seconds(500)),
                end: Some(loop_seconds(200)),
            },
        )
        .at(0, Command::Start(StartOptions::default()));
    let output = render_clip(&mono_config(), buffer, &script, 1_024).expect("render succeeds");

    let errors = output.events_matching(|notification| {
        matches!(notification, Notification::Error(_))
    });
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|error| matches!(
        error,
        Notification::Error(clipdeck_core::ErrorKind::InvalidLoopBounds {
            start: 500,
            end: 200
        })
    )));

    let samples = output.channel(0);
    assert_eq!(samples[499], 499.0);
    assert!(samples[501..].iter().all(|sample| *sample == 500.0));
}

#[test]
fn pause_and_resume_continue_from_the_same_sample() {
    let buffer = ramp_buffer(48_000).expect("ramp");
    let script = RenderScript::new()
        .at(0, Command::Start(StartOptions::default()))
        .at(1_024, Command::Pause { when: None })
        .at(2_048, Command::Resume { when: None });
    let output = render_clip(&mono_config(), buffer, &script, 3_072).expect("render succeeds");
    let samples = output.channel(0);

    assert_eq!(samples[1_023], 1_023.0);
    assert!(samples[1_024..2_048].iter().all(|sample| *sample == 0.0));
    assert_eq!(samples[2_048], 1_024.0);
    assert_eq!(samples[3_071], 2_047.0);
    assert_eq!(count(&output, Notification::Paused), 1);
    assert_eq!(count(&output, Notification::Resumed), 1);
}
