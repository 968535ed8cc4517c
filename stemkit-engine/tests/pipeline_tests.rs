//! Message pipeline integration tests

mod helpers;

use helpers::{test_cache, test_contract, ScriptedProvider, TEST_SAMPLE_RATE};
use std::sync::Arc;
use stemkit_common::{EngineConfig, StemCategory, TimingMap, Transition};
use stemkit_engine::audio::wav::read_clip;
use stemkit_engine::audio::CrossfadeAssembler;
use stemkit_engine::pipeline::{MessagePipeline, MessagePlan, SegmentSpec};
use stemkit_engine::rotation::{RotationCategory, RotationSelector};
use stemkit_engine::synthesis::{StemGenerator, StemSource};
use stemkit_engine::Error;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    provider: Arc<ScriptedProvider>,
    selector: Arc<RotationSelector>,
    pipeline: MessagePipeline,
}

fn fixture(provider: ScriptedProvider) -> Fixture {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(provider);
    let config = EngineConfig {
        retries: 1,
        retry_delay_ms: 0,
        provider_timeout_secs: 5,
        ..EngineConfig::default()
    };
    let generator = StemGenerator::from_config(provider.clone(), test_cache(&dir, test_contract()), &config);
    let selector = Arc::new(RotationSelector::new(dir.path().join("data/rotations_meta.json")));
    let pipeline = MessagePipeline::new(
        Arc::new(generator),
        selector.clone(),
        CrossfadeAssembler::new(),
        dir.path().join("output"),
    );
    Fixture {
        dir,
        provider,
        selector,
        pipeline,
    }
}

fn two_segment_plan(crossfade_ms: f64) -> MessagePlan {
    MessagePlan {
        segments: vec![
            SegmentSpec::new("hey", StemCategory::Script, "Hey"),
            SegmentSpec::new("name", StemCategory::Name, "{name}"),
        ],
        timing: TimingMap::from_transitions(vec![Transition::new("hey", "name", 0.0, crossfade_ms)]),
    }
}

#[tokio::test]
async fn test_assemble_message_end_to_end() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));

    let message = fx
        .pipeline
        .assemble(&MessagePlan::fallback(), "Alice", "Acme Labs")
        .await
        .unwrap();

    assert_eq!(message.stems.len(), 5);
    assert!(message
        .stems
        .iter()
        .all(|s| matches!(s.source, StemSource::Synthesized { .. })));
    assert_eq!(fx.provider.calls(), 5);

    let output = &message.report.output;
    assert!(output.starts_with(fx.dir.path().join("output")));
    let file_name = output.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("output.alice.acme_labs."));
    assert!(file_name.ends_with(".semantic.wav"));

    let clip = read_clip(output).unwrap();
    assert_eq!(clip.format.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(clip.frames(), message.report.frames);
}

#[tokio::test]
async fn test_second_message_reuses_script_stems() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));
    let plan = MessagePlan::fallback();

    fx.pipeline.assemble(&plan, "Alice", "Acme").await.unwrap();
    let second = fx.pipeline.assemble(&plan, "Bob", "Acme").await.unwrap();

    // Only the new name needed synthesis
    assert_eq!(fx.provider.calls(), 6);
    let synthesized: Vec<&str> = second
        .stems
        .iter()
        .filter(|s| s.source != StemSource::Cached)
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(synthesized, vec!["name.bob"]);
}

#[tokio::test]
async fn test_templated_script_is_not_shared_between_names() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));
    let plan = MessagePlan {
        segments: vec![
            SegmentSpec::new("greeting", StemCategory::Script, "Hi {name}, great to meet you"),
            SegmentSpec::new("name", StemCategory::Name, "{name}"),
        ],
        timing: TimingMap::new(),
    };

    let alice = fx.pipeline.assemble(&plan, "Alice", "Acme").await.unwrap();
    let bob = fx.pipeline.assemble(&plan, "Bob", "Acme").await.unwrap();

    assert!(matches!(bob.stems[0].source, StemSource::Synthesized { .. }));
    assert_ne!(bob.stems[0].label, alice.stems[0].label);
    assert_ne!(bob.stems[0].path, alice.stems[0].path);
    assert_eq!(fx.provider.calls(), 4);

    // Same name again is served from cache
    let again = fx.pipeline.assemble(&plan, "Bob", "Acme").await.unwrap();
    assert!(again.stems.iter().all(|s| s.source == StemSource::Cached));
    assert_eq!(fx.provider.calls(), 4);
}

#[tokio::test]
async fn test_plan_timing_controls_duration() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));

    let plain = fx.pipeline.assemble(&two_segment_plan(0.0), "Alice", "Acme").await.unwrap();
    let faded = fx.pipeline.assemble(&two_segment_plan(50.0), "Alice", "Acme").await.unwrap();

    // 200 ms stems from the scripted provider
    let frame = |ms: usize| ms * TEST_SAMPLE_RATE as usize / 1000;
    assert_eq!(plain.report.frames, frame(400));
    assert_eq!(faded.report.frames, frame(400) - frame(50));
}

#[tokio::test]
async fn test_assemble_next_rotates_names() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));
    let names = vec!["Alice".to_string(), "Bob".to_string()];
    let developers = vec!["Acme".to_string()];
    let plan = two_segment_plan(10.0);

    let first = fx.pipeline.assemble_next(&plan, &names, &developers).await.unwrap();
    let second = fx.pipeline.assemble_next(&plan, &names, &developers).await.unwrap();

    assert_eq!(first.name, "Alice");
    assert_eq!(second.name, "Bob");
    assert_eq!(fx.selector.usage(RotationCategory::Developers).await["Acme"].use_count, 2);
}

#[tokio::test]
async fn test_assemble_next_without_candidates_fails() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));

    let result = fx
        .pipeline
        .assemble_next(&MessagePlan::fallback(), &[], &["Acme".to_string()])
        .await;

    assert!(matches!(result, Err(Error::EmptyInput(_))));
    assert_eq!(fx.provider.calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_aborts_message() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE).broken("Mallory"));

    let result = fx.pipeline.assemble(&MessagePlan::fallback(), "Mallory", "Acme").await;

    assert!(matches!(result, Err(Error::Provider(_))));
    assert!(!fx.dir.path().join("output").exists());
}

#[tokio::test]
async fn test_invalid_timing_is_rejected_before_synthesis() {
    let fx = fixture(ScriptedProvider::new(TEST_SAMPLE_RATE));
    let mut plan = two_segment_plan(10.0);
    plan.timing.push(Transition::new("name", "ghost", 0.0, 10.0));

    let result = fx.pipeline.assemble(&plan, "Alice", "Acme").await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(fx.provider.calls(), 0);
}
