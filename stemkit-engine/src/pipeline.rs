//! Personalized message pipeline
//!
//! rotation -> cache lookup / synthesis per segment -> crossfade assembly.

use crate::audio::{AssemblyReport, CrossfadeAssembler};
use crate::error::{Error, Result};
use crate::rotation::RotationSelector;
use crate::synthesis::{ResolvedStem, StemGenerator, StemOrigin};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use stemkit_common::time::{file_stamp, now};
use stemkit_common::{StemCategory, StemLabel, TimingMap, Transition};
use tracing::info;

const NAME_PLACEHOLDER: &str = "{name}";
const DEVELOPER_PLACEHOLDER: &str = "{developer}";

/// One segment of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub id: String,
    pub category: StemCategory,
    /// Transcript; `{name}` / `{developer}` are substituted per message
    pub text: String,
}

impl SegmentSpec {
    pub fn new(id: impl Into<String>, category: StemCategory, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            text: text.into(),
        }
    }

    /// True when the transcript varies per message
    pub fn is_templated(&self) -> bool {
        self.text.contains(NAME_PLACEHOLDER) || self.text.contains(DEVELOPER_PLACEHOLDER)
    }
}

/// Ordered segments plus their timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePlan {
    pub segments: Vec<SegmentSpec>,
    #[serde(default)]
    pub timing: TimingMap,
}

impl MessagePlan {
    /// Built-in greeting used when no plan is supplied
    pub fn fallback() -> Self {
        let segments = vec![
            SegmentSpec::new("hey", StemCategory::Script, "Hey"),
            SegmentSpec::new("name", StemCategory::Name, NAME_PLACEHOLDER),
            SegmentSpec::new("intro", StemCategory::Script, "I noticed your work at"),
            SegmentSpec::new("developer", StemCategory::Developer, DEVELOPER_PLACEHOLDER),
            SegmentSpec::new("outro", StemCategory::Script, "and wanted to reach out."),
        ];
        let timing = TimingMap::from_transitions(vec![
            Transition::new("hey", "name", 0.0, 20.0),
            Transition::new("name", "intro", 120.0, 10.0),
            Transition::new("intro", "developer", 0.0, 20.0),
            Transition::new("developer", "outro", 80.0, 10.0),
        ]);
        Self { segments, timing }
    }

    /// Validate segment ids and timing before any synthesis
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(Error::EmptyInput("message plan has no segments".to_string()));
        }
        let ids: Vec<&str> = self.segments.iter().map(|s| s.id.as_str()).collect();
        self.timing.validate(&ids)?;
        Ok(())
    }

    /// Concrete (segment id, label, transcript) triples for one message
    pub fn render(&self, name: &str, developer: &str) -> Vec<(String, StemLabel, String)> {
        self.segments
            .iter()
            .map(|segment| {
                let text = segment
                    .text
                    .replace(NAME_PLACEHOLDER, name)
                    .replace(DEVELOPER_PLACEHOLDER, developer);
                let label = match segment.category {
                    // Personalized stems are keyed by their value
                    StemCategory::Name | StemCategory::Developer => StemLabel::new(segment.category, &text),
                    // Templated text is keyed by its rendered value
                    _ if segment.is_templated() => {
                        StemLabel::new(segment.category, &format!("{} {}", segment.id, text))
                    }
                    _ => StemLabel::new(segment.category, &segment.id),
                };
                (segment.id.clone(), label, text)
            })
            .collect()
    }
}

/// A finished message
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledMessage {
    pub name: String,
    pub developer: String,
    pub stems: Vec<ResolvedStem>,
    pub report: AssemblyReport,
}

/// Message pipeline over the generator, the rotation selector and the assembler
pub struct MessagePipeline {
    generator: Arc<StemGenerator>,
    selector: Arc<RotationSelector>,
    assembler: CrossfadeAssembler,
    output_dir: PathBuf,
}

impl MessagePipeline {
    pub fn new(
        generator: Arc<StemGenerator>,
        selector: Arc<RotationSelector>,
        assembler: CrossfadeAssembler,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            generator,
            selector,
            assembler,
            output_dir: output_dir.into(),
        }
    }

    /// Output path for a message: `output.<name>.<developer>.<stamp>.semantic.wav`
    pub fn output_path(&self, name: &str, developer: &str) -> PathBuf {
        let name = StemLabel::new(StemCategory::Name, name);
        let developer = StemLabel::new(StemCategory::Developer, developer);
        self.output_dir.join(format!(
            "output.{}.{}.{}.semantic.wav",
            name.slug(),
            developer.slug(),
            file_stamp(now())
        ))
    }

    /// Resolve every segment and assemble the message for `name` / `developer`
    pub async fn assemble(&self, plan: &MessagePlan, name: &str, developer: &str) -> Result<AssembledMessage> {
        plan.validate()?;
        if name.trim().is_empty() || developer.trim().is_empty() {
            return Err(Error::EmptyInput("name and developer are required".to_string()));
        }

        let mut ids = Vec::with_capacity(plan.segments.len());
        let mut stems = Vec::with_capacity(plan.segments.len());
        for (id, label, text) in plan.render(name.trim(), developer.trim()) {
            let origin = match label.category() {
                StemCategory::Name => StemOrigin::rotational("names"),
                StemCategory::Developer => StemOrigin::rotational("developers"),
                _ => StemOrigin::default(),
            };
            let stem = self.generator.resolve(&label, &text, &origin).await?;
            ids.push(id);
            stems.push(stem);
        }

        let paths: Vec<PathBuf> = stems.iter().map(|s| s.path.clone()).collect();
        let output = self.output_path(name, developer);
        let assembler = self.assembler.clone();
        let timing = plan.timing.clone();

        let report = tokio::task::spawn_blocking(move || assembler.assemble_segments(&paths, &ids, &timing, &output))
            .await
            .map_err(|e| Error::Internal(format!("assembly task failed: {}", e)))??;

        info!(name, developer, output = %report.output.display(), "Message assembled");
        Ok(AssembledMessage {
            name: name.to_string(),
            developer: developer.to_string(),
            stems,
            report,
        })
    }

    /// Pick the next name/developer pair by rotation, then assemble
    pub async fn assemble_next(
        &self,
        plan: &MessagePlan,
        names: &[String],
        developers: &[String],
    ) -> Result<AssembledMessage> {
        let pair = self.selector.select_pair(names, developers).await?;
        match (pair.name, pair.developer) {
            (Some(name), Some(developer)) => self.assemble(plan, &name, &developer).await,
            _ => Err(Error::EmptyInput(
                "no enabled name/developer candidates for rotation".to_string(),
            )),
        }
    }
}
