//! Map-reduce summarization over a [`Generator`].
//!
//! Short inputs are summarized with one generation call. Inputs longer than
//! `max_input_length` are split into segments, each segment is summarized
//! independently at a prorated length (map), and the concatenated partial
//! summaries are summarized once more (reduce). The reduce pass never
//! recurses, so a long input costs exactly `segments + 1` calls.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use longctx_index::{Metadata, TextChunk};

use crate::error::{Result, TextError};
use crate::llm::Generator;
use crate::segmenter::{RegexSegmenter, Segmenter, floor_char_boundary};

/// Shape of the generated summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    #[default]
    Concise,
    Detailed,
    BulletPoints,
}

impl SummaryStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryStyle::Concise => "concise",
            SummaryStyle::Detailed => "detailed",
            SummaryStyle::BulletPoints => "bullet_points",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            SummaryStyle::Concise => "Write a concise summary",
            SummaryStyle::Detailed => "Write a detailed summary that keeps the important specifics",
            SummaryStyle::BulletPoints => {
                "Summarize as a list of bullet points, one point per line starting with \"- \","
            }
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call summarization options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Upper bound on the summary length, in characters.
    pub max_length: usize,

    pub style: SummaryStyle,

    /// Topic the summary should concentrate on.
    pub focus: Option<String>,

    /// Target length as a fraction of the input. Never exceeds `max_length`.
    pub compression_ratio: Option<f32>,

    /// Ask the model to keep key terms, names and numbers verbatim.
    pub preserve_keywords: bool,

    /// Record style, focus and segmentation in [`Summary::metadata`].
    pub include_metadata: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            max_length: 500,
            style: SummaryStyle::Concise,
            focus: None,
            compression_ratio: None,
            preserve_keywords: false,
            include_metadata: true,
        }
    }
}

impl SummaryOptions {
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_style(mut self, style: SummaryStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = Some(focus.into());
        self
    }

    pub fn with_compression_ratio(mut self, ratio: f32) -> Self {
        self.compression_ratio = Some(ratio);
        self
    }

    fn target_length(&self, original_length: usize) -> usize {
        let target = match self.compression_ratio {
            Some(ratio) => {
                let scaled = (original_length as f32 * ratio.clamp(0.0, 1.0)) as usize;
                scaled.min(self.max_length)
            }
            None => self.max_length,
        };
        target.max(1)
    }
}

/// Summarizer-wide limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Inputs longer than this many bytes are summarized hierarchically.
    pub max_input_length: usize,

    /// Floor for the prorated per-segment target length.
    pub min_segment_target: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_input_length: 8000,
            min_segment_target: 100,
        }
    }
}

/// A generated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub original_length: usize,
    pub summary_length: usize,
    /// `summary_length / original_length`; 1.0 when the text was returned
    /// unchanged, 0.0 for empty input.
    pub compression_ratio: f32,
    pub metadata: Metadata,
}

impl Summary {
    fn empty() -> Self {
        Self {
            text: String::new(),
            original_length: 0,
            summary_length: 0,
            compression_ratio: 0.0,
            metadata: Metadata::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Condenses text through a [`Generator`].
///
/// Generation errors are returned as-is; nothing is retried.
pub struct Summarizer {
    generator: Generator,
    segmenter: Arc<dyn Segmenter>,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(generator: Generator, config: SummarizerConfig) -> Result<Self> {
        if config.max_input_length == 0 {
            return Err(TextError::InvalidConfig(
                "max_input_length must be positive".to_string(),
            ));
        }
        Ok(Self {
            generator,
            segmenter: Arc::new(RegexSegmenter::new()?),
            config,
        })
    }

    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Summarize `text`.
    ///
    /// Text already within `options.max_length` is returned unchanged with a
    /// compression ratio of 1.0 and no generation call.
    pub async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<Summary> {
        let original_length = text.len();
        if original_length <= options.max_length {
            return Ok(self.finish(text.to_string(), original_length, 1.0, 0, options));
        }

        let target = options.target_length(original_length);
        let segments = if original_length > self.config.max_input_length {
            self.segment(text)
        } else {
            vec![text.to_string()]
        };

        let summary = if segments.len() <= 1 {
            self.summarize_once(text, target, options).await?
        } else {
            info!(
                "Summarizing {original_length} bytes hierarchically over {} segments",
                segments.len()
            );
            let mut partials = Vec::with_capacity(segments.len());
            for segment in &segments {
                let share = target * segment.len() / original_length;
                let segment_target = share.max(self.config.min_segment_target);
                partials.push(self.summarize_once(segment, segment_target, options).await?);
            }
            self.summarize_once(&partials.join("\n\n"), target, options)
                .await?
        };

        let ratio = summary.len() as f32 / original_length as f32;
        Ok(self.finish(summary, original_length, ratio, segments.len(), options))
    }

    /// Join chunk texts with blank lines and summarize the result.
    pub async fn summarize_chunks(
        &self,
        chunks: &[TextChunk],
        options: &SummaryOptions,
    ) -> Result<Summary> {
        if chunks.is_empty() {
            return Ok(Summary::empty());
        }
        let joined = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.summarize(&joined, options).await
    }

    async fn summarize_once(
        &self,
        text: &str,
        target: usize,
        options: &SummaryOptions,
    ) -> Result<String> {
        let raw = self
            .generator
            .generate(&build_prompt(text, target, options))
            .await?;
        Ok(clean_summary(&raw, target, options.style))
    }

    fn finish(
        &self,
        text: String,
        original_length: usize,
        compression_ratio: f32,
        segments: usize,
        options: &SummaryOptions,
    ) -> Summary {
        let mut metadata = Metadata::new();
        if options.include_metadata {
            metadata.insert("style".to_string(), options.style.to_string());
            if let Some(focus) = &options.focus {
                metadata.insert("focus".to_string(), focus.clone());
            }
            metadata.insert("hierarchical".to_string(), (segments > 1).to_string());
            metadata.insert("segments".to_string(), segments.to_string());
        }
        debug!(
            "Summary {original_length} -> {} bytes (ratio {compression_ratio:.2})",
            text.len()
        );
        Summary {
            summary_length: text.len(),
            text,
            original_length,
            compression_ratio,
            metadata,
        }
    }

    /// Split `text` into segments of at most `max_input_length` bytes:
    /// paragraphs first, then sentences, then hard cuts.
    fn segment(&self, text: &str) -> Vec<String> {
        let limit = self.config.max_input_length;
        let mut units: Vec<(&str, &'static str)> = Vec::new();
        for paragraph in self.segmenter.paragraphs(text) {
            if paragraph.len() <= limit {
                units.push((paragraph, "\n\n"));
                continue;
            }
            for (i, sentence) in self.segmenter.sentences(paragraph).into_iter().enumerate() {
                let mut joiner = if i == 0 { "\n\n" } else { " " };
                let mut rest = sentence;
                while rest.len() > limit {
                    let mut cut = floor_char_boundary(rest, limit);
                    if cut == 0 {
                        cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
                    }
                    units.push((&rest[..cut], joiner));
                    joiner = "";
                    rest = &rest[cut..];
                }
                if !rest.is_empty() {
                    units.push((rest, joiner));
                }
            }
        }

        let mut segments: Vec<String> = Vec::new();
        for (unit, joiner) in units {
            if let Some(open) = segments.last_mut() {
                if open.len() + joiner.len() + unit.len() <= limit {
                    open.push_str(joiner);
                    open.push_str(unit);
                    continue;
                }
            }
            segments.push(unit.to_string());
        }
        segments
    }
}

fn build_prompt(text: &str, target: usize, options: &SummaryOptions) -> String {
    let mut prompt = format!(
        "{} of the following text in at most {target} characters.",
        options.style.instruction()
    );
    if let Some(focus) = &options.focus {
        prompt.push_str(&format!(" Focus on: {focus}."));
    }
    if options.preserve_keywords {
        prompt.push_str(" Keep key terms, names and numbers exactly as written.");
    }
    prompt.push_str("\n\nText:\n");
    prompt.push_str(text);
    prompt.push_str("\n\nSummary:");
    prompt
}

/// Tidy raw model output: drop an echoed "Summary:" label, normalize
/// bullets, and cut to `target` characters at the best boundary.
fn clean_summary(raw: &str, target: usize, style: SummaryStyle) -> String {
    let mut text = raw.trim();
    if text
        .get(..8)
        .is_some_and(|label| label.eq_ignore_ascii_case("summary:"))
    {
        text = text[8..].trim_start();
    }

    let text = if style == SummaryStyle::BulletPoints {
        normalize_bullets(text)
    } else {
        text.to_string()
    };
    truncate_at_boundary(&text, target)
}

fn normalize_bullets(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let line = line.trim();
            for marker in ["- ", "* ", "• ", "+ "] {
                if let Some(rest) = line.strip_prefix(marker) {
                    return format!("- {}", rest.trim_start());
                }
            }
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            if digits > 0 {
                let rest = &line[digits..];
                if let Some(item) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
                    return format!("- {}", item.trim_start());
                }
            }
            format!("- {line}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `limit` bytes, preferring the last sentence end,
/// then the last newline, then the last whitespace in the second half of the
/// allowance. Falls back to a hard cut.
fn truncate_at_boundary(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let head = &text[..floor_char_boundary(text, limit)];
    let floor = limit / 2;

    if let Some(end) = head.rfind(['.', '!', '?']) {
        if end + 1 > floor {
            return head[..=end].to_string();
        }
    }
    for boundary in [head.rfind('\n'), head.rfind(char::is_whitespace)]
        .into_iter()
        .flatten()
    {
        if boundary > floor {
            return head[..boundary].trim_end().to_string();
        }
    }
    head.to_string()
}
