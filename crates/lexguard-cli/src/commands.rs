//! Subcommand implementations and terminal rendering.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use lexguard_core::{
    AgentType, AnalysisKey, AnalysisOutcome, AnnotatedDocument, Highlighting, Inspection,
    RiskStatistics, SeverityTier,
};
use lexguard_runtime::{AgentProcessingController, ControllerSnapshot, RuntimeConfig};
use serde::Serialize;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

pub enum Replacement {
    Alternative(usize),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeMode {
    FetchOnly,
    ProcessIfNeeded,
    Reprocess,
}

fn emit<T: Serialize>(value: &T, format: OutputFormat, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

pub fn highlight(document: &AnnotatedDocument, format: OutputFormat) -> Result<()> {
    let highlighting = document.highlight();
    for exclusion in &highlighting.excluded {
        tracing::warn!(
            annotation = %exclusion.id,
            position = exclusion.position,
            reason = ?exclusion.reason,
            "Annotation not highlighted"
        );
    }
    emit(&highlighting, format, || render_highlighting(&highlighting))
}

pub fn stats(document: &AnnotatedDocument, format: OutputFormat) -> Result<()> {
    let stats = document.statistics();
    emit(&stats, format, || render_stats(&stats))
}

pub fn inspect(document: &AnnotatedDocument, id: &str, format: OutputFormat) -> Result<()> {
    let Some(inspection) = document.inspect(id) else {
        bail!("No annotation with id '{}'", id);
    };
    emit(&inspection, format, || render_inspection(&inspection))
}

pub fn replace(
    document: &AnnotatedDocument,
    id: &str,
    replacement: Replacement,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let updated = match replacement {
        Replacement::Alternative(index) => document.apply_alternative(id, index),
        Replacement::Text(text) => document.replace_word(id, &text),
    }?;

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&updated)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
        None => emit(&updated, format, || {
            let mut out = render_highlighting(&updated.highlight());
            let _ = writeln!(out, "{} annotation(s) remaining", updated.words().len());
            out
        }),
    }
}

pub async fn analyze(
    config: &RuntimeConfig,
    document: &str,
    agent: AgentType,
    mode: AnalyzeMode,
    format: OutputFormat,
) -> Result<()> {
    let client = lexguard_runtime::build_client(config)?;
    let controller = AgentProcessingController::new(client).with_auto_fetch(true);
    let key = AnalysisKey::new(document, agent);

    let mut snapshot = controller.set_key(key).await;
    snapshot = match mode {
        AnalyzeMode::Reprocess => controller.process().await,
        AnalyzeMode::ProcessIfNeeded if !snapshot.outcome.is_success() => {
            controller.retry().await
        }
        _ => snapshot,
    };

    emit(&snapshot, format, || render_snapshot(&snapshot, agent))?;

    if let AnalysisOutcome::Failure { message, .. } = &snapshot.outcome {
        bail!("{} analysis failed: {}", agent.display_name(), message);
    }
    Ok(())
}

fn tier_marker(tier: SeverityTier) -> &'static str {
    match tier {
        SeverityTier::Severe => "!!",
        SeverityTier::Elevated => "!",
        SeverityTier::Minor => "~",
        SeverityTier::Neutral => "?",
    }
}

/// Inline rendering: `[word]!!{id}` with the marker showing the tier.
pub fn render_highlighting(highlighting: &Highlighting<'_>) -> String {
    let mut out = String::new();
    for segment in &highlighting.segments {
        match segment.annotation {
            Some(annotation) => {
                let marker = tier_marker(annotation.severity.tier());
                let _ = write!(out, "[{}]{}{{{}}}", segment.text, marker, annotation.id);
            }
            None => out.push_str(segment.text),
        }
    }
    out.push('\n');

    let _ = writeln!(out);
    for tier in SeverityTier::ALL {
        let _ = writeln!(out, "  {:<3} {}", tier_marker(tier), tier.legend_label());
    }
    if !highlighting.excluded.is_empty() {
        let _ = writeln!(
            out,
            "{} annotation(s) could not be placed",
            highlighting.excluded.len()
        );
    }
    out
}

pub fn render_stats(stats: &RiskStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Words:        {}", stats.total_words);
    let _ = writeln!(out, "Risky words:  {}", stats.risky_words);
    let _ = writeln!(out, "Risk density: {:.1}%", stats.density_percent());

    let _ = writeln!(out, "\nBy severity:");
    for (severity, count) in stats.severity.known() {
        let _ = writeln!(out, "  {:<10} {}", severity, count);
    }
    if stats.severity.other > 0 {
        let _ = writeln!(out, "  {:<10} {}", "other", stats.severity.other);
    }

    if !stats.categories.is_empty() {
        let _ = writeln!(out, "\nBy category:");
        for (category, count) in &stats.categories {
            let label = lexguard_core::patterns::humanize_category(category);
            let label = if label.is_empty() { "uncategorized".to_string() } else { label };
            let _ = writeln!(out, "  {:<24} {}", label, count);
        }
    }
    out
}

pub fn render_inspection(inspection: &Inspection<'_>) -> String {
    let word = inspection.annotation;
    let mut out = String::new();
    let _ = writeln!(out, "\"{}\" at {}", word.word, word.position);
    let _ = writeln!(
        out,
        "Severity: {} ({})",
        word.severity,
        inspection.tier.legend_label()
    );
    if !inspection.category_label.is_empty() {
        let _ = writeln!(out, "Category: {}", inspection.category_label);
    }
    if let Some(impact) = &word.impact {
        let _ = writeln!(out, "Impact:   {}", impact);
    }
    if let Some(context) = inspection.context {
        let full = context
            .full_context
            .clone()
            .unwrap_or_else(|| format!("{}{}{}", context.before, context.word, context.after));
        let _ = writeln!(out, "Context:  ...{}...", full.trim());
    }

    if inspection.alternatives.is_empty() {
        let _ = writeln!(out, "No suggested alternatives");
    } else {
        let _ = writeln!(out, "Alternatives:");
        for (index, alternative) in inspection.alternatives.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", index, alternative);
        }
    }
    let _ = writeln!(out, "\n{}", inspection.recommendation());
    out
}

pub fn render_snapshot(snapshot: &ControllerSnapshot, agent: AgentType) -> String {
    let mut out = String::new();
    let key = snapshot
        .key
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "{} ({})", agent.display_name(), key);

    match &snapshot.outcome {
        AnalysisOutcome::Absent => {
            let _ = writeln!(out, "No analysis yet. Run again with --process.");
        }
        AnalysisOutcome::Pending => {
            let _ = writeln!(out, "Analysis in progress");
        }
        AnalysisOutcome::Success { payload, .. } => {
            if payload.is_legal_document() == Some(false) {
                let _ = writeln!(out, "Not classified as a legal document");
            }
            if let Some(kind) = payload.document_type() {
                let _ = writeln!(out, "Type:    {}", kind);
            }
            if let Some(summary) = payload.summary() {
                let _ = writeln!(out, "Summary: {}", summary);
            }
            if let Ok(words) = payload.risky_words() {
                if !words.is_empty() {
                    let _ = writeln!(out, "Risky words: {}", words.len());
                }
            }
        }
        AnalysisOutcome::Failure {
            message, retryable, ..
        } => {
            let _ = writeln!(out, "Failed: {}", message);
            if *retryable {
                let _ = writeln!(out, "Retry with --process.");
            }
        }
    }

    if snapshot.retry_count > 0 {
        let _ = writeln!(out, "Attempts: {}", snapshot.retry_count);
    }
    if let Some(model) = &snapshot.meta.model_used {
        let _ = writeln!(out, "Model:   {}", model);
    }
    out
}
