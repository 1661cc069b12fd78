use anyhow::Result;

use crate::api::{ChecklistApiClient, DirectoryTemplateSource};
use crate::checklist::status::{StatusLevel, StatusSink};
use crate::checklist::types::{ChecklistDefinition, StepStatus, StepView};
use crate::config::ChecklistConfig;

pub mod config;
pub mod exec;
pub mod lookup;
pub mod template;

/// Prints operator status lines to the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalStatusSink;

impl StatusSink for TerminalStatusSink {
    fn report(&self, level: StatusLevel, message: &str) {
        let icon = match level {
            StatusLevel::Idle => "⏸️ ",
            StatusLevel::Warn => "⏳",
            StatusLevel::Ok => "✅",
            StatusLevel::Err => "❌",
        };
        println!("{} {}", icon, message);
        tracing::debug!(status = ?level, "{}", message);
    }
}

pub fn api_client(config: &ChecklistConfig) -> Result<ChecklistApiClient> {
    Ok(ChecklistApiClient::from_config(&config.api)?)
}

pub fn directory_source(config: &ChecklistConfig) -> Result<DirectoryTemplateSource> {
    DirectoryTemplateSource::from_config(&config.templates).ok_or_else(|| {
        anyhow::anyhow!(
            "templates.directory is not configured (set it in qc-checklist.toml or QC_CHECKLIST_TEMPLATES__DIRECTORY)"
        )
    })
}

pub fn print_definition(definition: &ChecklistDefinition) {
    println!("📋 CHECKLIST {}", definition.model);
    println!("──────────────────────────");
    for step in &definition.steps {
        println!(
            "   {:>2}. {} ({}s)",
            step.order, step.description, step.target_seconds
        );
        if !step.suggested_tags.is_empty() {
            println!("       🏷️  {}", step.suggested_tags.join(", "));
        }
    }
    println!();
}

fn status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "⚪",
        StepStatus::Running => "🔵",
        StepStatus::Passed => "🟢",
        StepStatus::Failed => "🔴",
    }
}

pub fn print_views(views: &[StepView]) {
    for view in views {
        let mut line = format!(
            "   {} {:>2}. {:<32} {:>4}s / {}s ({:>3}%) {}",
            status_icon(view.status),
            view.order,
            view.description,
            view.elapsed_seconds,
            view.target_seconds,
            view.percent_elapsed,
            view.status.label(),
        );
        if view.controls.can_pass {
            line.push_str("  ✔ ok/nok");
        } else if view.running {
            line.push_str(&format!("  ⏳ ok/nok at {}s", view.release_at_seconds));
        }
        if view.occurrences > 0 {
            line.push_str(&format!("  ⚠️  {} NCR", view.occurrences));
        }
        println!("{}", line);
    }
}

pub fn show_how_to_start() -> Result<()> {
    println!("🧪 qc-checklist - production quality checklists");
    println!();
    println!("To get started:");
    println!("  ▶️  qc-checklist exec --serial <SN>     # Run the checklist for a unit");
    println!("  🔎 qc-checklist lookup <SN>            # Show which checklist applies");
    println!("  📋 qc-checklist template list          # Models with a template");
    println!();
    println!("Admin commands:");
    println!("  📤 qc-checklist template push <file>   # Validate and store a template");
    println!("  ⚙️  qc-checklist config                 # Show effective configuration");
    Ok(())
}
