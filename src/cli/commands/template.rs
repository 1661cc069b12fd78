use anyhow::Result;

use crate::checklist::loader::{load_file, validate_for_save};
use crate::cli::commands::{api_client, print_definition};
use crate::cli::TemplateAction;
use crate::config::ChecklistConfig;

pub struct TemplateCommand<'a> {
    pub action: &'a TemplateAction,
}

impl<'a> TemplateCommand<'a> {
    pub fn new(action: &'a TemplateAction) -> Self {
        Self { action }
    }

    pub async fn execute(&self, config: &ChecklistConfig) -> Result<()> {
        match self.action {
            TemplateAction::List => {
                let models = api_client(config)?.list_templates().await?;
                if models.is_empty() {
                    println!("📭 No templates stored yet");
                    println!("   💡 Store one with: qc-checklist template push <file>");
                } else {
                    println!("📋 {} templates:", models.len());
                    for model in models {
                        println!("   • {}", model);
                    }
                }
                Ok(())
            }
            TemplateAction::Show { model } => {
                let definition = api_client(config)?.fetch_template(model).await?;
                print_definition(&definition);
                Ok(())
            }
            TemplateAction::Check { file } => {
                let definition = load_file(file)?;
                validate_for_save(&definition, config.execution.max_steps)?;
                print_definition(&definition);
                println!("✅ Template is valid");
                Ok(())
            }
            TemplateAction::Push { file } => {
                let definition = load_file(file)?;
                api_client(config)?
                    .save_template(&definition, config.execution.max_steps)
                    .await?;
                println!(
                    "✅ Template for {} stored ({} items)",
                    definition.model,
                    definition.steps.len()
                );
                Ok(())
            }
        }
    }
}
