use anyhow::Result;

use crate::api::TemplateSource;
use crate::cli::commands::{api_client, directory_source, print_definition};
use crate::config::ChecklistConfig;

pub struct LookupCommand {
    pub serial: String,
    pub offline: bool,
}

impl LookupCommand {
    pub fn new(serial: String) -> Self {
        Self {
            serial,
            offline: false,
        }
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub async fn execute(&self, config: &ChecklistConfig) -> Result<()> {
        println!("🔎 Looking up checklist for serial {}...", self.serial);

        let result = if self.offline {
            directory_source(config)?.load_by_serial(&self.serial).await
        } else {
            api_client(config)?.load_by_serial(&self.serial).await
        };

        match result {
            Ok(definition) => {
                println!();
                print_definition(&definition);
                Ok(())
            }
            Err(e) => {
                println!("❌ No checklist for {}: {}", self.serial, e);
                Err(e.into())
            }
        }
    }
}
