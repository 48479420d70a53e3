use anyhow::{Context, Result};
use std::path::PathBuf;

use tutor_guard::config::TutorConfig;
use tutor_guard::replay::{read_log, replay};

pub struct ReplayCommand {
    pub file: PathBuf,
    pub json: bool,
}

impl ReplayCommand {
    pub fn new(file: PathBuf) -> Self {
        Self { file, json: false }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn execute(&self, config: &TutorConfig) -> Result<()> {
        let records = read_log(&self.file)
            .with_context(|| format!("Failed to load observation log {}", self.file.display()))?;
        let outcome = replay(&records, config);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        println!("Replaying {} observations from {}", records.len(), self.file.display());
        println!();
        for event in &outcome.events {
            println!("{event}");
        }
        println!();
        println!(
            "{} ticks, {} triggers, {} actions, {} stage changes",
            outcome.metrics.ticks,
            outcome.metrics.gesture_triggers,
            outcome.metrics.actions_dispatched,
            outcome.metrics.stage_commands
        );
        println!("Final stage: {}", outcome.final_stage);
        Ok(())
    }
}
