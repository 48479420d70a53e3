use anyhow::Result;

use tutor_guard::config::TutorConfig;

pub struct ShowConfigCommand;

impl ShowConfigCommand {
    pub fn execute(&self, config: &TutorConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}

pub struct CheckConfigCommand;

impl CheckConfigCommand {
    /// Loading already validated the configuration; report what was checked.
    pub fn execute(&self, config: &TutorConfig) -> Result<()> {
        println!("Configuration OK");
        println!(
            "  gestures: activation {} ticks, release {} ticks",
            config.gestures.activation_threshold, config.gestures.release_threshold
        );
        println!(
            "  security: absence grace {} ticks, warning grace {}s, identity enrolled: {}",
            config.security.absence_grace_ticks,
            config.security.warning_grace_seconds,
            config.security.identity_enrolled
        );
        println!("  effectors: {:?}", config.effectors.kind);
        Ok(())
    }
}
