//! Serve command handler.

use clap::Args;
use docqa_core::{AppConfig, AppResult};

/// Run the HTTP API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (default from config, `0.0.0.0:8000`)
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let bind = self.bind.as_deref().unwrap_or(&config.server_bind);
        crate::server::run_server(config, bind).await
    }
}
