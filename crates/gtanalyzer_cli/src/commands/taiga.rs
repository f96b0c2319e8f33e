use std::sync::Arc;

use gtanalyzer::analysis::BoardAnalyzer;
use gtanalyzer::{AnalysisParams, BatchRequest, EntityRef};

use crate::TaigaAction;
use crate::commands::shared::{run_batch, taiga_client};
use crate::config::Config;
use crate::progress::ProgressReporter;

pub(crate) async fn handle_taiga(
    action: TaigaAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TaigaAction::Analyze { token, boards } => {
            let reporter = Arc::new(ProgressReporter::new());
            let client = taiga_client(config, token.as_deref(), Some(reporter.as_callback()))?;

            let batch = BatchRequest::new(
                boards.into_iter().map(EntityRef::new).collect(),
                AnalysisParams::default(),
            );

            run_batch(BoardAnalyzer::new(client), batch, config, reporter).await
        }
        TaigaAction::Milestones { token, board } => {
            let client = taiga_client(config, token.as_deref(), None)?;
            let summaries = BoardAnalyzer::new(client)
                .milestone_summaries(&board)
                .await
                .map_err(|e| format!("{board}: {}", e.reason()))?;

            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(())
        }
    }
}
