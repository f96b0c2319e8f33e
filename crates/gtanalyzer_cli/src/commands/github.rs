use std::sync::Arc;

use gtanalyzer::analysis::RepositoryAnalyzer;
use gtanalyzer::{AnalysisParams, BatchRequest, EntityRef};

use crate::GithubAction;
use crate::commands::shared::{github_client, run_batch};
use crate::config::Config;
use crate::progress::ProgressReporter;

pub(crate) async fn handle_github(
    action: GithubAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        GithubAction::Analyze {
            owner,
            since,
            until,
            token,
            repositories,
        } => {
            let reporter = Arc::new(ProgressReporter::new());
            let client = github_client(config, token.as_deref(), Some(reporter.as_callback()))?;

            let batch = BatchRequest::new(
                repositories.into_iter().map(EntityRef::new).collect(),
                AnalysisParams::for_owner(owner).with_window(since, until),
            );

            run_batch(RepositoryAnalyzer::new(client), batch, config, reporter).await
        }
    }
}
