//! `tessera chat`: one message, one or more agents.

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_agent::{RunOutcome, RunReport};

use crate::runtime::{build_session, cancel_on_ctrl_c, load_image, open_workspace, save_media};

pub struct ChatOptions {
    pub message: String,
    pub agents: Vec<String>,
    pub images: Vec<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub creative: bool,
    pub out_dir: PathBuf,
}

pub async fn run(config_path: Option<&Path>, options: ChatOptions) -> anyhow::Result<()> {
    let images = options
        .images
        .iter()
        .map(|path| load_image(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (config, workspace) = open_workspace(config_path, options.workspace).await?;
    let session = Arc::new(build_session(&config, &workspace));
    let interrupt = cancel_on_ctrl_c(session.clone());

    let result = if options.creative {
        let agent_id = match options.agents.first() {
            Some(id) => id.clone(),
            None => session
                .workers()
                .first()
                .map(|a| a.id.clone())
                .context("No agents configured")?,
        };
        session
            .send_message(&agent_id, &options.message, images, true)
            .await
            .map(|report| vec![report])
    } else if let [agent_id] = options.agents.as_slice() {
        session
            .send_message(agent_id, &options.message, images, false)
            .await
            .map(|report| vec![report])
    } else {
        session
            .send_to_agents(&options.agents, &options.message, images)
            .await
    };
    interrupt.abort();

    let reports = result?;
    let mut failed = 0;
    for report in &reports {
        print_report(report, reports.len() > 1);
        if matches!(report.outcome, RunOutcome::Failed(_)) {
            failed += 1;
        }
        if !report.media.is_empty() {
            for path in save_media(&options.out_dir, &report.agent_id, &report.media)? {
                println!("Saved {}", path.display());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} agent run(s) failed", reports.len());
    }
    Ok(())
}

fn print_report(report: &RunReport, labelled: bool) {
    if labelled {
        println!("── {} ({} turn(s)) ──", report.agent_id, report.turns);
    }
    match &report.outcome {
        RunOutcome::Done(text) => println!("{text}"),
        RunOutcome::Aborted => println!("[cancelled]"),
        RunOutcome::Failed(message) => println!("Error: {message}"),
    }
}
