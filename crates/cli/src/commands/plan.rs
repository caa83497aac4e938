//! `tessera plan`: preview the planner's split without running agents.

use std::path::Path;
use std::sync::Arc;

use crate::runtime::{build_session, cancel_on_ctrl_c, open_workspace};

pub async fn run(config_path: Option<&Path>, message: &str) -> anyhow::Result<()> {
    let (config, workspace) = open_workspace(config_path, None).await?;
    let session = Arc::new(build_session(&config, &workspace));
    let interrupt = cancel_on_ctrl_c(session.clone());
    let plan = session.generate_plan(message).await;
    interrupt.abort();

    let Some(plan) = plan else {
        println!("No plan: every agent would receive the message as is.");
        return Ok(());
    };

    let mut entries: Vec<_> = plan.into_iter().collect();
    entries.sort();
    for (agent_id, instruction) in entries {
        println!("{agent_id}: {instruction}");
    }
    Ok(())
}
