//! `tessera search`: query the workspace index.

use std::path::{Path, PathBuf};

use crate::runtime::open_workspace;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
    workspace: Option<PathBuf>,
    names: bool,
) -> anyhow::Result<()> {
    let (_, workspace) = open_workspace(config_path, workspace).await?;

    let lines = if names {
        workspace.vfs().search_by_name(query).await
    } else {
        workspace.index().search(query)
    };

    if lines.is_empty() {
        println!("No matches for '{query}' in {} indexed file(s)", workspace.index().len());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
