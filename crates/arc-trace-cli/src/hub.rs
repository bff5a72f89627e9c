// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Commands that talk to the trace hub.

use anyhow::{anyhow, bail, Context, Result};
use arc_app_core::app::{AppState, Navigation};
use arc_app_core::notice::NoticeKind;
use arc_session_client::sync::{SyncClient, TraceView};
use arc_session_client::{pump, SessionClient};
use arc_session_proto::Vote;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::info;

use crate::{DatasetSource, Settings};

struct Hub {
    client: SessionClient,
    sync: SyncClient,
    app: AppState,
    timeout: Duration,
}

impl Hub {
    async fn open(settings: &Settings, source: &DatasetSource) -> Result<Self> {
        let mut app = AppState::new(&settings.prefs.username);
        let data = source.read()?;
        let mut sync = SyncClient::new();
        sync.connecting();
        let socket = &settings.prefs.socket_path;
        let client = match SessionClient::connect(socket).await {
            Ok(client) => client,
            Err(err) => {
                sync.on_disconnected(&mut app);
                return Err(err.context(format!("connecting to {}", socket.display())));
            }
        };
        sync.connected(&mut app);
        sync.load_dataset(&mut app, &source.name, data)?;
        let mut hub = Self {
            client,
            sync,
            app,
            timeout: settings.timeout,
        };
        hub.flush_notices();
        Ok(hub)
    }

    /// Make `task_id` current and wait for its snapshot.
    async fn focus(&mut self, task_id: &str) -> Result<()> {
        let already = self.app.catalog().current_task().and_then(|t| t.id()) == Some(task_id);
        if !already {
            self.sync.navigate(&mut self.app, Navigation::Id(task_id.to_owned()))?;
        }
        self.pump_until(|sync, _| sync.awaiting_snapshot().is_none()).await
    }

    /// Run event-loop turns until `done` holds, a server error arrives, or
    /// the reply timeout elapses.
    async fn pump_until<F>(&mut self, mut done: F) -> Result<()>
    where
        F: FnMut(&SyncClient, &AppState) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        while !done(&self.sync, &self.app) {
            let turn = pump(&mut self.client, &mut self.sync, &mut self.app);
            let alive = time::timeout_at(deadline, turn)
                .await
                .map_err(|_| anyhow!("timed out waiting for the trace hub"))??;
            let failure = self
                .app
                .notices()
                .iter()
                .find(|n| n.kind == NoticeKind::Error)
                .map(|n| n.text.clone());
            if let Some(text) = failure {
                self.flush_notices();
                bail!(text);
            }
            if !alive {
                bail!("trace hub closed the connection");
            }
        }
        self.flush_notices();
        Ok(())
    }

    fn flush_notices(&mut self) {
        for notice in self.app.notices_mut().drain() {
            match notice.kind {
                NoticeKind::Info => eprintln!("{}", notice.text),
                NoticeKind::Error => eprintln!("error: {}", notice.text),
            }
        }
    }

    fn trace_count(&self) -> usize {
        self.app
            .catalog()
            .current_task()
            .map_or(0, |t| t.traces().len())
    }
}

pub(crate) async fn traces(settings: &Settings, source: &DatasetSource, task_id: &str) -> Result<()> {
    let mut hub = Hub::open(settings, source).await?;
    hub.focus(task_id).await?;
    let task = hub
        .app
        .catalog()
        .task_by_id(task_id)
        .context("task vanished from the catalog")?;
    let ranked = task.traces().sorted();
    if ranked.is_empty() {
        println!("No traces for task {task_id}.");
    }
    for (position, trace) in ranked.iter().enumerate() {
        println!(
            "#{position} [{:+}] {} ({})\n    {}",
            trace.score, trace.author, trace.trace_id, trace.text
        );
    }
    Ok(())
}

pub(crate) async fn add(
    settings: &Settings,
    source: &DatasetSource,
    task_id: &str,
    text: &str,
) -> Result<()> {
    let mut hub = Hub::open(settings, source).await?;
    hub.focus(task_id).await?;
    let before = hub.trace_count();
    hub.sync.submit_add(&hub.app, text)?;
    hub.pump_until(|_, app| {
        app.catalog()
            .current_task()
            .is_some_and(|t| t.traces().len() > before)
    })
    .await?;
    info!(task_id, "trace confirmed");
    println!("Trace added to task {task_id}.");
    Ok(())
}

pub(crate) async fn vote(
    settings: &Settings,
    source: &DatasetSource,
    task_id: &str,
    position: usize,
    down: bool,
) -> Result<()> {
    let mut hub = Hub::open(settings, source).await?;
    hub.focus(task_id).await?;
    while hub.app.catalog().trace_cursor().is_some_and(|c| c < position) {
        if !hub.app.traces_mut().advance() {
            break;
        }
    }
    let shown = match hub.sync.trace_view(&hub.app) {
        TraceView::Showing {
            position: at,
            trace,
            ..
        } if at == position => trace.trace_id.clone(),
        _ => bail!("task {task_id} has no trace at position {position}"),
    };
    let vote = if down { Vote::Down } else { Vote::Up };
    hub.sync.submit_vote(&hub.app, vote)?;
    hub.pump_until(|sync, _| !sync.vote_pending()).await?;
    let score = hub
        .app
        .catalog()
        .current_task()
        .and_then(|t| t.traces().get(&shown))
        .map(|t| t.score);
    match score {
        Some(score) => println!("Trace {shown} now scores {score:+}."),
        None => println!("Vote on {shown} acknowledged."),
    }
    Ok(())
}

pub(crate) async fn export(settings: &Settings, source: &DatasetSource, out_dir: &Path) -> Result<()> {
    let mut hub = Hub::open(settings, source).await?;
    let ids: Vec<String> = hub
        .app
        .catalog()
        .tasks()
        .iter()
        .filter_map(|t| t.id().map(str::to_owned))
        .collect();
    for id in &ids {
        hub.focus(id).await?;
    }
    let export = hub.app.export()?;
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(&export.file_name);
    fs::write(&path, export.contents).with_context(|| format!("writing {}", path.display()))?;
    println!(
        "Exported {} tasks ({} with traces loaded) to {}",
        hub.app.catalog().len(),
        ids.len(),
        path.display()
    );
    Ok(())
}
