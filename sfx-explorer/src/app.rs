//! Event loop: repaint on every refresh notification until interrupted.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use sfx_client::RestDataSource;
use sfx_core::{ClusterDataSource, ExplorerConfig};
use sfx_tree::{ExplorerSession, RefreshEvent, SessionSettings};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::render::TreeRenderer;

pub struct App {
    session: ExplorerSession,
    events: mpsc::Receiver<RefreshEvent>,
    renderer: TreeRenderer,
}

impl App {
    /// Open a session against the configured cluster endpoint.
    pub fn connect(config: &ExplorerConfig) -> Result<Self, AppError> {
        let source: Arc<dyn ClusterDataSource> = Arc::new(RestDataSource::new(&config.cluster)?);
        Self::with_source(config, source)
    }

    pub fn with_source(
        config: &ExplorerConfig,
        source: Arc<dyn ClusterDataSource>,
    ) -> Result<Self, AppError> {
        let (session, events) = ExplorerSession::new(source, SessionSettings::from(config))?;
        if config.refresh.auto_refresh {
            session.start_auto_refresh();
        }
        Ok(Self {
            session,
            events,
            renderer: TreeRenderer::new(config.render.max_depth),
        })
    }

    pub fn session(&self) -> &ExplorerSession {
        &self.session
    }

    /// Paint once, then repaint on each notification until Ctrl-C or until
    /// the scheduler goes away.
    pub async fn run<W: Write>(self, out: &mut W) -> Result<(), AppError> {
        self.run_until(out, tokio::signal::ctrl_c()).await
    }

    /// [`App::run`] with an arbitrary shutdown signal. The signal is also
    /// watched while a repaint waits on fetches.
    pub async fn run_until<W, S>(mut self, out: &mut W, shutdown: S) -> Result<(), AppError>
    where
        W: Write,
        S: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(shutdown);
        self.session.full_refresh();

        loop {
            let event = tokio::select! {
                event = self.events.recv() => event,
                signal = &mut shutdown => {
                    signal?;
                    tracing::info!("interrupted");
                    break;
                }
            };
            let Some(event) = event else {
                break;
            };
            tokio::select! {
                painted = self.paint(&event, out) => painted?,
                signal = &mut shutdown => {
                    signal?;
                    tracing::info!("interrupted during repaint");
                    break;
                }
            }
        }

        self.session.shutdown();
        Ok(())
    }

    /// Render the part of the tree `event` names.
    pub async fn paint<W: Write>(&self, event: &RefreshEvent, out: &mut W) -> Result<(), AppError> {
        let text = match event {
            RefreshEvent::FullTree => self.renderer.render(self.session.root()).await,
            RefreshEvent::Node(node) => self.renderer.render(node).await,
        };
        tracing::debug!(full_tree = event.is_full_tree(), lines = text.lines().count(), "repaint");
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }

    /// Receive the next notification, if the scheduler is still alive.
    pub async fn next_event(&mut self) -> Option<RefreshEvent> {
        self.events.recv().await
    }
}
