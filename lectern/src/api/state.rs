use std::sync::Arc;

use crate::audio::FeedbackPlayer;
use crate::capture::FrameAcquirer;
use crate::config::Config;
use crate::session::Orchestrator;
use crate::store::ResultStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// History of finished capture sessions.
    pub store: Arc<ResultStore>,
    /// Single-flight capture pipeline shared with the trigger loops.
    pub orchestrator: Arc<Orchestrator>,
    pub acquirer: Arc<FrameAcquirer>,
    pub player: Arc<FeedbackPlayer>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<ResultStore>,
        orchestrator: Arc<Orchestrator>,
        acquirer: Arc<FrameAcquirer>,
        player: Arc<FeedbackPlayer>,
    ) -> Self {
        Self {
            config,
            store,
            orchestrator,
            acquirer,
            player,
        }
    }
}
