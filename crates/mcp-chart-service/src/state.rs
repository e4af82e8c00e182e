//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServiceConfig;

/// Chart paths that are always served regardless of the prefix.
const BASE_CHART_PATHS: [&str; 2] = ["/chart", "/service/chart"];

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Resolved service configuration.
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Paths answering health checks.
    pub fn health_paths(&self) -> Vec<String> {
        let mut paths = vec!["/health".to_string()];
        push_unique(&mut paths, format!("{}/health", self.config.path_prefix));
        paths
    }

    /// Paths accepting chart requests, in the order they are advertised.
    pub fn chart_paths(&self) -> Vec<String> {
        let mut paths = vec![BASE_CHART_PATHS[0].to_string()];
        push_unique(&mut paths, format!("{}/chart", self.config.path_prefix));
        push_unique(&mut paths, BASE_CHART_PATHS[1].to_string());
        paths
    }
}

fn push_unique(paths: &mut Vec<String>, path: String) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}
