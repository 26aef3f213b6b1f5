use serde::Serialize;

use crate::error::SearchError;
use crate::render::LayerSet;
use crate::search::SearchOutcome;
use crate::types::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SearchToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied,
    /// A newer search started after this one; its result was dropped.
    Stale,
}

/// Map state shared by successive searches: the layers, the view centre and
/// the error region.
#[derive(Default)]
pub struct MapSession {
    latest: u64,
    layers: LayerSet,
    center: Option<Coordinate>,
    message: Option<String>,
}

impl MapSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a submission: hands out a fresh token and clears the error region.
    pub fn begin(&mut self) -> SearchToken {
        self.latest += 1;
        self.message = None;
        SearchToken(self.latest)
    }

    pub fn is_current(&self, token: SearchToken) -> bool {
        token.0 == self.latest
    }

    /// Moves the view to a freshly geocoded centre, before any buildings arrive.
    pub fn recenter(&mut self, token: SearchToken, center: Coordinate) -> Commit {
        if !self.is_current(token) {
            return Commit::Stale;
        }
        self.center = Some(center);
        Commit::Applied
    }

    pub fn commit(
        &mut self,
        token: SearchToken,
        result: Result<SearchOutcome, SearchError>,
    ) -> Commit {
        if !self.is_current(token) {
            tracing::info!("Dropping result of search {} (latest is {})", token.0, self.latest);
            return Commit::Stale;
        }
        match result {
            Ok(outcome) => {
                self.center = Some(outcome.center);
                self.layers.render(&outcome.buildings);
                if outcome.buildings.is_empty() {
                    self.message = Some(SearchError::NoBuildingsFound.user_message());
                }
            }
            // layers keep the previous result
            Err(err) => {
                tracing::warn!("Search {} failed: {}", token.0, err);
                self.message = Some(err.user_message());
            }
        }
        Commit::Applied
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerSet {
        &mut self.layers
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.center
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
