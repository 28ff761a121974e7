//! The concrete feature sessions. Each composes the orchestrator, frame
//! pump, prediction state, and feedback policy into one long-running
//! feature behind the [`Feature`](crate::lifecycle::Feature) contract.

mod item_search;
mod read_text;
mod text_search;

pub use item_search::{ItemSearchConfig, ItemSearchSession};
pub use read_text::{ReadTextConfig, ReadTextSession};
pub use text_search::{TextSearchConfig, TextSearchSession};

use crate::orchestrator::Phase;

/// Phases of a guided session. Shared by all three features; each feature
/// supplies its own adjacency table, so the reading flow (which has no
/// query acquisition) simply never visits the speech phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    /// Acquiring the query (speech or keyboard).
    Listening,
    /// Interpreting the recognized text against the target catalog.
    ProcessingSpeech,
    /// Speaking the resolved target name; auto-advances when done.
    Announcing,
    /// Frames, detections, and feedback are live.
    Searching,
    Completed,
}

impl Phase for SearchPhase {
    const IDLE: Self = SearchPhase::Idle;

    fn is_active(&self) -> bool {
        matches!(self, SearchPhase::Searching)
    }
}

impl SearchPhase {
    /// Running means a session is underway, on either side of pause.
    pub fn is_running(&self) -> bool {
        !matches!(self, SearchPhase::Idle | SearchPhase::Completed)
    }
}

/// Adjacency for the two search features. `Idle → ProcessingSpeech` is the
/// preselected-target path that skips query acquisition.
pub fn search_adjacency(from: SearchPhase, to: SearchPhase) -> bool {
    use SearchPhase::*;
    matches!(
        (from, to),
        (Idle, Listening)
            | (Idle, ProcessingSpeech)
            | (Listening, ProcessingSpeech)
            | (ProcessingSpeech, Announcing)
            | (Announcing, Searching)
            | (Searching, Completed)
    )
}

/// Adjacency for continuous reading: no query acquisition, straight into
/// the active phase.
pub fn read_adjacency(from: SearchPhase, to: SearchPhase) -> bool {
    use SearchPhase::*;
    matches!((from, to), (Idle, Searching) | (Searching, Completed))
}

pub(crate) const AUTO_OFF_WARNING: &str = "Still searching. Auto-off soon";
pub(crate) const AUTO_OFF_NOTICE: &str = "Search paused automatically";
pub(crate) const NOT_SUPPORTED_SUFFIX: &str = "is not supported yet";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_flow_is_connected() {
        use SearchPhase::*;
        assert!(search_adjacency(Idle, Listening));
        assert!(search_adjacency(Listening, ProcessingSpeech));
        assert!(search_adjacency(ProcessingSpeech, Announcing));
        assert!(search_adjacency(Announcing, Searching));
        assert!(search_adjacency(Searching, Completed));
    }

    #[test]
    fn searching_is_not_reachable_from_idle() {
        assert!(!search_adjacency(SearchPhase::Idle, SearchPhase::Searching));
    }

    #[test]
    fn preselected_path_skips_listening() {
        assert!(search_adjacency(
            SearchPhase::Idle,
            SearchPhase::ProcessingSpeech
        ));
    }

    #[test]
    fn read_flow_enters_directly() {
        assert!(read_adjacency(SearchPhase::Idle, SearchPhase::Searching));
        assert!(!read_adjacency(SearchPhase::Idle, SearchPhase::Listening));
    }

    #[test]
    fn only_searching_is_pausable() {
        assert!(SearchPhase::Searching.is_active());
        assert!(!SearchPhase::Listening.is_active());
        assert!(!SearchPhase::Announcing.is_active());
    }

    #[test]
    fn running_excludes_terminal_phases() {
        assert!(SearchPhase::Listening.is_running());
        assert!(SearchPhase::Searching.is_running());
        assert!(!SearchPhase::Idle.is_running());
        assert!(!SearchPhase::Completed.is_running());
    }
}
