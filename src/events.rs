//! Progress events emitted while a run is in flight.
//!
//! Callers that want progress pass an `mpsc` sender into the pipeline and
//! consume events on their side (the CLI drives a progress bar from them).
//! Nothing is emitted when no sender is configured. Delivery is best effort:
//! a subscriber that falls behind loses events, it never slows the run.

use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::directory::Language;

/// Sending half of a progress channel
pub type EventSender = mpsc::Sender<CrawlEvent>;

/// A stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Crawl,
    Directory,
    Load,
    Index,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Crawl => "crawl",
            Phase::Directory => "directory",
            Phase::Load => "load",
            Phase::Index => "index",
        };
        f.write_str(name)
    }
}

/// Progress notifications for a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    /// A pipeline stage has started
    PhaseStarted { phase: Phase },

    /// Sitemaps were read; `total` distinct URLs were found
    UrlsLoaded { total: usize },

    /// A URL matched no classification rule and will not be processed
    UrlSkipped { url: String },

    /// A URL has been handled, successfully or not
    UrlFinished {
        url: String,
        ok: bool,
        completed: usize,
        total: usize,
    },

    /// Directory records extracted for one language
    DirectoryProgress {
        language: Language,
        done: usize,
        total: usize,
    },

    /// A namespace has been written to the vector index
    NamespacePublished { namespace: String, vectors: usize },
}

/// Send `event` if a channel is configured.
///
/// Never waits: the event is dropped when the channel is full or closed.
pub fn emit(events: Option<&EventSender>, event: CrawlEvent) {
    let Some(sender) = events else {
        return;
    };
    match sender.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => debug!("Progress channel full, dropping {:?}", event),
        Err(TrySendError::Closed(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_channel_is_noop() {
        emit(None, CrawlEvent::UrlsLoaded { total: 3 });
    }

    #[test]
    fn test_emit_survives_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        emit(Some(&tx), CrawlEvent::PhaseStarted { phase: Phase::Crawl });
    }

    #[tokio::test]
    async fn test_emit_delivers() {
        let (tx, mut rx) = mpsc::channel(4);
        emit(Some(&tx), CrawlEvent::UrlSkipped { url: "https://a".into() });
        assert_eq!(
            rx.recv().await,
            Some(CrawlEvent::UrlSkipped { url: "https://a".into() })
        );
        assert_eq!(Phase::Index.to_string(), "index");
    }

    #[tokio::test]
    async fn test_emit_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        emit(Some(&tx), CrawlEvent::UrlsLoaded { total: 1 });
        emit(Some(&tx), CrawlEvent::UrlsLoaded { total: 2 });
        drop(tx);

        assert_eq!(rx.recv().await, Some(CrawlEvent::UrlsLoaded { total: 1 }));
        assert_eq!(rx.recv().await, None);
    }
}
