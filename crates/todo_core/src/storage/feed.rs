//! Live "all tasks" feed.
//!
//! The store owns a [`FeedPublisher`] and pushes a full snapshot after every
//! committed write. Each [`TaskFeed`] sees the current snapshot first and
//! then the latest snapshot after each change. Snapshots published faster
//! than a subscriber reads them collapse into the newest one.

use crate::error::AppError;
use crate::model::Task;
use futures_util::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub type Snapshot = Arc<[Task]>;

#[derive(Debug, Clone)]
enum FeedState {
    Snapshot(Snapshot),
    Failed(AppError),
}

#[derive(Debug)]
pub struct FeedPublisher {
    sender: watch::Sender<FeedState>,
}

impl FeedPublisher {
    pub fn new(initial: Snapshot) -> Self {
        let (sender, _) = watch::channel(FeedState::Snapshot(initial));
        Self { sender }
    }

    pub fn publish(&self, snapshot: Snapshot) {
        self.sender.send_replace(FeedState::Snapshot(snapshot));
    }

    /// Ends every feed with `err`. Nothing is published afterwards.
    pub fn fail(&self, err: AppError) {
        self.sender.send_replace(FeedState::Failed(err));
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.sender.borrow(), FeedState::Failed(_))
    }

    pub fn subscribe(&self) -> TaskFeed {
        TaskFeed {
            receiver: self.sender.subscribe(),
            primed: false,
            finished: false,
            cancel: None,
        }
    }
}

/// A subscription to the full task list.
#[derive(Debug)]
pub struct TaskFeed {
    receiver: watch::Receiver<FeedState>,
    primed: bool,
    finished: bool,
    cancel: Option<CancellationToken>,
}

impl TaskFeed {
    /// Ties the feed to a scope: once `token` is cancelled the feed ends.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Waits for the next snapshot.
    ///
    /// The first call returns the current snapshot without waiting. Returns
    /// `Some(Err(_))` once if the store became unavailable, and `None` when
    /// the store is gone or the feed's scope was cancelled.
    pub async fn next(&mut self) -> Option<Result<Snapshot, AppError>> {
        if self.finished {
            return None;
        }

        if let Some(token) = &self.cancel
            && token.is_cancelled()
        {
            self.finished = true;
            return None;
        }

        if self.primed {
            let changed = match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => None,
                        changed = self.receiver.changed() => Some(changed),
                    }
                }
                None => Some(self.receiver.changed().await),
            };

            match changed {
                Some(Ok(())) => {}
                Some(Err(_)) | None => {
                    self.finished = true;
                    return None;
                }
            }
        }

        self.primed = true;
        let state = self.receiver.borrow_and_update().clone();
        match state {
            FeedState::Snapshot(tasks) => Some(Ok(tasks)),
            FeedState::Failed(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Snapshot, AppError>> {
        futures_util::stream::unfold(self, |mut feed| async move {
            feed.next().await.map(|item| (item, feed))
        })
    }
}
