//! Purpose: Turn push-style producer callbacks into an ordered, abortable event stream.
//! Exports: `RecordStream`, `StreamIntake`, `AbortHandle`, `Delivery`, `StreamEvent`.
//! Role: Consumer side of every foreground scan/query and of each paginated page.
//! Invariants: Events surface in producer order and `End` is surfaced exactly once, last.
//! Invariants: Once aborted no `Data` is surfaced and the intake answers `false` to every push.
//! Invariants: Backpressure is the boolean returned by the intake; nothing else signals the producer.
use super::error::{Error, ErrorKind};
use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, trace, warn};

/// What a producer hands to the intake for one callback invocation.
#[derive(Debug)]
pub enum Delivery<T> {
    Item(T),
    Error(Error),
    /// No more items. Paginated producers attach the bookmark for the next page.
    End(Option<Bytes>),
}

/// What the consumer observes.
#[derive(Debug)]
pub enum StreamEvent<T> {
    Data(T),
    Error(Error),
    End(Option<Bytes>),
}

enum Signal<T> {
    Delivery(Delivery<T>),
    Abort,
}

#[derive(Default)]
struct Shared {
    aborted: AtomicBool,
    after_abort: AtomicUsize,
}

pub struct StreamIntake<T> {
    tx: mpsc::UnboundedSender<Signal<T>>,
    shared: Arc<Shared>,
}

impl<T> Clone for StreamIntake<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> StreamIntake<T> {
    /// Returns whether the producer should keep sending.
    pub fn push(&self, delivery: Delivery<T>) -> bool {
        if self.shared.aborted.load(Ordering::Acquire) {
            let late = self.shared.after_abort.fetch_add(1, Ordering::Relaxed) + 1;
            if late > 1 {
                warn!(late, "producer kept delivering after the stream was aborted");
            } else {
                trace!("dropping delivery received after abort");
            }
            return false;
        }
        self.tx.send(Signal::Delivery(delivery)).is_ok()
    }

    pub fn item(&self, item: T) -> bool {
        self.push(Delivery::Item(item))
    }

    pub fn error(&self, error: Error) -> bool {
        self.push(Delivery::Error(error))
    }

    pub fn end(&self) -> bool {
        self.push(Delivery::End(None))
    }

    pub fn end_with_bookmark(&self, bookmark: Bytes) -> bool {
        self.push(Delivery::End(Some(bookmark)))
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }
}

/// Cloneable handle that aborts a stream from anywhere.
pub struct AbortHandle<T> {
    wake: mpsc::WeakUnboundedSender<Signal<T>>,
    shared: Arc<Shared>,
}

impl<T> Clone for AbortHandle<T> {
    fn clone(&self) -> Self {
        Self {
            wake: self.wake.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> AbortHandle<T> {
    /// Idempotent; only the first call has an effect.
    pub fn abort(&self) {
        if self.shared.aborted.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("record stream aborted");
        // Wake a consumer parked on an empty queue; the end itself is surfaced on its next poll.
        if let Some(tx) = self.wake.upgrade() {
            let _ = tx.send(Signal::Abort);
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }
}

pub struct RecordStream<T> {
    rx: mpsc::UnboundedReceiver<Signal<T>>,
    handle: AbortHandle<T>,
    pending_end: bool,
    ended: bool,
}

impl<T> RecordStream<T> {
    pub fn channel() -> (RecordStream<T>, StreamIntake<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let handle = AbortHandle {
            wake: tx.downgrade(),
            shared: Arc::clone(&shared),
        };
        let stream = RecordStream {
            rx,
            handle,
            pending_end: false,
            ended: false,
        };
        (stream, StreamIntake { tx, shared })
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle<T> {
        self.handle.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.handle.is_aborted()
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent<T>> {
        self.next().await
    }

    /// Drain every item, failing on the first producer error.
    pub async fn collect_records(mut self) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Data(item) => items.push(item),
                StreamEvent::Error(err) => {
                    self.abort();
                    return Err(err);
                }
                StreamEvent::End(_) => break,
            }
        }
        Ok(items)
    }

    fn finish(&mut self, bookmark: Option<Bytes>) -> Poll<Option<StreamEvent<T>>> {
        self.ended = true;
        debug!(has_bookmark = bookmark.is_some(), "record stream ended");
        Poll::Ready(Some(StreamEvent::End(bookmark)))
    }
}

impl<T> Unpin for RecordStream<T> {}

impl<T> Stream for RecordStream<T> {
    type Item = StreamEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.ended {
                return Poll::Ready(None);
            }
            if this.handle.is_aborted() || this.pending_end {
                return this.finish(None);
            }
            match ready!(this.rx.poll_recv(cx)) {
                Some(Signal::Abort) => continue,
                Some(Signal::Delivery(Delivery::Item(item))) => {
                    return Poll::Ready(Some(StreamEvent::Data(item)));
                }
                Some(Signal::Delivery(Delivery::Error(err))) if err.is_benign_end() => {
                    return this.finish(None);
                }
                Some(Signal::Delivery(Delivery::Error(err))) => {
                    return Poll::Ready(Some(StreamEvent::Error(err)));
                }
                Some(Signal::Delivery(Delivery::End(bookmark))) => {
                    return this.finish(bookmark);
                }
                None => {
                    this.pending_end = true;
                    return Poll::Ready(Some(StreamEvent::Error(
                        Error::new(ErrorKind::Internal)
                            .with_message("producer closed the stream without signalling end"),
                    )));
                }
            }
        }
    }
}
