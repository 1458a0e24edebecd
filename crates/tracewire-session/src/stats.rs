use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracewire_frame::proto::TraceStats;

/// Outstanding `GetTraceStats` calls, answered in the order they were sent.
///
/// The daemon handles one request at a time per connection, so stats
/// replies arrive in request order and are matched first-in first-out
/// rather than by request id.
#[derive(Debug, Default)]
pub struct PendingStatsQueue {
    waiters: VecDeque<oneshot::Sender<TraceStats>>,
}

impl PendingStatsQueue {
    /// Queue a new waiter.
    pub fn push(&mut self) -> StatsWaiter {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        StatsWaiter { rx }
    }

    /// Hand `stats` to the oldest waiter. Returns `false` if none was waiting.
    pub fn resolve_next(&mut self, stats: TraceStats) -> bool {
        match self.waiters.pop_front() {
            Some(tx) => {
                // A dropped waiter just means nobody is interested any more.
                let _ = tx.send(stats);
                true
            }
            None => false,
        }
    }

    /// Resolve every waiter with empty stats. Returns how many were waiting.
    pub fn resolve_all_empty(&mut self) -> usize {
        let count = self.waiters.len();
        for tx in self.waiters.drain(..) {
            let _ = tx.send(TraceStats::default());
        }
        count
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Resolves to the stats of one `GetTraceStats` reply.
///
/// Never fails: if the session is torn down (or dropped) first, it resolves
/// to empty stats.
#[derive(Debug)]
pub struct StatsWaiter {
    rx: oneshot::Receiver<TraceStats>,
}

impl StatsWaiter {
    /// A waiter that is already resolved.
    pub fn resolved(stats: TraceStats) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(stats);
        Self { rx }
    }
}

impl Future for StatsWaiter {
    type Output = TraceStats;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_default())
    }
}

/// Resolves to the fullest buffer's occupancy, see [`buffer_usage`].
#[derive(Debug)]
pub struct BufferUsage {
    state: UsageState,
}

#[derive(Debug)]
enum UsageState {
    Ready(f64),
    Waiting(StatsWaiter),
    Done,
}

impl BufferUsage {
    pub fn ready(usage: f64) -> Self {
        Self {
            state: UsageState::Ready(usage),
        }
    }

    pub fn waiting(waiter: StatsWaiter) -> Self {
        Self {
            state: UsageState::Waiting(waiter),
        }
    }
}

impl Future for BufferUsage {
    type Output = f64;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match std::mem::replace(&mut self.state, UsageState::Done) {
            UsageState::Ready(usage) => Poll::Ready(usage),
            UsageState::Waiting(mut waiter) => match Pin::new(&mut waiter).poll(cx) {
                Poll::Ready(stats) => Poll::Ready(buffer_usage(&stats)),
                Poll::Pending => {
                    self.state = UsageState::Waiting(waiter);
                    Poll::Pending
                }
            },
            UsageState::Done => panic!("BufferUsage polled after completion"),
        }
    }
}

/// Highest `bytes_written / buffer_size` over all buffers.
///
/// Buffers missing either size are skipped and a zero-sized buffer counts
/// as empty. The ratio is not clamped: an overfull buffer reports more
/// than 1.0. Returns 0.0 when no buffer qualifies.
pub fn buffer_usage(stats: &TraceStats) -> f64 {
    let mut usage = 0.0f64;
    for buffer in &stats.buffer_stats {
        let (Some(written), Some(size)) = (buffer.bytes_written, buffer.buffer_size) else {
            continue;
        };
        if size == 0 {
            continue;
        }
        usage = usage.max(written as f64 / size as f64);
    }
    usage
}
