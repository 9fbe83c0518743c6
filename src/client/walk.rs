//! Subtree traversal streams.
//!
//! Walks are pull-based: each `poll_next` either hands out a buffered
//! varbind or drives one GETNEXT/GETBULK round trip. A traversal ends at
//! endOfMibView or at the first name outside the requested root, and a
//! name that fails to advance ends the stream with an error so a broken
//! agent cannot loop the caller forever.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;

use super::Client;

type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<VarBind>>> + Send>>;

/// How the next batch is requested.
#[derive(Clone, Copy)]
enum Fetch {
    /// One GETNEXT per round trip.
    Next,
    /// GETBULK with this many repetitions per round trip.
    Bulk(i32),
}

/// Where the traversal stands inside the subtree.
struct Cursor {
    root: Oid,
    position: Oid,
    yielded: Option<Oid>,
}

/// Verdict for one varbind coming back from the agent.
enum Step {
    /// Hand this binding to the caller.
    Out(VarBind),
    /// Traversal is complete.
    End,
    /// The agent failed to advance past `previous`.
    Stuck { previous: Oid, current: Oid },
}

impl Cursor {
    fn new(root: Oid) -> Self {
        Self {
            position: root.clone(),
            root,
            yielded: None,
        }
    }

    fn advance(&mut self, vb: VarBind) -> Step {
        if matches!(vb.value, Value::EndOfMibView) || !vb.oid.starts_with(&self.root) {
            return Step::End;
        }
        if let Some(previous) = self.yielded.take()
            && vb.oid <= previous
        {
            return Step::Stuck {
                previous,
                current: vb.oid,
            };
        }
        self.position = vb.oid.clone();
        self.yielded = Some(vb.oid.clone());
        Step::Out(vb)
    }
}

enum State {
    /// Ready to issue the next request.
    Idle,
    /// A round trip is in progress.
    InFlight(FetchFuture),
    /// Terminal; the stream only returns `None` from here on.
    Finished,
}

/// Shared engine behind [`Walk`] and [`BulkWalk`].
struct Traversal<T: Transport> {
    client: Client<T>,
    fetch: Fetch,
    cursor: Cursor,
    buffered: VecDeque<VarBind>,
    state: State,
}

impl<T: Transport> Traversal<T> {
    fn new(client: Client<T>, root: Oid, fetch: Fetch) -> Self {
        Self {
            client,
            fetch,
            cursor: Cursor::new(root),
            buffered: VecDeque::new(),
            state: State::Idle,
        }
    }

    fn finish(&mut self) {
        self.buffered.clear();
        self.state = State::Finished;
    }
}

impl<T: Transport + 'static> Traversal<T> {
    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<VarBind>>> {
        loop {
            // Drain what the last round trip brought in before fetching more.
            while let Some(vb) = self.buffered.pop_front() {
                match self.cursor.advance(vb) {
                    Step::Out(vb) => return Poll::Ready(Some(Ok(vb))),
                    Step::End => {
                        self.finish();
                        return Poll::Ready(None);
                    }
                    Step::Stuck { previous, current } => {
                        self.finish();
                        return Poll::Ready(Some(Err(Error::NonIncreasingOid {
                            previous,
                            current,
                        })));
                    }
                }
            }

            match &mut self.state {
                State::Finished => return Poll::Ready(None),
                State::Idle => {
                    let client = self.client.clone();
                    let from = self.cursor.position.clone();
                    let fut: FetchFuture = match self.fetch {
                        Fetch::Next => {
                            Box::pin(
                                async move { client.get_next(&from).await.map(|vb| vec![vb]) },
                            )
                        }
                        Fetch::Bulk(repetitions) => Box::pin(async move {
                            client
                                .get_bulk(std::slice::from_ref(&from), 0, repetitions)
                                .await
                        }),
                    };
                    self.state = State::InFlight(fut);
                }
                State::InFlight(fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(batch)) if batch.is_empty() => {
                        self.finish();
                        return Poll::Ready(None);
                    }
                    Poll::Ready(Ok(batch)) => {
                        self.buffered.extend(batch);
                        self.state = State::Idle;
                    }
                    Poll::Ready(Err(e)) => {
                        self.finish();
                        return Poll::Ready(Some(Err(e)));
                    }
                },
            }
        }
    }
}

/// GETNEXT walk over a subtree, created by [`Client::walk()`].
pub struct Walk<T: Transport> {
    inner: Box<Traversal<T>>,
}

impl<T: Transport> Walk<T> {
    pub(crate) fn new(client: Client<T>, root: Oid) -> Self {
        Self {
            inner: Box::new(Traversal::new(client, root, Fetch::Next)),
        }
    }
}

impl<T: Transport + 'static> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_step(cx)
    }
}

/// GETBULK walk over a subtree, created by [`Client::bulk_walk()`].
pub struct BulkWalk<T: Transport> {
    inner: Box<Traversal<T>>,
}

impl<T: Transport> BulkWalk<T> {
    pub(crate) fn new(client: Client<T>, root: Oid, max_repetitions: i32) -> Self {
        Self {
            inner: Box::new(Traversal::new(client, root, Fetch::Bulk(max_repetitions))),
        }
    }
}

impl<T: Transport + 'static> Stream for BulkWalk<T> {
    type Item = Result<VarBind>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_step(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn binding(oid: Oid) -> VarBind {
        VarBind::new(oid, Value::Integer(1))
    }

    #[test]
    fn test_cursor_yields_and_tracks_position() {
        let mut cursor = Cursor::new(oid!(1, 3, 6, 1, 2, 1, 1));

        let first = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
        assert!(matches!(cursor.advance(binding(first.clone())), Step::Out(_)));
        assert_eq!(cursor.position, first);

        let second = oid!(1, 3, 6, 1, 2, 1, 1, 2, 0);
        assert!(matches!(cursor.advance(binding(second.clone())), Step::Out(_)));
        assert_eq!(cursor.position, second);
    }

    #[test]
    fn test_cursor_ends_on_end_of_mib_view() {
        let mut cursor = Cursor::new(oid!(1, 3, 6, 1, 2, 1, 1));
        let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::EndOfMibView);
        assert!(matches!(cursor.advance(vb), Step::End));
    }

    #[test]
    fn test_cursor_ends_outside_root() {
        let mut cursor = Cursor::new(oid!(1, 3, 6, 1, 2, 1, 1));
        // The next subtree over terminates the traversal silently
        let vb = binding(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0));
        assert!(matches!(cursor.advance(vb), Step::End));
    }

    #[test]
    fn test_cursor_flags_non_increasing_names() {
        let mut cursor = Cursor::new(oid!(1, 3, 6, 1, 2, 1, 1));

        let name = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);
        assert!(matches!(cursor.advance(binding(name.clone())), Step::Out(_)));

        // Same name again: the agent is not making progress
        match cursor.advance(binding(name.clone())) {
            Step::Stuck { previous, current } => {
                assert_eq!(previous, name);
                assert_eq!(current, name);
            }
            _ => panic!("expected a stuck verdict"),
        }

        // Going backwards is just as stuck
        let mut cursor = Cursor::new(oid!(1, 3, 6, 1, 2, 1, 1));
        assert!(matches!(
            cursor.advance(binding(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0))),
            Step::Out(_)
        ));
        assert!(matches!(
            cursor.advance(binding(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0))),
            Step::Stuck { .. }
        ));
    }

    #[test]
    fn test_cursor_accepts_names_deeper_than_root() {
        let root = oid!(1, 3, 6, 1);
        let mut cursor = Cursor::new(root.clone());
        assert!(matches!(
            cursor.advance(binding(oid!(1, 3, 6, 1, 4, 1, 9999, 1))),
            Step::Out(_)
        ));
    }
}
