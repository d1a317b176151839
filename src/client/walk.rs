//! Lazy walk streams.
//!
//! A walk issues strictly sequential GETNEXT (or GETBULK) rounds and
//! yields `(oid, value)` pairs while they remain inside the requested
//! subtrees. Termination: endOfMibView, the first non-descendant OID, or
//! an agent misbehavior (the same OID seen twice), which under
//! [`ErrorHandling::Strict`] surfaces as
//! [`Error::FaultySnmpImplementation`] and under [`ErrorHandling::Warn`]
//! logs and ends the stream.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;

use super::Client;

/// How walk-level agent misbehavior is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Surface [`Error::FaultySnmpImplementation`] (default).
    #[default]
    Strict,
    /// Log a warning and end the walk cleanly.
    Warn,
}

/// How the walk fetches each round.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FetchMode {
    /// One GETNEXT per round.
    GetNext,
    /// One GETBULK per round, up to `bulk_size` listing entries.
    Bulk { bulk_size: usize },
}

struct Cursor {
    root: Oid,
    current: Oid,
    done: bool,
}

type FetchFuture = Pin<Box<dyn std::future::Future<Output = Result<Vec<VarBind>>> + Send>>;

/// Async stream over an OID subtree walk.
///
/// Created by [`Client::walk`], [`Client::multi_walk`] or
/// [`Client::bulk_walk`]. Each exhausted buffer triggers one network
/// round trip; within the stream, rounds are strictly sequential.
pub struct Walk<T: Transport + 'static> {
    client: Client<T>,
    cursors: Vec<Cursor>,
    yielded: HashSet<Oid>,
    buffer: VecDeque<VarBind>,
    mode: FetchMode,
    error_handling: ErrorHandling,
    done: bool,
    pending: Option<FetchFuture>,
}

impl<T: Transport + 'static> Walk<T> {
    pub(crate) fn new(
        client: Client<T>,
        roots: Vec<Oid>,
        mode: FetchMode,
        error_handling: ErrorHandling,
    ) -> Self {
        let cursors = roots
            .into_iter()
            .map(|root| Cursor {
                current: root.clone(),
                root,
                done: false,
            })
            .collect();
        Self {
            client,
            cursors,
            yielded: HashSet::new(),
            buffer: VecDeque::new(),
            mode,
            error_handling,
            done: false,
            pending: None,
        }
    }

    /// Change the misbehavior handling for this walk.
    pub fn error_handling(mut self, handling: ErrorHandling) -> Self {
        self.error_handling = handling;
        self
    }

    /// The next varbind, or `None` when the walk is complete.
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Drain the walk into a vector.
    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(item) = self.next().await {
            results.push(item?);
        }
        Ok(results)
    }

    /// Fold one round of results into the cursors and the buffer.
    ///
    /// Repeated-OID detection happens at two levels: the fetchers reject
    /// results that are not strict successors of their request (the
    /// looping-agent case), and anything already yielded — a parallel
    /// column walking into a sibling's subtree — is skipped here. A
    /// cursor that produced nothing new is finished.
    fn absorb_round(&mut self, varbinds: Vec<VarBind>) {
        // Assign each result to the first active cursor whose subtree
        // contains it; cursors that received nothing are finished.
        let mut per_cursor: Vec<Vec<VarBind>> =
            (0..self.cursors.len()).map(|_| Vec::new()).collect();

        for vb in varbinds {
            if vb.value == Value::EndOfMibView {
                continue;
            }
            let owner = self
                .cursors
                .iter()
                .position(|c| !c.done && c.root.parent_of(&vb.oid));
            match owner {
                Some(idx) => per_cursor[idx].push(vb),
                None => {
                    tracing::debug!(
                        target: "snmpkit::client",
                        oid = %vb.oid,
                        "walk result outside every requested subtree, dropped"
                    );
                }
            }
        }

        for (cursor, results) in self.cursors.iter_mut().zip(per_cursor) {
            if cursor.done {
                continue;
            }

            let mut advanced = false;
            for vb in results {
                if !self.yielded.insert(vb.oid.clone()) {
                    tracing::debug!(
                        target: "snmpkit::client",
                        oid = %vb.oid,
                        "already-seen OID skipped"
                    );
                    continue;
                }
                advanced = true;
                cursor.current = vb.oid.clone();
                self.buffer.push_back(vb);
            }
            if !advanced {
                cursor.done = true;
            }
        }

        if self.cursors.iter().all(|c| c.done) {
            self.done = true;
        }
    }
}

impl<T: Transport + 'static> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(vb) = self.buffer.pop_front() {
                return Poll::Ready(Some(Ok(vb)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            if self.pending.is_none() {
                let requests: Vec<Oid> = self
                    .cursors
                    .iter()
                    .filter(|c| !c.done)
                    .map(|c| c.current.clone())
                    .collect();
                if requests.is_empty() {
                    self.done = true;
                    return Poll::Ready(None);
                }

                let client = self.client.clone();
                let fut: FetchFuture = match self.mode {
                    FetchMode::GetNext => {
                        Box::pin(async move { client.multi_get_next(&requests).await })
                    }
                    FetchMode::Bulk { bulk_size } => {
                        Box::pin(async move { client.bulk_listing(&requests, bulk_size).await })
                    }
                };
                self.pending = Some(fut);
            }

            let pending = self.pending.as_mut().expect("pending fetch was just set");
            match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => {
                    self.pending = None;
                    match result {
                        Ok(varbinds) => {
                            self.absorb_round(varbinds);
                            // loop: drain buffer or fetch again
                        }
                        Err(Error::FaultySnmpImplementation { oid })
                            if self.error_handling == ErrorHandling::Warn =>
                        {
                            tracing::warn!(
                                target: "snmpkit::client",
                                oid = %oid,
                                "walk aborted on faulty agent response"
                            );
                            self.done = true;
                            return Poll::Ready(None);
                        }
                        Err(e) => {
                            self.done = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
            }
        }
    }
}
