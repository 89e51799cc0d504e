//! The pooled endpoint (§4.4) — the crate's hardest subsystem.
//!
//! All state mutation goes through the [`executor::CommandExecutor`]: every
//! public operation (`acquire`, a connect completing, a slot recycling
//! itself, the janitor tick, shutdown) is one closure submitted to the
//! executor, which guarantees FIFO, non-reentrant execution with no external
//! locking discipline required of callers. The [`PoolState`] the commands
//! mutate is still kept behind a [`std::sync::Mutex`] — not because two
//! commands ever run concurrently (they don't; the executor's "draining"
//! flag rules that out) but because nothing in the type system otherwise
//! proves that to a reader, and the lock is never contended in practice.

pub(crate) mod buffer;
pub(crate) mod executor;
pub(crate) mod slot;

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use futures_util::stream::{self, StreamExt};
use http::Uri;
use tokio::sync::oneshot;

use crate::{
    common::exec::Exec,
    config::PoolConfig,
    connection::{Connection, ConnectionHandler},
    error::Error,
    request::Request,
    response::Response,
    rt::{ArcTimer, Timer},
};
use buffer::{BufferId, TicketBuffer};
use executor::CommandExecutor;
use slot::{PooledConnectionSlot, SlotId};

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Establishes one fresh connection to the pool's authority, wiring the
/// given lifecycle handler to it. Built by [`crate::endpoint::Endpoint`]'s
/// builder, which closes over the [`crate::connect`] collaborator and the
/// protocol configs; the pool itself stays agnostic of TLS/DNS/transport
/// genericity (§6) by only ever seeing this type-erased entry point.
pub(crate) type ConnectFn =
    Arc<dyn Fn(Arc<dyn ConnectionHandler>) -> BoxFuture<Result<Connection, Error>> + Send + Sync>;

/// A single-shot destination for one ticket's outcome, shared between
/// whichever of {normal grant, connect completion, connect timeout, cancel}
/// resolves it first. A plain `oneshot::Sender` can't be raced this way
/// since `send` consumes it; this wraps one behind a take-once `Mutex`.
struct TicketSink {
    tx: Mutex<Option<oneshot::Sender<Result<PooledConnection, Error>>>>,
    /// Set while the ticket is linked into the pool's buffer, so a timeout
    /// or cancellation can unlink it in O(1) (§4.5).
    buffer_id: Mutex<Option<BufferId>>,
}

impl TicketSink {
    fn new() -> (Arc<TicketSink>, oneshot::Receiver<Result<PooledConnection, Error>>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(TicketSink {
                tx: Mutex::new(Some(tx)),
                buffer_id: Mutex::new(None),
            }),
            rx,
        )
    }

    /// Resolve with `result`, if nobody already has. If this loses the race
    /// (the sender was already taken), `result` is simply dropped here — for
    /// `Ok(PooledConnection)` that runs the connection's own `Drop` impl,
    /// recycling it exactly as if a consumer had received it and let it go
    /// unused (§5 "a just-fulfilled ticket silently recycles its connection
    /// on consumer drop").
    fn resolve(&self, result: Result<PooledConnection, Error>) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(result);
        }
    }
}

type Ticket = Arc<TicketSink>;

/// A granted unit of a connection's concurrency budget (§3 Pooled Connection
/// Slot). Dropping one without calling [`PooledConnection::send`] recycles
/// it immediately; calling `send` hands recycling off to the connection's
/// `on_exchange_terminate` callback instead, which fires once the exchange
/// (not just this handle) actually completes.
pub(crate) struct PooledConnection {
    pool: Pool,
    slot_id: SlotId,
    connection: Connection,
    released: bool,
}

impl PooledConnection {
    fn new(pool: Pool, slot_id: SlotId, connection: Connection) -> Self {
        PooledConnection {
            pool,
            slot_id,
            connection,
            released: false,
        }
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Run one exchange on this connection. Recycling from here on is
    /// driven by the connection's lifecycle callback, not by this handle.
    pub(crate) async fn send(mut self, request: Request) -> Result<Response, Error> {
        self.released = true;
        self.connection.send(request).await
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.released {
            let pool = self.pool.clone();
            let slot_id = self.slot_id;
            pool.shared.executor.submit(move || pool.cmd_recycle(slot_id));
        }
    }
}

/// A snapshot of the invariants in §8, useful for tests and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolStats {
    pub(crate) size: usize,
    pub(crate) connecting: usize,
    pub(crate) parked: usize,
    pub(crate) total_capacity: i64,
    pub(crate) capacity: i64,
    pub(crate) buffered: usize,
    pub(crate) closing: bool,
    pub(crate) closed: bool,
}

struct PoolState {
    active: Vec<PooledConnectionSlot>,
    parked: VecDeque<PooledConnectionSlot>,
    buffer: TicketBuffer<Ticket>,
    size: usize,
    connecting: usize,
    total_capacity: i64,
    capacity: i64,
    closing: bool,
    closed: bool,
    active_index: usize,
}

impl PoolState {
    fn new() -> Self {
        PoolState {
            active: Vec::new(),
            parked: VecDeque::new(),
            buffer: TicketBuffer::new(),
            size: 0,
            connecting: 0,
            total_capacity: 0,
            capacity: 0,
            closing: false,
            closed: false,
            active_index: 0,
        }
    }

    fn find_slot_mut(&mut self, id: SlotId) -> Option<&mut PooledConnectionSlot> {
        self.active
            .iter_mut()
            .find(|s| s.id == id)
            .or_else(move || self.parked.iter_mut().find(|s| s.id == id))
    }

    /// §4.4.2 Connection selection: round-robin with early-exit improvement.
    fn select_connection(&mut self) -> Option<usize> {
        let n = self.active.len();
        if n == 0 {
            return None;
        }
        if self.active_index >= n {
            self.active_index = 0;
        }
        let start = self.active_index;
        let best = self.active[start].load_factor();
        for step in 1..n {
            let idx = (start + step) % n;
            if self.active[idx].load_factor() < best {
                self.active_index = idx;
                return Some(idx);
            }
        }
        if best >= 1.0 { None } else { Some(start) }
    }

    fn buffer_has_room(&self, config: &PoolConfig) -> bool {
        if config.buffer_is_unbounded() {
            return true;
        }
        (self.buffer.len() as isize + self.connecting as isize) < config.buffer_bound()
    }

    /// Restore the first non-expired parked slot with spare capacity, if
    /// any (§4.4.1 step 3).
    fn pop_restorable_parked(&mut self, now: Instant) -> Option<PooledConnectionSlot> {
        let pos = self
            .parked
            .iter()
            .position(|s| !s.is_expired(now) && s.has_spare_capacity())?;
        self.parked.remove(pos)
    }

    /// Grant buffered tickets to whatever capacity [`Self::select_connection`]
    /// finds, until either the buffer drains or nothing more is selectable.
    /// Resolving the granted tickets is the caller's job, after releasing
    /// the pool lock (§4.4.3/.4/.5 "drainBuffer()").
    fn drain_buffer(&mut self) -> Vec<(Ticket, SlotId, Connection)> {
        let mut granted = Vec::new();
        loop {
            if self.buffer.is_empty() {
                break;
            }
            let Some(idx) = self.select_connection() else {
                break;
            };
            let ticket = self.buffer.poll().expect("buffer checked non-empty");
            let slot = &mut self.active[idx];
            slot.allocated += 1;
            self.capacity -= 1;
            granted.push((ticket, slot.id, slot.connection.clone()));
        }
        granted
    }

    /// §4.4.5 `remove(slot)`.
    fn remove_slot(&mut self, slot_id: SlotId) {
        if let Some(pos) = self.parked.iter().position(|s| s.id == slot_id) {
            if let Some(mut slot) = self.parked.remove(pos) {
                slot.removed = true;
            }
            return;
        }
        if let Some(pos) = self.active.iter().position(|s| s.id == slot_id) {
            let slot = self.active.swap_remove(pos);
            if pos < self.active.len() {
                self.active[pos].index = pos as isize;
            }
            if self.active_index >= self.active.len() {
                self.active_index = 0;
            }
            self.total_capacity -= i64::from(slot.capacity);
            self.capacity -= i64::from(slot.capacity - slot.allocated);
            self.size -= 1;
        }
    }

    /// Park the given active slot (§4.4.3 step 3).
    fn park_slot(&mut self, slot_id: SlotId, now: Instant, keep_alive_timeout: Option<Duration>) {
        let Some(pos) = self.active.iter().position(|s| s.id == slot_id) else {
            return;
        };
        let mut slot = self.active.swap_remove(pos);
        if pos < self.active.len() {
            self.active[pos].index = pos as isize;
        }
        if self.active_index >= self.active.len() {
            self.active_index = 0;
        }
        self.total_capacity -= i64::from(slot.capacity);
        self.capacity -= i64::from(slot.capacity - slot.allocated);
        self.size -= 1;
        slot.parked = true;
        slot.index = -1;
        slot.touch(keep_alive_timeout, now);
        self.parked.push_front(slot);
    }

    /// §4.4.5 `setCapacity(slot, newCap)`. Returns `true` if capacity grew.
    fn set_capacity(&mut self, slot_id: SlotId, new_capacity: u32) -> bool {
        let Some(slot) = self.find_slot_mut(slot_id) else {
            return false;
        };
        let old = slot.capacity;
        slot.capacity = new_capacity;
        let delta = i64::from(new_capacity) - i64::from(old);
        self.total_capacity += delta;
        self.capacity += delta;
        delta > 0
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.size,
            connecting: self.connecting,
            parked: self.parked.len(),
            total_capacity: self.total_capacity,
            capacity: self.capacity,
            buffered: self.buffer.len(),
            closing: self.closing,
            closed: self.closed,
        }
    }
}

struct Shared {
    executor: CommandExecutor,
    state: Mutex<PoolState>,
    config: PoolConfig,
    graceful_shutdown_timeout: Duration,
    authority: Uri,
    connect: ConnectFn,
    next_slot_id: AtomicU64,
    janitor: Mutex<Option<JanitorHandle>>,
    exec: Exec,
    timer: ArcTimer,
}

/// A stop signal for the janitor loop, dropped (and its receiver observed)
/// on shutdown — the pool's own [`Exec`] abstraction has no `abort()` the
/// way `tokio::task::JoinHandle` does, so cancellation is cooperative.
struct JanitorHandle {
    stop: oneshot::Sender<()>,
}

/// The pool's public handle. Cheap to clone (an `Arc` underneath); every
/// clone shares the same command executor and state.
#[derive(Clone)]
pub(crate) struct Pool {
    shared: Arc<Shared>,
}

impl Pool {
    pub(crate) fn new(
        authority: Uri,
        config: PoolConfig,
        graceful_shutdown_timeout: Duration,
        connect: ConnectFn,
        exec: Exec,
        timer: ArcTimer,
    ) -> Self {
        let pool = Pool {
            shared: Arc::new(Shared {
                executor: CommandExecutor::new(),
                state: Mutex::new(PoolState::new()),
                config,
                graceful_shutdown_timeout,
                authority,
                connect,
                next_slot_id: AtomicU64::new(0),
                janitor: Mutex::new(None),
                exec,
                timer,
            }),
        };
        pool.start_janitor();
        pool
    }

    pub(crate) fn authority(&self) -> &Uri {
        &self.shared.authority
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.shared.state.lock().unwrap().stats()
    }

    fn start_janitor(&self) {
        let pool = self.clone();
        let period = self.shared.config.clean_period;
        let timer = self.shared.timer.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.shared.exec.execute(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => return,
                    () = timer.sleep(period) => {
                        let pool = pool.clone();
                        pool.shared.executor.submit(move || pool.cmd_janitor());
                    }
                }
            }
        });
        *self.shared.janitor.lock().unwrap() = Some(JanitorHandle { stop: stop_tx });
    }

    /// §4.4.1 `acquire(ticket)`.
    pub(crate) async fn acquire(&self) -> Result<PooledConnection, Error> {
        let (sink, rx) = TicketSink::new();
        let pool = self.clone();
        let submitted = sink.clone();
        self.shared
            .executor
            .submit(move || pool.cmd_acquire(submitted));
        Acquire {
            pool: self.clone(),
            sink,
            rx: Some(rx),
        }
        .await
    }

    fn cmd_acquire(&self, sink: Ticket) {
        enum Action {
            Resolved(SlotId, Connection),
            Restore(PooledConnectionSlot),
            Connect,
            Buffered,
            Rejected(Error),
        }

        let action = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closing || state.closed {
                Action::Rejected(Error::pool_closed())
            } else if let Some(idx) = state.select_connection() {
                let slot = &mut state.active[idx];
                slot.allocated += 1;
                state.capacity -= 1;
                Action::Resolved(slot.id, slot.connection.clone())
            } else if state.connecting + state.size < self.shared.config.max_size {
                // Restoring a parked slot is synchronous (no network round
                // trip), so unlike a real connect, `connecting` never needs
                // incrementing for it.
                if let Some(restored) = state.pop_restorable_parked(Instant::now()) {
                    Action::Restore(restored)
                } else {
                    state.connecting += 1;
                    Action::Connect
                }
            } else if state.buffer_has_room(&self.shared.config) {
                let bid = state.buffer.push_front(sink.clone());
                *sink.buffer_id.lock().unwrap() = Some(bid);
                Action::Buffered
            } else {
                Action::Rejected(Error::pool_saturated())
            }
        };

        match action {
            Action::Resolved(slot_id, connection) => {
                sink.resolve(Ok(PooledConnection::new(self.clone(), slot_id, connection)));
            }
            Action::Restore(mut slot) => {
                slot.parked = false;
                slot.allocated += 1;
                let capacity = slot.capacity;
                let slot_id = slot.id;
                let connection = slot.connection.clone();
                let mut state = self.shared.state.lock().unwrap();
                slot.index = state.active.len() as isize;
                state.active.push(slot);
                state.size += 1;
                state.total_capacity += i64::from(capacity);
                state.capacity += i64::from(capacity) - 1;
                drop(state);
                sink.resolve(Ok(PooledConnection::new(self.clone(), slot_id, connection)));
            }
            Action::Connect => self.spawn_connect(sink),
            Action::Buffered => self.spawn_connect_timeout(sink),
            Action::Rejected(err) => sink.resolve(Err(err)),
        }
    }

    fn spawn_connect(&self, sink: Ticket) {
        let pool = self.clone();
        let slot_id = SlotId(self.shared.next_slot_id.fetch_add(1, Ordering::Relaxed));
        let connect = self.shared.connect.clone();
        let connect_sink = sink.clone();
        self.shared.exec.execute(async move {
            let handler: Arc<dyn ConnectionHandler> = Arc::new(SlotHandler {
                pool: pool.clone(),
                slot_id,
            });
            let result = connect(handler).await;
            pool.shared
                .executor
                .submit(move || pool.cmd_connect_complete(slot_id, result, connect_sink));
        });
        self.spawn_connect_timeout(sink);
    }

    fn spawn_connect_timeout(&self, sink: Ticket) {
        let pool = self.clone();
        let timeout = self.shared.config.connect_timeout;
        let timer = self.shared.timer.clone();
        self.shared.exec.execute(async move {
            timer.sleep(timeout).await;
            pool.shared.executor.submit(move || pool.cmd_ticket_timeout(sink));
        });
    }

    fn cmd_ticket_timeout(&self, sink: Ticket) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(bid) = sink.buffer_id.lock().unwrap().take() {
            state.buffer.remove(bid);
        }
        drop(state);
        sink.resolve(Err(Error::connect_timeout()));
    }

    fn cmd_connect_complete(&self, slot_id: SlotId, result: Result<Connection, Error>, sink: Ticket) {
        let mut state = self.shared.state.lock().unwrap();
        state.connecting -= 1;
        match result {
            Ok(connection) => {
                if state.closing || state.closed {
                    drop(state);
                    connection.shutdown();
                    sink.resolve(Err(Error::pool_closed()));
                    return;
                }
                let capacity = connection.max_concurrent().unwrap_or(1).max(1);
                let mut slot = PooledConnectionSlot::new(slot_id, connection.clone(), capacity);
                slot.allocated = 1;
                slot.index = state.active.len() as isize;
                state.active.push(slot);
                state.size += 1;
                state.total_capacity += i64::from(capacity);
                state.capacity += i64::from(capacity) - 1;
                let granted = state.drain_buffer();
                drop(state);
                sink.resolve(Ok(PooledConnection::new(self.clone(), slot_id, connection)));
                self.resolve_granted(granted);
            }
            Err(err) => {
                drop(state);
                sink.resolve(Err(err));
            }
        }
    }

    fn resolve_granted(&self, granted: Vec<(Ticket, SlotId, Connection)>) {
        for (ticket, slot_id, connection) in granted {
            ticket.resolve(Ok(PooledConnection::new(self.clone(), slot_id, connection)));
        }
    }

    /// §4.4.5 `recycle(slot)`.
    fn cmd_recycle(&self, slot_id: SlotId) {
        let mut state = self.shared.state.lock().unwrap();
        let now = Instant::now();
        let keep_alive = self.shared.config.keep_alive_timeout;
        let mut granted = None;
        if let Some(slot) = state.find_slot_mut(slot_id) {
            slot.touch(keep_alive, now);
            slot.allocated = slot.allocated.saturating_sub(1);
            let reusable = !slot.parked && !slot.removed;
            if reusable {
                if let Some(ticket) = state.buffer.poll() {
                    let slot = state.find_slot_mut(slot_id).expect("slot still present");
                    slot.allocated += 1;
                    let connection = slot.connection.clone();
                    granted = Some((ticket, slot_id, connection));
                } else {
                    state.capacity += 1;
                }
            }
        }
        drop(state);
        if let Some((ticket, slot_id, connection)) = granted {
            ticket.resolve(Ok(PooledConnection::new(self.clone(), slot_id, connection)));
        }
    }

    fn cmd_remove(&self, slot_id: SlotId) {
        let mut state = self.shared.state.lock().unwrap();
        state.remove_slot(slot_id);
        let granted = state.drain_buffer();
        drop(state);
        self.resolve_granted(granted);
    }

    fn cmd_settings_change(&self, slot_id: SlotId, new_max: u32) {
        let mut state = self.shared.state.lock().unwrap();
        let grew = state.set_capacity(slot_id, new_max);
        let granted = if grew { state.drain_buffer() } else { Vec::new() };
        drop(state);
        self.resolve_granted(granted);
    }

    fn cmd_replace_connection(&self, slot_id: SlotId, new_connection: Connection) {
        let mut state = self.shared.state.lock().unwrap();
        let new_capacity = new_connection.max_concurrent().unwrap_or(1).max(1);
        if let Some(slot) = state.find_slot_mut(slot_id) {
            slot.connection = new_connection;
        }
        let grew = state.set_capacity(slot_id, new_capacity);
        let granted = if grew { state.drain_buffer() } else { Vec::new() };
        drop(state);
        self.resolve_granted(granted);
    }

    /// §4.4.3 janitor tick.
    fn cmd_janitor(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.closing || state.closed {
            return;
        }
        let now = Instant::now();

        let mut i = 0;
        while i < state.parked.len() {
            if state.parked[i].is_expired(now) {
                if let Some(slot) = state.parked.remove(i) {
                    slot.connection.shutdown();
                }
            } else {
                i += 1;
            }
        }

        let inflight = state.total_capacity - state.capacity;
        let mut buckets: Vec<Vec<SlotId>> = vec![Vec::new(); 10];
        for slot in &state.active {
            let bucket = ((slot.load_factor() * 10.0).floor() as usize).min(9);
            buckets[bucket].push(slot.id);
        }

        let mut new_total = state.total_capacity;
        let mut to_park = Vec::new();
        'buckets: for bucket in &buckets {
            for slot_id in bucket {
                let Some(slot) = state.active.iter().find(|s| s.id == *slot_id) else {
                    continue;
                };
                let cap = i64::from(slot.capacity);
                if new_total - cap < inflight {
                    break 'buckets;
                }
                new_total -= cap;
                to_park.push(*slot_id);
            }
        }

        let keep_alive = self.shared.config.keep_alive_timeout;
        for slot_id in to_park {
            state.park_slot(slot_id, now, keep_alive);
        }
        let granted = state.drain_buffer();
        drop(state);
        self.resolve_granted(granted);
    }

    /// §4.4.6 `shutdown()` / the graceful variant.
    pub(crate) async fn shutdown(&self, graceful: bool) {
        let (active, parked) = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return;
            }
            state.closing = true;
            let active = std::mem::take(&mut state.active);
            let parked: Vec<_> = state.parked.drain(..).collect();
            while let Some(ticket) = state.buffer.poll() {
                ticket.resolve(Err(Error::pool_closed()));
            }
            (active, parked)
        };

        if let Some(handle) = self.shared.janitor.lock().unwrap().take() {
            let _ = handle.stop.send(());
        }

        let timeout = self.shared.graceful_shutdown_timeout;
        stream::iter(active.into_iter().chain(parked))
            .for_each_concurrent(None, |slot| {
                let graceful_shutdown_timeout = timeout;
                async move {
                    if graceful {
                        slot.connection.shutdown_gracefully(graceful_shutdown_timeout).await;
                    } else {
                        slot.connection.shutdown();
                    }
                }
            })
            .await;

        self.shared.state.lock().unwrap().closed = true;
    }
}

/// The caller's half of [`Pool::acquire`]. Dropping it before it resolves
/// enqueues `cancelRequest` (§5 Cancellation): the ticket is unlinked from
/// the buffer if it's still waiting there; otherwise it is either still
/// racing a connect (in which case a losing `TicketSink::resolve` silently
/// recycles the connection it would have carried) or already handed off (in
/// which case the `PooledConnection` sitting unread in the channel recycles
/// itself when this future's drop takes `rx` down with it).
struct Acquire {
    pool: Pool,
    sink: Ticket,
    rx: Option<oneshot::Receiver<Result<PooledConnection, Error>>>,
}

impl Future for Acquire {
    type Output = Result<PooledConnection, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        use std::task::Poll;
        let rx = self.rx.as_mut().expect("Acquire polled after completion");
        match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(result)) => {
                self.rx = None;
                Poll::Ready(result)
            }
            Poll::Ready(Err(_)) => {
                self.rx = None;
                Poll::Ready(Err(Error::pool_closed()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Acquire {
    fn drop(&mut self) {
        if self.rx.is_some() {
            let pool = self.pool.clone();
            let sink = self.sink.clone();
            pool.shared.executor.submit(move || pool.cmd_cancel(sink));
        }
    }
}

impl Pool {
    fn cmd_cancel(&self, sink: Ticket) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(bid) = sink.buffer_id.lock().unwrap().take() {
            state.buffer.remove(bid);
        }
    }
}

/// Routes a connection's lifecycle callbacks back into pool commands (§9
/// "Callbacks post commands to the executor rather than mutating pool
/// fields directly").
struct SlotHandler {
    pool: Pool,
    slot_id: SlotId,
}

impl ConnectionHandler for SlotHandler {
    fn on_settings_change(&self, new_max: u32) {
        let pool = self.pool.clone();
        let slot_id = self.slot_id;
        pool.shared.executor.submit(move || pool.cmd_settings_change(slot_id, new_max));
    }

    fn on_close(&self) {
        let pool = self.pool.clone();
        let slot_id = self.slot_id;
        pool.shared.executor.submit(move || pool.cmd_remove(slot_id));
    }

    fn on_error(&self, err: &Error) {
        tracing::warn!(slot = self.slot_id.0, error = %err, "connection reported an error");
    }

    fn on_exchange_terminate(&self) {
        let pool = self.pool.clone();
        let slot_id = self.slot_id;
        pool.shared.executor.submit(move || pool.cmd_recycle(slot_id));
    }

    fn on_upgrade(&self, new_connection: Connection) {
        let pool = self.pool.clone();
        let slot_id = self.slot_id;
        pool.shared
            .executor
            .submit(move || pool.cmd_replace_connection(slot_id, new_connection));
    }
}
