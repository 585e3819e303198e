//! Signal/slot dispatch.
//!
//! A [`Signal`] is owned by its emitter. Slots are either free closures or
//! methods bound to a receiver held in a [`Shared`] handle; a bound slot only
//! keeps a weak reference, so a dropped receiver is never called and its
//! connection is pruned on the next emission or connect.
//!
//! Emission runs every connected slot once, in connection order, on the
//! calling thread. The connection list is snapshotted first, so slots may
//! connect or disconnect (themselves or others) while an emission is running.
//! A slot disconnected before its turn is skipped.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::object::{Object, Shared};
use crate::value::Value;

/// Identifies one connection, unique across all signals in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a signal is currently running its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Idle,
    Emitting,
}

/// What a bound slot calls on its receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Callable {
    Function(usize),
    Reflected(String),
}

/// Identity of a bound slot: receiver address plus callable.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlotKey {
    receiver: usize,
    callable: Callable,
}

impl SlotKey {
    fn new<R>(receiver: &Shared<R>, callable: Callable) -> Self {
        Self {
            receiver: receiver.address(),
            callable,
        }
    }
}

enum Delivery {
    Delivered,
    /// The receiver has been dropped.
    Expired,
    /// The calling thread already holds the receiver, typically because the
    /// receiver is emitting.
    Busy,
}

type Slot<A> = Box<dyn Fn(&A) -> Delivery + Send + Sync>;

struct Connection<A: ?Sized> {
    id: ConnectionId,
    key: Option<SlotKey>,
    receiver: Option<Weak<dyn Any + Send + Sync>>,
    active: AtomicBool,
    slot: Slot<A>,
}

impl<A: ?Sized> Connection<A> {
    fn is_live(&self) -> bool {
        self.active.load(Ordering::Acquire)
            && self
                .receiver
                .as_ref()
                .is_none_or(|receiver| receiver.strong_count() > 0)
    }

    fn sever(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Decrements the emission depth when an emission ends, even by unwinding.
struct EmitGuard<'a>(&'a AtomicUsize);

impl Drop for EmitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A typed publish/subscribe channel carrying `&A` to each slot.
pub struct Signal<A: ?Sized + 'static> {
    name: String,
    connections: Mutex<Vec<Arc<Connection<A>>>>,
    depth: AtomicUsize,
}

impl<A: ?Sized + 'static> Signal<A> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connections: Mutex::new(Vec::new()),
            depth: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> SignalState {
        if self.depth.load(Ordering::Acquire) > 0 {
            SignalState::Emitting
        } else {
            SignalState::Idle
        }
    }

    /// Number of connections whose receiver is still alive.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().iter().filter(|c| c.is_live()).count()
    }

    #[must_use]
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections
            .lock()
            .iter()
            .any(|c| c.id == id && c.is_live())
    }

    /// Connect a free closure. Every call creates a new connection.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let slot: Slot<A> = Box::new(move |args: &A| {
            slot(args);
            Delivery::Delivered
        });
        self.attach(None, None, slot)
    }

    /// Connect a method of `receiver`. Connecting the same receiver and method
    /// again returns the existing connection.
    ///
    /// A receiver locked by another thread is waited for. A receiver locked
    /// by the emitting thread itself is skipped.
    pub fn connect_method<R: Object>(&self, receiver: &Shared<R>, method: fn(&mut R, &A)) -> ConnectionId {
        let key = SlotKey::new(receiver, Callable::Function(method as usize));
        let weak = receiver.downgrade();
        let name = self.name.clone();
        let slot: Slot<A> = Box::new(move |args: &A| {
            let Some(cell) = weak.upgrade() else {
                return Delivery::Expired;
            };
            let receiver = Shared::from_cell(cell);
            let Some(mut guard) = receiver.lock_for_delivery() else {
                warn!(signal = %name, "receiver is locked by the emitting thread, slot skipped");
                return Delivery::Busy;
            };
            method(&mut guard, args);
            Delivery::Delivered
        });
        let weak = receiver.downgrade();
        let liveness: Weak<dyn Any + Send + Sync> = weak;
        self.attach(Some(key), Some(liveness), slot)
    }

    fn attach(&self, key: Option<SlotKey>, receiver: Option<Weak<dyn Any + Send + Sync>>, slot: Slot<A>) -> ConnectionId {
        let mut connections = self.connections.lock();
        connections.retain(|c| c.is_live());
        if let Some(key) = &key
            && let Some(existing) = connections.iter().find(|c| c.key.as_ref() == Some(key))
        {
            return existing.id;
        }
        let id = ConnectionId::next();
        connections.push(Arc::new(Connection {
            id,
            key,
            receiver,
            active: AtomicBool::new(true),
            slot,
        }));
        id
    }

    /// Remove a connection. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.detach(|c| c.id == id) > 0
    }

    /// Remove the connection of `method` on `receiver`, if any.
    pub fn disconnect_method<R: Object>(&self, receiver: &Shared<R>, method: fn(&mut R, &A)) -> bool {
        let key = SlotKey::new(receiver, Callable::Function(method as usize));
        self.detach(|c| c.key.as_ref() == Some(&key)) > 0
    }

    /// Remove every connection bound to `receiver`. Returns how many.
    pub fn disconnect_receiver<R: Object>(&self, receiver: &Shared<R>) -> usize {
        let address = receiver.address();
        self.detach(|c| c.key.as_ref().is_some_and(|k| k.receiver == address))
    }

    /// Remove every connection.
    pub fn disconnect_all(&self) {
        self.detach(|_| true);
    }

    fn detach(&self, matches: impl Fn(&Connection<A>) -> bool) -> usize {
        let mut connections = self.connections.lock();
        let before = connections.len();
        connections.retain(|c| {
            if matches(c) {
                c.sever();
                false
            } else {
                true
            }
        });
        before - connections.len()
    }

    /// Run every connected slot with `args`. Returns the number of slots run.
    pub fn emit(&self, args: &A) -> usize {
        let snapshot: Vec<_> = self.connections.lock().clone();
        if snapshot.is_empty() {
            return 0;
        }

        self.depth.fetch_add(1, Ordering::AcqRel);
        let _guard = EmitGuard(&self.depth);
        let mut delivered = 0;
        let mut expired = false;
        for connection in &snapshot {
            if !connection.active.load(Ordering::Acquire) {
                continue;
            }
            match (connection.slot)(args) {
                Delivery::Delivered => delivered += 1,
                Delivery::Expired => {
                    connection.sever();
                    expired = true;
                }
                Delivery::Busy => {}
            }
        }
        if expired {
            self.connections.lock().retain(|c| c.is_live());
        }
        trace!(signal = %self.name, delivered, "signal emitted");
        delivered
    }
}

impl Signal<[Value]> {
    /// Bind a reflected method of `receiver`; each emission invokes it by
    /// name with the emitted arguments. Invocation errors are logged.
    pub(crate) fn connect_invoke<R: Object>(&self, receiver: &Shared<R>, method: &str) -> ConnectionId {
        let key = SlotKey::new(receiver, Callable::Reflected(method.to_string()));
        let weak = receiver.downgrade();
        let name = method.to_string();
        let signal = self.name.clone();
        let slot: Slot<[Value]> = Box::new(move |args: &[Value]| {
            let Some(cell) = weak.upgrade() else {
                return Delivery::Expired;
            };
            let receiver = Shared::from_cell(cell);
            let Some(mut guard) = receiver.lock_for_delivery() else {
                warn!(%signal, method = %name, "receiver is locked by the emitting thread, slot skipped");
                return Delivery::Busy;
            };
            if let Err(err) = guard.invoke(&name, args) {
                warn!(%signal, method = %name, %err, "reflected slot failed");
            }
            Delivery::Delivered
        });
        let weak = receiver.downgrade();
        let liveness: Weak<dyn Any + Send + Sync> = weak;
        self.attach(Some(key), Some(liveness), slot)
    }

    pub(crate) fn disconnect_invoke<R: Object>(&self, receiver: &Shared<R>, method: &str) -> bool {
        let key = SlotKey::new(receiver, Callable::Reflected(method.to_string()));
        self.detach(|c| c.key.as_ref() == Some(&key)) > 0
    }
}

impl<A: ?Sized + 'static> Drop for Signal<A> {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

impl<A: ?Sized + 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("connections", &self.connection_count())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::fixtures::{self, Listener};
    use crate::object::share;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&i64) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move |_: &i64| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn record(listener: &mut Listener, amount: &i64) {
        listener.received.push(*amount);
    }

    #[test]
    fn test_emit_without_slots_is_a_noop() {
        let signal: Signal<i64> = Signal::new("damaged");
        assert_eq!(signal.emit(&1), 0);
        assert_eq!(signal.state(), SignalState::Idle);
    }

    #[test]
    fn test_slot_invoked_once_with_arguments() {
        let signal: Signal<i64> = Signal::new("damaged");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        signal.connect(move |amount: &i64| sink.lock().push(*amount));
        assert_eq!(signal.emit(&42), 1);
        assert_eq!(*seen.lock(), vec![42]);
    }

    #[test]
    fn test_slots_run_in_connection_order() {
        let signal: Signal<()> = Signal::new("tick");
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = Arc::clone(&order);
            signal.connect(move |_: &()| order.lock().push(i));
        }
        signal.emit(&());
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let signal: Signal<i64> = Signal::new("damaged");
        let (count, slot) = counter();
        let id = signal.connect(slot);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_self_disconnect_during_emit() {
        let signal = Arc::new(Signal::<i64>::new("damaged"));
        let own_id = Arc::new(OnceLock::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let (before, first) = counter();
        signal.connect(first);
        {
            let signal_ref = Arc::downgrade(&signal);
            let slot_id = Arc::clone(&own_id);
            let calls = Arc::clone(&calls);
            let id = signal.connect(move |_: &i64| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let (Some(signal), Some(id)) = (signal_ref.upgrade(), slot_id.get()) {
                    signal.disconnect(*id);
                }
            });
            own_id.set(id).unwrap();
        }
        let (after, last) = counter();
        signal.connect(last);

        assert_eq!(signal.emit(&1), 3);
        assert_eq!(signal.emit(&1), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_slot_removed_before_its_turn_is_skipped() {
        let signal = Arc::new(Signal::<i64>::new("damaged"));
        let victim = Arc::new(OnceLock::new());
        {
            let signal_ref = Arc::downgrade(&signal);
            let victim = Arc::clone(&victim);
            signal.connect(move |_: &i64| {
                if let (Some(signal), Some(id)) = (signal_ref.upgrade(), victim.get()) {
                    signal.disconnect(*id);
                }
            });
        }
        let (count, slot) = counter();
        victim.set(signal.connect(slot)).unwrap();

        assert_eq!(signal.emit(&1), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(signal.connection_count(), 1);
    }

    #[test]
    fn test_state_is_emitting_inside_slot() {
        let signal = Arc::new(Signal::<()>::new("tick"));
        let observed = Arc::new(Mutex::new(None));
        {
            let signal_ref = Arc::downgrade(&signal);
            let observed = Arc::clone(&observed);
            signal.connect(move |_: &()| {
                *observed.lock() = signal_ref.upgrade().map(|s| s.state());
            });
        }
        signal.emit(&());
        assert_eq!(*observed.lock(), Some(SignalState::Emitting));
        assert_eq!(signal.state(), SignalState::Idle);
    }

    #[test]
    fn test_method_slot_is_idempotent_and_weak() {
        let registry = fixtures::registry();
        let signal: Signal<i64> = Signal::new("damaged");
        let listener = share(Listener::create(&registry));

        let a = signal.connect_method(&listener, record);
        let b = signal.connect_method(&listener, record);
        assert_eq!(a, b);
        assert_eq!(signal.connection_count(), 1);

        assert_eq!(signal.emit(&9), 1);
        assert_eq!(listener.lock().received, vec![9]);

        drop(listener);
        assert_eq!(signal.connection_count(), 0);
        assert_eq!(signal.emit(&9), 0);
    }

    #[test]
    fn test_disconnect_method_and_receiver() {
        let registry = fixtures::registry();
        let signal: Signal<i64> = Signal::new("damaged");
        let first = share(Listener::create(&registry));
        let second = share(Listener::create(&registry));

        signal.connect_method(&first, record);
        signal.connect_method(&second, record);
        assert!(signal.disconnect_method(&first, record));
        assert!(!signal.disconnect_method(&first, record));
        assert_eq!(signal.disconnect_receiver(&second), 1);
        assert_eq!(signal.emit(&1), 0);
    }

    #[test]
    fn test_receiver_locked_by_emitting_thread_is_skipped() {
        let registry = fixtures::registry();
        let signal: Signal<i64> = Signal::new("damaged");
        let listener = share(Listener::create(&registry));
        signal.connect_method(&listener, record);

        let guard = listener.lock();
        assert!(listener.is_held_by_current_thread());
        assert_eq!(signal.emit(&1), 0);
        drop(guard);
        assert!(!listener.is_held_by_current_thread());
        assert_eq!(signal.emit(&2), 1);
        assert_eq!(listener.lock().received, vec![2]);
    }

    #[test]
    fn test_receiver_locked_by_other_thread_is_waited_for() {
        let registry = fixtures::registry();
        let signal: Signal<i64> = Signal::new("damaged");
        let listener = share(Listener::create(&registry));
        signal.connect_method(&listener, record);

        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = {
            let listener = listener.clone();
            std::thread::spawn(move || {
                let guard = listener.lock();
                locked_tx.send(()).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(50));
                drop(guard);
            })
        };
        locked_rx.recv().unwrap();
        assert!(!listener.is_held_by_current_thread());
        assert_eq!(signal.emit(&5), 1);
        holder.join().unwrap();
        assert_eq!(listener.lock().received, vec![5]);
    }

    #[test]
    fn test_dropping_signal_severs_everything() {
        let signal: Signal<i64> = Signal::new("damaged");
        let (count, slot) = counter();
        let id = signal.connect(slot);
        assert!(signal.is_connected(id));
        drop(signal);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
