use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    fmt::{self, Debug, Formatter},
    mem,
    sync::Arc,
};

/// A callback run with the encoded packet once it is ready.
pub type PacketCallback = Box<dyn FnOnce(&Bytes) + Send>;

enum State {
    Pending(Vec<PacketCallback>),
    Resolved(Bytes),
    Cancelled,
}

/// A compressed chunk packet which may still be in production.
///
/// Clones share the same state. Callbacks fire exactly once, in registration order, on the thread
/// which resolves the future. A cancelled future never resolves and never fires its callbacks.
#[derive(Clone)]
pub struct PacketFuture {
    state: Arc<Mutex<State>>,
}

impl PacketFuture {
    pub fn new() -> Self {
        PacketFuture {
            state: Arc::new(Mutex::new(State::Pending(Vec::new()))),
        }
    }

    /// Registers a callback. If the packet is already available the callback runs immediately,
    /// and if the future was cancelled the callback is dropped.
    pub fn on_resolve<F>(&self, callback: F)
    where F: FnOnce(&Bytes) + Send + 'static {
        self.attach(vec![Box::new(callback)]);
    }

    pub(crate) fn attach(&self, callbacks: Vec<PacketCallback>) {
        let mut state = self.state.lock();

        match &mut *state {
            State::Pending(pending) => pending.extend(callbacks),
            State::Resolved(packet) => {
                let packet = packet.clone();
                drop(state);

                for callback in callbacks {
                    callback(&packet);
                }
            }
            State::Cancelled => {}
        }
    }

    /// Resolves this future and fires its callbacks. Returns `false` and discards the packet if the
    /// future was cancelled or already resolved.
    pub fn resolve(&self, packet: Bytes) -> bool {
        let callbacks = {
            let mut state = self.state.lock();

            match &*state {
                State::Pending(_) => (),
                _ => return false,
            }

            match mem::replace(&mut *state, State::Resolved(packet.clone())) {
                State::Pending(callbacks) => callbacks,
                _ => Vec::new(),
            }
        };

        for callback in callbacks {
            callback(&packet);
        }

        true
    }

    /// Cancels this future, returning the callbacks registered so far so they can be moved to a
    /// replacement. Returns `None` and leaves the future untouched if it was already resolved.
    pub fn cancel(&self) -> Option<Vec<PacketCallback>> {
        let mut state = self.state.lock();

        match &*state {
            State::Resolved(_) => None,
            State::Cancelled => Some(Vec::new()),
            State::Pending(_) => match mem::replace(&mut *state, State::Cancelled) {
                State::Pending(callbacks) => Some(callbacks),
                _ => Some(Vec::new()),
            },
        }
    }

    /// Returns whether the packet is available.
    pub fn has_result(&self) -> bool {
        matches!(&*self.state.lock(), State::Resolved(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.state.lock(), State::Cancelled)
    }

    /// Returns the packet if it is available.
    pub fn result(&self) -> Option<Bytes> {
        match &*self.state.lock() {
            State::Resolved(packet) => Some(packet.clone()),
            _ => None,
        }
    }

    /// Returns the number of callbacks waiting on this future.
    pub fn waiter_count(&self) -> usize {
        match &*self.state.lock() {
            State::Pending(callbacks) => callbacks.len(),
            _ => 0,
        }
    }

    /// Returns whether both handles refer to the same future.
    pub fn ptr_eq(&self, other: &PacketFuture) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for PacketFuture {
    fn default() -> Self {
        PacketFuture::new()
    }
}

impl Debug for PacketFuture {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &*self.state.lock() {
            State::Pending(callbacks) => write!(f, "PacketFuture(pending, {} waiting)", callbacks.len()),
            State::Resolved(packet) => write!(f, "PacketFuture(resolved, {} bytes)", packet.len()),
            State::Cancelled => write!(f, "PacketFuture(cancelled)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn callbacks_fire_in_order_once() {
        let future = PacketFuture::new();
        let (sender, receiver) = channel();

        for i in 0 .. 3 {
            let sender = sender.clone();
            future.on_resolve(move |packet| {
                drop(sender.send((i, packet.len())));
            });
        }
        assert_eq!(future.waiter_count(), 3);

        assert!(future.resolve(Bytes::from_static(&[1, 2])));
        assert!(!future.resolve(Bytes::from_static(&[3])), "Second resolution is rejected");
        drop(sender);

        assert_eq!(receiver.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 2), (2, 2)]);
        assert_eq!(future.result(), Some(Bytes::from_static(&[1, 2])));
    }

    #[test]
    fn late_callbacks_fire_immediately() {
        let future = PacketFuture::new();
        future.resolve(Bytes::from_static(&[9]));

        let (sender, receiver) = channel();
        future.on_resolve(move |packet| {
            drop(sender.send(packet[0]));
        });
        assert_eq!(receiver.try_recv().ok(), Some(9));
    }

    #[test]
    fn cancellation_detaches_callbacks() {
        let future = PacketFuture::new();
        future.on_resolve(|_| panic!("Cancelled futures never fire"));

        let callbacks = future.cancel().expect("Pending futures can be cancelled");
        assert_eq!(callbacks.len(), 1);
        assert!(future.is_cancelled());
        assert!(!future.resolve(Bytes::from_static(&[1])));
        assert!(!future.has_result());

        future.on_resolve(|_| panic!("Callbacks on cancelled futures are dropped"));
        assert_eq!(future.waiter_count(), 0);
    }

    #[test]
    fn resolved_futures_cannot_be_cancelled() {
        let future = PacketFuture::new();
        future.resolve(Bytes::new());
        assert!(future.cancel().is_none());
        assert!(future.has_result());
    }

    #[test]
    fn clones_share_state() {
        let future = PacketFuture::new();
        let clone = future.clone();
        assert!(future.ptr_eq(&clone));
        assert!(!future.ptr_eq(&PacketFuture::new()));

        clone.resolve(Bytes::from_static(&[4]));
        assert!(future.has_result());
    }
}
