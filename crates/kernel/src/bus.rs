use std::collections::BTreeMap;

/// Stable token identifying one bus subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// A per-frame listener. Receives the shared context and the frame delta in seconds.
pub type Listener<C, E> = Box<dyn FnMut(&mut C, f32) -> Result<(), E>>;

/// Per-frame broadcast.
///
/// Listeners are keyed by [`ListenerId`] rather than compared structurally, so
/// two identical closures are two subscriptions and unsubscribing one never
/// touches the other. Invocation order is an implementation detail; callers
/// must not depend on it.
pub struct UpdateBus<C, E> {
    listeners: BTreeMap<ListenerId, Listener<C, E>>,
    next_id: u64,
}

impl<C, E> UpdateBus<C, E> {
    pub fn new() -> Self {
        Self {
            listeners: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Allocate an id without subscribing. Pair with [`UpdateBus::subscribe_keyed`].
    pub fn reserve_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Subscribe a listener under a fresh id.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&mut C, f32) -> Result<(), E> + 'static,
    ) -> ListenerId {
        let id = self.reserve_id();
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Subscribe under a caller-held id. Subscribing an id twice is a no-op
    /// and returns `false`.
    pub fn subscribe_keyed(
        &mut self,
        id: ListenerId,
        listener: impl FnMut(&mut C, f32) -> Result<(), E> + 'static,
    ) -> bool {
        if self.listeners.contains_key(&id) {
            return false;
        }
        self.listeners.insert(id, Box::new(listener));
        true
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Notify every listener with `delta`. Stops at the first error.
    pub fn invoke(&mut self, ctx: &mut C, delta: f32) -> Result<(), E> {
        for listener in self.listeners.values_mut() {
            listener(ctx, delta)?;
        }
        Ok(())
    }
}

impl<C, E> Default for UpdateBus<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ctx {
        total: f32,
        calls: u32,
    }

    #[test]
    fn invoke_reaches_every_listener() {
        let mut bus: UpdateBus<Ctx, ()> = UpdateBus::new();
        bus.subscribe(|ctx, dt| {
            ctx.total += dt;
            Ok(())
        });
        bus.subscribe(|ctx, _| {
            ctx.calls += 1;
            Ok(())
        });

        let mut ctx = Ctx::default();
        bus.invoke(&mut ctx, 0.5).unwrap();
        bus.invoke(&mut ctx, 0.25).unwrap();
        assert_eq!(ctx.total, 0.75);
        assert_eq!(ctx.calls, 2);
    }

    #[test]
    fn identical_closures_are_distinct_subscriptions() {
        let mut bus: UpdateBus<Ctx, ()> = UpdateBus::new();
        let make = || {
            |ctx: &mut Ctx, _: f32| {
                ctx.calls += 1;
                Ok(())
            }
        };
        let a = bus.subscribe(make());
        let _b = bus.subscribe(make());
        assert_eq!(bus.len(), 2);

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));

        let mut ctx = Ctx::default();
        bus.invoke(&mut ctx, 0.0).unwrap();
        assert_eq!(ctx.calls, 1);
    }

    #[test]
    fn keyed_duplicate_is_noop() {
        let mut bus: UpdateBus<Ctx, ()> = UpdateBus::new();
        let id = bus.reserve_id();
        assert!(bus.subscribe_keyed(id, |ctx, _| {
            ctx.calls += 1;
            Ok(())
        }));
        assert!(!bus.subscribe_keyed(id, |ctx, _| {
            ctx.calls += 100;
            Ok(())
        }));

        let mut ctx = Ctx::default();
        bus.invoke(&mut ctx, 0.0).unwrap();
        assert_eq!(ctx.calls, 1);
    }

    #[test]
    fn first_error_halts_invoke() {
        let mut bus: UpdateBus<Ctx, &'static str> = UpdateBus::new();
        bus.subscribe(|_, _| Err("broken frame"));
        bus.subscribe(|ctx, _| {
            ctx.calls += 1;
            Ok(())
        });

        let mut ctx = Ctx::default();
        assert_eq!(bus.invoke(&mut ctx, 0.016), Err("broken frame"));
        assert_eq!(ctx.calls, 0);
    }

    #[test]
    fn clear_removes_all() {
        let mut bus: UpdateBus<Ctx, ()> = UpdateBus::new();
        let id = bus.subscribe(|_, _| Ok(()));
        bus.clear();
        assert!(bus.is_empty());
        assert!(!bus.contains(id));
    }
}
