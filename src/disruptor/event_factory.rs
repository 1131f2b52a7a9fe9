//! Event factories
//!
//! A ring buffer calls its factory once per slot at construction, so every
//! event the pipeline will ever carry is allocated up front and then reused.

/// Factory for pre-populating ring buffer slots
///
/// # Examples
/// ```
/// use ringseq::disruptor::{EventFactory, RingBuffer};
///
/// struct Tick {
///     price: u64,
/// }
///
/// struct TickFactory;
///
/// impl EventFactory<Tick> for TickFactory {
///     fn new_instance(&self) -> Tick {
///         Tick { price: 0 }
///     }
/// }
///
/// let ring = RingBuffer::new(6, TickFactory).unwrap();
/// assert_eq!(ring.capacity(), 8);
/// ```
pub trait EventFactory<T>: Send + Sync {
    /// Create the initial contents of one slot
    fn new_instance(&self) -> T;
}

/// Event factory that uses the Default trait
pub struct DefaultEventFactory<T: Default> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T: Default> DefaultEventFactory<T> {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Default> Default for DefaultEventFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> EventFactory<T> for DefaultEventFactory<T> {
    fn new_instance(&self) -> T {
        T::default()
    }
}

/// Event factory backed by a closure
pub struct ClosureEventFactory<F> {
    factory_fn: F,
}

impl<F> ClosureEventFactory<F> {
    pub fn new(factory_fn: F) -> Self {
        Self { factory_fn }
    }
}

impl<T, F> EventFactory<T> for ClosureEventFactory<F>
where
    F: Fn() -> T + Send + Sync,
{
    fn new_instance(&self) -> T {
        (self.factory_fn)()
    }
}
