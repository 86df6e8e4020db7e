//! Log distribution engine.
//!
//! A [`DistributionEngine`] owns an ordered list of (sink, formatter) pairs
//! and fans every event out to all of them in registration order. The list
//! sits behind a reader/writer lock: broadcasts share it, registration
//! changes take it exclusively.
//!
//! Broadcasting is best-effort. A formatter or sink that fails (or panics)
//! loses that one line for that one pair; the caller of
//! [`output`](DistributionEngine::output) never sees the failure.

pub mod sinks;

pub use sinks::{NullSink, WriterSink};

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{FormatError, ObserverError};
use crate::event::{ConvertedEvent, LogEvent};

// ============================================================================
// Capabilities
// ============================================================================

/// A byte-accepting destination (file, pipe, buffer).
pub trait LogSink: Send + Sync {
    /// Writes one formatted buffer.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; the engine drops it.
    fn write_log(&self, buf: &[u8]) -> std::io::Result<()>;

    /// Returns `true` for placeholder sinks carrying no implementation.
    ///
    /// Absent sinks cannot be registered.
    fn is_absent(&self) -> bool {
        false
    }
}

/// Maps a converted event to the bytes handed to a sink.
pub trait LogFormatter: Send + Sync {
    /// Formats one event. `None` is the degenerate absent event; formatters
    /// decide what (possibly empty) payload it produces.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] when the event cannot be represented; the
    /// engine drops it.
    fn format(&self, event: Option<&ConvertedEvent>) -> Result<Vec<u8>, FormatError>;

    /// Returns `true` for placeholder formatters carrying no implementation.
    fn is_absent(&self) -> bool {
        false
    }
}

struct SinkPair {
    sink: Arc<dyn LogSink>,
    formatter: Arc<dyn LogFormatter>,
}

// ============================================================================
// Engine
// ============================================================================

/// Thread-safe observer registry plus fan-out broadcast.
#[derive(Default)]
pub struct DistributionEngine {
    observers: RwLock<Vec<SinkPair>>,
}

impl DistributionEngine {
    /// Creates an engine with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a (sink, formatter) pair to the broadcast list.
    ///
    /// # Errors
    ///
    /// [`ObserverError::NilSink`] or [`ObserverError::NilFormatter`] if either
    /// side reports itself absent.
    pub fn add_observer(
        &self,
        sink: Arc<dyn LogSink>,
        formatter: Arc<dyn LogFormatter>,
    ) -> Result<(), ObserverError> {
        if sink.is_absent() {
            return Err(ObserverError::NilSink);
        }
        if formatter.is_absent() {
            return Err(ObserverError::NilFormatter);
        }

        self.write_observers().push(SinkPair { sink, formatter });
        Ok(())
    }

    /// Removes the first pair whose sink is the same allocation as `sink`.
    ///
    /// Comparison is by identity, never by value. The remaining pairs keep
    /// their relative order.
    ///
    /// # Errors
    ///
    /// [`ObserverError::SinkNotFound`] if `sink` is absent or not registered.
    pub fn remove_observer(&self, sink: &dyn LogSink) -> Result<(), ObserverError> {
        if sink.is_absent() {
            return Err(ObserverError::SinkNotFound);
        }

        let target = std::ptr::from_ref(sink).cast::<()>();
        let mut observers = self.write_observers();
        let index = observers
            .iter()
            .position(|pair| Arc::as_ptr(&pair.sink).cast::<()>() == target)
            .ok_or(ObserverError::SinkNotFound)?;
        observers.remove(index);
        drop(observers);
        Ok(())
    }

    /// Removes every observer.
    pub fn clear_observers(&self) {
        self.write_observers().clear();
    }

    /// Broadcasts `event` to every registered pair in registration order.
    ///
    /// The event is converted once. `None` converts to an absent converted
    /// event that each formatter still receives. Failures are dropped.
    pub fn output(&self, event: Option<&LogEvent>) {
        let converted = event.map(ConvertedEvent::from_event);
        let observers = self.read_observers();

        for (index, pair) in observers.iter().enumerate() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
                let buf = pair.formatter.format(converted.as_ref())?;
                pair.sink.write_log(&buf)?;
                Ok::<(), DeliveryError>(())
            }));

            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(observer = index, error = %e, "log delivery failed"),
                Err(_) => debug!(observer = index, "log observer panicked"),
            }
        }
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_observers().len()
    }

    /// Returns `true` if no pair is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_observers().is_empty()
    }

    /// Snapshot of the registered sinks in broadcast order.
    #[must_use]
    pub fn sinks(&self) -> Vec<Arc<dyn LogSink>> {
        self.read_observers()
            .iter()
            .map(|pair| Arc::clone(&pair.sink))
            .collect()
    }

    // Poisoning is recovered: every mutation is a single Vec operation, so
    // the list is never observed half-updated.
    fn read_observers(&self) -> RwLockReadGuard<'_, Vec<SinkPair>> {
        self.observers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_observers(&self) -> RwLockWriteGuard<'_, Vec<SinkPair>> {
        self.observers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DistributionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributionEngine")
            .field("observers", &self.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::stubs::{FormatterStub, RecordingSink, SinkStub};
    use super::*;
    use crate::format::NullFormatter;

    fn stub_pair() -> (Arc<dyn LogSink>, Arc<dyn LogFormatter>) {
        (Arc::new(SinkStub::new()), Arc::new(FormatterStub::new()))
    }

    fn counting_engine() -> (DistributionEngine, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let formats = Arc::new(AtomicUsize::new(0));
        let writes = Arc::new(AtomicUsize::new(0));
        let engine = DistributionEngine::new();
        let (f, w) = (Arc::clone(&formats), Arc::clone(&writes));
        engine
            .add_observer(
                Arc::new(SinkStub::with(move |_| {
                    w.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })),
                Arc::new(FormatterStub::with(move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })),
            )
            .unwrap();
        (engine, formats, writes)
    }

    /// Registers `n` pairs whose sinks append their index to `log`.
    fn ordered_engine(n: usize, log: &Arc<Mutex<Vec<usize>>>) -> (DistributionEngine, Vec<Arc<dyn LogSink>>) {
        let engine = DistributionEngine::new();
        let mut sinks = Vec::new();
        for i in 0..n {
            let log = Arc::clone(log);
            let sink: Arc<dyn LogSink> = Arc::new(SinkStub::with(move |_| {
                log.lock().unwrap().push(i);
                Ok(())
            }));
            engine
                .add_observer(Arc::clone(&sink), Arc::new(FormatterStub::new()))
                .unwrap();
            sinks.push(sink);
        }
        (engine, sinks)
    }

    // ------- add_observer

    #[test]
    fn add_observer_absent_sink_errors() {
        let engine = DistributionEngine::new();
        let err = engine
            .add_observer(Arc::new(NullSink), Arc::new(FormatterStub::new()))
            .unwrap_err();
        assert_eq!(err, ObserverError::NilSink);
        assert!(engine.is_empty());
    }

    #[test]
    fn add_observer_absent_formatter_errors() {
        let engine = DistributionEngine::new();
        let err = engine
            .add_observer(Arc::new(SinkStub::new()), Arc::new(NullFormatter))
            .unwrap_err();
        assert_eq!(err, ObserverError::NilFormatter);
        assert!(engine.is_empty());
    }

    #[test]
    fn add_observer_works() {
        let engine = DistributionEngine::new();
        let (sink, formatter) = stub_pair();
        engine.add_observer(sink, formatter).unwrap();
        assert_eq!(engine.len(), 1);
    }

    // ------- output

    #[test]
    fn output_without_observers_does_nothing() {
        let engine = DistributionEngine::new();
        engine.output(None);
        engine.output(Some(&LogEvent::default()));
    }

    #[test]
    fn output_absent_event_still_calls_formatter_and_sink() {
        let (engine, formats, writes) = counting_engine();
        engine.output(None);
        assert_eq!(formats.load(Ordering::SeqCst), 1);
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn output_passes_converted_event_to_formatter() {
        let engine = DistributionEngine::new();
        let sink = Arc::new(RecordingSink::default());
        engine
            .add_observer(
                sink.clone(),
                Arc::new(FormatterStub::with(|event| {
                    let event = event.expect("event present");
                    Ok(format!("{}|{}", event.message, event.args.join(",")).into_bytes())
                })),
            )
            .unwrap();

        let event = LogEvent::new(crate::event::LogLevel::Info, "hello")
            .with_args(vec!["bytes".into(), vec![0xFFu8, 0x01].into()]);
        engine.output(Some(&event));

        assert_eq!(sink.contents(), vec!["hello|bytes,ff01"]);
    }

    #[test]
    fn output_calls_pairs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (engine, _sinks) = ordered_engine(5, &log);
        engine.output(None);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failing_pair_does_not_stop_later_pairs() {
        let engine = DistributionEngine::new();
        let later = Arc::new(RecordingSink::default());
        engine
            .add_observer(
                Arc::new(SinkStub::new()),
                Arc::new(FormatterStub::with(|_| Err(FormatError::Serialize("boom".into())))),
            )
            .unwrap();
        engine
            .add_observer(
                Arc::new(SinkStub::with(|_| Err(std::io::ErrorKind::BrokenPipe.into()))),
                Arc::new(FormatterStub::new()),
            )
            .unwrap();
        engine
            .add_observer(
                Arc::new(SinkStub::with(|_| panic!("sink exploded"))),
                Arc::new(FormatterStub::new()),
            )
            .unwrap();
        engine
            .add_observer(
                later.clone(),
                Arc::new(FormatterStub::with(|_| Ok(b"ok".to_vec()))),
            )
            .unwrap();

        engine.output(None);
        engine.output(None);

        assert_eq!(later.contents(), vec!["ok", "ok"]);
        assert_eq!(engine.len(), 4);
    }

    #[test]
    fn output_called_concurrently_counts_exactly() {
        let (engine, formats, writes) = counting_engine();
        let engine = Arc::new(engine);
        let calls = 1000;

        std::thread::scope(|s| {
            for _ in 0..calls {
                let engine = &engine;
                s.spawn(move || engine.output(None));
            }
        });

        assert_eq!(formats.load(Ordering::SeqCst), calls);
        assert_eq!(writes.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn concurrent_registration_and_output_do_not_interfere() {
        let (engine, formats, _) = counting_engine();
        let engine = Arc::new(engine);

        std::thread::scope(|s| {
            for _ in 0..8 {
                let engine = &engine;
                s.spawn(move || {
                    for _ in 0..100 {
                        let sink: Arc<dyn LogSink> = Arc::new(SinkStub::new());
                        engine
                            .add_observer(Arc::clone(&sink), Arc::new(FormatterStub::new()))
                            .unwrap();
                        engine.output(None);
                        engine.remove_observer(sink.as_ref()).unwrap();
                    }
                });
            }
        });

        assert_eq!(formats.load(Ordering::SeqCst), 800);
        assert_eq!(engine.len(), 1);
    }

    // ------- remove_observer

    #[test]
    fn remove_observer_absent_sink_errors() {
        let engine = DistributionEngine::new();
        assert_eq!(
            engine.remove_observer(&NullSink),
            Err(ObserverError::SinkNotFound)
        );
    }

    #[test]
    fn remove_observer_empty_list_errors() {
        let engine = DistributionEngine::new();
        assert_eq!(
            engine.remove_observer(&SinkStub::new()),
            Err(ObserverError::SinkNotFound)
        );
    }

    #[test]
    fn remove_observer_unregistered_sink_errors() {
        let engine = DistributionEngine::new();
        let (a, fa) = stub_pair();
        let (b, fb) = stub_pair();
        engine.add_observer(a, fa).unwrap();
        engine.add_observer(b, fb).unwrap();

        assert_eq!(
            engine.remove_observer(&SinkStub::new()),
            Err(ObserverError::SinkNotFound)
        );
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn remove_observer_is_by_identity_not_value() {
        let engine = DistributionEngine::new();
        let registered: Arc<dyn LogSink> = Arc::new(SinkStub::new());
        engine
            .add_observer(Arc::clone(&registered), Arc::new(FormatterStub::new()))
            .unwrap();

        // An equal-looking but distinct sink must not match.
        assert_eq!(
            engine.remove_observer(&SinkStub::new()),
            Err(ObserverError::SinkNotFound)
        );
        assert!(engine.remove_observer(registered.as_ref()).is_ok());
        assert!(engine.is_empty());
    }

    #[test]
    fn remove_observer_twice_errors_second_time() {
        let engine = DistributionEngine::new();
        let (sink, formatter) = stub_pair();
        engine.add_observer(Arc::clone(&sink), formatter).unwrap();

        assert!(engine.remove_observer(sink.as_ref()).is_ok());
        assert_eq!(
            engine.remove_observer(sink.as_ref()),
            Err(ObserverError::SinkNotFound)
        );
    }

    #[test]
    fn remove_each_position_preserves_order() {
        let n = 4;
        for removed in 0..n {
            let log = Arc::new(Mutex::new(Vec::new()));
            let (engine, sinks) = ordered_engine(n, &log);

            engine.remove_observer(sinks[removed].as_ref()).unwrap();
            engine.output(None);

            let expected: Vec<usize> = (0..n).filter(|&i| i != removed).collect();
            assert_eq!(*log.lock().unwrap(), expected, "removed index {removed}");
        }
    }

    #[test]
    fn remove_removes_first_matching_registration_only() {
        let engine = DistributionEngine::new();
        let sink: Arc<dyn LogSink> = Arc::new(SinkStub::new());
        engine
            .add_observer(Arc::clone(&sink), Arc::new(FormatterStub::new()))
            .unwrap();
        engine
            .add_observer(Arc::clone(&sink), Arc::new(FormatterStub::new()))
            .unwrap();

        engine.remove_observer(sink.as_ref()).unwrap();
        assert_eq!(engine.len(), 1);
    }

    // ------- clear_observers

    #[test]
    fn clear_observers_then_output_calls_nothing() {
        let (engine, formats, writes) = counting_engine();
        assert_eq!(engine.len(), 1);

        engine.clear_observers();
        engine.output(None);

        assert!(engine.is_empty());
        assert_eq!(formats.load(Ordering::SeqCst), 0);
        assert_eq!(writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sinks_snapshot_is_in_broadcast_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (engine, sinks) = ordered_engine(3, &log);
        let snapshot = engine.sinks();
        assert_eq!(snapshot.len(), 3);
        for (a, b) in snapshot.iter().zip(&sinks) {
            assert!(Arc::ptr_eq(a, b));
        }
    }
}
