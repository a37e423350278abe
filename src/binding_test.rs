use super::*;
use std::cell::{Cell, RefCell};

use crate::fallback::FallbackMap;
use crate::registry::SubscriptionRegistry;
use crate::serializer::{CodecError, JsonSerializer};
use crate::storage::{FailureMode, MemoryStorage, StorageBackend, UnavailableStorage};

struct Harness {
    storage: Rc<MemoryStorage>,
    fallback: Rc<FallbackMap>,
    registry: Rc<SubscriptionRegistry>,
}

impl Harness {
    fn new() -> Self {
        Self {
            storage: Rc::new(MemoryStorage::new()),
            fallback: Rc::new(FallbackMap::new()),
            registry: Rc::new(SubscriptionRegistry::new()),
        }
    }

    fn context(&self) -> ExecutionContext {
        let storage: Rc<dyn StorageBackend> = self.storage.clone();
        ExecutionContext::Interactive(InteractiveContext::with_parts(
            storage,
            Rc::clone(&self.fallback),
            Rc::clone(&self.registry),
        ))
    }

    /// An attached binding, as it is after the post-commit effect ran.
    fn binding<T: Clone + Default + 'static>(
        &self,
        key: &str,
        options: PersistedStateOptions<T>,
    ) -> StateBinding<T> {
        let binding = StateBinding::new(key.to_owned(), self.context(), options);
        binding.attach();
        binding
    }
}

fn todos() -> Vec<String> {
    vec!["a".to_owned(), "b".to_owned()]
}

/// Serializer wrapper that counts parse calls, for cache assertions.
struct CountingSerializer {
    parses: Rc<Cell<u32>>,
}

impl<T: serde::Serialize + serde::de::DeserializeOwned> Serializer<T> for CountingSerializer {
    fn stringify(&self, value: &T) -> Result<String, CodecError> {
        JsonSerializer.stringify(value)
    }

    fn parse(&self, raw: &str) -> Result<T, CodecError> {
        self.parses.set(self.parses.get() + 1);
        JsonSerializer.parse(raw)
    }
}

/// Serializer whose stringify always fails.
struct UnserializableSerializer;

impl Serializer<u32> for UnserializableSerializer {
    fn stringify(&self, _value: &u32) -> Result<String, CodecError> {
        Err(CodecError::Stringify(serde_json::from_str::<u32>("x").expect_err("error")))
    }

    fn parse(&self, raw: &str) -> Result<u32, CodecError> {
        JsonSerializer.parse(raw)
    }
}

// =============================================================
// Attach phase
// =============================================================

#[test]
fn pre_attach_read_ignores_the_stored_value() {
    let harness = Harness::new();
    harness.storage.write("k", "[\"stored\"]").expect("write");

    let binding: StateBinding<Vec<String>> =
        StateBinding::new("k".to_owned(), harness.context(), PersistedStateOptions::new().default_value(todos()));
    assert_eq!(binding.read(), todos());
}

#[test]
fn attach_transitions_exactly_once() {
    let harness = Harness::new();
    let binding: StateBinding<u32> =
        StateBinding::new("k".to_owned(), harness.context(), PersistedStateOptions::new());
    assert!(binding.attach());
    assert!(!binding.attach());
}

#[test]
fn attached_read_returns_the_stored_value() {
    let harness = Harness::new();
    harness.storage.write("k", "[\"stored\"]").expect("write");

    let binding: StateBinding<Vec<String>> =
        harness.binding("k", PersistedStateOptions::new().default_value(todos()));
    assert_eq!(binding.read(), vec!["stored".to_owned()]);
}

#[test]
fn server_default_value_serves_pre_attach_reads() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = StateBinding::new(
        "k".to_owned(),
        harness.context(),
        PersistedStateOptions::new().default_value(1).server_default_value(2),
    );
    assert_eq!(binding.read(), 2);
    binding.attach();
    assert_eq!(binding.read(), 1);
}

// =============================================================
// Round trips and defaults
// =============================================================

#[test]
fn write_then_fresh_binding_reads_the_value() {
    let harness = Harness::new();
    let writer: StateBinding<Vec<String>> = harness.binding("k", PersistedStateOptions::new());
    writer.apply(ValueUpdate::Value(vec!["x".to_owned()]));

    let reader: StateBinding<Vec<String>> = harness.binding("k", PersistedStateOptions::new());
    assert_eq!(reader.read(), vec!["x".to_owned()]);
}

#[test]
fn absent_key_reads_the_default() {
    let harness = Harness::new();
    let binding: StateBinding<Vec<String>> =
        harness.binding("k", PersistedStateOptions::new().default_value(todos()));
    assert_eq!(binding.read(), todos());
}

#[test]
fn absent_key_without_default_reads_type_default() {
    let harness = Harness::new();
    let binding: StateBinding<Vec<String>> = harness.binding("k", PersistedStateOptions::new());
    assert_eq!(binding.read(), Vec::<String>::new());
}

#[test]
fn computed_default_resolves_once_and_stays_fixed() {
    let harness = Harness::new();
    let calls = Rc::new(Cell::new(0_u32));
    let calls_fn = Rc::clone(&calls);
    let binding: StateBinding<u32> = harness.binding(
        "k",
        PersistedStateOptions::new().default_value_fn(move || {
            calls_fn.set(calls_fn.get() + 1);
            7
        }),
    );

    harness.storage.set_failure_mode(FailureMode::RejectWrites);
    assert_eq!(binding.read(), 7);
    assert_eq!(binding.read(), 7);
    assert_eq!(calls.get(), 1);
}

// =============================================================
// Default seeding
// =============================================================

#[test]
fn explicit_default_is_seeded_on_first_absent_read() {
    let harness = Harness::new();
    let binding: StateBinding<Vec<String>> =
        harness.binding("todos", PersistedStateOptions::new().default_value(todos()));

    assert_eq!(binding.read(), todos());
    assert_eq!(harness.storage.entry("todos"), Some("[\"a\",\"b\"]".to_owned()));
}

#[test]
fn second_instance_reads_the_seeded_entry_not_its_own_default() {
    let harness = Harness::new();
    let first: StateBinding<Vec<String>> =
        harness.binding("todos", PersistedStateOptions::new().default_value(todos()));
    first.read();

    let second: StateBinding<Vec<String>> = harness.binding(
        "todos",
        PersistedStateOptions::new().default_value(vec!["other".to_owned()]),
    );
    assert_eq!(second.read(), todos());
}

#[test]
fn mounting_without_a_default_writes_nothing() {
    let harness = Harness::new();
    let binding: StateBinding<Vec<String>> = harness.binding("k", PersistedStateOptions::new());
    binding.read();
    assert!(harness.storage.is_empty());
    assert!(harness.fallback.is_empty());
}

#[test]
fn rejected_seed_is_not_retried_and_not_held_in_memory() {
    let harness = Harness::new();
    harness.storage.set_failure_mode(FailureMode::RejectWrites);
    let binding: StateBinding<u32> =
        harness.binding("k", PersistedStateOptions::new().default_value(5));

    assert_eq!(binding.read(), 5);
    assert!(binding.is_persistent());

    harness.storage.set_failure_mode(FailureMode::None);
    assert_eq!(binding.read(), 5);
    assert!(harness.storage.is_empty());
}

#[test]
fn remove_does_not_reseed_the_default() {
    let harness = Harness::new();
    let binding: StateBinding<u32> =
        harness.binding("k", PersistedStateOptions::new().default_value(5));
    binding.read();
    binding.remove();

    assert_eq!(binding.read(), 5);
    assert!(harness.storage.is_empty());
}

// =============================================================
// Fallback mode
// =============================================================

#[test]
fn rejected_write_is_observable_and_flips_is_persistent() {
    let harness = Harness::new();
    harness.storage.set_failure_mode(FailureMode::RejectWrites);
    let binding: StateBinding<String> = harness.binding("k", PersistedStateOptions::new());

    binding.apply(ValueUpdate::Value("x".to_owned()));
    assert_eq!(binding.read(), "x");
    assert!(!binding.is_persistent());
    assert_eq!(harness.storage.entry("k"), None);
}

#[test]
fn unrelated_key_stays_persistent() {
    let harness = Harness::new();
    let failing: StateBinding<String> = harness.binding("failing", PersistedStateOptions::new());
    let healthy: StateBinding<String> = harness.binding("healthy", PersistedStateOptions::new());

    harness.storage.set_failure_mode(FailureMode::RejectWrites);
    failing.apply(ValueUpdate::Value("x".to_owned()));
    harness.storage.set_failure_mode(FailureMode::None);
    healthy.apply(ValueUpdate::Value("y".to_owned()));

    assert!(!failing.is_persistent());
    assert!(healthy.is_persistent());
}

#[test]
fn later_durable_write_clears_fallback_mode() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());

    harness.storage.set_failure_mode(FailureMode::RejectWrites);
    binding.apply(ValueUpdate::Value(1));
    assert!(!binding.is_persistent());

    harness.storage.set_failure_mode(FailureMode::None);
    binding.apply(ValueUpdate::Value(2));
    assert!(binding.is_persistent());
    assert!(harness.fallback.is_empty());
    assert_eq!(harness.storage.entry("k"), Some("2".to_owned()));
}

#[test]
fn fallback_entry_wins_over_the_durable_value() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());
    binding.apply(ValueUpdate::Value(1));

    harness.storage.set_failure_mode(FailureMode::RejectWrites);
    binding.apply(ValueUpdate::Value(2));
    assert_eq!(harness.storage.entry("k"), Some("1".to_owned()));
    assert_eq!(binding.read(), 2);
}

#[test]
fn throwing_store_degrades_to_memory_only() {
    let harness = Harness::new();
    let storage: Rc<dyn StorageBackend> = Rc::new(UnavailableStorage);
    let context = ExecutionContext::Interactive(InteractiveContext::with_parts(
        storage,
        Rc::clone(&harness.fallback),
        Rc::clone(&harness.registry),
    ));
    let binding: StateBinding<u32> =
        StateBinding::new("k".to_owned(), context, PersistedStateOptions::new().default_value(1));
    binding.attach();

    assert_eq!(binding.read(), 1);
    binding.apply(ValueUpdate::Value(2));
    assert_eq!(binding.read(), 2);
    assert!(!binding.is_persistent());
}

// =============================================================
// Remove
// =============================================================

#[test]
fn remove_clears_both_stores_and_restores_the_default() {
    let harness = Harness::new();
    let binding: StateBinding<Vec<String>> =
        harness.binding("todos", PersistedStateOptions::new().default_value(todos()));
    binding.apply(ValueUpdate::Value(vec!["c".to_owned()]));

    binding.remove();
    assert_eq!(binding.read(), todos());
    assert_eq!(harness.storage.entry("todos"), None);
    assert!(harness.fallback.is_empty());
}

#[test]
fn remove_restores_type_default_when_none_configured() {
    let harness = Harness::new();
    let binding: StateBinding<Option<String>> = harness.binding("k", PersistedStateOptions::new());
    binding.apply(ValueUpdate::Value(Some("x".to_owned())));

    binding.remove();
    assert_eq!(binding.read(), None);
}

// =============================================================
// Updater resolution
// =============================================================

#[test]
fn transform_resolves_against_the_authoritative_value() {
    let harness = Harness::new();
    let writer: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());
    let other: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());

    writer.apply(ValueUpdate::Value(1));
    other.apply(ValueUpdate::Transform(Box::new(|v| v + 1)));
    assert_eq!(writer.read(), 2);
}

#[test]
fn transform_sees_its_own_previous_write() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());
    binding.apply(ValueUpdate::Value(10));
    binding.apply(ValueUpdate::Transform(Box::new(|v| v * 2)));
    binding.apply(ValueUpdate::Transform(Box::new(|v| v + 1)));
    assert_eq!(binding.read(), 21);
}

// =============================================================
// Notification fan-out
// =============================================================

#[test]
fn write_notifies_subscribers_of_the_key() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());

    let seen = Rc::new(Cell::new(0_u32));
    let seen_cb = Rc::clone(&seen);
    harness
        .registry
        .subscribe("k", true, Rc::new(move || seen_cb.set(seen_cb.get() + 1)));

    binding.apply(ValueUpdate::Value(1));
    binding.remove();
    assert_eq!(seen.get(), 2);
}

#[test]
fn subscribers_observe_the_new_value_inside_the_notification() {
    let harness = Harness::new();
    let writer: StateBinding<u32> = harness.binding("k", PersistedStateOptions::new());
    let reader = Rc::new(harness.binding::<u32>("k", PersistedStateOptions::new()));

    let observed = Rc::new(Cell::new(0_u32));
    let observed_cb = Rc::clone(&observed);
    let reader_cb = Rc::clone(&reader);
    harness
        .registry
        .subscribe("k", true, Rc::new(move || observed_cb.set(reader_cb.read())));

    writer.apply(ValueUpdate::Value(9));
    assert_eq!(observed.get(), 9);
}

#[test]
fn unrelated_key_writes_do_not_notify() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = harness.binding("other", PersistedStateOptions::new());

    let seen = Rc::new(Cell::new(0_u32));
    let seen_cb = Rc::clone(&seen);
    harness
        .registry
        .subscribe("k", true, Rc::new(move || seen_cb.set(seen_cb.get() + 1)));

    binding.apply(ValueUpdate::Value(1));
    assert_eq!(seen.get(), 0);
}

// =============================================================
// Corrupt stored values
// =============================================================

#[test]
fn corrupt_entry_reads_as_the_default() {
    let harness = Harness::new();
    harness.storage.write("k", "{definitely not json").expect("write");
    let binding: StateBinding<Vec<String>> =
        harness.binding("k", PersistedStateOptions::new().default_value(todos()));
    assert_eq!(binding.read(), todos());
}

#[test]
fn parse_error_handler_receives_the_corrupted_raw() {
    let harness = Harness::new();
    harness.storage.write("k", "{corrupt").expect("write");

    let seen_raw = Rc::new(RefCell::new(String::new()));
    let seen_raw_cb = Rc::clone(&seen_raw);
    let binding: StateBinding<u32> = harness.binding(
        "k",
        PersistedStateOptions::new().on_parse_error(move |_err, raw| {
            *seen_raw_cb.borrow_mut() = raw.to_owned();
            None
        }),
    );

    binding.read();
    assert_eq!(*seen_raw.borrow(), "{corrupt");
}

#[test]
fn recovery_value_replaces_the_default_for_that_read() {
    let harness = Harness::new();
    harness.storage.write("k", "{corrupt").expect("write");
    let binding: StateBinding<u32> = harness.binding(
        "k",
        PersistedStateOptions::new().default_value(1).on_parse_error(|_err, _raw| Some(42)),
    );
    assert_eq!(binding.read(), 42);
}

#[test]
fn declined_recovery_falls_back_to_the_default() {
    let harness = Harness::new();
    harness.storage.write("k", "{corrupt").expect("write");
    let binding: StateBinding<u32> = harness.binding(
        "k",
        PersistedStateOptions::new().default_value(1).on_parse_error(|_err, _raw| None),
    );
    assert_eq!(binding.read(), 1);
}

#[test]
fn unserializable_write_is_a_no_op() {
    let harness = Harness::new();
    let binding: StateBinding<u32> = harness.binding(
        "k",
        PersistedStateOptions::new().default_value(1).serializer(UnserializableSerializer),
    );

    let seen = Rc::new(Cell::new(0_u32));
    let seen_cb = Rc::clone(&seen);
    harness
        .registry
        .subscribe("k", true, Rc::new(move || seen_cb.set(seen_cb.get() + 1)));

    binding.apply(ValueUpdate::Value(2));
    assert_eq!(seen.get(), 0);
    assert!(harness.fallback.is_empty());
    assert!(binding.is_persistent());
}

// =============================================================
// Snapshot cache behavior
// =============================================================

#[test]
fn unchanged_raw_is_parsed_once_across_reads() {
    let harness = Harness::new();
    harness.storage.write("k", "[1,2]").expect("write");
    let parses = Rc::new(Cell::new(0_u32));
    let binding: StateBinding<Vec<u32>> = harness.binding(
        "k",
        PersistedStateOptions::new().serializer(CountingSerializer { parses: Rc::clone(&parses) }),
    );

    binding.read();
    binding.read();
    binding.read();
    assert_eq!(parses.get(), 1);
}

#[test]
fn changed_raw_is_reparsed() {
    let harness = Harness::new();
    let parses = Rc::new(Cell::new(0_u32));
    let binding: StateBinding<Vec<u32>> = harness.binding(
        "k",
        PersistedStateOptions::new().serializer(CountingSerializer { parses: Rc::clone(&parses) }),
    );

    binding.apply(ValueUpdate::Value(vec![1]));
    binding.read();
    binding.apply(ValueUpdate::Value(vec![2]));
    binding.read();
    assert_eq!(binding.read(), vec![2]);
    assert_eq!(parses.get(), 2);
}

// =============================================================
// The undefined-like slot
// =============================================================

#[test]
fn option_none_round_trips_through_storage() {
    let harness = Harness::new();
    let writer: StateBinding<Option<String>> = harness.binding("k", PersistedStateOptions::new());
    writer.apply(ValueUpdate::Value(None));

    assert_eq!(harness.storage.entry("k"), Some("null".to_owned()));
    let reader: StateBinding<Option<String>> = harness.binding("k", PersistedStateOptions::new());
    assert_eq!(reader.read(), None);
}

#[test]
fn literal_undefined_entry_reads_as_none() {
    let harness = Harness::new();
    harness.storage.write("k", "undefined").expect("write");
    let binding: StateBinding<Option<String>> =
        harness.binding("k", PersistedStateOptions::new().default_value(Some("d".to_owned())));
    assert_eq!(binding.read(), None);
}

// =============================================================
// Non-interactive contexts
// =============================================================

#[test]
fn non_interactive_reads_the_default_and_never_writes() {
    let binding: StateBinding<Vec<String>> = StateBinding::new(
        "k".to_owned(),
        ExecutionContext::NonInteractive,
        PersistedStateOptions::new().default_value(todos()),
    );
    binding.attach();

    assert_eq!(binding.read(), todos());
    binding.apply(ValueUpdate::Value(vec!["x".to_owned()]));
    binding.remove();
    assert_eq!(binding.read(), todos());
    assert!(binding.is_persistent());
}

#[test]
fn non_interactive_prefers_the_server_default() {
    let binding: StateBinding<u32> = StateBinding::new(
        "k".to_owned(),
        ExecutionContext::NonInteractive,
        PersistedStateOptions::new().default_value(1).server_default_value(2),
    );
    binding.attach();
    assert_eq!(binding.read(), 2);
}

// =============================================================
// End-to-end scenario
// =============================================================

#[test]
fn shared_key_lifecycle_matches_expectations() {
    let harness = Harness::new();
    let options = || PersistedStateOptions::new().default_value(todos());

    let a: StateBinding<Vec<String>> = harness.binding("todos", options());
    assert_eq!(a.read(), todos());
    assert_eq!(harness.storage.entry("todos"), Some("[\"a\",\"b\"]".to_owned()));

    let b: StateBinding<Vec<String>> = harness.binding("todos", options());
    assert_eq!(b.read(), todos());

    a.apply(ValueUpdate::Value(vec!["c".to_owned(), "d".to_owned()]));
    assert_eq!(b.read(), vec!["c".to_owned(), "d".to_owned()]);

    a.remove();
    assert_eq!(b.read(), todos());
}
