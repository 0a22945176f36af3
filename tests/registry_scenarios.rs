//! End-to-end scenarios driven entirely through the public syscall surface,
//! the way a user-mode caller would see the configuration manager: open a
//! handle, operate on it, close it.

use cm_registry::cm::syscalls::{AccessMask, Disposition, KeyInformationClass, KeyQueryResult, KeyValueInformationClass, ValueQueryResult};
use cm_registry::cm::{CallbackArgument, CmStatus, CreateOptions, NotifyClass, ValueData, ValueType};
use cm_registry::{Registry, RegistryConfig};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fresh_registry() -> Registry {
    let registry = Registry::new(RegistryConfig::new());
    registry.initialize().unwrap();
    registry
}

#[test]
fn initialize_twice_is_refused() {
    let registry = fresh_registry();
    assert_eq!(registry.initialize(), Err(CmStatus::AccessDenied));
}

#[test]
fn create_open_set_query_enumerate_delete_round_trip() {
    init_logging();
    let registry = fresh_registry();

    let (status, handle, disposition) = registry.create_key(
        "HKLM\\Software\\Acme",
        Some("AcmeClass"),
        CreateOptions::default(),
        AccessMask::ALL_ACCESS,
    );
    assert_eq!(status, CmStatus::Success);
    assert_eq!(disposition, Disposition::CreatedNewKey);
    let handle = handle.unwrap();

    let status = registry.set_value_key(handle, "Version", ValueType::Dword, ValueData::from_dword(7));
    assert_eq!(status, CmStatus::Success);

    let (status, _, result) = registry.query_value_key(handle, "Version", KeyValueInformationClass::Partial, 64);
    assert_eq!(status, CmStatus::Success);
    match result.unwrap() {
        ValueQueryResult::Partial(info) => {
            assert_eq!(info.value_type, ValueType::Dword);
            assert_eq!(ValueData::from_bytes(&info.data).as_dword(), Some(7));
        }
        _ => panic!("expected partial information"),
    }

    let (status, _, node) = registry.query_key(handle, KeyInformationClass::Full, 256);
    assert_eq!(status, CmStatus::Success);
    match node.unwrap() {
        KeyQueryResult::Full(info) => {
            assert_eq!(info.values, 1);
            assert_eq!(info.class.as_deref(), Some("AcmeClass"));
        }
        _ => panic!("expected full information"),
    }

    // Reopening the same path finds the existing key rather than creating a new one.
    let (status, reopened, disposition) = registry.create_key(
        "\\HKLM\\Software\\Acme\\",
        None,
        CreateOptions::default(),
        AccessMask::QUERY_VALUE,
    );
    assert_eq!(status, CmStatus::Success);
    assert_eq!(disposition, Disposition::OpenedExistingKey);
    assert_eq!(registry.close_key(reopened.unwrap()), CmStatus::Success);

    assert_eq!(registry.delete_value_key(handle, "Version"), CmStatus::Success);
    assert_eq!(registry.delete_key(handle), CmStatus::Success);
    assert_eq!(registry.close_key(handle), CmStatus::InvalidHandle);
}

#[test]
fn create_key_rejects_tree_creation_through_a_missing_intermediate() {
    let registry = fresh_registry();
    let (status, handle, disposition) = registry.create_key(
        "HKLM\\NoSuchParent\\Child",
        None,
        CreateOptions::default(),
        AccessMask::ALL_ACCESS,
    );
    assert_eq!(status, CmStatus::ObjectNameNotFound);
    assert!(handle.is_none());
    assert_eq!(disposition, Disposition::None);
}

#[test]
fn create_key_creates_a_single_missing_component_with_stray_backslashes() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Base", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    registry.close_key(handle.unwrap());

    let (status, handle, disposition) = registry.create_key(
        "HKLM\\Base\\Leaf\\",
        None,
        CreateOptions::default(),
        AccessMask::ALL_ACCESS,
    );
    assert_eq!(status, CmStatus::Success);
    assert_eq!(disposition, Disposition::CreatedNewKey);
    registry.close_key(handle.unwrap());

    let (status, _) = registry.open_key("HKLM\\Base\\Leaf", AccessMask::QUERY_VALUE);
    assert_eq!(status, CmStatus::Success);
}

#[test]
fn delete_key_with_children_is_refused() {
    let registry = fresh_registry();
    let (_, parent, _) = registry.create_key("HKLM\\Parent", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let parent = parent.unwrap();
    registry.create_key("HKLM\\Parent\\Child", None, CreateOptions::default(), AccessMask::ALL_ACCESS);

    assert_eq!(registry.delete_key(parent), CmStatus::CannotDelete);
}

#[test]
fn enumerate_key_walks_children_then_reports_no_more_entries() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Services", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    registry.create_key("HKLM\\Services\\Alpha", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    registry.create_key("HKLM\\Services\\Beta", None, CreateOptions::default(), AccessMask::ALL_ACCESS);

    let (status0, _, _) = registry.enumerate_key(handle, 0, KeyInformationClass::Node, 256);
    let (status1, _, _) = registry.enumerate_key(handle, 1, KeyInformationClass::Node, 256);
    let (status2, _, _) = registry.enumerate_key(handle, 2, KeyInformationClass::Node, 256);
    assert_eq!(status0, CmStatus::Success);
    assert_eq!(status1, CmStatus::Success);
    assert_eq!(status2, CmStatus::NoMoreEntries);
}

#[test]
fn enumerate_key_serves_basic_node_and_full_information_classes() {
    let registry = fresh_registry();
    let (_, handle, _) =
        registry.create_key("HKLM\\Drivers", Some("DriverClass"), CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    registry.set_value_key(handle, "Root", ValueType::Dword, ValueData::from_dword(1));
    let (_, child, _) =
        registry.create_key("HKLM\\Drivers\\Alpha", Some("AlphaClass"), CreateOptions::default(), AccessMask::ALL_ACCESS);
    let child = child.unwrap();
    registry.set_value_key(child, "Enabled", ValueType::Dword, ValueData::from_dword(1));
    registry.set_value_key(child, "Name", ValueType::Sz, ValueData::from_string("alpha"));

    let (status, _, info) = registry.enumerate_key(handle, 0, KeyInformationClass::Basic, 256);
    assert_eq!(status, CmStatus::Success);
    let KeyQueryResult::Basic(basic) = info.unwrap() else { panic!("expected basic") };
    assert_eq!(basic.name, "Alpha");

    let (status, _, info) = registry.enumerate_key(handle, 0, KeyInformationClass::Node, 256);
    assert_eq!(status, CmStatus::Success);
    let KeyQueryResult::Node(node) = info.unwrap() else { panic!("expected node") };
    assert_eq!(node.name, "Alpha");
    assert_eq!(node.class.as_deref(), Some("AlphaClass"));

    // Full information's counts/maxima describe the key under the handle
    // (one child, one value), while class/values describe the enumerated
    // child itself (two values of its own).
    let (status, _, info) = registry.enumerate_key(handle, 0, KeyInformationClass::Full, 256);
    assert_eq!(status, CmStatus::Success);
    let KeyQueryResult::Full(full) = info.unwrap() else { panic!("expected full") };
    assert_eq!(full.subkeys, 1);
    assert_eq!(full.values, 2);
    assert_eq!(full.class.as_deref(), Some("AlphaClass"));
}

#[test]
fn query_key_buffer_too_small_then_overflow_then_success() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key(
        "HKLM\\LongNamedSoftwareKey",
        None,
        CreateOptions::default(),
        AccessMask::ALL_ACCESS,
    );
    let handle = handle.unwrap();

    let (status, required, info) = registry.query_key(handle, KeyInformationClass::Basic, 1);
    assert_eq!(status, CmStatus::BufferTooSmall);
    assert!(info.is_none());
    assert!(required > 1);

    let (status, required, info) = registry.query_key(handle, KeyInformationClass::Basic, 18);
    assert_eq!(status, CmStatus::BufferOverflow);
    let KeyQueryResult::Basic(basic) = info.unwrap() else { panic!("expected basic") };
    assert!(basic.name.len() < required);

    let (status, _, info) = registry.query_key(handle, KeyInformationClass::Basic, required);
    assert_eq!(status, CmStatus::Success);
    assert!(info.is_some());
}

#[test]
fn save_key_rejects_a_volatile_key() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key(
        "HKLM\\Volatile",
        None,
        CreateOptions { volatile: true },
        AccessMask::ALL_ACCESS,
    );
    assert_eq!(registry.save_key(handle.unwrap()), CmStatus::AccessDenied);
}

#[test]
fn save_key_copies_a_stable_key_into_a_temp_hive() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Saveable", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    registry.set_value_key(handle, "Marker", ValueType::Dword, ValueData::from_dword(5));
    assert_eq!(registry.save_key(handle), CmStatus::Success);
}

#[test]
fn set_value_key_marks_the_key_cell_as_a_link_for_symbolic_link_value() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Linked", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();

    let status = registry.set_value_key(handle, "SymbolicLinkValue", ValueType::Link, ValueData::from_string("\\A\\B"));
    assert_eq!(status, CmStatus::Success);

    let (_, _, node) = registry.query_key(handle, KeyInformationClass::Basic, 256);
    assert!(node.is_some());
}

#[test]
fn query_multiple_value_key_stops_on_the_first_unknown_name() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Multi", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    registry.set_value_key(handle, "First", ValueType::Dword, ValueData::from_dword(1));
    registry.set_value_key(handle, "Second", ValueType::Dword, ValueData::from_dword(2));

    let (status, _, result) = registry.query_multiple_value_key(handle, &["First", "Missing", "Second"], 256);
    assert_eq!(status, CmStatus::ObjectNameNotFound);
    assert_eq!(result.entries.len(), 1);
    assert!(result.entries[0].is_some());
}

#[test]
fn query_multiple_value_key_builds_one_pointer_aligned_combined_buffer() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\MultiOk", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    registry.set_value_key(handle, "A", ValueType::Dword, ValueData::from_dword(1));
    registry.set_value_key(handle, "B", ValueType::Binary, ValueData::from_bytes(&[1, 2, 3]));

    let (status, required, result) = registry.query_multiple_value_key(handle, &["A", "B"], 256);
    assert_eq!(status, CmStatus::Success);
    assert_eq!(result.entries.len(), 2);
    let a = result.entries[0].unwrap();
    let b = result.entries[1].unwrap();
    assert_eq!(a.data_offset, 0);
    assert_eq!(a.data_length, 4);
    // B's offset is rounded up to the next pointer-sized boundary past A's data.
    let align = core::mem::size_of::<usize>();
    assert_eq!(b.data_offset % align, 0);
    assert!(b.data_offset >= a.data_offset + a.data_length);
    assert_eq!(required, b.data_offset + b.data_length);
    assert_eq!(result.data.len(), required);
}

#[test]
fn query_multiple_value_key_keeps_accounting_required_past_the_first_overflow() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\MultiOverflow", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    registry.set_value_key(handle, "A", ValueType::Binary, ValueData::from_bytes(&[0u8; 16]));
    registry.set_value_key(handle, "B", ValueType::Binary, ValueData::from_bytes(&[0u8; 16]));

    let (status, required, result) = registry.query_multiple_value_key(handle, &["A", "B"], 4);
    assert_eq!(status, CmStatus::BufferTooSmall);
    assert_eq!(result.entries.len(), 2);
    assert!(result.entries[0].is_none());
    assert!(result.entries[1].is_none());
    assert_eq!(required, 32);
}

#[test]
fn flush_key_always_reports_success() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Volatile", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    assert_eq!(registry.flush_key(handle.unwrap()), CmStatus::Success);
}

#[test]
fn set_information_key_always_reports_success() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Info", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();
    assert_eq!(registry.set_information_key(handle, 42), CmStatus::Success);
    let (_, _, node) = registry.query_key(handle, KeyInformationClass::Basic, 256);
    let KeyQueryResult::Basic(basic) = node.unwrap() else { panic!("expected basic") };
    assert_eq!(basic.last_write_time, 42);
}

#[test]
fn register_callback_observes_pre_and_post_notifications() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let registry = fresh_registry();
    let pre_hits = Arc::new(AtomicUsize::new(0));
    let post_hits = Arc::new(AtomicUsize::new(0));
    let (pre, post) = (pre_hits.clone(), post_hits.clone());

    let cookie = registry.register_callback(0, move |_, class, arg| {
        match (class, arg) {
            (NotifyClass::RegNtPreCreateKey, CallbackArgument::Pre { .. }) => {
                pre.fetch_add(1, Ordering::SeqCst);
            }
            (NotifyClass::RegNtPostCreateKey, CallbackArgument::Post { status }) => {
                assert_eq!(*status, CmStatus::Success);
                post.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        CmStatus::Success
    });

    registry.create_key("HKLM\\Observed", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    assert_eq!(pre_hits.load(Ordering::SeqCst), 1);
    assert_eq!(post_hits.load(Ordering::SeqCst), 1);

    assert!(registry.unregister_callback(cookie).is_ok());
    registry.create_key("HKLM\\AfterUnregister", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    assert_eq!(pre_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_pre_callback_short_circuits_create_key() {
    let registry = fresh_registry();
    registry.register_callback(0, |_, class, _| {
        if class == NotifyClass::RegNtPreCreateKey {
            CmStatus::AccessDenied
        } else {
            CmStatus::Success
        }
    });

    let (status, handle, disposition) = registry.create_key(
        "HKLM\\Blocked",
        None,
        CreateOptions::default(),
        AccessMask::ALL_ACCESS,
    );
    assert_eq!(status, CmStatus::AccessDenied);
    assert!(handle.is_none());
    assert_eq!(disposition, Disposition::None);

    let (status, _) = registry.open_key("HKLM\\Blocked", AccessMask::QUERY_VALUE);
    assert_eq!(status, CmStatus::ObjectNameNotFound);
}

#[test]
fn load_and_unload_hive_round_trip() {
    let registry = fresh_registry();
    assert_eq!(registry.load_key("HKLM\\Mounted", "Extra"), CmStatus::Success);

    let (_, handle) = registry.open_key("HKLM\\Mounted", AccessMask::QUERY_VALUE);
    let handle = handle.unwrap();

    // A live handle into the mounted hive blocks unload.
    assert_eq!(registry.unload_key("HKLM\\Mounted"), CmStatus::AccessDenied);
    assert_eq!(registry.close_key(handle), CmStatus::Success);
    assert_eq!(registry.unload_key("HKLM\\Mounted"), CmStatus::Success);
    assert_eq!(registry.unload_key("HKLM\\Mounted"), CmStatus::ObjectNameNotFound);
}

#[test]
fn create_key_rejects_a_class_string_over_the_configured_limit() {
    let mut config = RegistryConfig::new();
    config.max_class_length = 4;
    let registry = Registry::new(config);
    registry.initialize().unwrap();

    let (status, handle, _) = registry.create_key(
        "HKLM\\Tight",
        Some("WayTooLongAClassString"),
        CreateOptions::default(),
        AccessMask::ALL_ACCESS,
    );
    assert_eq!(status, CmStatus::InvalidParameter);
    assert!(handle.is_none());
}

#[test]
fn rename_key_moves_the_namespace_entry_and_updates_the_cached_path() {
    let registry = fresh_registry();
    let (_, handle, _) = registry.create_key("HKLM\\Movable", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let handle = handle.unwrap();

    assert_eq!(registry.rename_key(handle, "Renamed"), CmStatus::Success);

    let (status, _) = registry.open_key("HKLM\\Movable", AccessMask::QUERY_VALUE);
    assert_eq!(status, CmStatus::ObjectNameNotFound);

    let (status, reopened) = registry.open_key("HKLM\\Renamed", AccessMask::QUERY_VALUE);
    assert_eq!(status, CmStatus::Success);
    registry.close_key(reopened.unwrap());

    // The handle obtained before the rename keeps working, against the new path.
    assert_eq!(registry.set_information_key(handle, 1), CmStatus::Success);
    assert_eq!(registry.close_key(handle), CmStatus::Success);
}

#[test]
fn rename_key_with_children_is_refused() {
    let registry = fresh_registry();
    let (_, parent, _) = registry.create_key("HKLM\\RenameParent", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    let parent = parent.unwrap();
    registry.create_key("HKLM\\RenameParent\\Child", None, CreateOptions::default(), AccessMask::ALL_ACCESS);

    assert_eq!(registry.rename_key(parent, "Renamed"), CmStatus::CannotDelete);
}

#[test]
fn rename_key_rejects_a_colliding_sibling_name() {
    let registry = fresh_registry();
    let (_, a, _) = registry.create_key("HKLM\\RenameA", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    registry.create_key("HKLM\\RenameB", None, CreateOptions::default(), AccessMask::ALL_ACCESS);

    assert_eq!(registry.rename_key(a.unwrap(), "RenameB"), CmStatus::Unsuccessful);
}

#[test]
fn unregister_waits_out_a_callback_invocation_in_flight_on_another_thread() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    let registry = Arc::new(fresh_registry());
    let entered = Arc::new(AtomicBool::new(false));
    let may_leave = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(2));

    let (e, leave) = (entered.clone(), may_leave.clone());
    let cookie = registry.register_callback(0, move |_, class, _| {
        if class == NotifyClass::RegNtPreCreateKey {
            e.store(true, Ordering::SeqCst);
            while !leave.load(Ordering::SeqCst) {
                core::hint::spin_loop();
            }
        }
        CmStatus::Success
    });

    let r = registry.clone();
    let b = barrier.clone();
    let worker = thread::spawn(move || {
        b.wait();
        r.create_key("HKLM\\Concurrent", None, CreateOptions::default(), AccessMask::ALL_ACCESS);
    });

    barrier.wait();
    while !entered.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }

    // unregister must block until the in-flight invocation releases rundown.
    let r2 = registry.clone();
    let unregistering = thread::spawn(move || r2.unregister_callback(cookie));
    thread::sleep(Duration::from_millis(20));
    may_leave.store(true, Ordering::SeqCst);

    assert!(unregistering.join().unwrap().is_ok());
    worker.join().unwrap();
}
