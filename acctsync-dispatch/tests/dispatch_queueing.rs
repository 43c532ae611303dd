//! Dispatcher behaviour that can be observed without a real directory
//! service: everything is forced through the queue by sentinels, class
//! markers or transient delivery failures.

use std::cell::Cell;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use acctsync_core::{ChangeRecord, Password, Principal, SyncConfig};
use acctsync_dispatch::{Delivery, DeliveryClient, DeliveryError, Dispatcher, Outcome, SyncError};
use acctsync_queue::{reader, QueueDir, QueueError};
use rstest::rstest;
use tempfile::TempDir;

const CONFIG: &str = "targets:\n  - domain: ad\n    realms: [EXAMPLE.COM]\n";

/// Counts calls and answers every delivery the same way.
struct Counting {
    calls: Cell<usize>,
    answer: Result<(), DeliveryError>,
}

impl Counting {
    fn answering(answer: Result<(), DeliveryError>) -> Self {
        Self {
            calls: Cell::new(0),
            answer,
        }
    }
}

impl DeliveryClient for Counting {
    fn deliver(&self, _: &ChangeRecord) -> Result<(), DeliveryError> {
        self.calls.set(self.calls.get() + 1);
        self.answer.clone()
    }
}

fn principal() -> Principal {
    Principal::parse("test@EXAMPLE.COM").expect("principal")
}

fn queue_dir(tmp: &TempDir) -> PathBuf {
    let path = tmp.path().join("queue");
    fs::create_dir(&path).expect("mkdir queue");
    path
}

fn dispatcher<'a>(
    queue: &Path,
    config: &'a SyncConfig,
    client: &'a Counting,
) -> Dispatcher<&'a SyncConfig, &'a Counting> {
    Dispatcher::new(QueueDir::new(queue), config, client)
}

fn lines_of(path: &Path) -> Vec<String> {
    BufReader::new(fs::File::open(path).expect("open"))
        .lines()
        .map(|l| l.expect("line"))
        .collect()
}

fn only_queued(outcome: &Outcome) -> PathBuf {
    let queued: Vec<_> = outcome.queued().collect();
    assert_eq!(queued.len(), 1, "expected exactly one queued entry: {outcome:?}");
    queued[0].path.clone()
}

#[test]
fn blocked_password_change_is_queued_not_delivered() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    fs::write(queue.join("test-ad-password-19700101T000000Z"), "").expect("marker");
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Ok(()));

    let outcome = dispatcher(&queue, &config, &client)
        .on_password_change(&principal(), Password::new("foobar"))
        .expect("password change succeeds");

    assert_eq!(client.calls.get(), 0, "no delivery attempted while blocked");
    assert!(queue.join(".lock").exists());
    let entry = only_queued(&outcome);
    let name = entry.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("test-ad-password-") && name.ends_with("-00"), "{name}");
    assert_eq!(lines_of(&entry), vec!["test", "ad", "password", "foobar"]);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&entry).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn one_marker_blocks_enable_then_disable() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    let marker = queue.join("test-ad-enable-19700101T000000Z");
    fs::write(&marker, "").expect("marker");
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Ok(()));
    let dispatcher = dispatcher(&queue, &config, &client);

    let enabled = dispatcher.on_status_change(&principal(), true).expect("enable");
    let enable_entry = only_queued(&enabled);
    assert_eq!(lines_of(&enable_entry), vec!["test", "ad", "enable"]);
    fs::remove_file(&enable_entry).expect("remove queued enable");

    let disabled = dispatcher.on_status_change(&principal(), false).expect("disable");
    let disable_entry = only_queued(&disabled);
    assert_eq!(lines_of(&disable_entry), vec!["test", "ad", "disable"]);

    assert_eq!(client.calls.get(), 0);
    assert!(marker.exists(), "marker is not consumed by queueing");
    fs::remove_file(&marker).expect("remove marker");
    fs::remove_file(&disable_entry).expect("remove queued disable");
    fs::remove_file(queue.join(".lock")).expect("lock file still exists");
    fs::remove_dir(&queue).expect("no other files in queue directory");
}

#[rstest]
#[case("test-ad-19700101T000000Z")]
#[case("test-ad-*-20000101T000000Z")]
fn sentinel_blocks_every_operation(#[case] sentinel: &str) {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    fs::write(queue.join(sentinel), "").expect("sentinel");
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Ok(()));
    let dispatcher = dispatcher(&queue, &config, &client);

    dispatcher
        .on_password_change(&principal(), Password::new("pw"))
        .expect("password");
    dispatcher.on_status_change(&principal(), true).expect("enable");
    dispatcher.on_status_change(&principal(), false).expect("disable");

    assert_eq!(client.calls.get(), 0);
    let queued = reader::entries(&QueueDir::new(&queue)).expect("entries");
    assert_eq!(queued.len(), 3);
}

#[test]
fn unblocked_change_is_delivered_without_queueing() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Ok(()));

    let outcome = dispatcher(&queue, &config, &client)
        .on_password_change(&principal(), Password::new("pw"))
        .expect("delivered");

    assert_eq!(client.calls.get(), 1);
    let Outcome::Propagated(outcomes) = outcome else {
        panic!("expected propagation");
    };
    assert_eq!(outcomes[0].delivery, Delivery::Delivered);
    let names: Vec<_> = fs::read_dir(&queue)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![".lock"], "lock taken for the check, no entry written");
}

#[test]
fn transient_failure_falls_back_to_queue() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Err(DeliveryError::Transient("timeout".into())));

    let outcome = dispatcher(&queue, &config, &client)
        .on_status_change(&principal(), false)
        .expect("queued instead");

    assert_eq!(client.calls.get(), 1);
    let entry = only_queued(&outcome);
    assert_eq!(lines_of(&entry), vec!["test", "ad", "disable"]);
}

#[test]
fn queued_change_holds_back_later_changes_of_same_class() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    let config = SyncConfig::from_yaml(CONFIG).expect("config");

    let failing = Counting::answering(Err(DeliveryError::Transient("down".into())));
    dispatcher(&queue, &config, &failing)
        .on_status_change(&principal(), false)
        .expect("queued");

    let working = Counting::answering(Ok(()));
    let dispatcher = dispatcher(&queue, &config, &working);
    let later = dispatcher.on_status_change(&principal(), true).expect("enable");
    assert_eq!(later.queued().count(), 1, "enable must not overtake queued disable");
    assert_eq!(working.calls.get(), 0);

    let password = dispatcher
        .on_password_change(&principal(), Password::new("pw"))
        .expect("password");
    assert_eq!(password.queued().count(), 0, "other class is unaffected");
    assert_eq!(working.calls.get(), 1);
}

#[test]
fn permanent_failure_is_reported_and_not_queued() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Err(DeliveryError::Permanent("constraint violation".into())));

    let err = dispatcher(&queue, &config, &client)
        .on_password_change(&principal(), Password::new("short"))
        .unwrap_err();

    assert!(matches!(err, SyncError::Delivery { .. }), "{err:?}");
    assert!(err.to_string().contains("constraint violation"));
    assert!(reader::entries(&QueueDir::new(&queue)).unwrap().is_empty());
}

#[test]
fn missing_queue_directory_fails_before_delivery() {
    let tmp = TempDir::new().expect("tmp");
    let queue = tmp.path().join("queue");
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Ok(()));
    let dispatcher = dispatcher(&queue, &config, &client);
    let wanted = format!("cannot open lock file {}: ", queue.join(".lock").display());

    let results = [
        dispatcher.on_password_change(&principal(), Password::new("foobar")),
        dispatcher.on_status_change(&principal(), true),
        dispatcher.on_status_change(&principal(), false),
    ];
    for result in results {
        let err = result.unwrap_err();
        assert!(
            matches!(err, SyncError::Queue(QueueError::QueueUnavailable { .. })),
            "{err:?}"
        );
        assert_eq!(err.code(), libc::ENOENT);
        let message = err.to_string();
        assert!(message.starts_with(&wanted), "{message}");
        #[cfg(target_os = "linux")]
        assert!(message.ends_with("No such file or directory"), "{message}");
    }
    assert_eq!(client.calls.get(), 0, "no delivery without a queue to fall back on");
    assert!(!queue.exists());
}

#[test]
fn queue_only_target_with_missing_directory_fails_fast() {
    let tmp = TempDir::new().expect("tmp");
    let queue = tmp.path().join("queue");
    let config =
        SyncConfig::from_yaml("targets:\n  - domain: ad\n    queue_only: true\n").expect("config");
    let client = Counting::answering(Ok(()));

    let err = dispatcher(&queue, &config, &client)
        .on_status_change(&principal(), true)
        .unwrap_err();
    assert_eq!(err.code(), libc::ENOENT);
    assert_eq!(client.calls.get(), 0);
}

#[rstest]
#[case("")]
#[case("queue_dir: /nonexistent\n")]
fn unconfigured_sync_is_a_silent_no_op(#[case] yaml: &str) {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    fs::write(queue.join("test-ad-19700101T000000Z"), "").expect("sentinel");
    let config = SyncConfig::from_yaml(yaml).expect("config");
    let client = Counting::answering(Ok(()));
    let dispatcher = dispatcher(&queue, &config, &client);

    assert_eq!(
        dispatcher
            .on_password_change(&principal(), Password::new("foobar"))
            .expect("password"),
        Outcome::Disabled
    );
    assert_eq!(
        dispatcher.on_status_change(&principal(), false).expect("disable"),
        Outcome::Disabled
    );

    assert_eq!(client.calls.get(), 0);
    let names: Vec<_> = fs::read_dir(&queue)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec!["test-ad-19700101T000000Z"], "no lock, no entry");
}

#[test]
fn unconfigured_sync_ignores_missing_queue_directory() {
    let tmp = TempDir::new().expect("tmp");
    let queue = tmp.path().join("queue");
    let config = SyncConfig::default();
    let client = Counting::answering(Ok(()));

    let outcome = dispatcher(&queue, &config, &client)
        .on_status_change(&principal(), false)
        .expect("no-op");
    assert_eq!(outcome, Outcome::Disabled);
    assert!(!queue.exists());
}

#[test]
fn other_realms_are_not_synced() {
    let tmp = TempDir::new().expect("tmp");
    let queue = queue_dir(&tmp);
    let config = SyncConfig::from_yaml(CONFIG).expect("config");
    let client = Counting::answering(Ok(()));

    let outcome = dispatcher(&queue, &config, &client)
        .on_status_change(&Principal::parse("test@OTHER.ORG").unwrap(), true)
        .expect("no-op");
    assert_eq!(outcome, Outcome::Disabled);
    assert_eq!(client.calls.get(), 0);
}
