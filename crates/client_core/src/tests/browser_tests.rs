use super::*;
use std::cell::Cell;

use async_trait::async_trait;
use shared::{
    domain::{Coordinates, Record},
    error::SensorError,
    protocol::SensorReading,
};
use tokio::{sync::oneshot, task::LocalSet};

use crate::sensor::{PositionCallback, WatchId};

const WAIT: Duration = Duration::from_secs(5);

struct StaticSource {
    records: Vec<Record>,
    calls: Cell<u32>,
}

impl StaticSource {
    fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            calls: Cell::new(0),
        }
    }
}

#[async_trait(?Send)]
impl RecordSource for StaticSource {
    async fn fetch_records(&self) -> Result<Vec<shared::domain::Record>, LoadError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.records.clone())
    }
}

struct FailingSource(LoadError);

#[async_trait(?Send)]
impl RecordSource for FailingSource {
    async fn fetch_records(&self) -> Result<Vec<Record>, LoadError> {
        Err(self.0.clone())
    }
}

/// Completes only when the test releases the gate.
struct GatedSource {
    gate: RefCell<Option<oneshot::Receiver<Vec<Record>>>>,
}

impl GatedSource {
    fn new() -> (Self, oneshot::Sender<Vec<Record>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                gate: RefCell::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait(?Send)]
impl RecordSource for GatedSource {
    async fn fetch_records(&self) -> Result<Vec<Record>, LoadError> {
        let gate = self.gate.borrow_mut().take();
        match gate {
            Some(rx) => rx
                .await
                .map_err(|_| LoadError::Transport("gate dropped".into())),
            None => Err(LoadError::Transport("fetched twice".into())),
        }
    }
}

/// Keeps every callback and keeps emitting to it even after `clear_watch`,
/// like a sensor that ignores cancellation.
#[derive(Default)]
struct MockWatcher {
    callbacks: RefCell<Vec<PositionCallback>>,
    cleared: RefCell<Vec<WatchId>>,
    refuse_with: Option<SensorError>,
}

impl MockWatcher {
    fn refusing(err: SensorError) -> Self {
        Self {
            refuse_with: Some(err),
            ..Self::default()
        }
    }

    fn emit(&self, event: PositionEvent) {
        for callback in self.callbacks.borrow_mut().iter_mut() {
            callback(event.clone());
        }
    }

    fn emit_reading(&self, latitude: f64, longitude: f64) {
        self.emit(Ok(SensorReading::new(latitude, longitude)));
    }
}

impl PositionWatcher for MockWatcher {
    fn watch(&self, callback: PositionCallback) -> Result<WatchId, SensorError> {
        if let Some(err) = &self.refuse_with {
            return Err(err.clone());
        }
        let mut callbacks = self.callbacks.borrow_mut();
        callbacks.push(callback);
        Ok(WatchId(callbacks.len() as u64))
    }

    fn clear_watch(&self, id: WatchId) {
        self.cleared.borrow_mut().push(id);
    }
}

#[derive(Default)]
struct RecordingDocument {
    titles: RefCell<Vec<String>>,
}

impl RecordingDocument {
    fn last_title(&self) -> Option<String> {
        self.titles.borrow().last().cloned()
    }
}

impl DocumentHost for RecordingDocument {
    fn set_title(&self, title: &str) {
        self.titles.borrow_mut().push(title.to_string());
    }
}

struct Harness {
    browser: RepositoryBrowser,
    watcher: Rc<MockWatcher>,
    document: Rc<RecordingDocument>,
}

fn harness(source: Rc<dyn RecordSource>) -> Harness {
    harness_with(source, MockWatcher::default(), BrowserSettings::default())
}

fn harness_with(
    source: Rc<dyn RecordSource>,
    watcher: MockWatcher,
    settings: BrowserSettings,
) -> Harness {
    let watcher = Rc::new(watcher);
    let document = Rc::new(RecordingDocument::default());
    let browser = RepositoryBrowser::new(
        BrowserDeps {
            records: source,
            watcher: Rc::clone(&watcher) as Rc<dyn PositionWatcher>,
            document: Rc::clone(&document) as Rc<dyn DocumentHost>,
        },
        settings,
    );
    Harness {
        browser,
        watcher,
        document,
    }
}

fn two_repos() -> Vec<Record> {
    vec![
        Record::new(RecordId(1), "repoA"),
        Record::new(RecordId(2), "repoB"),
    ]
}

async fn wait_for_view(
    browser: &RepositoryBrowser,
    predicate: impl Fn(&View) -> bool,
) -> Rc<View> {
    let mut frames = browser.binder().frames();
    let view = tokio::time::timeout(
        WAIT,
        frames.wait_for(|view| view.as_deref().is_some_and(&predicate)),
    )
    .await
    .expect("view in time")
    .expect("binder alive")
    .clone();
    view.expect("rendered view")
}

fn is_ready(view: &View) -> bool {
    view.screen().is_some()
}

#[tokio::test]
async fn loaded_list_shows_both_repositories_unfavorited() {
    LocalSet::new()
        .run_until(async {
            let source = Rc::new(StaticSource::new(two_repos()));
            let h = harness(Rc::clone(&source) as Rc<dyn RecordSource>);

            h.browser.mount().expect("mount");
            assert_eq!(h.browser.current_view().as_deref(), Some(&View::Loading));

            let view = wait_for_view(&h.browser, is_ready).await;
            let rows = &view.screen().expect("screen").repositories;
            let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();

            assert_eq!(names, vec!["repoA", "repoB"]);
            assert!(rows.iter().all(|row| !row.favorite));
            assert_eq!(h.browser.load_state().get(), LoadState::Loaded);
            assert_eq!(source.calls.get(), 1);
            assert_eq!(
                h.document.last_title().as_deref(),
                Some("You have 0 favorites")
            );
        })
        .await;
}

#[tokio::test]
async fn toggles_drive_the_favorite_count_and_title() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            wait_for_view(&h.browser, is_ready).await;

            assert!(h.browser.toggle_favorite(RecordId(2)));
            let view = wait_for_view(&h.browser, |view| {
                view.screen()
                    .is_some_and(|screen| screen.repositories[1].favorite)
            })
            .await;
            assert!(!view.screen().expect("screen").repositories[0].favorite);
            assert_eq!(h.browser.favorite_count(), 1);
            assert_eq!(
                h.document.last_title().as_deref(),
                Some("You have 1 favorites")
            );

            assert!(h.browser.toggle_favorite(RecordId(2)));
            wait_for_view(&h.browser, |view| {
                view.screen()
                    .is_some_and(|screen| !screen.repositories[1].favorite)
            })
            .await;
            assert_eq!(h.browser.favorite_count(), 0);
            assert_eq!(
                h.document.last_title().as_deref(),
                Some("You have 0 favorites")
            );
        })
        .await;
}

#[tokio::test]
async fn toggling_an_unknown_id_changes_nothing() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            wait_for_view(&h.browser, is_ready).await;
            let before = h.browser.records().get();
            let version = h.browser.records().version();
            let renders = h.browser.binder().render_count();

            assert!(!h.browser.toggle_favorite(RecordId(404)));
            tokio::task::yield_now().await;

            assert_eq!(h.browser.records().get(), before);
            assert_eq!(h.browser.records().version(), version);
            assert_eq!(h.browser.binder().render_count(), renders);
        })
        .await;
}

#[tokio::test]
async fn position_follows_only_the_latest_reading() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            wait_for_view(&h.browser, is_ready).await;

            h.watcher.emit_reading(10.0, 20.0);
            h.watcher.emit_reading(11.0, 21.0);

            let view = wait_for_view(&h.browser, |view| {
                view.screen()
                    .is_some_and(|screen| screen.location.latitude.is_some())
            })
            .await;
            let location = &view.screen().expect("screen").location;

            assert_eq!(location.latitude, Some(11.0));
            assert_eq!(location.longitude, Some(21.0));
            assert_eq!(
                h.browser.position().get(),
                PositionState::Fixed(Coordinates::new(11.0, 21.0))
            );
        })
        .await;
}

#[tokio::test]
async fn teardown_clears_the_watch_once_and_ignores_later_readings() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            h.watcher.emit_reading(10.0, 20.0);
            wait_for_view(&h.browser, |view| {
                view.screen()
                    .is_some_and(|screen| screen.location.latitude == Some(10.0))
            })
            .await;

            assert!(h.browser.teardown());
            assert!(!h.browser.teardown());
            assert_eq!(*h.watcher.cleared.borrow(), vec![WatchId(1)]);

            let version = h.browser.position().version();
            h.watcher.emit_reading(50.0, 60.0);
            h.watcher.emit(Err(SensorError::Timeout));
            tokio::task::yield_now().await;

            assert_eq!(h.browser.position().version(), version);
            assert_eq!(
                h.browser.position().get(),
                PositionState::Fixed(Coordinates::new(10.0, 20.0))
            );
        })
        .await;
}

#[tokio::test]
async fn dropping_the_browser_clears_the_watch() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            let Harness {
                browser, watcher, ..
            } = h;

            drop(browser);
            assert_eq!(watcher.cleared.borrow().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn refused_watch_marks_position_unavailable() {
    LocalSet::new()
        .run_until(async {
            let h = harness_with(
                Rc::new(StaticSource::new(two_repos())),
                MockWatcher::refusing(SensorError::PermissionDenied),
                BrowserSettings::default(),
            );
            h.browser.mount().expect("mount");

            let view = wait_for_view(&h.browser, is_ready).await;
            assert_eq!(
                view.screen().expect("screen").location.unavailable.as_deref(),
                Some("location permission denied")
            );
            assert_eq!(
                h.browser.position().get(),
                PositionState::Unavailable(SensorError::PermissionDenied)
            );

            h.browser.teardown();
            assert!(h.watcher.cleared.borrow().is_empty());
        })
        .await;
}

#[tokio::test]
async fn sensor_errors_are_kept_local_to_the_position() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            wait_for_view(&h.browser, is_ready).await;

            h.watcher
                .emit(Err(SensorError::Unavailable("no fix".into())));
            let view = wait_for_view(&h.browser, |view| {
                view.screen()
                    .is_some_and(|screen| screen.location.unavailable.is_some())
            })
            .await;

            let screen = view.screen().expect("screen");
            assert_eq!(screen.repositories.len(), 2);
            assert_eq!(screen.location.latitude, None);
        })
        .await;
}

#[tokio::test]
async fn failed_load_is_shown_instead_of_crashing() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(FailingSource(LoadError::Status { status: 500 })));
            h.browser.mount().expect("mount");

            let view = wait_for_view(&h.browser, is_ready).await;
            let screen = view.screen().expect("screen");

            assert!(screen.repositories.is_empty());
            assert_eq!(
                screen.load_error.as_deref(),
                Some("server responded with status 500")
            );
            assert_eq!(
                h.browser.load_state().get(),
                LoadState::Failed(LoadError::Status { status: 500 })
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn unsettled_load_fails_at_the_timeout_ceiling() {
    LocalSet::new()
        .run_until(async {
            let (source, _gate) = GatedSource::new();
            let h = harness_with(
                Rc::new(source),
                MockWatcher::default(),
                BrowserSettings {
                    load_timeout: Some(Duration::from_secs(2)),
                },
            );
            h.browser.mount().expect("mount");

            tokio::time::sleep(Duration::from_millis(1999)).await;
            assert!(h.browser.load_state().get().is_loading());

            tokio::time::sleep(Duration::from_millis(2)).await;
            tokio::task::yield_now().await;
            assert_eq!(
                h.browser.load_state().get(),
                LoadState::Failed(LoadError::TimedOut { timeout_ms: 2000 })
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn loading_ends_only_when_the_fetch_settles() {
    LocalSet::new()
        .run_until(async {
            let (source, gate) = GatedSource::new();
            let h = harness_with(
                Rc::new(source),
                MockWatcher::default(),
                BrowserSettings { load_timeout: None },
            );
            h.browser.mount().expect("mount");

            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(h.browser.load_state().get().is_loading());
            assert_eq!(h.browser.current_view().as_deref(), Some(&View::Loading));

            gate.send(two_repos()).expect("release gate");
            let view = wait_for_view(&h.browser, is_ready).await;

            assert_eq!(view.screen().expect("screen").repositories.len(), 2);
            assert_eq!(h.browser.load_state().get(), LoadState::Loaded);
        })
        .await;
}

#[tokio::test]
async fn teardown_cancels_an_in_flight_load() {
    LocalSet::new()
        .run_until(async {
            let (source, gate) = GatedSource::new();
            let h = harness_with(
                Rc::new(source),
                MockWatcher::default(),
                BrowserSettings { load_timeout: None },
            );
            h.browser.mount().expect("mount");
            tokio::task::yield_now().await;

            h.browser.teardown();
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            let _ = gate.send(two_repos());
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }

            assert!(h.browser.records().get().is_empty());
            assert!(h.browser.load_state().get().is_loading());
            assert!(h.browser.binder().cancellation().is_cancelled());
        })
        .await;
}

#[tokio::test]
async fn submit_hands_over_the_typed_values_unaltered() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            wait_for_view(&h.browser, is_ready).await;

            h.browser.input(FormField::Name).set("Alice");
            h.browser.input(FormField::Age).set("30");
            h.browser.input(FormField::Date).set("2024-01-01");

            let received = RefCell::new(Vec::new());
            let handler = |form: &FormSubmission| received.borrow_mut().push(form.clone());
            let submitted = h.browser.submit(&handler);

            let expected = FormSubmission {
                name: "Alice".into(),
                age: "30".into(),
                date: "2024-01-01".into(),
            };
            assert_eq!(submitted, expected);
            assert_eq!(*received.borrow(), vec![expected]);

            let view = wait_for_view(&h.browser, |view| {
                view.screen()
                    .is_some_and(|screen| screen.form.iter().all(|field| !field.value.is_empty()))
            })
            .await;
            let values: Vec<&str> = view
                .screen()
                .expect("screen")
                .form
                .iter()
                .map(|field| field.value.as_str())
                .collect();
            assert_eq!(values, vec!["Alice", "30", "2024-01-01"]);
        })
        .await;
}

#[tokio::test]
async fn mount_is_once_only() {
    LocalSet::new()
        .run_until(async {
            let h = harness(Rc::new(StaticSource::new(two_repos())));
            h.browser.mount().expect("mount");
            assert_eq!(h.browser.mount(), Err(BinderError::AlreadyMounted));

            h.browser.teardown();
            assert_eq!(h.browser.mount(), Err(BinderError::TornDown));
        })
        .await;
}
