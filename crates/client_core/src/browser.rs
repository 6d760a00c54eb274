//! The repository browser: cells, effects and external sources wired into a
//! single binder.

use std::{cell::RefCell, rc::Rc, time::Duration};

use reactive::{Binder, BinderError, Derived, Setter, StateCell, Subscription};
use shared::{
    domain::{LoadState, PositionState, RecordId},
    error::LoadError,
    records::RecordList,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    form::{FormSubmission, SubmitHandler},
    host::{favorites_title, DocumentHost},
    input::{InputBinding, InputKind},
    sensor::{PositionEvent, PositionWatcher},
    source::RecordSource,
    view::{render_view, FieldView, View},
};

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Ceiling after which an unsettled load is reported as failed. `None`
    /// waits for the source indefinitely.
    pub load_timeout: Option<Duration>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            load_timeout: Some(DEFAULT_LOAD_TIMEOUT),
        }
    }
}

/// External collaborators the browser depends on.
pub struct BrowserDeps {
    pub records: Rc<dyn RecordSource>,
    pub watcher: Rc<dyn PositionWatcher>,
    pub document: Rc<dyn DocumentHost>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Age,
    Date,
}

pub struct RepositoryBrowser {
    binder: Binder<View>,
    deps: BrowserDeps,
    settings: BrowserSettings,
    records: StateCell<RecordList>,
    set_records: Setter<RecordList>,
    load_state: StateCell<LoadState>,
    set_load_state: Setter<LoadState>,
    position: StateCell<PositionState>,
    set_position: Setter<PositionState>,
    name: InputBinding,
    age: InputBinding,
    date: InputBinding,
    favorite_count: Derived<usize>,
    _title: Subscription,
    tasks: RefCell<Vec<JoinHandle<()>>>,
}

impl RepositoryBrowser {
    pub fn new(deps: BrowserDeps, settings: BrowserSettings) -> Self {
        let binder = Binder::new();
        let (records, set_records) = binder.create_cell("records", RecordList::default());
        let (load_state, set_load_state) = binder.create_cell("load_state", LoadState::Idle);
        let (position, set_position) = binder.create_cell("position", PositionState::Pending);
        let name = InputBinding::new(&binder, "name", InputKind::Text);
        let age = InputBinding::new(&binder, "age", InputKind::Number);
        let date = InputBinding::new(&binder, "date", InputKind::Date);

        let favorite_count = {
            let records = records.clone();
            binder.derive([records.dependency()], move || {
                records.with(RecordList::favorite_count)
            })
        };

        let title = {
            let count = favorite_count.clone();
            let document = Rc::clone(&deps.document);
            binder.subscribe(favorite_count.dependencies(), move || {
                document.set_title(&favorites_title(count.get()));
            })
        };

        {
            let records = records.clone();
            let load_state = load_state.clone();
            let position = position.clone();
            let fields = [name.clone(), age.clone(), date.clone()];
            binder.set_renderer(move || {
                let form = fields
                    .iter()
                    .map(|field| FieldView {
                        name: field.name().to_string(),
                        kind: field.kind(),
                        value: field.value(),
                    })
                    .collect();
                records.with(|records| {
                    load_state.with(|load| {
                        position.with(|position| render_view(records, load, position, form))
                    })
                })
            });
        }

        Self {
            binder,
            deps,
            settings,
            records,
            set_records,
            load_state,
            set_load_state,
            position,
            set_position,
            name,
            age,
            date,
            favorite_count,
            _title: title,
            tasks: RefCell::new(Vec::new()),
        }
    }

    /// Starts the record load and the position watch, then renders the first
    /// view. Must be called from within a `tokio::task::LocalSet`.
    pub fn mount(&self) -> Result<(), BinderError> {
        if self.binder.is_torn_down() {
            return Err(BinderError::TornDown);
        }
        if self.binder.is_mounted() {
            return Err(BinderError::AlreadyMounted);
        }

        self.start_load();
        self.start_watch();
        let settle_loop = self.binder.spawn_settle_loop();
        self.tasks.borrow_mut().push(settle_loop);

        self.binder.mount()?;
        info!("repository browser mounted");
        Ok(())
    }

    fn start_load(&self) {
        let source = Rc::clone(&self.deps.records);
        let set_records = self.set_records.clone();
        let set_load_state = self.set_load_state.clone();
        let cancel = self.binder.cancellation();
        let limit = self.settings.load_timeout;

        self.set_load_state.set(LoadState::Loading);
        let task = tokio::task::spawn_local(async move {
            let fetch = async {
                match limit {
                    Some(limit) => tokio::time::timeout(limit, source.fetch_records())
                        .await
                        .unwrap_or(Err(LoadError::TimedOut {
                            timeout_ms: limit.as_millis() as u64,
                        })),
                    None => source.fetch_records().await,
                }
            };

            let Some(outcome) = cancel.run_until_cancelled(fetch).await else {
                debug!("record load cancelled by teardown");
                return;
            };

            match outcome {
                Ok(records) => {
                    let list = RecordList::from_records(records);
                    info!(count = list.len(), "records loaded");
                    set_records.set(list);
                    set_load_state.set(LoadState::Loaded);
                }
                Err(err) => {
                    warn!(error = %err, "record load failed");
                    set_load_state.set(LoadState::Failed(err));
                }
            }
        });
        self.tasks.borrow_mut().push(task);
    }

    fn start_watch(&self) {
        let set_position = self.set_position.clone();
        let callback = Box::new(move |event: PositionEvent| {
            let next = match event {
                Ok(reading) => PositionState::Fixed(reading.coords),
                Err(err) => {
                    warn!(error = %err, "position unavailable");
                    PositionState::Unavailable(err)
                }
            };
            set_position.set(next);
        });

        match self.deps.watcher.watch(callback) {
            Ok(id) => {
                let watcher = Rc::clone(&self.deps.watcher);
                self.binder.on_teardown(move || watcher.clear_watch(id));
            }
            Err(err) => {
                warn!(error = %err, "position watch refused");
                self.set_position.set(PositionState::Unavailable(err));
            }
        }
    }

    /// Releases the position watch, cancels an in-flight load and stops the
    /// settle loop. Safe to call more than once.
    pub fn teardown(&self) -> bool {
        let released = self.binder.teardown();
        for task in self.tasks.borrow_mut().drain(..) {
            task.abort();
        }
        if released {
            info!("repository browser torn down");
        }
        released
    }

    /// Flips the favorite flag of one record. Unknown ids are ignored.
    pub fn toggle_favorite(&self, id: RecordId) -> bool {
        let changed = self.set_records.update(|records| records.toggle_favorite(id));
        if !changed {
            debug!(record = %id, "toggle ignored");
        }
        changed
    }

    pub fn input(&self, field: FormField) -> &InputBinding {
        match field {
            FormField::Name => &self.name,
            FormField::Age => &self.age,
            FormField::Date => &self.date,
        }
    }

    pub fn form_submission(&self) -> FormSubmission {
        FormSubmission {
            name: self.name.value(),
            age: self.age.value(),
            date: self.date.value(),
        }
    }

    pub fn submit(&self, handler: &dyn SubmitHandler) -> FormSubmission {
        let form = self.form_submission();
        handler.submit(&form);
        form
    }

    pub fn binder(&self) -> &Binder<View> {
        &self.binder
    }

    pub fn records(&self) -> &StateCell<RecordList> {
        &self.records
    }

    pub fn load_state(&self) -> &StateCell<LoadState> {
        &self.load_state
    }

    pub fn position(&self) -> &StateCell<PositionState> {
        &self.position
    }

    pub fn favorite_count(&self) -> usize {
        self.favorite_count.get()
    }

    pub fn current_view(&self) -> Option<Rc<View>> {
        self.binder.current_view()
    }
}

impl Drop for RepositoryBrowser {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "tests/browser_tests.rs"]
mod tests;
