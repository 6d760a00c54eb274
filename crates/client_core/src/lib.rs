//! Repository browser built on the `reactive` binder: loads a remote record
//! list, tracks favorites, binds form inputs and follows a position feed.

pub mod browser;
pub mod form;
pub mod host;
pub mod input;
pub mod sensor;
pub mod source;
pub mod view;

pub use browser::{BrowserDeps, BrowserSettings, FormField, RepositoryBrowser};
pub use form::{FormSubmission, LoggingSubmitHandler, SubmitHandler};
pub use host::{DocumentHost, TracingDocumentHost};
pub use input::{InputBinding, InputKind};
pub use sensor::{PositionWatcher, SimulatedPositionWatcher, WatchId};
pub use source::{HttpRecordSource, RecordSource, SourceError};
pub use view::View;
