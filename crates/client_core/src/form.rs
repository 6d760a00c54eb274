use serde::Serialize;
use tracing::info;

/// The three form values exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSubmission {
    pub name: String,
    pub age: String,
    pub date: String,
}

pub trait SubmitHandler {
    fn submit(&self, form: &FormSubmission);
}

impl<F> SubmitHandler for F
where
    F: Fn(&FormSubmission),
{
    fn submit(&self, form: &FormSubmission) {
        self(form)
    }
}

/// Writes the submitted values to the log.
pub struct LoggingSubmitHandler;

impl SubmitHandler for LoggingSubmitHandler {
    fn submit(&self, form: &FormSubmission) {
        info!(name = %form.name, age = %form.age, date = %form.date, "form submitted");
    }
}
