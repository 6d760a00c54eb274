use tracing::info;

/// Document-level side effects the browser performs outside its view tree.
pub trait DocumentHost {
    fn set_title(&self, title: &str);
}

pub fn favorites_title(count: usize) -> String {
    format!("You have {count} favorites")
}

pub struct TracingDocumentHost;

impl DocumentHost for TracingDocumentHost {
    fn set_title(&self, title: &str) {
        info!(%title, "document title");
    }
}
