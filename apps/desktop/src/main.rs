mod config;

use std::{path::PathBuf, rc::Rc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    BrowserDeps, DocumentHost, FormField, HttpRecordSource, LoggingSubmitHandler,
    PositionWatcher, RecordSource, RepositoryBrowser, SimulatedPositionWatcher,
    TracingDocumentHost, View,
};
use shared::domain::Coordinates;
use tokio::{sync::watch, task::LocalSet};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(about = "Browse a user's repositories and print every rendered frame as JSON")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    load_timeout_ms: Option<u64>,
    /// Seconds to run before tearing down; `0` waits for Ctrl-C.
    #[arg(long)]
    run_for_secs: Option<u64>,
    /// Favorite the first repository once the list has loaded.
    #[arg(long)]
    favorite_first: bool,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    date: Option<String>,
}

impl Args {
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(user) = &self.user {
            settings.github_user = user.clone();
        }
        if let Some(timeout) = self.load_timeout_ms {
            settings.load_timeout_ms = timeout;
        }
        if let Some(secs) = self.run_for_secs {
            settings.run_for_secs = secs;
        }
        settings
    }

    fn form_values(&self) -> [(FormField, Option<&str>); 3] {
        [
            (FormField::Name, self.name.as_deref()),
            (FormField::Age, self.age.as_deref()),
            (FormField::Date, self.date.as_deref()),
        ]
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = args.apply(load_settings(&args.config)?);
    info!(user = %settings.github_user, base_url = %settings.base_url, "starting repository browser");

    LocalSet::new().run_until(run(args, settings)).await
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let source = HttpRecordSource::for_user(&settings.base_url, &settings.github_user)
        .context("failed to build record source")?;
    let watcher = SimulatedPositionWatcher::new(
        settings.sensor_interval(),
        Coordinates::new(settings.origin_latitude, settings.origin_longitude),
    );

    let browser = RepositoryBrowser::new(
        BrowserDeps {
            records: Rc::new(source) as Rc<dyn RecordSource>,
            watcher: Rc::new(watcher) as Rc<dyn PositionWatcher>,
            document: Rc::new(TracingDocumentHost) as Rc<dyn DocumentHost>,
        },
        settings.browser(),
    );

    let printer = tokio::task::spawn_local(print_frames(browser.binder().frames()));
    browser.mount()?;

    let mut typed = false;
    for (field, value) in args.form_values() {
        if let Some(value) = value {
            browser.input(field).set(value);
            typed = true;
        }
    }
    if typed {
        browser.submit(&LoggingSubmitHandler);
    }

    let session = async {
        if args.favorite_first {
            favorite_first(&browser).await;
        }
        match settings.run_for() {
            Some(run_for) => tokio::time::sleep(run_for).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = session => info!("run time elapsed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("interrupted");
        }
    }

    browser.teardown();
    printer.abort();
    Ok(())
}

async fn favorite_first(browser: &RepositoryBrowser) {
    let mut frames = browser.binder().frames();
    let ready = frames
        .wait_for(|view| view.as_deref().and_then(View::screen).is_some())
        .await
        .is_ok();
    if !ready {
        return;
    }

    let first = browser
        .records()
        .with(|records| records.iter().next().map(|record| record.id));
    match first {
        Some(id) => {
            browser.toggle_favorite(id);
        }
        None => warn!("no repository to favorite"),
    }
}

async fn print_frames(mut frames: watch::Receiver<Option<Rc<View>>>) {
    while frames.changed().await.is_ok() {
        let Some(view) = frames.borrow_and_update().clone() else {
            continue;
        };
        match serde_json::to_string(view.as_ref()) {
            Ok(json) => println!("{json}"),
            Err(err) => warn!(error = %err, "failed to encode frame"),
        }
    }
}
