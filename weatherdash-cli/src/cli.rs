use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Select, Text};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weatherdash_core::{
    AddCallbacks, AddOutcome, AutocompleteController, CityId, Config, Dashboard, Notice,
    autocomplete::SearchPhase,
    notice::ChannelNotifier,
    persist::{self, FileStorage, KeyValueStorage},
    store::now_ms,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weatherdash",
    version,
    about = "Watch the weather in your favourite cities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key (and optionally a custom endpoint).
    Configure,

    /// Look up cities matching a name.
    Search {
        query: String,
    },

    /// Search for a city and add it to the watchlist.
    Add {
        /// Prompted for when absent.
        query: Option<String>,
    },

    /// Show the watchlist, refreshing stale cities first.
    List,

    /// Fetch fresh weather for one city.
    Refresh {
        /// City id (e.g. `london-gb`) or name.
        city: String,
    },

    /// Remove a city from the watchlist.
    Remove {
        city: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Current weather and the 24 hour temperature trend for one city.
    Show {
        city: String,

        /// Fetch a new forecast instead of using a recent one.
        #[arg(long)]
        refresh: bool,
    },

    /// Keep the watchlist fresh in the foreground until Ctrl-C.
    Watch {
        /// Seconds between sweeps; defaults to the configured value.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Search { query } => {
                let session = Session::open(&config)?;
                search(&session, &query).await
            }
            Command::Add { query } => {
                let mut session = Session::open(&config)?;
                add(&mut session, query).await
            }
            Command::List => {
                let mut session = Session::open(&config)?;
                let report = session.dashboard.engine().sweep().await;
                if !report.failed.is_empty() {
                    eprintln!(
                        "Could not refresh {} cities; showing last known data.",
                        report.failed.len()
                    );
                }
                session.save()?;
                output::cards(&session.dashboard.cards(now_ms()));
                Ok(())
            }
            Command::Refresh { city } => {
                let mut session = Session::open(&config)?;
                let id = session.resolve(&city)?;
                let result = session.dashboard.refresh_city(&id).await;
                session.print_notices();
                let city = result?;
                session.save()?;
                output::city(&city);
                Ok(())
            }
            Command::Remove { city, yes } => {
                let mut session = Session::open(&config)?;
                let id = session.resolve(&city)?;
                if !yes {
                    let name = session
                        .dashboard
                        .store()
                        .get(&id)
                        .map(|c| c.name)
                        .unwrap_or_default();
                    let confirmed = Confirm::new(&format!("Remove {name} from your cities list?"))
                        .with_default(false)
                        .prompt()?;
                    if !confirmed {
                        return Ok(());
                    }
                }
                session.dashboard.remove_city(&id)?;
                session.print_notices();
                session.save()
            }
            Command::Show { city, refresh } => {
                let mut session = Session::open(&config)?;
                let id = session.resolve(&city)?;
                let details = if refresh {
                    let result = session.dashboard.refresh_forecast(&id, Local::now()).await;
                    session.print_notices();
                    result?
                } else {
                    session.dashboard.city_details(&id, Local::now()).await?
                };
                output::details(&details);
                Ok(())
            }
            Command::Watch { interval } => {
                let interval = interval
                    .map(Duration::from_secs)
                    .unwrap_or(config.sweep_interval());
                let session = Session::open(&config)?;
                watch(session, interval, config.persist_debounce()).await
            }
        }
    }
}

/// Everything a command needs: the dashboard over the rehydrated watchlist,
/// the storage it is saved back to, and the notices it emits.
struct Session {
    dashboard: Dashboard,
    storage: Arc<dyn KeyValueStorage>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl Session {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(Config::data_dir()?));
        let initial = persist::rehydrate(storage.as_ref());
        let (notifier, notices) = ChannelNotifier::channel();
        let dashboard = Dashboard::from_config(config, initial, Arc::new(notifier))?;

        Ok(Self {
            dashboard,
            storage,
            notices,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        persist::flush(self.storage.as_ref(), &self.dashboard.store().snapshot())
            .context("Failed to save the watchlist")
    }

    fn print_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            output::notice(&notice);
        }
    }

    /// Accept either a city id or an unambiguous city name.
    fn resolve(&self, arg: &str) -> anyhow::Result<CityId> {
        let id = CityId::from(arg.trim());
        let watchlist = self.dashboard.store().snapshot();
        if watchlist.contains(&id) {
            return Ok(id);
        }

        let matches: Vec<_> = watchlist
            .cities()
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case(arg.trim()))
            .collect();
        match matches.as_slice() {
            [city] => Ok(city.id.clone()),
            [] => Err(anyhow!(
                "{arg} is not in your watchlist. Run `weatherdash list` to see ids."
            )),
            _ => Err(anyhow!("{arg} matches several cities; use the id instead.")),
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()?;
    if key.trim().is_empty() {
        bail!("API key must not be empty");
    }
    config.set_api_key(key.trim().to_string());

    config.base_url = Text::new("API base URL:")
        .with_default(&config.base_url)
        .prompt()?;

    config.save()?;
    let path = Config::config_file_path()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn search(session: &Session, query: &str) -> anyhow::Result<()> {
    let items = session
        .dashboard
        .geocoder()
        .suggest(query, &CancellationToken::new())
        .await
        .unwrap_or_default();
    if items.is_empty() {
        println!("No cities found");
    } else {
        output::suggestions(&items);
    }
    Ok(())
}

/// Run one debounced search through the controller and wait for it to settle.
async fn settle(controller: &AutocompleteController, query: &str) {
    let mut states = controller.subscribe();
    controller.input_changed(query);

    loop {
        let phase = states.borrow_and_update().phase;
        if !matches!(phase, SearchPhase::Debouncing | SearchPhase::Searching) {
            return;
        }
        if states.changed().await.is_err() {
            return;
        }
    }
}

async fn add(session: &mut Session, query: Option<String>) -> anyhow::Result<()> {
    let (picked_tx, mut picked_rx) = mpsc::unbounded_channel();
    let controller = session.dashboard.autocomplete(move |suggestion| {
        let _ = picked_tx.send(suggestion);
    });

    let query = match query {
        Some(q) => q,
        None => Text::new("City:").prompt()?,
    };
    settle(&controller, &query).await;

    let state = controller.state();
    if let Some(err) = state.error {
        println!("{err}");
        return Ok(());
    }
    if state.suggestions.is_empty() {
        bail!("Type at least two characters to search");
    }

    let labels: Vec<String> = state
        .suggestions
        .iter()
        .map(|s| s.display_name.clone())
        .collect();
    let picked = Select::new("Which one?", labels).raw_prompt()?;
    let suggestion = state
        .suggestions
        .get(picked.index)
        .cloned()
        .context("Selected city disappeared")?;
    controller.select(suggestion);

    let Some(suggestion) = picked_rx.recv().await else {
        return Ok(());
    };
    let outcome = session
        .dashboard
        .add_city(&suggestion, AddCallbacks::new())
        .await;
    session.print_notices();

    match outcome {
        AddOutcome::Added(city) => {
            session.save()?;
            output::city(&city);
            Ok(())
        }
        AddOutcome::Duplicate(_) | AddOutcome::AlreadyPending => Ok(()),
        AddOutcome::FetchFailed(e) => Err(anyhow!(e.user_message())),
    }
}

async fn watch(
    mut session: Session,
    interval: Duration,
    persist_debounce: Duration,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let store = session.dashboard.store().clone();

    let persistor = persist::spawn_persistor(
        store.clone(),
        Arc::clone(&session.storage),
        persist_debounce,
        cancel.clone(),
    );
    let engine = session.dashboard.engine().clone();
    let engine = tokio::spawn(engine.run(interval, cancel.clone()));

    println!(
        "Watching {} cities every {}s. Press Ctrl-C to stop.",
        store.snapshot().len(),
        interval.as_secs()
    );
    output::cards(&session.dashboard.cards(now_ms()));

    let mut changes = store.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let _ = changes.borrow_and_update();
                println!();
                output::cards(&session.dashboard.cards(now_ms()));
                session.print_notices();
            }
        }
    }

    tracing::info!("stopping watch, flushing the watchlist");
    cancel.cancel();
    engine.await.context("staleness engine panicked")?;
    persistor.await.context("persistor panicked")?;
    Ok(())
}
