use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::apps_client::AppsClient;
use crate::bus::LocalBus;
use crate::catalog::CatalogClient;
use crate::config::{self, Config, ConfigError};
use crate::core_service::CoreService;
use crate::index_store::{IndexStore, StoreError};
use crate::logging;
use crate::provider_registry::{self, LocalModule, MediaModule, ProviderModule, StoredLists};
use crate::search_manager::SearchManager;
use crate::service_client::BusHandle;
use crate::settings_client::{LocaleSettings, SettingsClient};
use crate::transport;

const DEFAULT_CONFIG_FILE: &str = "unisearch.toml";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub show_help: bool,
}

pub fn usage() -> &'static str {
    "usage: unisearch-core [--config <path>] [--help]\n\
     Reads one JSON request per line on stdin: {\"method\": \"search\", \"payload\": {\"key\": \"...\"}}"
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, RuntimeError> {
    let mut options = RuntimeOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => options.show_help = true,
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| RuntimeError::Usage("--config needs a path".into()))?;
                options.config_path = Some(PathBuf::from(path));
            }
            other => {
                if let Some(path) = other.strip_prefix("--config=") {
                    options.config_path = Some(PathBuf::from(path));
                } else {
                    return Err(RuntimeError::Usage(format!("unknown argument '{other}'")));
                }
            }
        }
    }
    Ok(options)
}

pub struct Daemon {
    pub bus: Rc<LocalBus>,
    pub handle: Rc<BusHandle>,
    pub locale: Rc<LocaleSettings>,
    pub manager: Rc<SearchManager>,
    pub service: Rc<CoreService>,
    pub settings: Rc<SettingsClient>,
    pub apps: Rc<AppsClient>,
    pub catalog: Rc<CatalogClient>,
    service_name: String,
}

impl Daemon {
    pub fn build(config: &Config, store: IndexStore) -> Self {
        let bus = LocalBus::new();
        let handle = BusHandle::new();
        let locale = LocaleSettings::new(&config.default_language);
        let store = Rc::new(store);

        let manager = Rc::new(
            SearchManager::new(Rc::clone(&store), Rc::clone(&locale))
                .with_search_timeout(config.search_timeout()),
        );

        let stored = StoredLists::load(&config.stored_list_paths);
        stored.sync_items(&store);

        let catalog = CatalogClient::new(&config.media_catalog_service, Rc::clone(&handle));
        let modules: Vec<Box<dyn ProviderModule>> = vec![
            Box::new(LocalModule::new(Rc::clone(&store), stored)),
            Box::new(MediaModule::new(Rc::clone(&catalog))),
        ];
        let installed = provider_registry::install(&manager, &modules);
        tracing::info!(installed, "provider modules installed");

        let settings = SettingsClient::new(
            &config.settings_service,
            Rc::clone(&handle),
            Rc::clone(&locale),
        );
        let apps = AppsClient::new(
            &config.app_manager_service,
            Rc::clone(&handle),
            Rc::clone(&manager),
            &locale,
        );
        let service = Rc::new(CoreService::new(Rc::clone(&manager), config));

        Self {
            bus,
            handle,
            locale,
            manager,
            service,
            settings,
            apps,
            catalog,
            service_name: config.service_name.clone(),
        }
    }

    pub fn start(&self) {
        self.settings.initialize();
        self.apps.initialize();
        self.catalog.initialize();
        self.handle.attach(Rc::clone(&self.bus));
        transport::register_on_bus(&self.bus, &self.service_name, Rc::clone(&self.service));
        tracing::info!(service = %self.service_name, "daemon started");
    }

    pub fn stop(&self) {
        self.bus.unregister_service(&self.service_name);
        self.apps.finalize();
        self.settings.finalize();
        self.catalog.finalize();
        tracing::info!(
            service = %self.service_name,
            pending_searches = self.manager.pending_searches(),
            "daemon stopped"
        );
    }
}

pub fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    if options.show_help {
        println!("{}", usage());
        return Ok(());
    }

    let config_path = options
        .config_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = config::load(&config_path)?;
    let _logging = logging::init(&config.log_dir)?;
    tracing::info!(
        config_path = %config_path.display(),
        index_db_path = %config.index_db_path.display(),
        "starting"
    );

    let store = IndexStore::open(&config.index_db_path)?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async move {
        let daemon = Daemon::build(&config, store);
        daemon.start();
        let served = serve_stdin(&daemon.service).await;
        daemon.stop();
        served
    })
}

async fn serve_stdin(service: &CoreService) -> Result<(), RuntimeError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let mut reply = transport::handle_json(service, &line).await;
                reply.push('\n');
                stdout.write_all(reply.as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_cli_args, RuntimeError};
    use std::path::PathBuf;

    #[test]
    fn parses_config_flag_in_both_forms() {
        let args = vec!["--config".to_string(), "a.toml".to_string()];
        let options = parse_cli_args(&args).unwrap();
        assert_eq!(options.config_path, Some(PathBuf::from("a.toml")));

        let args = vec!["--config=b.json5".to_string()];
        let options = parse_cli_args(&args).unwrap();
        assert_eq!(options.config_path, Some(PathBuf::from("b.json5")));
    }

    #[test]
    fn rejects_unknown_and_incomplete_args() {
        assert!(matches!(
            parse_cli_args(&["--verbose".to_string()]),
            Err(RuntimeError::Usage(_))
        ));
        assert!(matches!(
            parse_cli_args(&["--config".to_string()]),
            Err(RuntimeError::Usage(_))
        ));
        assert!(parse_cli_args(&["--help".to_string()]).unwrap().show_help);
    }
}
