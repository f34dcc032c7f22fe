use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use poa_forms::app::App;
use poa_forms::catalog::Catalog;
use poa_forms::config::{AppConfig, CONFIG_FILE_NAME};
use poa_forms::form::TerminalCollector;
use poa_forms::print::{NoopPrinter, PrintDispatcher, SystemPrinter};
use poa_forms::qr::local_url;
use poa_forms::server::{FormService, serve_until};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "poa-forms",
    version,
    about = "Fill in visa and power-of-attorney forms and print them as PDF documents."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Document type catalog (JSON). Overrides the config file.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Directory for generated documents. Overrides the config file.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive menu (the default).
    Menu,
    /// List the document types in the catalog.
    List,
    /// Show the fields of one document type.
    Fields { document_type: String },
    /// Fill in a form on the terminal and print the resulting document.
    Fill {
        #[arg(short = 't', long)]
        document_type: Option<String>,
        /// Write the document without printing it.
        #[arg(long)]
        no_print: bool,
    },
    /// Serve the browser form until Ctrl-C.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Save and display a QR code for the form.
    Qr {
        /// Point at the local form server instead of the public URL.
        #[arg(long)]
        local: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    match dotenv::dotenv() {
        Ok(path) => info!("Loaded .env file from: {:?}", path),
        Err(_) => debug!("No .env file found. Relying on environment variables."),
    }

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config);
    config.apply_env();
    if let Some(path) = cli.catalog {
        config.catalog.path = path;
    }
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }

    let catalog = Catalog::load(&config.catalog.path).with_context(|| {
        format!(
            "Cannot start without a document catalog ({})",
            config.catalog.path.display()
        )
    })?;
    let catalog = Arc::new(catalog);

    match cli.command.unwrap_or(Command::Menu) {
        Command::Menu => {
            let mut app = App::new(config, catalog, Box::new(SystemPrinter::default()));
            let mut term = TerminalCollector::new(io::stdin().lock(), io::stdout());
            app.run_menu(&mut term)?;
        }
        Command::List => {
            for title in catalog.list_document_types() {
                println!("{}", title);
            }
        }
        Command::Fields { document_type } => {
            let fields = catalog
                .get_fields(&document_type)
                .with_context(|| format!("Unknown document type '{}'", document_type))?;
            for field in fields {
                println!(
                    "{:<24} {:<8} {}",
                    field.name,
                    field.kind.html_input_type(),
                    field.label
                );
            }
        }
        Command::Fill {
            document_type,
            no_print,
        } => {
            let printer: Box<dyn PrintDispatcher> = if no_print {
                config.output.print = false;
                Box::new(NoopPrinter)
            } else {
                Box::new(SystemPrinter::default())
            };
            let app = App::new(config, catalog, printer);
            let mut term = TerminalCollector::new(io::stdin().lock(), io::stdout());
            if app.fill_form(&mut term, document_type.as_deref())?.is_none() {
                println!("No document generated.");
            }
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);
            let service = FormService::new(catalog, config.letterhead, config.output.dir);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build the async runtime")?;
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                    .await
                    .with_context(|| format!("Cannot bind {}:{}", host, port))?;
                let addr = listener.local_addr()?;
                println!("Form available at {}", local_url(&host, addr.port()));
                serve_until(listener, service, async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Ctrl-C received, shutting down");
                })
                .await
                .context("Form server failed")
            })?;
        }
        Command::Qr { local } => {
            let url = if local {
                local_url(&config.server.host, config.server.port)
            } else {
                config.qr.public_url.clone()
            };
            let app = App::new(config, catalog, Box::new(NoopPrinter));
            let mut term = TerminalCollector::new(io::stdin().lock(), io::stdout());
            app.show_qr(&mut term, &url)?;
        }
    }

    Ok(())
}
