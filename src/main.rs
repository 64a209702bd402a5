use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use hushwall::conductors::Conductor;
use hushwall::config::{Config, HostedValues, SurfaceKind};
use hushwall::constructors::{self, Backend};
use hushwall::presenters::impls::terminal::TerminalPresenter;
use hushwall::surfaces::{AdminConsole, UserApp};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

async fn async_main(config: Config) {
    let backend = match backend(&config) {
        Ok(b) => b,
        Err(e) => return tracing::error!("cannot build backend: {}", e),
    };

    let (out, mut printed) = mpsc::channel::<String>(64);
    let printer = tokio::spawn(async move {
        while let Some(line) = printed.recv().await {
            println!("{}", line);
        }
    });
    let pres = Arc::new(TerminalPresenter { out: out.clone() });
    let input = BufReader::new(tokio::io::stdin());

    let res = match config.surface {
        SurfaceKind::User => {
            let app = Arc::new(UserApp::assemble(&backend, pres));
            let session = tokio::spawn({
                let app = app.clone();
                async move { app.run().await }
            });

            let res = Conductor { surface: app, out }.run(input).await;
            session.abort();
            res
        },
        SurfaceKind::Admin => {
            let console = Arc::new(AdminConsole::assemble(&backend, pres));
            let session = tokio::spawn({
                let console = console.clone();
                async move { console.run().await }
            });

            let res = Conductor {
                surface: console,
                out,
            }
            .run(input)
            .await;
            session.abort();
            res
        },
    };

    if let Err(e) = res {
        tracing::error!("command loop stopped: {}", e);
    }

    printer.abort();
}

fn backend(config: &Config) -> anyhow::Result<Backend> {
    if config.in_memory {
        tracing::info!("using in-memory backend");
        return Ok(constructors::in_memory());
    }

    let HostedValues {
        firebase_api_key,
        supabase_url,
        supabase_anon_key,
    } = config.hosted_values()?;

    constructors::hosted(firebase_api_key, supabase_url, supabase_anon_key)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hushwall=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name_fn(|| {
            let num = NUM.fetch_add(1, Ordering::SeqCst);
            format!("hushwall-worker-{}", num)
        })
        .build()
    {
        Ok(r) => r,
        Err(e) => return eprintln!("{}", e),
    };

    rt.block_on(async_main(config));
    // stdin reads stay blocked on a worker until shutdown
    rt.shutdown_background();
}

static NUM: AtomicUsize = AtomicUsize::new(0);
