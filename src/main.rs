use anyhow::{Result, bail};
use clap::Parser;
use openai_variations::cli::{CliOptions, Command, CreateArgs};
use openai_variations::config::{ConfigStore, Settings, setup_logging};
use openai_variations::constants::{ABOUT, REFERENCES};
use openai_variations::variation::{ImageSize, VariationClient, VariationResult};
use openai_variations::worker::{JobStatus, VariationWorker};
use serde_json::json;
use tokio::sync::watch;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        eprintln!("Continuing without logging");
    }

    match &cli.command {
        Command::Create(args) => create(&cli, args).await,
        Command::About => {
            about(cli.json)?;
            Ok(())
        }
    }
}

async fn create(cli: &CliOptions, args: &CreateArgs) -> Result<()> {
    let store = ConfigStore::new(&cli.config);
    let stored = store.load_or_default();

    let settings = match args.api_key.as_deref() {
        Some(key) => Settings::with_api_key(key),
        None => stored,
    };
    let Some(api_key) = settings.api_key().map(str::to_string) else {
        bail!(
            "OpenAI API key empty, pass --api-key or set OPENAI_API_KEY (it is then kept in {})",
            store.path().display()
        );
    };
    store.save_or_warn(&settings);

    let mut builder = VariationClient::builder()
        .api_key(api_key)
        .output_dir(&cli.output_dir);
    if let Some(base_url) = &args.base_url {
        builder = builder.base_url(base_url);
    }
    let worker = VariationWorker::new(builder.build()?);

    let status = worker.subscribe();
    let reporter = tokio::spawn(report_progress(status, cli.json));

    let Some(job) = worker.submit(args.to_request()) else {
        bail!("A variation request is already running");
    };
    let outcome = job.await?;
    if let Err(err) = reporter.await {
        debug!("Status reporter ended early: {err}");
    }

    match outcome {
        Ok(result) => {
            report_result(&result, cli, args)?;
            Ok(())
        }
        Err(err) => {
            if cli.json {
                let summary = json!({
                    "success": false,
                    "error": err.to_string(),
                    "status": err.status(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            bail!("Got an error: {err}")
        }
    }
}

/// Prints the busy line, returns once the worker reaches a terminal state.
async fn report_progress(mut status: watch::Receiver<JobStatus>, quiet: bool) {
    loop {
        let current = status.borrow_and_update().clone();
        match current {
            JobStatus::Busy { source } if !quiet => {
                eprintln!("Working on {} ...", source.display());
            }
            other if other.is_terminal() => return,
            _ => {}
        }
        if status.changed().await.is_err() {
            return;
        }
    }
}

fn report_result(result: &VariationResult, cli: &CliOptions, args: &CreateArgs) -> Result<()> {
    if cli.json {
        let skipped = result
            .skipped
            .iter()
            .map(|skip| {
                json!({
                    "index": skip.index,
                    "url": skip.url,
                    "reason": skip.reason.to_string(),
                })
            })
            .collect::<Vec<_>>();
        let size = ImageSize::from(args.size);
        let summary = json!({
            "success": true,
            "source": args.image.display().to_string(),
            "size": size,
            "pixels": size.pixels(),
            "response_record": result.response_record_path.display().to_string(),
            "saved": result
                .saved_image_paths
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>(),
            "skipped": skipped,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "Done, {} of {} images saved to folder '{}'",
        result.saved_image_paths.len(),
        result.requested(),
        cli.output_dir.display()
    );
    println!("Response saved to {}", result.response_record_path.display());
    for skip in &result.skipped {
        eprintln!(
            "Skipped image {} ({}): {}",
            skip.index + 1,
            skip.url.as_deref().unwrap_or("no url"),
            skip.reason
        );
    }
    Ok(())
}

fn about(json_output: bool) -> Result<()> {
    if json_output {
        let info = json!({
            "about": ABOUT.iter().map(|(k, v)| (k.to_string(), json!(v))).collect::<serde_json::Map<_, _>>(),
            "references": REFERENCES.iter().map(|(k, v)| (k.to_string(), json!(v))).collect::<serde_json::Map<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Basic client for the OpenAI image variation API");
    for (key, value) in ABOUT {
        println!("{key}={value}");
    }
    println!("\nSome references\n");
    for (_, url) in REFERENCES {
        println!("{url}");
    }
    Ok(())
}
