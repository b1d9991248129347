use anyhow::Result;
use brochure_common::ModelTag;
use brochure_common::observability::{LogConfig, init_logging};
use brochure_config::BrochureConfigLoader;
use brochure_pipeline::BrochureGenerator;
use clap::Parser;
use futures::StreamExt;
use std::io::Write;

mod args;
use args::Args;

/// Characters of the API key echoed at startup.
const KEY_PREFIX_CHARS: usize = 8;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1) Load config (env wins over file)
    let loader = match &args.config {
        Some(path) => BrochureConfigLoader::new().with_file(path),
        None => BrochureConfigLoader::new().with_default_location(),
    };
    let mut config = loader.load()?;
    args.apply(&mut config);

    let log_path = init_logging(LogConfig {
        emit_stderr: args.verbose,
        default_filter: if args.verbose { "debug" } else { "info" },
        ..LogConfig::default()
    })?;
    tracing::info!(log_path=%log_path.display(), company=%args.company, url=%args.url, "brochure.start");

    // 2) Unknown tags and missing credentials stop here, before any request
    let tag: ModelTag = args.model.parse()?;
    let llm_config = match config.providers.llm_config_for(tag) {
        Ok(llm_config) => llm_config,
        Err(e) => {
            tracing::error!(%tag, error=%e, "brochure.credentials_missing");
            eprintln!("{e}");
            eprintln!(
                "No API key was found for {tag} - set {} or providers.{}.api_key in the config file.",
                tag.credential_env().unwrap_or("the provider's API key variable"),
                tag.provider_key()
            );
            std::process::exit(1);
        }
    };
    if let Some(key) = llm_config.api_key() {
        let prefix: String = key.chars().take(KEY_PREFIX_CHARS).collect();
        println!("{tag} API Key exists and begins {prefix}");
    }

    // 3) Generate
    let generator = BrochureGenerator::for_model(&config, &args.model).await?;
    if args.stream {
        stream_to_stdout(&generator, &args.company, &args.url).await?;
    } else {
        let brochure = generator.generate(&args.company, &args.url).await?;
        println!("{}", brochure.markdown);
        tracing::info!(model=%brochure.model, sources=?brochure.sources, "brochure.done");
    }
    Ok(())
}

/// Print fragments as they arrive. Ctrl-C drops the stream, which closes the
/// provider connection.
async fn stream_to_stdout(generator: &BrochureGenerator, company: &str, url: &str) -> Result<()> {
    let mut stream = generator.stream(company, url).await?;
    let mut stdout = std::io::stdout();

    loop {
        let fragment = tokio::select! {
            next = stream.next() => next,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("brochure.stream.interrupted");
                break;
            }
        };
        let Some(fragment) = fragment else { break };
        stdout.write_all(fragment?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
