use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use docpress::artifact::MemoryArtifactStore;
use docpress::render::flow::FlowEngine;
use docpress::save::DirectorySink;
use docpress::{ExportPipeline, JobState, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "docpress", version, about = "Render a styled document to a paginated PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render at export fidelity and save `<name>_CV.pdf`
    Export {
        #[command(flatten)]
        input: Input,
        /// Display name of the document subject, used for the file name
        #[arg(long)]
        name: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Run one preview cycle and report the artifact
    Preview {
        #[command(flatten)]
        input: Input,
        /// Also write the preview PDF to this path
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct Input {
    /// Markup of the document body
    #[arg(long)]
    markup: PathBuf,
    /// Stylesheet applied to the markup
    #[arg(long)]
    stylesheet: Option<PathBuf>,
    /// JSON pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Input {
    fn load(&self) -> anyhow::Result<(PipelineConfig, String, String)> {
        let config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        let markup = std::fs::read_to_string(&self.markup)
            .with_context(|| format!("reading markup {}", self.markup.display()))?;
        let stylesheet = match &self.stylesheet {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading stylesheet {}", path.display()))?,
            None => String::new(),
        };
        Ok((config, markup, stylesheet))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("docpress=info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Export { input, name, out } => {
            let (config, markup, stylesheet) = input.load()?;
            let pipeline = ExportPipeline::new(
                config,
                Arc::new(FlowEngine::new()),
                Arc::new(MemoryArtifactStore::new()),
                Arc::new(DirectorySink::new(&out)),
            );
            pipeline.update_content(&markup, &stylesheet);
            let outcome = pipeline.export(&name).await.context("export failed")?;
            pipeline.teardown();
            let Some(outcome) = outcome else {
                bail!("nothing to export: no document is mounted");
            };
            println!(
                "{} ({} pages, {} bytes)",
                out.join(&outcome.file_name).display(),
                outcome.page_count,
                outcome.size
            );
        }
        Command::Preview { input, write } => {
            let (config, markup, stylesheet) = input.load()?;
            let store = Arc::new(MemoryArtifactStore::new());
            let pipeline = ExportPipeline::new(
                config,
                Arc::new(FlowEngine::new()),
                store.clone(),
                Arc::new(DirectorySink::new(".")),
            );
            pipeline.update_content(&markup, &stylesheet);
            let state = pipeline.regenerate_now().await;
            if state != JobState::Succeeded {
                bail!("preview did not complete ({:?})", state);
            }
            let url = pipeline.preview_url().context("preview was not published")?;
            println!("url: {}", url);
            println!("pages: {}", pipeline.page_count());
            println!("fingerprint: {}", pipeline.preview_fingerprint().unwrap_or_default());
            if let Some(path) = write {
                let bytes = store.fetch(&url).context("preview artifact already released")?;
                std::fs::write(&path, &bytes[..]).with_context(|| format!("writing {}", path.display()))?;
            }
            pipeline.teardown();
        }
    }
    Ok(())
}
