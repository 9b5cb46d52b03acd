use std::fs;
use std::path::PathBuf;

use clap::Parser;

use mailfamiliar_core::predictor::{Engine, Mailbox, Predictor, PredictorKind};
use mailfamiliar_core::EngineConfig;

#[derive(Parser, Debug)]
#[command(
    name = "score-headers",
    about = "Score a header block against a set of learned mailboxes"
)]
struct Args {
    /// JSON array of mailboxes: `[{"qualifiedName": .., "messages": [{"headers": .., "date": ..}]}]`.
    #[arg(long)]
    corpus: PathBuf,

    /// File holding the candidate header block.
    #[arg(long)]
    headers: PathBuf,

    /// Predictor to use; defaults to MAILFAMILIAR_PREDICTOR.
    #[arg(long)]
    predictor: Option<PredictorKind>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let mut config = EngineConfig::from_env();
    if let Some(kind) = args.predictor {
        config.predictor = kind;
    }

    let mailboxes: Vec<Mailbox> = serde_json::from_str(&fs::read_to_string(&args.corpus)?)?;
    let candidate = fs::read_to_string(&args.headers)?;

    let mut engine = Engine::from_config(&config);
    for mailbox in &mailboxes {
        engine.consider_box(mailbox)?;
    }

    log::info!(
        "scoring with {} over {} mailboxes",
        engine.name(),
        mailboxes.len()
    );

    let scores = engine.folder_score(&candidate);
    println!("{}", serde_json::to_string_pretty(&scores)?);

    if let Some(best) = engine.folder_for(&candidate) {
        log::info!("best match: {best}");
    }

    Ok(())
}
