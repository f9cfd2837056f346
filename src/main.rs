use std::io::IsTerminal;

use anyhow::{ensure, Context, Result};
use clap::Parser;

use batch_caption::{
    model::{TEXT_DECODER_FILE, TOKENIZER_FILE, VISION_ENCODER_FILE},
    CaptionModel, CaptionOrchestrator, Config, FileDialogSelection, FormatLoader,
    PathListSelection, SelectionProvider, SidecarWriter, SystemClipboard,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    for file in [VISION_ENCODER_FILE, TEXT_DECODER_FILE, TOKENIZER_FILE] {
        let path = config.model_dir.join(file);
        ensure!(path.exists(), "Model file does not exist: {}", path.display());
    }

    log::info!("Setting up caption model from {}", config.model_dir.display());
    let model = CaptionModel::new(&config.model_dir, config.device_id, config.max_new_tokens)
        .context("Failed to load caption model")?;

    if config.paths.is_empty() {
        let loader = FormatLoader::with_default_formats(config.decode_limits());
        run_session(&config, model, FileDialogSelection::new(&loader))
    } else {
        let walk_loader = FormatLoader::with_default_formats(config.decode_limits());
        let selection = PathListSelection::new(config.paths.clone(), walk_loader);
        run_session(&config, model, selection)
    }
}

fn run_session<S: SelectionProvider>(config: &Config, model: CaptionModel, selection: S) -> Result<()> {
    let mut orchestrator = CaptionOrchestrator::new(
        model,
        selection,
        SystemClipboard::new(),
        FormatLoader::with_default_formats(config.decode_limits()),
        SidecarWriter::new(&config.caption_extension),
    )
    .with_progress(std::io::stderr().is_terminal());

    let summary = orchestrator.run()?;
    log::info!(
        "Captioned {} image(s) across {} batch(es)",
        summary.captions,
        summary.batches
    );
    Ok(())
}
