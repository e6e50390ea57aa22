//! `memoryd model download`: fetch the ONNX model and tokenizer.

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use memoryd::config::EmbeddingConfig;
use memoryd::embedding::local::{model_files, MODEL_FILE, TOKENIZER_FILE};

const MODEL_BASE_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Remote path under [`MODEL_BASE_URL`] for each cached file.
fn remote_path(file: &str) -> String {
    match file {
        MODEL_FILE => format!("{MODEL_BASE_URL}/onnx/{MODEL_FILE}"),
        other => format!("{MODEL_BASE_URL}/{other}"),
    }
}

pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let (model_path, tokenizer_path) = model_files(config);

    for (file, dest) in [(MODEL_FILE, &model_path), (TOKENIZER_FILE, &tokenizer_path)] {
        if dest.exists() {
            println!("{file} already present at {}", dest.display());
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache dir {}", parent.display()))?;
        }
        println!("Downloading {file}...");
        download_file(&remote_path(file), dest).await?;
        println!("Saved {}", dest.display());
    }

    println!("Model ready. Start the daemon with `memoryd start &`.");
    Ok(())
}

fn progress_bar(len: Option<u64>) -> ProgressBar {
    let Some(len) = len else {
        return ProgressBar::new_spinner();
    };
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

/// Stream `url` to `dest` through a `.tmp` sibling, renamed into place on success.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;
    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = progress_bar(response.content_length());
    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk).await.context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .with_context(|| format!("failed to move download into {}", dest.display()))?;
    pb.finish_and_clear();
    Ok(())
}
