//! `store` and `retrieve`.

use anyhow::Result;

use memoryd::client::{self, Route};
use memoryd::config::MemorydConfig;
use memoryd::protocol::{Request, Response};

/// Print what the user should see; an `error` response becomes a non-zero exit.
pub(crate) fn print_response(response: &Response) -> Result<()> {
    anyhow::ensure!(response.is_ok(), "{}", response.display_text());
    let text = response.display_text();
    if !text.is_empty() {
        println!("{text}");
    }
    Ok(())
}

async fn run(config: &MemorydConfig, request: Request) -> Result<()> {
    let (route, response) = client::call(config, request).await?;
    if route == Route::Fallback {
        tracing::info!("answered in-process; `memoryd start &` keeps the model loaded between calls");
    }
    print_response(&response)
}

pub async fn store(config: &MemorydConfig, words: &[String]) -> Result<()> {
    run(config, Request::Store { text: words.join(" ") }).await
}

pub async fn retrieve(config: &MemorydConfig, words: &[String], top_k: Option<usize>) -> Result<()> {
    run(config, Request::Retrieve { text: words.join(" "), top_k }).await
}
