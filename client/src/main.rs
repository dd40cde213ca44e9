use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::error;

use chat_client::render::TerminalRenderer;
use chat_client::{ClientConfig, ClientError, HttpTransport, SessionController};

/// Terminal front end: one line in, one streamed answer out.
/// `/reset` starts a new conversation, `/quit` exits, Ctrl-C cancels the
/// answer in progress.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_client=info".into()),
        )
        .init();

    let config = ClientConfig::from_env();
    let transport = Arc::new(HttpTransport::new(config.endpoint.clone()));
    let mut controller = SessionController::new(transport, &config);
    let mut updates = controller.subscribe();
    let controller = Arc::new(controller);

    let renderer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        let mut terminal = TerminalRenderer::new();
        while let Some(update) = updates.recv().await {
            if let Some(text) = terminal.render(update) {
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        match text {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                if let Err(e) = controller.reset() {
                    error!("{e}");
                }
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        match controller.submit(text, &cancel).await {
            Ok(_) => {}
            Err(ClientError::Busy) => error!("Still answering the previous message"),
            Err(e) => error!("{e}"),
        }
        interrupt.abort();
    }

    drop(controller);
    let _ = renderer.await;
    Ok(())
}
