//! Training modes driven from the command line.

use std::path::Path;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::{Config, ResponderConfig};
use crate::credentials::RedditCredentials;
use crate::harvest::{HarvestReport, Harvester, Shutdown, SourceError, TrainingSequence};
use crate::reddit::RedditClient;
use crate::store::{Corpus, StatementStore, StoreError, TrainingSink};

/// First prompt of an interactive session.
const GREETING: &str = "How can I help you?";

const FEEDBACK_GREETING: &str = "Type something to begin...\n";

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("failed to set up content source: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Harvest Reddit comment chains into the store.
pub async fn reddit(
    config: &Config,
    credentials: RedditCredentials,
    store: &mut StatementStore,
    shutdown: &mut Shutdown,
) -> Result<HarvestReport, TrainError> {
    let client = RedditClient::new(credentials, &config.reddit)?;
    let harvester = Harvester::new(client, config.harvest.clone());

    store.set_conversation(format!("reddit:{}", harvester.config().topic));
    Ok(harvester.run(store, shutdown).await)
}

/// Train every conversation in a corpus file.
pub fn corpus(store: &mut StatementStore, path: &Path) -> Result<usize, TrainError> {
    let corpus = Corpus::load(path)?;
    store.set_conversation("corpus");
    let count = store.import(&corpus)?;
    info!("📚 Trained {} conversations from {:?}", count, path);
    Ok(count)
}

/// Write everything the store has learned to a corpus file.
pub fn export(store: &StatementStore, path: &Path) -> Result<usize, TrainError> {
    let corpus = store.export()?;
    corpus.save(path)?;
    info!("Exported {} conversations to {:?}", corpus.conversations.len(), path);
    Ok(corpus.conversations.len())
}

/// Talk to the bot and teach it as you go.
///
/// Each line typed is learned as the answer to the prompt it was typed at, and
/// the bot's best stored reply becomes the next prompt. Ends on EOF or
/// shutdown. Returns the number of exchanges learned.
pub async fn manual<R, W>(
    store: &mut StatementStore,
    responder: &ResponderConfig,
    mut input: R,
    mut output: W,
    shutdown: &mut Shutdown,
) -> Result<usize, TrainError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    store.set_conversation("manual");
    let mut response = GREETING.to_string();
    let mut learned = 0;

    loop {
        output.write_all(format!("{response}: ").as_bytes()).await?;
        output.flush().await?;

        let Some(comment) = next_line(&mut input, shutdown).await? else {
            break;
        };
        if comment.is_empty() {
            continue;
        }

        let next = respond(store, responder, &comment)?;
        info!("Comment: {}", comment);
        info!("Response: {}", next);

        if let Some(training) = TrainingSequence::from_statements(vec![response, comment]) {
            info!("Training bot: {:?}", training.statements());
            store.train(&training)?;
            learned += 1;
        }
        response = next;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(learned)
}

/// Ask for approval of every reply and learn only the approved ones.
///
/// The bot answers each line with its best stored reply, then asks whether
/// that reply makes sense. "yes" learns the pair, "no" drops it, anything else
/// asks again. Ends on EOF or shutdown. Returns the number of pairs learned.
pub async fn feedback<R, W>(
    store: &mut StatementStore,
    responder: &ResponderConfig,
    mut input: R,
    mut output: W,
    shutdown: &mut Shutdown,
) -> Result<usize, TrainError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    store.set_conversation("feedback");
    let mut learned = 0;

    output.write_all(FEEDBACK_GREETING.as_bytes()).await?;
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(statement) = next_line(&mut input, shutdown).await? else {
            break;
        };
        if statement.is_empty() {
            continue;
        }

        let response = respond(store, responder, &statement)?;
        output
            .write_all(format!("Is \"{response}\" a coherent response to \"{statement}\"? ").as_bytes())
            .await?;

        let approved = loop {
            output.flush().await?;
            let Some(answer) = next_line(&mut input, shutdown).await? else {
                break None;
            };
            match answer.to_lowercase().as_str() {
                "yes" | "y" => break Some(true),
                "no" | "n" => break Some(false),
                _ => output.write_all(b"Please type either \"Yes\" or \"No\": ").await?,
            }
        };
        let Some(approved) = approved else {
            break;
        };

        if approved {
            if let Some(training) = TrainingSequence::from_statements(vec![statement, response.clone()]) {
                info!("Training bot: {:?}", training.statements());
                store.train(&training)?;
                learned += 1;
            }
        } else {
            debug!("Not learning {:?}", response);
        }
        output.write_all(format!("{response}\n").as_bytes()).await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(learned)
}

/// Next trimmed input line, or `None` on EOF or shutdown.
async fn next_line<R: AsyncBufRead + Unpin>(
    input: &mut R,
    shutdown: &mut Shutdown,
) -> Result<Option<String>, TrainError> {
    let mut line = String::new();
    let read = tokio::select! {
        biased;
        _ = shutdown.triggered() => return Ok(None),
        read = input.read_line(&mut line) => read?,
    };
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn respond(store: &StatementStore, responder: &ResponderConfig, input: &str) -> Result<String, TrainError> {
    Ok(store
        .best_response(input, responder.threshold)?
        .map(|r| r.text)
        .unwrap_or_else(|| responder.default_response.clone()))
}
