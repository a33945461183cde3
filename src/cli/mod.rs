pub mod commands;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

use crate::cli::commands::{Commands, ConversationAction};
use crate::config::AppConfig;
use crate::db::queries::{self, QueryError, QuerySource};
use crate::db::{ConversationStore, Database, DbError, Message, Sender};
use crate::llm::ProviderFactory;
use crate::proto::chat_event::Event;
use crate::proto::codec;
use crate::proto::MessageEvent;
use crate::session::{
    CloseCause, CloseSignal, SessionDeps, SessionEngine, SessionError, Transport, TransportError,
};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load config: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("unknown llm provider [{0}]")]
    Provider(String),
    #[error("message body must not be empty")]
    EmptyMessage,
    #[error("chat ended: {0}")]
    Chat(String),
}

/// Installs the query templates and opens the configured database.
pub fn open_database(config: &AppConfig) -> Result<Database, CliError> {
    let source = match &config.database.queries_dir {
        Some(dir) => QuerySource::Directory(PathBuf::from(dir)),
        None => QuerySource::Embedded,
    };
    match queries::init(source) {
        Ok(()) | Err(QueryError::AlreadyInitialized) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(Database::open(&config.database)?)
}

pub async fn run_cli(command: Commands, config_path: String) -> Result<(), CliError> {
    let config = AppConfig::load(&config_path)?;

    match command {
        Commands::Serve => {
            // Intercepted by main.rs to boot actix-web
            Ok(())
        }
        Commands::Conversation { action } => {
            let db = open_database(&config)?;
            match action {
                ConversationAction::Create { title } => {
                    let conversation = db.create_conversation(&title)?;
                    println!(
                        "Created conversation: {} ({})",
                        conversation.title, conversation.id
                    );
                }
                ConversationAction::List => {
                    let conversations = db.list_conversations()?;
                    if conversations.is_empty() {
                        println!("No conversations found.");
                    } else {
                        println!("{:<8} | {:<20} | {}", "ID", "Created At", "Title");
                        println!("{:-<8}-+-{:-<20}-+-{:-<20}", "", "", "");
                        for c in conversations {
                            println!(
                                "{:<8} | {:<20} | {}",
                                c.id,
                                c.created_at.format("%Y-%m-%d %H:%M:%S"),
                                c.title
                            );
                        }
                    }
                }
                ConversationAction::Message { id, body } => {
                    let message = add_message(&db, id, &body)?;
                    println!(
                        "Added message {} to conversation {}",
                        message.id, message.conversation_id
                    );
                }
                ConversationAction::Show { id } => {
                    let conversation = db.get_conversation(id)?;
                    println!("Conversation: {}", conversation.title);
                    println!("ID: {}", conversation.id);
                    println!("Created At: {}", conversation.created_at);
                    if !conversation.context.is_empty() {
                        println!("Context: {}", conversation.context);
                    }
                    println!("---");
                    for m in conversation.messages.unwrap_or_default() {
                        println!("[{}]: {}", m.sender, m.body);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Chat {
            conversation,
            token,
        } => run_repl(conversation, token, config).await,
    }
}

/// Posts one USER message to an existing conversation.
pub fn add_message(
    store: &dyn ConversationStore,
    conversation_id: i64,
    body: &str,
) -> Result<Message, CliError> {
    if body.trim().is_empty() {
        return Err(CliError::EmptyMessage);
    }
    // Check if the conversation exists first
    store.get_conversation(conversation_id)?;
    Ok(store.create_message(body, Sender::User, conversation_id)?)
}

async fn run_repl(conversation_id: i64, token: String, config: AppConfig) -> Result<(), CliError> {
    let db = open_database(&config)?;
    let completion = ProviderFactory::create_default(&config)
        .ok_or_else(|| CliError::Provider(config.llm.provider.clone()))?;

    let deps = SessionDeps::new(Arc::new(db), completion, token, &config.chat);
    let mut engine = SessionEngine::start(conversation_id, deps)?;

    println!("--- Chatrelay Terminal Chat ---");
    println!("Connected to conversation: {}", conversation_id);
    println!("Type /exit to quit.");
    println!("-------------------------------");

    let mut transport = TerminalTransport::new();
    match engine.run(&mut transport).await {
        CloseCause::PeerClosed => Ok(()),
        cause => Err(CliError::Chat(format!("{cause:?}"))),
    }
}

/// Line-oriented terminal: every line is sent as one chat turn.
struct TerminalTransport {
    lines: Lines<BufReader<Stdin>>,
}

impl TerminalTransport {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait(?Send)]
impl Transport for TerminalTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            print!("\nUser> ");
            if let Err(e) = io::stdout().flush() {
                warn!("Unable to flush stdout: {}", e);
            }

            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| TransportError::Receive(e.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text == "/exit" || text == "/quit" {
                return Ok(None);
            }

            let frame = codec::encode_inbound(&MessageEvent {
                body: text.to_string(),
            })
            .map_err(|e| TransportError::Receive(e.to_string()))?;
            return Ok(Some(Bytes::from(frame)));
        }
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let event =
            codec::decode_outbound(&frame).map_err(|e| TransportError::Send(e.to_string()))?;
        match event.event {
            Some(Event::Message(message)) => println!("Bot> {}", message.body),
            Some(Event::Error(error)) => eprintln!("[{:?}] {}", error.r#type(), error.message),
            None => {}
        }
        Ok(())
    }

    async fn close(&mut self, _signal: CloseSignal) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::connection::IN_MEMORY;

    fn test_db() -> Database {
        Database::open(&DatabaseConfig {
            path: IN_MEMORY.to_string(),
            queries_dir: None,
        })
        .unwrap()
    }

    #[test]
    fn add_message_stores_user_message() {
        let db = test_db();
        let conversation = db.create_conversation("notes").unwrap();

        let message = add_message(&db, conversation.id, "remember this").unwrap();
        assert_eq!(message.sender, Sender::User);
        assert_eq!(message.body, "remember this");

        let stored = db.get_conversation(conversation.id).unwrap();
        assert_eq!(stored.messages.unwrap().len(), 1);
    }

    #[test]
    fn add_message_rejects_missing_conversation_and_blank_body() {
        let db = test_db();
        let conversation = db.create_conversation("notes").unwrap();

        assert!(matches!(
            add_message(&db, conversation.id + 1, "hi"),
            Err(CliError::Db(ref e)) if e.is_not_found()
        ));
        assert!(matches!(
            add_message(&db, conversation.id, "  "),
            Err(CliError::EmptyMessage)
        ));
        assert!(db.get_conversation(conversation.id).unwrap().messages.is_none());
    }
}
