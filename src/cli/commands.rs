use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatrelay", version, about = "Realtime chat relay server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API and WebSocket server
    Serve,

    /// Chat with a conversation from the terminal
    Chat {
        /// The id of the conversation to connect to
        #[arg(short = 'i', long)]
        conversation: i64,

        /// Bearer token forwarded to the completion backend
        #[arg(short, long, env = "OPENAI_API_KEY", hide_env_values = true)]
        token: String,
    },

    /// Manage conversations
    Conversation {
        #[command(subcommand)]
        action: ConversationAction,
    },
}

#[derive(Subcommand)]
pub enum ConversationAction {
    /// Create a new conversation
    Create {
        #[arg(short, long)]
        title: String,
    },

    /// List all conversations
    List,

    /// Add a user message without opening a chat session
    Message {
        id: i64,

        #[arg(short = 'm', long)]
        body: String,
    },

    /// Print a conversation with its messages
    Show {
        id: i64,
    },
}
