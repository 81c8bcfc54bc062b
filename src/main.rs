use clap::{Parser, Subcommand};
use gatormarket::http::UreqHttpClient;
use gatormarket::messaging::ConversationState;
use gatormarket::store::FileStore;
use gatormarket::types::user::AuthUser;
use gatormarket::{Client, ClientConfig};
use log::error;
use std::sync::Arc;
use std::time::Duration;

// Small driver around the library: inspect conversations, send messages,
// watch notifications. Pages and forms live elsewhere; this is the same
// core the app embeds.
#[derive(Parser)]
#[command(name = "gatormarket", about = "GatorMarket client demo")]
struct Cli {
    /// Base URL of the marketplace API.
    #[arg(long, default_value = "https://csc648g1.me/api")]
    api_url: String,
    /// Directory for persisted client state.
    #[arg(long, default_value = "gatormarket-state")]
    store_dir: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a credential and start a session.
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        username: String,
    },
    /// End the current session.
    Logout,
    /// List conversations, newest activity first.
    Conversations,
    /// Show one conversation's messages (marks it read).
    Messages {
        #[arg(long)]
        id: i64,
    },
    /// Send a message into a conversation.
    Send {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        text: String,
    },
    /// Print the wishlist as the reconciler sees it.
    Wishlist,
    /// Poll for unread counts and sold wishlist items until Ctrl-C.
    Watch,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{:<5}] [{}] - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(async {
        let store = match FileStore::new(&cli.store_dir).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to open state directory {}: {e}", cli.store_dir);
                return;
            }
        };

        let config = ClientConfig {
            api_url: cli.api_url.clone(),
            store_dir: cli.store_dir.clone(),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        };
        let client = Client::new(config, Arc::new(UreqHttpClient::new()), store);

        if let Err(e) = run(&client, cli.command).await {
            error!("{e}");
        }
    });
}

async fn run(client: &Arc<Client>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login {
            token,
            user_id,
            username,
        } => {
            client
                .login_with(
                    token,
                    AuthUser {
                        user_id,
                        username,
                        email: None,
                    },
                )
                .await?;
            println!("Logged in as user {user_id}");
        }
        Command::Logout => {
            client.restore().await?;
            client.logout().await;
            println!("Logged out");
        }
        Command::Conversations => {
            restore_or_bail(client).await?;
            for convo in client.conversations.list_conversations().await? {
                println!(
                    "#{} [{} unread] {}: {}",
                    convo.conversation_id,
                    convo.unread_count,
                    convo.subject.as_deref().unwrap_or("(no subject)"),
                    convo.last_message_text.as_deref().unwrap_or("")
                );
            }
        }
        Command::Messages { id } => {
            restore_or_bail(client).await?;
            client.conversations.select_conversation(id).await?;
            if let Some(ConversationState::Loaded { messages, .. }) =
                client.conversations.conversation_state(id)
            {
                for msg in messages {
                    println!("[{}] {}", msg.sender_username, msg.message_text);
                }
            }
        }
        Command::Send { id, text } => {
            restore_or_bail(client).await?;
            client.conversations.send_message(id, &text).await?;
            println!("Sent");
        }
        Command::Wishlist => {
            restore_or_bail(client).await?;
            for entry in client.wishlist.entries() {
                println!("#{} {} (${})", entry.product_id, entry.name, entry.price);
            }
        }
        Command::Watch => {
            restore_or_bail(client).await?;
            let mut unread = client.bus.unread_count.subscribe();
            let mut toasts = client.bus.toast.subscribe();
            client.start_notification_poller();
            println!("Watching for notifications (Ctrl-C to stop)...");
            loop {
                tokio::select! {
                    Ok(count) = unread.recv() => println!("Unread messages: {count}"),
                    Ok(toast) = toasts.recv() => println!("{}", toast.text),
                    _ = tokio::signal::ctrl_c() => {
                        client.logout().await;
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn restore_or_bail(client: &Arc<Client>) -> anyhow::Result<()> {
    if !client.restore().await? {
        anyhow::bail!("no stored session; run `login` first");
    }
    Ok(())
}
