//! Serenity-self based Discord listener. Filters channels and allowed users, forwards
//! parsed commands to the main loop and posts the reply back.

use serenity_self::all::{Client, Context, EventHandler, GatewayIntents, Message};
use serenity_self::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::DiscordCfg;
use crate::parser::{parse_command, BotCommand};

pub struct BotRequest {
    pub author: String,
    pub command: BotCommand,
    pub reply: oneshot::Sender<String>,
}

pub struct Handler {
    pub channel_ids: Vec<String>,
    pub allowed_users: Vec<String>,
    pub tx: mpsc::Sender<BotRequest>,
}

impl Handler {
    fn accepts(&self, channel_id: &str, author: &str) -> bool {
        if !self.channel_ids.iter().any(|id| id == channel_id) {
            return false;
        }
        // Exact, case-insensitive: this account can place orders.
        self.allowed_users
            .iter()
            .any(|u| u.eq_ignore_ascii_case(author))
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        let ch = msg.channel_id.get().to_string();
        if !self.accepts(&ch, &msg.author.name) {
            return;
        }
        let Some(command) = parse_command(&msg.content) else {
            debug!("ignoring non-command from {}: {}", msg.author.name, msg.content);
            return;
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let req = BotRequest {
            author: msg.author.name.clone(),
            command,
            reply: reply_tx,
        };
        if self.tx.send(req).await.is_err() {
            error!("command loop is gone, dropping message");
            return;
        }
        let Ok(text) = reply_rx.await else {
            error!("command loop dropped the reply");
            return;
        };
        if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
            error!("Discord reply failed: {}", e);
        }
    }
}

pub async fn run(token: &str, cfg: DiscordCfg, tx: mpsc::Sender<BotRequest>) -> anyhow::Result<()> {
    let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let handler = Handler {
        channel_ids: cfg.channel_ids,
        allowed_users: cfg.allowed_users,
        tx,
    };

    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await?;

    info!("Discord listener starting...");
    client.start().await?;
    Ok(())
}
