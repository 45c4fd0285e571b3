// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - ordered IM message ingestion.
//!
//! This is the binary entry point: the long-running `serve` process plus
//! one-shot commands that drive the same pipeline from a shell.

mod check;
mod commands;
mod serve;
mod stack;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::CourierConfig;
use courier_core::CourierError;

/// Courier - ordered IM message ingestion.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the default search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ingestion service until SIGINT/SIGTERM.
    Serve,
    /// Submit one chat message.
    Chat {
        #[arg(long)]
        user: String,
        #[arg(long)]
        conversation: String,
        /// Idempotency key; generated when omitted.
        #[arg(long)]
        msg_id: Option<String>,
        /// 1 = text, 2 = image.
        #[arg(long, default_value_t = 1)]
        msg_type: u8,
        content: String,
    },
    /// Read a conversation after a cursor.
    Pull {
        #[arg(long)]
        user: String,
        #[arg(long)]
        conversation: String,
        #[arg(long, default_value_t = 0)]
        cursor: u64,
    },
    /// Acknowledge reading a conversation up to `seq`.
    Ack {
        #[arg(long)]
        user: String,
        #[arg(long)]
        conversation: String,
        seq: u64,
    },
    /// Show a user's inbox entries after a seq.
    Inbox {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 0)]
        after: u64,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Run backend health checks.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let Some(command) = cli.command else {
        println!("courier: use --help for available commands");
        return;
    };

    match run(command, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(command: Commands, config: CourierConfig) -> Result<i32, CourierError> {
    if !matches!(command, Commands::Serve) {
        serve::init_tracing("warn");
    }
    let output = match command {
        Commands::Serve => {
            serve::run_serve(config).await?;
            return Ok(0);
        }
        Commands::Check => {
            let failures = check::run_check(&config).await?;
            return Ok(i32::from(failures > 0));
        }
        Commands::Chat {
            user,
            conversation,
            msg_id,
            msg_type,
            content,
        } => {
            let request = commands::ChatRequest {
                user_id: user,
                conversation_id: conversation,
                content,
                msg_id,
                msg_type,
            };
            commands::run_chat(&config, request).await?
        }
        Commands::Pull {
            user,
            conversation,
            cursor,
        } => commands::run_pull(&config, &user, &conversation, cursor).await?,
        Commands::Ack {
            user,
            conversation,
            seq,
        } => commands::run_ack(&config, &user, &conversation, seq).await?,
        Commands::Inbox { user, after, limit } => {
            commands::run_inbox(&config, &user, after, limit).await?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_arguments() {
        let cli = Cli::parse_from([
            "courier",
            "chat",
            "--user",
            "u1",
            "--conversation",
            "private_u1_u2",
            "--msg-id",
            "m1",
            "hello",
        ]);
        match cli.command {
            Some(Commands::Chat {
                user,
                msg_id,
                msg_type,
                content,
                ..
            }) => {
                assert_eq!(user, "u1");
                assert_eq!(msg_id.as_deref(), Some("m1"));
                assert_eq!(msg_type, 1);
                assert_eq!(content, "hello");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = courier_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.service.name, "courier");
        assert_eq!(config.queue.queue_name, "im.msg.process");
    }
}
