// zeus — terminal front end for the Zeus chat backend.
//
// Drives the client engine the way the web page drove the original: login,
// a conversation sidebar, realtime sends, background tasks, model slots.
// Plain text in, UI events out.
//
//   ZEUS_BASE_URL=http://127.0.0.1:8000 zeus
//
// Commands:
//   /login <user> <pass>     authenticate and store the token
//   /logout                  clear the session
//   /list                    list conversations (newest first)
//   /open <id>               switch to a conversation
//   /new <title>             create a conversation with the primary model
//   /delete <id>             delete a conversation
//   /models                  show the model catalog (tool-capable only)
//   /slot <name> <model_id>  bind primary | secondary | tertiary
//   /slots                   show current slot bindings
//   /bg <text>               send in background mode
//   /attach <path> <text>    upload a file and send with it attached
//   /cancel                  cancel the displayed conversation's work
//   /quit                    exit
//   anything else            send as a chat message

use std::sync::Arc;

use log::error;
use tokio::io::{AsyncBufReadExt, BufReader};

use zeus_client::{
    ClientConfig, ClientState, MessageRole, ModelSlot, UiEvent,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut config = ClientConfig::default();
    if let Ok(url) = std::env::var("ZEUS_BASE_URL") {
        config.base_url = url;
    }

    let (state, mut events) = match ClientState::new(config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("[zeus] Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    let state = Arc::new(state);

    // Resume a stored session if the token still verifies.
    if state.auth.verify().await {
        if let Some(user) = state.auth.user() {
            println!("* session resumed as {}", user.username);
        }
        print_sidebar(&state).await;
    } else {
        println!("* not logged in — /login <user> <pass>");
    }

    // Event printer: everything the engine would have painted on the page.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if !handle_line(&state, &line).await {
            break;
        }
    }

    state.teardown();
}

fn now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn print_event(event: UiEvent) {
    match event {
        UiEvent::MessageAppended { role, content, .. } => match role {
            MessageRole::User => println!("[{}] you> {}", now(), content),
            MessageRole::Assistant => println!("[{}] zeus> {}", now(), content),
            MessageRole::System => println!("[{}] * {}", now(), content),
        },
        UiEvent::ProcessingChanged { processing, .. } => {
            if processing {
                println!("[{}] * processing…  (/cancel to stop)", now());
            } else {
                println!("[{}] * idle", now());
            }
        }
        UiEvent::Thinking { text: Some(text) } => println!("[{}] … {}", now(), text),
        UiEvent::Thinking { text: None } => {}
        UiEvent::ToolPanelOpened { tool } => println!("[{}] [tool {}] started", now(), tool),
        UiEvent::ToolPanelLog { tool, output, is_error } => {
            let marker = if is_error { "!" } else { "|" };
            println!("[{}] [tool {}] {} {}", now(), tool, marker, output.trim_end());
        }
        UiEvent::ToolPanelClosed { tool, result, timed_out } => {
            if timed_out {
                println!("[{}] [tool {}] timed out", now(), tool);
            } else if let Some(result) = result {
                println!("[{}] [tool {}] done: {}", now(), tool, result);
            }
        }
        UiEvent::ConversationsStale => println!("[{}] * conversation list changed (/list)", now()),
        UiEvent::ConversationLoaded { conversation } => {
            println!(
                "[{}] * opened \"{}\" ({} messages, model {})",
                now(),
                conversation.title,
                conversation.messages.len(),
                conversation.model_id
            );
            for msg in &conversation.messages {
                let who = match msg.role {
                    MessageRole::User => "you",
                    MessageRole::Assistant => "zeus",
                    MessageRole::System => "*",
                };
                println!("  {}> {}", who, msg.content);
            }
        }
        UiEvent::ViewReset => println!("[{}] * view cleared", now()),
        UiEvent::ConnectionChanged { connected } => {
            println!(
                "[{}] * {}",
                now(),
                if connected { "connected" } else { "disconnected" }
            );
        }
        UiEvent::SystemNotice { content } => println!("[{}] * {}", now(), content),
        UiEvent::TaskQueued { task_id, message } => {
            println!(
                "[{}] * task {} queued{}",
                now(),
                task_id,
                message.map(|m| format!(": {m}")).unwrap_or_default()
            );
        }
        UiEvent::AuthExpired => println!("[{}] * session expired — /login again", now()),
    }
}

async fn print_sidebar(state: &ClientState) {
    let conversations = state.conversations.list().await;
    if conversations.is_empty() {
        println!("(no conversations)");
        return;
    }
    for conv in conversations {
        let marker = if state.conversations.active_id().as_deref() == Some(conv.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {}  [{} msgs, {}]",
            marker, conv.id, conv.title, conv.message_count, conv.model_id
        );
    }
}

/// Handle one input line; false means quit.
async fn handle_line(state: &Arc<ClientState>, line: &str) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" => return false,

        "/login" => match rest.split_once(' ') {
            Some((user, pass)) => match state.auth.login(user, pass.trim()).await {
                Ok(_) => {
                    println!("* logged in as {}", user);
                    print_sidebar(state).await;
                }
                Err(e) => println!("* login failed: {}", e),
            },
            None => println!("usage: /login <user> <pass>"),
        },

        "/logout" => {
            state.auth.logout().await;
            state.chat.disconnect();
            println!("* logged out");
        }

        "/list" => print_sidebar(state).await,

        "/open" => {
            if !state.chat.open_conversation(rest).await {
                println!("* could not open {}", rest);
            }
        }

        "/new" => {
            let title = if rest.is_empty() { "New conversation" } else { rest };
            let model = state.models.get(ModelSlot::Primary);
            match state.conversations.create(title, &model).await {
                Some(conv) => {
                    println!("* created {}", conv.id);
                    state.chat.open_conversation(&conv.id).await;
                }
                None => println!("* create failed"),
            }
        }

        "/delete" => {
            if state.delete_conversation(rest).await {
                println!("* deleted {}", rest);
            } else {
                println!("* delete failed");
            }
        }

        "/models" => {
            for model in state.models.fetch_catalog(true).await {
                println!(
                    "  {}  ({}, ctx {})",
                    model.id, model.name, model.context_length
                );
            }
        }

        "/slots" => {
            let sel = state.models.all();
            println!("  primary:   {}", sel.primary);
            println!("  secondary: {}", sel.secondary);
            println!("  tertiary:  {}", sel.tertiary);
        }

        "/slot" => match rest.split_once(' ') {
            Some((slot, model_id)) => {
                let slot = match slot {
                    "primary" => ModelSlot::Primary,
                    "secondary" => ModelSlot::Secondary,
                    "tertiary" => ModelSlot::Tertiary,
                    other => {
                        println!("* unknown slot '{}'", other);
                        return true;
                    }
                };
                state.models.set(slot, model_id.trim());
            }
            None => println!("usage: /slot <primary|secondary|tertiary> <model_id>"),
        },

        "/bg" => {
            if let Err(e) = state.chat.send_message(rest, true, vec![]).await {
                println!("* send failed: {}", e);
            }
        }

        "/attach" => match rest.split_once(' ') {
            Some((path, text)) => {
                match state.uploads.upload(&[std::path::PathBuf::from(path)]).await {
                    Ok(response) => {
                        let ids: Vec<String> =
                            response.files.iter().map(|f| f.id.clone()).collect();
                        if let Err(e) = state.chat.send_message(text.trim(), false, ids).await {
                            println!("* send failed: {}", e);
                        }
                    }
                    Err(e) => println!("* upload failed: {}", e),
                }
            }
            None => println!("usage: /attach <path> <text>"),
        },

        "/cancel" => {
            if let Err(e) = state.chat.cancel().await {
                println!("* cancel failed: {}", e);
            }
        }

        _ => {
            if let Err(e) = state.chat.send_message(line, false, vec![]).await {
                println!("* send failed: {}", e);
            }
        }
    }
    true
}
