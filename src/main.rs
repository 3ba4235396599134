//! Minimal terminal front end for the chat engine. Rendering stays thin
//! on purpose: every state transition lives in the library.
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use kalchat::{
    encode_files, AppConfig, Attachment, EngineError, GeminiClient, Orchestrator,
    PendingAttachments, SendOutcome, SessionStore,
};
use kalchat::store::FileStorage;

const HELP: &str = "\
Commands:
  /new              start a new session
  /list             list sessions (* marks the active one)
  /select <n>       switch to session n from /list
  /delete <n>       delete session n from /list
  /rename <title>   rename the active session
  /attach <path>    queue a file for the next send
  /drop <n>         remove pending attachment n
  /quit             exit
Anything else is sent to the model.";

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_dir = dirs_next::data_dir().map(|d| d.join("KalChat").join("logs"));

    match log_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "kalchat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn print_sessions(store: &SessionStore) {
    for (i, session) in store.sessions().iter().enumerate() {
        let marker = if session.id == store.active_id() { "*" } else { " " };
        println!("{} [{}] {} ({} messages)", marker, i, session.title, session.messages.len());
    }
}

fn session_id_by_index(store: &SessionStore, arg: &str) -> Option<String> {
    let index: usize = arg.trim().parse().ok()?;
    store.sessions().get(index).map(|s| s.id.clone())
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let _log_guard = init_tracing();

    let config = AppConfig::from_env();
    if !config.has_api_key() {
        eprintln!("Warning: GEMINI_API_KEY is not set; sends will be rejected.");
    }

    let storage = FileStorage::in_data_dir()?;
    let store = Arc::new(Mutex::new(SessionStore::new(Box::new(storage))));
    let model = Arc::new(GeminiClient::new(config.api_key.clone()));
    let orchestrator = Orchestrator::new(store.clone(), model, config);
    info!("engine initialized");

    let mut pending = PendingAttachments::new();

    {
        let store = store.lock().unwrap();
        if let Some(active) = store.active_session() {
            println!("{}", active.messages[0].content);
        }
    }
    println!("{HELP}");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();

        if let Some(rest) = line.strip_prefix('/') {
            let (command, arg) = rest.split_once(' ').unwrap_or((rest, ""));
            match command {
                "quit" => break,
                "help" => println!("{HELP}"),
                "new" => {
                    let id = store.lock().unwrap().create_session();
                    println!("started session {id}");
                }
                "list" => print_sessions(&store.lock().unwrap()),
                "select" => {
                    let mut store = store.lock().unwrap();
                    let switched = session_id_by_index(&store, arg)
                        .map(|id| store.select_session(&id))
                        .unwrap_or(false);
                    println!("{}", if switched { "switched" } else { "no such session" });
                }
                "delete" => {
                    let mut store = store.lock().unwrap();
                    let deleted = session_id_by_index(&store, arg)
                        .map(|id| store.delete_session(&id))
                        .unwrap_or(false);
                    println!("{}", if deleted { "deleted" } else { "no such session" });
                }
                "rename" => {
                    let mut store = store.lock().unwrap();
                    let id = store.active_id().to_string();
                    if arg.trim().is_empty() {
                        println!("usage: /rename <title>");
                    } else {
                        store.rename_session(&id, arg.trim());
                        println!("renamed");
                    }
                }
                "attach" => {
                    let encoded = encode_files(&[arg.trim()]).await;
                    match encoded.into_iter().next() {
                        Some(att) => {
                            println!("queued {} ({})", att.name, att.mime_type);
                            pending.push(att);
                        }
                        None => println!("could not read {}", arg.trim()),
                    }
                }
                "drop" => match arg.trim().parse::<usize>().ok() {
                    Some(i) if pending.remove(i).is_some() => println!("removed"),
                    _ => println!("no such attachment"),
                },
                other => println!("unknown command /{other}"),
            }
            continue;
        }

        if line.is_empty() && pending.is_empty() {
            continue;
        }

        let session_id = store.lock().unwrap().active_id().to_string();
        let attachments: Vec<Attachment> = pending.take();
        match orchestrator.send(&session_id, line, attachments).await {
            Ok(SendOutcome::Replied(reply)) => println!("{reply}"),
            Ok(SendOutcome::Busy) => println!("(still waiting on the previous reply)"),
            Ok(SendOutcome::NothingToSend) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    store.lock().unwrap().flush();
    Ok(())
}
