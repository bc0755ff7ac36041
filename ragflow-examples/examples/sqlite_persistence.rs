//! Creates a session and two messages in a SQLite-backed store, then reloads
//! them, demonstrating `ragflow-store` alongside `ragflow-config`'s
//! deployment-defaults loader (unset in this example, so it falls back to
//! built-in defaults).

use chrono::Utc;
use ragflow_config::load_global_defaults;
use ragflow_core::model::{Message, MessageRole, Session};
use ragflow_core::persistence::{MessageStore, SessionStore};
use ragflow_store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let defaults = load_global_defaults("ragflow-examples")?;
    println!("global defaults: max_iterations={}, temperature={}", defaults.max_iterations, defaults.temperature);

    let db_dir = tempfile::tempdir()?;
    let store = SqliteStore::new(db_dir.path().join("ragflow.sqlite3"))?;

    let session = Session {
        id: "s1".to_string(),
        tenant_id: "tenant-a".to_string(),
        title: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    store.create(&session).await?;

    let user_message = Message::new_user("m1", "s1", "r1", "what is ragflow?");
    store.create(&user_message).await?;

    let mut assistant_message = Message::new_assistant("m2", "s1", "r1");
    assistant_message.role = MessageRole::Assistant;
    assistant_message.content = "RAGFlow orchestrates retrieval and chat over your knowledge bases.".to_string();
    assistant_message.is_completed = true;
    store.create(&assistant_message).await?;
    store.update(&assistant_message).await?;

    let history = store.list_by_session("s1", None).await?;
    for message in &history {
        println!("{:?} ({}): {}", message.role, message.id, message.content);
    }

    Ok(())
}
