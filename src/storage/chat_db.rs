use rusqlite::{OptionalExtension, Result as SqlResult, Row, params};
use std::path::Path;

use super::database::Database;
use super::models::Account;
use crate::common::{Channel, Message};

/// Database backing the local backend (messages, channels, accounts)
pub struct ChatDatabase {
    db: Database,
}

impl ChatDatabase {
    /// Initialize chat database at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        Self::from_database(Database::new(path)?)
    }

    pub fn in_memory() -> SqlResult<Self> {
        Self::from_database(Database::in_memory()?)
    }

    fn from_database(db: Database) -> SqlResult<Self> {
        let chat_db = Self { db };
        chat_db.init_schema()?;
        Ok(chat_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.db.connection();

        // Messages, partitioned by channel
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                message TEXT,
                image_url TEXT,
                create_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS channels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                create_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_channel_create_at
             ON messages(channel_id, create_at)",
            [],
        )?;

        Ok(())
    }

    // ========== Messages ==========

    pub fn insert_message(&self, channel_id: &str, message: &Message) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT OR REPLACE INTO messages
             (id, channel_id, sender_id, sender_name, message, image_url, create_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id,
                channel_id,
                message.sender_id,
                message.sender_name,
                message.message,
                message.image_url,
                message.create_at
            ],
        )?;
        Ok(())
    }

    /// Whole channel, ascending by creation time (insertion order breaks ties)
    pub fn channel_messages(&self, channel_id: &str) -> SqlResult<Vec<Message>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, sender_name, message, image_url, create_at
             FROM messages
             WHERE channel_id = ?1
             ORDER BY create_at ASC, rowid ASC",
        )?;

        let messages = stmt
            .query_map(params![channel_id], message_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(messages)
    }

    // ========== Channels ==========

    pub fn insert_channel(&self, channel: &Channel) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO channels (id, name, create_at) VALUES (?1, ?2, ?3)",
            params![channel.id, channel.name, channel.create_at],
        )?;
        Ok(())
    }

    /// All channels in storage order
    pub fn all_channels(&self) -> SqlResult<Vec<Channel>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare("SELECT id, name, create_at FROM channels ORDER BY rowid")?;

        let channels = stmt
            .query_map([], |row| {
                Ok(Channel {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    create_at: row.get(2)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(channels)
    }

    // ========== Accounts ==========

    pub fn insert_account(&self, account: &Account) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO accounts
             (id, email, display_name, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.email,
                account.display_name,
                account.password_hash,
                account.created_at
            ],
        )?;
        Ok(())
    }

    pub fn find_account(&self, email: &str) -> SqlResult<Option<Account>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, email, display_name, password_hash, created_at
             FROM accounts WHERE email = ?1",
        )?;

        stmt.query_row(params![email], |row| {
            Ok(Account {
                id: row.get(0)?,
                email: row.get(1)?,
                display_name: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()
    }
}

fn message_from_row(row: &Row<'_>) -> SqlResult<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_name: row.get(2)?,
        message: row.get(3)?,
        image_url: row.get(4)?,
        create_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, create_at: i64) -> Message {
        Message {
            id: id.into(),
            sender_id: "u1".into(),
            sender_name: "Alice".into(),
            message: Some(format!("text {id}")),
            image_url: None,
            create_at,
        }
    }

    #[test]
    fn messages_are_partitioned_and_ordered_by_create_at() {
        let db = ChatDatabase::in_memory().unwrap();
        db.insert_message("a", &message("m3", 30)).unwrap();
        db.insert_message("a", &message("m1", 10)).unwrap();
        db.insert_message("b", &message("other", 5)).unwrap();
        db.insert_message("a", &message("m2", 10)).unwrap();

        let ids: Vec<_> = db
            .channel_messages("a")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
        assert_eq!(db.channel_messages("b").unwrap().len(), 1);
        assert!(db.channel_messages("missing").unwrap().is_empty());
    }

    #[test]
    fn channels_keep_insertion_order_and_allow_duplicate_names() {
        let db = ChatDatabase::in_memory().unwrap();
        for (id, name) in [("c2", "zeta"), ("c1", "alpha"), ("c3", "alpha")] {
            db.insert_channel(&Channel {
                id: id.into(),
                name: name.into(),
                create_at: 1,
            })
            .unwrap();
        }

        let channels = db.all_channels().unwrap();
        let ids: Vec<_> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c2", "c1", "c3"]);
    }

    #[test]
    fn accounts_are_unique_by_email() {
        let db = ChatDatabase::in_memory().unwrap();
        let account = Account {
            id: "u1".into(),
            email: "a@example.com".into(),
            display_name: "Alice".into(),
            password_hash: "$argon2id$placeholder".into(),
            created_at: 0,
        };
        db.insert_account(&account).unwrap();
        assert!(db.insert_account(&Account { id: "u2".into(), ..account }).is_err());

        let found = db.find_account("a@example.com").unwrap().unwrap();
        assert_eq!(found.display_name, "Alice");
        assert!(db.find_account("b@example.com").unwrap().is_none());
    }
}
