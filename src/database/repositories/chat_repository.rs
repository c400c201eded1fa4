use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::models::DbChatMessage;
use crate::database::DatabaseResult;

/// 会话摘要：对端、最后一条消息、未读数
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConversationSummary {
    pub peer_id: String,
    pub last_message: DbChatMessage,
    pub unread_count: i64,
}

/// 私信仓库
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, message: &DbChatMessage) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, sender_id, recipient_id, content, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.content)
        .bind(message.is_read)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 与某对端的双向消息，按时间倒序分页
    pub async fn conversation(
        &self,
        user_id: Uuid,
        peer_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbChatMessage>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let messages = sqlx::query_as::<_, DbChatMessage>(
            "SELECT * FROM chat_messages
             WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id.to_string())
        .bind(peer_id.to_string())
        .bind(peer_id.to_string())
        .bind(user_id.to_string())
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// 将来自对端的消息全部置为已读
    pub async fn mark_read(&self, user_id: Uuid, peer_id: Uuid) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE chat_messages SET is_read = 1
             WHERE recipient_id = ? AND sender_id = ? AND is_read = 0",
        )
        .bind(user_id.to_string())
        .bind(peer_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 会话列表：扫描近期消息，在内存中按对端聚合
    pub async fn conversations(&self, user_id: Uuid) -> DatabaseResult<Vec<ConversationSummary>> {
        let uid = user_id.to_string();

        let messages = sqlx::query_as::<_, DbChatMessage>(
            "SELECT * FROM chat_messages
             WHERE sender_id = ? OR recipient_id = ?
             ORDER BY created_at DESC LIMIT 500",
        )
        .bind(&uid)
        .bind(&uid)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries: Vec<ConversationSummary> = Vec::new();
        for message in messages {
            let peer_id = if message.sender_id == uid {
                message.recipient_id.clone()
            } else {
                message.sender_id.clone()
            };

            match summaries.iter_mut().find(|s| s.peer_id == peer_id) {
                Some(summary) => {
                    if message.recipient_id == uid && !message.is_read {
                        summary.unread_count += 1;
                    }
                }
                None => {
                    let unread =
                        if message.recipient_id == uid && !message.is_read { 1 } else { 0 };
                    summaries.push(ConversationSummary {
                        peer_id,
                        last_message: message,
                        unread_count: unread,
                    });
                }
            }
        }

        Ok(summaries)
    }
}
