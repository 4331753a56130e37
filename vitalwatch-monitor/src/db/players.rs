//! Player database operations
//!
//! Only insert and lookup are exposed; player management belongs to the
//! surrounding application, not this service.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vitalwatch_common::time::to_db_timestamp;
use vitalwatch_common::Result;

use crate::models::{Player, PlayerInfo};

/// Insert a player row (used by seeding and tests)
pub async fn insert_player(pool: &SqlitePool, player: &Player) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO players (id, name, position, team, jersey_number, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(player.id.to_string())
    .bind(&player.name)
    .bind(&player.position)
    .bind(&player.team)
    .bind(player.jersey_number)
    .bind(to_db_timestamp(player.created_at))
    .bind(to_db_timestamp(player.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the name and position used in analysis prompts.
///
/// Callers degrade to [`PlayerInfo::placeholder`] when this returns `None`
/// or fails; a missing player must never abort an analysis.
pub async fn get_player_info(pool: &SqlitePool, id: Uuid) -> Result<Option<PlayerInfo>> {
    let row = sqlx::query("SELECT name, position FROM players WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| PlayerInfo {
        name: row.get("name"),
        position: row.get("position"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalwatch_common::time::now;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let player = Player {
            id: Uuid::new_v4(),
            name: "Jo Keller".to_string(),
            position: "Midfielder".to_string(),
            team: Some("First XI".to_string()),
            jersey_number: Some(8),
            created_at: now(),
            updated_at: now(),
        };
        insert_player(&pool, &player).await.unwrap();

        let info = get_player_info(&pool, player.id).await.unwrap().unwrap();
        assert_eq!(info.name, "Jo Keller");
        assert_eq!(info.position, "Midfielder");

        assert!(get_player_info(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }
}
