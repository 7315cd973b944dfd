use crate::domain::models::RoleKind;
use anyhow::Result;
use sqlx::PgPool;

pub async fn seed_all(pool: &PgPool) -> Result<()> {
    seed_roles(pool).await?;
    Ok(())
}

/// The role table is static reference data; ids are part of the contract.
async fn seed_roles(pool: &PgPool) -> Result<()> {
    let roles = [(1, RoleKind::Manager), (2, RoleKind::TeamMember)];
    for (id, role) in roles {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .execute(pool)
        .await?;
    }
    Ok(())
}
