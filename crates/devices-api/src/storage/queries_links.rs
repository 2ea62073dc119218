//! Integration link and AutoPi job queries.

use devices_core::TokenId;
use devices_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::{AutoPiJob, IntegrationLink, IntegrationStatus};

/// A link to stage as the only link for its (vehicle, integration) pair.
#[derive(Debug, Clone, Copy)]
pub struct StageLink<'a> {
    pub user_device_id: &'a str,
    pub integration_id: &'a str,
    pub external_id: Option<&'a str>,
    pub serial: &'a str,
    pub status: IntegrationStatus,
    pub metadata: Option<&'a str>,
    /// Recorded on the aftermarket device as its paired vehicle.
    pub vehicle_token_id: TokenId,
}

const INSERT_LINK_SQL: &str = r"
    INSERT INTO user_device_api_integrations
        (user_device_id, integration_id, external_id, serial, status, metadata,
         created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

impl Database {
    // =========================================================================
    // Integration link queries
    // =========================================================================

    /// Get the link for a (vehicle, integration) pair, if any.
    pub async fn get_integration_link(
        &self,
        user_device_id: &str,
        integration_id: &str,
    ) -> Result<Option<IntegrationLink>, DatabaseError> {
        let link = sqlx::query_as::<_, IntegrationLink>(
            "SELECT * FROM user_device_api_integrations WHERE user_device_id = ? AND integration_id = ?",
        )
        .bind(user_device_id)
        .bind(integration_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(link)
    }

    /// Get a vehicle's link by the hardware's external ID.
    pub async fn get_integration_link_by_external_id(
        &self,
        user_device_id: &str,
        external_id: &str,
    ) -> Result<IntegrationLink, DatabaseError> {
        sqlx::query_as::<_, IntegrationLink>(
            "SELECT * FROM user_device_api_integrations WHERE user_device_id = ? AND external_id = ?",
        )
        .bind(user_device_id)
        .bind(external_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| {
            DatabaseError::NotFound(format!(
                "Integration link for {user_device_id} with external id {external_id}"
            ))
        })
    }

    /// List every link of a vehicle.
    pub async fn list_integration_links(
        &self,
        user_device_id: &str,
    ) -> Result<Vec<IntegrationLink>, DatabaseError> {
        let links = sqlx::query_as::<_, IntegrationLink>(
            "SELECT * FROM user_device_api_integrations WHERE user_device_id = ? ORDER BY created_at",
        )
        .bind(user_device_id)
        .fetch_all(self.pool())
        .await?;

        Ok(links)
    }

    /// Replace the link for a (vehicle, integration) pair and mark the
    /// hardware as paired to the vehicle, in one transaction. Hardware of a
    /// replaced link is released when it differs from the new hardware.
    ///
    /// Returns the new link and whether a previous link was removed.
    pub async fn stage_integration_link(
        &self,
        link: StageLink<'_>,
    ) -> Result<(IntegrationLink, bool), DatabaseError> {
        let now = unix_timestamp();
        let vehicle_token = link.vehicle_token_id.to_db();
        let mut tx = self.pool().begin().await?;

        let previous: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT serial FROM user_device_api_integrations WHERE user_device_id = ? AND integration_id = ?",
        )
        .bind(link.user_device_id)
        .bind(link.integration_id)
        .fetch_optional(&mut *tx)
        .await?;
        let replaced = previous.is_some();

        if replaced {
            sqlx::query(
                "DELETE FROM user_device_api_integrations WHERE user_device_id = ? AND integration_id = ?",
            )
            .bind(link.user_device_id)
            .bind(link.integration_id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(old_serial) = previous
            .and_then(|(serial,)| serial)
            .filter(|serial| serial != link.serial)
        {
            sqlx::query(
                r"
                UPDATE aftermarket_devices SET vehicle_token_id = NULL, updated_at = ?
                WHERE serial = ? AND vehicle_token_id = ?
                ",
            )
            .bind(now)
            .bind(&old_serial)
            .bind(&vehicle_token)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(INSERT_LINK_SQL)
            .bind(link.user_device_id)
            .bind(link.integration_id)
            .bind(link.external_id)
            .bind(link.serial)
            .bind(link.status.as_str())
            .bind(link.metadata)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let paired = sqlx::query(
            "UPDATE aftermarket_devices SET vehicle_token_id = ?, updated_at = ? WHERE serial = ?",
        )
        .bind(&vehicle_token)
        .bind(now)
        .bind(link.serial)
        .execute(&mut *tx)
        .await?;
        if paired.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "AftermarketDevice {}",
                link.serial
            )));
        }

        let staged = sqlx::query_as::<_, IntegrationLink>(
            "SELECT * FROM user_device_api_integrations WHERE user_device_id = ? AND integration_id = ?",
        )
        .bind(link.user_device_id)
        .bind(link.integration_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((staged, replaced))
    }

    /// Set status and metadata of a link. Returns false if the link is gone.
    pub async fn update_integration_link(
        &self,
        user_device_id: &str,
        integration_id: &str,
        status: IntegrationStatus,
        metadata: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r"
            UPDATE user_device_api_integrations
            SET status = ?, metadata = ?, updated_at = ?
            WHERE user_device_id = ? AND integration_id = ?
            ",
        )
        .bind(status.as_str())
        .bind(metadata)
        .bind(unix_timestamp())
        .bind(user_device_id)
        .bind(integration_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set only the metadata of a link.
    pub async fn update_integration_link_metadata(
        &self,
        user_device_id: &str,
        integration_id: &str,
        metadata: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r"
            UPDATE user_device_api_integrations
            SET metadata = ?, updated_at = ?
            WHERE user_device_id = ? AND integration_id = ?
            ",
        )
        .bind(metadata)
        .bind(unix_timestamp())
        .bind(user_device_id)
        .bind(integration_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the link for a (vehicle, integration) pair and clear the
    /// hardware's paired vehicle if it is `vehicle_token_id`, in one
    /// transaction. A missing link is not an error; returns whether a link
    /// was deleted.
    pub async fn remove_integration_link(
        &self,
        user_device_id: &str,
        integration_id: &str,
        hardware_serial: &str,
        vehicle_token_id: TokenId,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let removed = sqlx::query(
            "DELETE FROM user_device_api_integrations WHERE user_device_id = ? AND integration_id = ?",
        )
        .bind(user_device_id)
        .bind(integration_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        sqlx::query(
            r"
            UPDATE aftermarket_devices SET vehicle_token_id = NULL, updated_at = ?
            WHERE serial = ? AND vehicle_token_id = ?
            ",
        )
        .bind(unix_timestamp())
        .bind(hardware_serial)
        .bind(vehicle_token_id.to_db())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(removed)
    }

    // =========================================================================
    // AutoPi job queries
    // =========================================================================

    /// Record a command sent to an AutoPi device.
    pub async fn create_autopi_job(
        &self,
        id: &str,
        device_id: &str,
        command: &str,
        user_device_id: Option<&str>,
    ) -> Result<AutoPiJob, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            r"
            INSERT INTO autopi_jobs (id, device_id, command, state, user_device_id, created_at, updated_at)
            VALUES (?, ?, ?, 'Sent', ?, ?, ?)
            ",
        )
        .bind(id)
        .bind(device_id)
        .bind(command)
        .bind(user_device_id)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_autopi_job(id).await
    }

    /// Get an AutoPi job by ID.
    pub async fn get_autopi_job(&self, id: &str) -> Result<AutoPiJob, DatabaseError> {
        sqlx::query_as::<_, AutoPiJob>("SELECT * FROM autopi_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("AutoPiJob {id}")))
    }
}
