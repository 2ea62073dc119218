//! Vehicle and hardware queries.

use devices_core::TokenId;
use devices_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::{AftermarketDevice, UserDevice, Vehicle, VehicleNft};

/// Fields for a new user device.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewUserDevice<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub definition_id: &'a str,
    pub device_style_id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub vin: Option<&'a str>,
    pub vin_confirmed: bool,
    pub country_code: Option<&'a str>,
    pub metadata: Option<&'a str>,
}

/// Fields for a new aftermarket device.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewAftermarketDevice<'a> {
    pub serial: &'a str,
    pub token_id: Option<TokenId>,
    pub ethereum_address: Option<&'a str>,
    pub owner_address: Option<&'a str>,
    pub beneficiary: Option<&'a str>,
    pub device_manufacturer_token_id: Option<TokenId>,
}

impl Database {
    // =========================================================================
    // User device queries
    // =========================================================================

    /// Create a user device.
    pub async fn create_user_device(
        &self,
        params: NewUserDevice<'_>,
    ) -> Result<UserDevice, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            r"
            INSERT INTO user_devices
                (id, user_id, definition_id, device_style_id, name, vin, vin_confirmed,
                 country_code, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(params.id)
        .bind(params.user_id)
        .bind(params.definition_id)
        .bind(params.device_style_id)
        .bind(params.name)
        .bind(params.vin)
        .bind(i64::from(params.vin_confirmed))
        .bind(params.country_code)
        .bind(params.metadata)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_user_device(params.id).await
    }

    /// Get a user device by ID.
    pub async fn get_user_device(&self, id: &str) -> Result<UserDevice, DatabaseError> {
        sqlx::query_as::<_, UserDevice>("SELECT * FROM user_devices WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("UserDevice {id}")))
    }

    /// Delete a user device. Its NFT stays, detached.
    pub async fn delete_user_device(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM user_devices WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Vehicle NFT queries
    // =========================================================================

    /// Record a minted vehicle.
    pub async fn create_vehicle_nft(
        &self,
        token_id: TokenId,
        user_device_id: Option<&str>,
        owner_address: Option<&str>,
    ) -> Result<VehicleNft, DatabaseError> {
        sqlx::query(
            "INSERT INTO vehicle_nfts (token_id, user_device_id, owner_address, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_id.to_db())
        .bind(user_device_id)
        .bind(owner_address)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        sqlx::query_as::<_, VehicleNft>("SELECT * FROM vehicle_nfts WHERE token_id = ?")
            .bind(token_id.to_db())
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    /// Get a vehicle by token ID together with its user device, if still live.
    pub async fn get_vehicle_by_token(&self, token_id: TokenId) -> Result<Vehicle, DatabaseError> {
        let nft = sqlx::query_as::<_, VehicleNft>("SELECT * FROM vehicle_nfts WHERE token_id = ?")
            .bind(token_id.to_db())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Vehicle with token {token_id}")))?;

        let user_device = match nft.user_device_id.as_deref() {
            Some(id) => {
                sqlx::query_as::<_, UserDevice>("SELECT * FROM user_devices WHERE id = ?")
                    .bind(id)
                    .fetch_optional(self.pool())
                    .await?
            }
            None => None,
        };

        Ok(Vehicle { nft, user_device })
    }

    // =========================================================================
    // Aftermarket device queries
    // =========================================================================

    /// Register an aftermarket device.
    pub async fn create_aftermarket_device(
        &self,
        params: NewAftermarketDevice<'_>,
    ) -> Result<AftermarketDevice, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            r"
            INSERT INTO aftermarket_devices
                (serial, token_id, ethereum_address, owner_address, beneficiary,
                 device_manufacturer_token_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(params.serial)
        .bind(params.token_id.map(TokenId::to_db))
        .bind(params.ethereum_address)
        .bind(params.owner_address)
        .bind(params.beneficiary)
        .bind(params.device_manufacturer_token_id.map(TokenId::to_db))
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_aftermarket_device(params.serial).await
    }

    /// Get an aftermarket device by serial.
    pub async fn get_aftermarket_device(
        &self,
        serial: &str,
    ) -> Result<AftermarketDevice, DatabaseError> {
        sqlx::query_as::<_, AftermarketDevice>("SELECT * FROM aftermarket_devices WHERE serial = ?")
            .bind(serial)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("AftermarketDevice {serial}")))
    }

    /// Get an aftermarket device by token ID.
    pub async fn get_aftermarket_device_by_token(
        &self,
        token_id: TokenId,
    ) -> Result<AftermarketDevice, DatabaseError> {
        sqlx::query_as::<_, AftermarketDevice>(
            "SELECT * FROM aftermarket_devices WHERE token_id = ?",
        )
        .bind(token_id.to_db())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("AftermarketDevice with token {token_id}")))
    }
}
