//! Persistent store facade.
//!
//! Row-oriented access to the gateway's eight relations, keyed by natural
//! identifiers (access key + request id). All statements are parameterized
//! and run against a shared connection pool; the facade adds no locking of
//! its own and relies on the database for isolation.
//!
//! Quantities are stored as BIGINT; the wire form is unsigned, so values are
//! cast at the facade boundary.

use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use crate::config::Config;
use crate::types::{Asset, Block, Dividend, Payment, RequestStatus};

/// Status values an access key may hold.
pub const ACCESS_KEY_VALID: &str = "valid";
pub const ACCESS_KEY_INVALID: &str = "invalid";
pub const ACCESS_KEY_DISABLED: &str = "disabled";

#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connects to the gateway database and verifies the connection.
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(&config.database_url())
            .await?;
        sqlx::query("select 1").execute(&pool).await?;
        Ok(Store { pool })
    }

    // ------------------------------------------------------------------
    // Access keys
    // ------------------------------------------------------------------

    /// True only when the access key exists with `valid` status.
    pub async fn user_key_exists(&self, access_key: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "select count(*) as n from userkeys where access_key = $1 and status = $2",
        )
        .bind(access_key)
        .bind(ACCESS_KEY_VALID)
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.try_get("n")?;
        Ok(count > 0)
    }

    /// The status of an access key regardless of its value, or None when the
    /// key is unknown.
    pub async fn get_status_by_user_key(
        &self,
        access_key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("select status from userkeys where access_key = $1")
            .bind(access_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get("status")).transpose()
    }

    pub async fn get_secret_by_access_key(
        &self,
        access_key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("select secret from userkeys where access_key = $1")
            .bind(access_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get("secret")).transpose()
    }

    pub async fn get_nonce_by_access_key(&self, access_key: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("select nonce from userkeys where access_key = $1")
            .bind(access_key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => r.try_get("nonce"),
            None => Ok(0),
        }
    }

    pub async fn update_nonce(&self, access_key: &str, nonce: i64) -> Result<(), sqlx::Error> {
        sqlx::query("update userkeys set nonce = $1 where access_key = $2 and status = $3")
            .bind(nonce)
            .bind(access_key)
            .bind(ACCESS_KEY_VALID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_blockchain_id_by_user_key(
        &self,
        access_key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            "select blockchain_id from userkeys where access_key = $1 and status = $2",
        )
        .bind(access_key)
        .bind(ACCESS_KEY_VALID)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.try_get("blockchain_id")).transpose()
    }

    /// Creates an access key/secret pair and its first address atomically.
    /// Either both rows are inserted or neither is.
    pub async fn create_user_key(
        &self,
        user_id: i64,
        blockchain_id: &str,
        source_address: &str,
        parent_access_key: &str,
    ) -> Result<(String, String), sqlx::Error> {
        let key = crate::ids::generate_key();
        let secret = crate::ids::generate_key();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "insert into userkeys(user_id, parent_access_key, access_key, secret, nonce, blockchain_id, status) \
             values($1, $2, $3, $4, 0, $5, $6)",
        )
        .bind(user_id)
        .bind(parent_access_key)
        .bind(&key)
        .bind(&secret)
        .bind(blockchain_id)
        .bind(ACCESS_KEY_VALID)
        .execute(&mut *tx)
        .await?;
        sqlx::query("insert into addresses(access_key, source_address) values($1, $2)")
            .bind(&key)
            .bind(source_address)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok((key, secret))
    }

    pub async fn update_user_key_status(
        &self,
        access_key: &str,
        status: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("update userkeys set status = $1 where access_key = $2")
            .bind(status)
            .bind(access_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Addresses
    // ------------------------------------------------------------------

    pub async fn create_secondary_address(
        &self,
        access_key: &str,
        new_address: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("insert into addresses(access_key, source_address) values($1, $2)")
            .bind(access_key)
            .bind(new_address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Newest address associated with the access key.
    pub async fn get_source_address_by_access_key(
        &self,
        access_key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            "select source_address from addresses where access_key = $1 order by row_id desc limit 1",
        )
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.try_get("source_address")).transpose()
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_asset(
        &self,
        access_key: &str,
        blockchain_id: &str,
        asset_id: &str,
        source_address: &str,
        distribution_address: &str,
        asset: &str,
        description: &str,
        quantity: u64,
        divisible: bool,
        status: RequestStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "insert into assets(access_key, blockchain_id, asset_id, source_address, distribution_address, \
             asset, description, quantity, divisible, status, error_code, error_description, broadcast_tx_id) \
             values($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, '', '')",
        )
        .bind(access_key)
        .bind(blockchain_id)
        .bind(asset_id)
        .bind(source_address)
        .bind(distribution_address)
        .bind(asset)
        .bind(description)
        .bind(quantity as i64)
        .bind(divisible)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_asset_by_asset_id(
        &self,
        access_key: &str,
        asset_id: &str,
    ) -> Result<Option<Asset>, sqlx::Error> {
        let row = sqlx::query(
            "select blockchain_id, asset_id, source_address, distribution_address, asset, description, \
             quantity, divisible, status, error_description, broadcast_tx_id \
             from assets where asset_id = $1 and access_key = $2",
        )
        .bind(asset_id)
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| asset_from_row(&r)).transpose()
    }

    pub async fn update_asset_with_error(
        &self,
        access_key: &str,
        asset_id: &str,
        error_code: i64,
        error_description: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update assets set status = 'error', error_code = $1, error_description = $2 \
             where access_key = $3 and asset_id = $4",
        )
        .bind(error_code)
        .bind(error_description)
        .bind(access_key)
        .bind(asset_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_asset_complete(
        &self,
        access_key: &str,
        asset_id: &str,
        broadcast_tx_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update assets set status = 'complete', broadcast_tx_id = $1 \
             where access_key = $2 and asset_id = $3",
        )
        .bind(broadcast_tx_id)
        .bind(access_key)
        .bind(asset_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_asset_name(
        &self,
        access_key: &str,
        asset_id: &str,
        asset: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("update assets set asset = $1 where access_key = $2 and asset_id = $3")
            .bind(asset)
            .bind(access_key)
            .bind(asset_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dividends
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_dividend(
        &self,
        access_key: &str,
        dividend_id: &str,
        source_address: &str,
        asset: &str,
        dividend_asset: &str,
        quantity_per_unit: u64,
        status: RequestStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "insert into dividends(access_key, dividend_id, source_address, asset, dividend_asset, \
             quantity_per_unit, status, error_code, error_description, broadcast_tx_id) \
             values($1, $2, $3, $4, $5, $6, $7, 0, '', '')",
        )
        .bind(access_key)
        .bind(dividend_id)
        .bind(source_address)
        .bind(asset)
        .bind(dividend_asset)
        .bind(quantity_per_unit as i64)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_dividend_by_dividend_id(
        &self,
        access_key: &str,
        dividend_id: &str,
    ) -> Result<Option<Dividend>, sqlx::Error> {
        let row = sqlx::query(
            "select dividend_id, source_address, asset, dividend_asset, quantity_per_unit, status, \
             error_description, broadcast_tx_id \
             from dividends where dividend_id = $1 and access_key = $2",
        )
        .bind(dividend_id)
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| dividend_from_row(&r)).transpose()
    }

    pub async fn update_dividend_with_error(
        &self,
        access_key: &str,
        dividend_id: &str,
        error_code: i64,
        error_description: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update dividends set status = 'error', error_code = $1, error_description = $2 \
             where access_key = $3 and dividend_id = $4",
        )
        .bind(error_code)
        .bind(error_description)
        .bind(access_key)
        .bind(dividend_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_dividend_complete(
        &self,
        access_key: &str,
        dividend_id: &str,
        broadcast_tx_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update dividends set status = 'complete', broadcast_tx_id = $1 \
             where access_key = $2 and dividend_id = $3",
        )
        .bind(broadcast_tx_id)
        .bind(access_key)
        .bind(dividend_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_payment(
        &self,
        access_key: &str,
        blockchain_id: &str,
        payment_id: &str,
        source_address: &str,
        destination_address: &str,
        asset: &str,
        issuer: &str,
        amount: u64,
        status: RequestStatus,
        tx_fee: u64,
        payment_tag: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "insert into payments(access_key, blockchain_id, payment_id, source_address, destination_address, \
             asset, issuer, amount, status, tx_fee, broadcast_tx_id, signed_raw_tx, payment_tag, error_code, error_description) \
             values($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, '', '', $11, 0, '')",
        )
        .bind(access_key)
        .bind(blockchain_id)
        .bind(payment_id)
        .bind(source_address)
        .bind(destination_address)
        .bind(asset)
        .bind(issuer)
        .bind(amount as i64)
        .bind(status.as_str())
        .bind(tx_fee as i64)
        .bind(payment_tag.unwrap_or(""))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_payment_by_payment_id(
        &self,
        access_key: &str,
        payment_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let row = sqlx::query(
            "select blockchain_id, payment_id, source_address, destination_address, asset, issuer, \
             amount, status, tx_fee, broadcast_tx_id, payment_tag, error_code, error_description \
             from payments where payment_id = $1 and access_key = $2",
        )
        .bind(payment_id)
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| payment_from_row(&r)).transpose()
    }

    pub async fn get_payment_by_payment_tag(
        &self,
        access_key: &str,
        payment_tag: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let row = sqlx::query(
            "select blockchain_id, payment_id, source_address, destination_address, asset, issuer, \
             amount, status, tx_fee, broadcast_tx_id, payment_tag, error_code, error_description \
             from payments where payment_tag = $1 and access_key = $2",
        )
        .bind(payment_tag)
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| payment_from_row(&r)).transpose()
    }

    /// Payments where the address appears as source or destination.
    pub async fn get_payments_by_address(
        &self,
        access_key: &str,
        address: &str,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        let rows = sqlx::query(
            "select blockchain_id, payment_id, source_address, destination_address, asset, issuer, \
             amount, status, tx_fee, broadcast_tx_id, payment_tag, error_code, error_description \
             from payments where access_key = $1 and (source_address = $2 or destination_address = $2)",
        )
        .bind(access_key)
        .bind(address)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_from_row).collect()
    }

    pub async fn update_payment_status(
        &self,
        access_key: &str,
        payment_id: &str,
        status: RequestStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("update payments set status = $1 where access_key = $2 and payment_id = $3")
            .bind(status.as_str())
            .bind(access_key)
            .bind(payment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_payment_with_error(
        &self,
        access_key: &str,
        payment_id: &str,
        error_code: i64,
        error_description: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update payments set status = 'error', error_code = $1, error_description = $2 \
             where access_key = $3 and payment_id = $4",
        )
        .bind(error_code)
        .bind(error_description)
        .bind(access_key)
        .bind(payment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_payment_complete(
        &self,
        access_key: &str,
        payment_id: &str,
        broadcast_tx_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update payments set status = 'complete', broadcast_tx_id = $1 \
             where access_key = $2 and payment_id = $3",
        )
        .bind(broadcast_tx_id)
        .bind(access_key)
        .bind(payment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records the signed raw transaction so a failed broadcast can be
    /// re-transmitted by the retry path without re-signing.
    pub async fn update_payment_signed_raw_tx(
        &self,
        access_key: &str,
        payment_id: &str,
        signed_raw_tx: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update payments set signed_raw_tx = $1 where access_key = $2 and payment_id = $3",
        )
        .bind(signed_raw_tx)
        .bind(access_key)
        .bind(payment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Activations and trust lines
    // ------------------------------------------------------------------

    pub async fn insert_activation(
        &self,
        access_key: &str,
        activation_id: &str,
        blockchain_id: &str,
        address_to_activate: &str,
        amount: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "insert into activations(activation_id, blockchain_id, access_key, address_to_activate, amount) \
             values($1, $2, $3, $4, $5)",
        )
        .bind(activation_id)
        .bind(blockchain_id)
        .bind(access_key)
        .bind(address_to_activate)
        .bind(amount as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Activation state joined against the payment row that drives it. The
    /// activation and its funding payment share the same identifier.
    pub async fn get_activation_by_activation_id(
        &self,
        access_key: &str,
        activation_id: &str,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        let row = sqlx::query(
            "select a.blockchain_id, a.address_to_activate, a.amount, p.status, p.broadcast_tx_id, p.error_description \
             from activations a join payments p on a.activation_id = p.payment_id \
             where a.activation_id = $1 and a.access_key = $2",
        )
        .bind(activation_id)
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let amount: i64 = row.try_get("amount")?;
        Ok(Some(serde_json::json!({
            "activationId": activation_id,
            "address": row.try_get::<String, _>("address_to_activate")?,
            "amount": amount as u64,
            "status": row.try_get::<String, _>("status")?,
            "broadcastTxId": row.try_get::<String, _>("broadcast_tx_id")?,
            "errorMessage": row.try_get::<String, _>("error_description")?,
        })))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_trust_asset(
        &self,
        access_key: &str,
        activation_id: &str,
        blockchain_id: &str,
        asset: &str,
        issuer: &str,
        trust_amount: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "insert into trustassets(activation_id, blockchain_id, access_key, asset, issuer, trust_amount) \
             values($1, $2, $3, $4, $5, $6)",
        )
        .bind(activation_id)
        .bind(blockchain_id)
        .bind(access_key)
        .bind(asset)
        .bind(issuer)
        .bind(trust_amount as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    pub async fn get_recent_blocks(&self, limit: i64) -> Result<Vec<Block>, sqlx::Error> {
        let rows = sqlx::query(
            "select block_id, status, duration from blocks order by block_id desc limit $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(Block {
                    block_id: r.try_get("block_id")?,
                    status: r.try_get("status")?,
                    duration: r.try_get("duration")?,
                })
            })
            .collect()
    }
}

fn asset_from_row(row: &PgRow) -> Result<Asset, sqlx::Error> {
    let quantity: i64 = row.try_get("quantity")?;
    Ok(Asset {
        blockchain_id: row.try_get("blockchain_id")?,
        asset_id: row.try_get("asset_id")?,
        source_address: row.try_get("source_address")?,
        distribution_address: row.try_get("distribution_address")?,
        asset: row.try_get("asset")?,
        description: row.try_get("description")?,
        quantity: quantity as u64,
        divisible: row.try_get("divisible")?,
        status: row.try_get("status")?,
        error_message: row.try_get("error_description")?,
        broadcast_tx_id: row.try_get("broadcast_tx_id")?,
        ..Asset::default()
    })
}

fn dividend_from_row(row: &PgRow) -> Result<Dividend, sqlx::Error> {
    let quantity_per_unit: i64 = row.try_get("quantity_per_unit")?;
    Ok(Dividend {
        dividend_id: row.try_get("dividend_id")?,
        source_address: row.try_get("source_address")?,
        asset: row.try_get("asset")?,
        dividend_asset: row.try_get("dividend_asset")?,
        quantity_per_unit: quantity_per_unit as u64,
        status: row.try_get("status")?,
        error_message: row.try_get("error_description")?,
        broadcast_tx_id: row.try_get("broadcast_tx_id")?,
        ..Dividend::default()
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    let amount: i64 = row.try_get("amount")?;
    Ok(Payment {
        blockchain_id: row.try_get("blockchain_id")?,
        payment_id: row.try_get("payment_id")?,
        source_address: row.try_get("source_address")?,
        destination_address: row.try_get("destination_address")?,
        asset: row.try_get("asset")?,
        issuer: row.try_get("issuer")?,
        amount: amount as u64,
        status: row.try_get("status")?,
        tx_fee: row.try_get("tx_fee")?,
        broadcast_tx_id: row.try_get("broadcast_tx_id")?,
        payment_tag: row.try_get("payment_tag")?,
        error_code: row.try_get("error_code")?,
        error_message: row.try_get("error_description")?,
        ..Payment::default()
    })
}
