use std::time::Duration;

use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::PurchaseStatus;
use crate::framework::DatabaseProcessor;

/// A request to deliver crypto tokens once the matching fiat deposit completes.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Purchase {
    pub deposit_id: String,
    pub wallet_address: Option<String>,
    pub token: Option<String>,
    pub crypto_amount: Option<Decimal>,
    pub status: PurchaseStatus,
    /// Set once the transfer is broadcast, before it is confirmed.
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    /// Set while one worker owns the transfer for this purchase.
    pub claim_id: Option<Uuid>,
    pub created_at: time::PrimitiveDateTime,
    pub claimed_at: Option<time::PrimitiveDateTime>,
    pub submitted_at: Option<time::PrimitiveDateTime>,
    pub completed_at: Option<time::PrimitiveDateTime>,
    pub failed_at: Option<time::PrimitiveDateTime>,
}

/// Final state written by the worker that holds the claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseSettlement {
    Completed { tx_hash: String },
    Failed { error: String },
}

const PURCHASE_COLUMNS: &str = "deposit_id, wallet_address, token, crypto_amount, status, \
    tx_hash, error, claim_id, created_at, claimed_at, submitted_at, completed_at, failed_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPurchaseByDepositId {
    pub deposit_id: String,
}

impl Processor<GetPurchaseByDepositId> for DatabaseProcessor {
    type Output = Option<Purchase>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPurchaseByDepositId")]
    async fn process(&self, query: GetPurchaseByDepositId) -> Result<Option<Purchase>, sqlx::Error> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE deposit_id = $1");
        sqlx::query_as::<_, Purchase>(&sql)
            .bind(query.deposit_id)
            .fetch_optional(&self.pool)
            .await
    }
}

/// Take ownership of a pending purchase with nothing broadcast yet. A claim
/// older than `lease` is taken over. Returns whether this caller won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPurchase {
    pub deposit_id: String,
    pub claim_id: Uuid,
    pub lease: Duration,
}

impl Processor<ClaimPurchase> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimPurchase")]
    async fn process(&self, claim: ClaimPurchase) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET claim_id = $2, claimed_at = now()
            WHERE deposit_id = $1
              AND status = 'pending'
              AND tx_hash IS NULL
              AND (claim_id IS NULL
                   OR claimed_at IS NULL
                   OR claimed_at < now() - make_interval(secs => $3))
            "#,
        )
        .bind(claim.deposit_id)
        .bind(claim.claim_id)
        .bind(claim.lease.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Record the hash of a broadcast transfer on the claimed purchase. From
/// here on the claim is never released or taken over: the purchase can only
/// be settled once the transaction's fate is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPurchaseSubmission {
    pub deposit_id: String,
    pub claim_id: Uuid,
    pub tx_hash: String,
}

impl Processor<RecordPurchaseSubmission> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordPurchaseSubmission")]
    async fn process(&self, record: RecordPurchaseSubmission) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET tx_hash = $3, submitted_at = now()
            WHERE deposit_id = $1 AND status = 'pending' AND claim_id = $2 AND tx_hash IS NULL
            "#,
        )
        .bind(record.deposit_id)
        .bind(record.claim_id)
        .bind(record.tx_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlePurchase {
    pub deposit_id: String,
    pub claim_id: Uuid,
    pub settlement: PurchaseSettlement,
}

impl Processor<SettlePurchase> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SettlePurchase")]
    async fn process(&self, settle: SettlePurchase) -> Result<bool, sqlx::Error> {
        let query = match settle.settlement {
            PurchaseSettlement::Completed { tx_hash } => sqlx::query(
                r#"
                UPDATE purchases
                SET status = 'completed', tx_hash = $3, completed_at = now()
                WHERE deposit_id = $1 AND status = 'pending' AND claim_id = $2
                "#,
            )
            .bind(settle.deposit_id)
            .bind(settle.claim_id)
            .bind(tx_hash),
            PurchaseSettlement::Failed { error } => sqlx::query(
                r#"
                UPDATE purchases
                SET status = 'failed', error = $3, failed_at = now()
                WHERE deposit_id = $1 AND status = 'pending' AND claim_id = $2
                "#,
            )
            .bind(settle.deposit_id)
            .bind(settle.claim_id)
            .bind(error),
        };
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Give up a claim without settling, leaving the purchase pending. Refused
/// once a transfer was broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePurchaseClaim {
    pub deposit_id: String,
    pub claim_id: Uuid,
}

impl Processor<ReleasePurchaseClaim> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReleasePurchaseClaim")]
    async fn process(&self, release: ReleasePurchaseClaim) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET claim_id = NULL, claimed_at = NULL
            WHERE deposit_id = $1 AND status = 'pending' AND claim_id = $2 AND tx_hash IS NULL
            "#,
        )
        .bind(release.deposit_id)
        .bind(release.claim_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
