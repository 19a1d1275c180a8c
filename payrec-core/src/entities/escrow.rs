use std::time::Duration;

use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{EscrowStatus, PaymentType, PayoutStatus};
use crate::framework::DatabaseProcessor;

/// Lookups that must resolve to a single escrow fetch one extra row so
/// duplicates can be detected.
pub const UNIQUE_LOOKUP_LIMIT: i64 = 2;

/// A buyer/seller arrangement holding funds until completion.
///
/// The `payout_*` columns track the seller payout lifecycle. A set
/// `payout_claimed_at` means a worker is calling the payout API right now.
/// `payout_request_id` is the idempotency key sent to the provider and
/// survives ambiguous failures so a retry reuses it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Escrow {
    pub escrow_id: Uuid,
    pub payment_type: PaymentType,
    pub status: EscrowStatus,
    pub deposit_id: Option<String>,
    pub amount: Option<Decimal>,
    pub fiat_currency: Option<String>,
    pub fiat_amount_paid: Option<Decimal>,
    pub fiat_currency_paid: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_provider: Option<String>,
    pub payout_id: Option<String>,
    pub payout_request_id: Option<Uuid>,
    pub payout_status: Option<PayoutStatus>,
    pub payout_error: Option<String>,
    pub created_at: time::PrimitiveDateTime,
    pub funded_at: Option<time::PrimitiveDateTime>,
    pub payout_claimed_at: Option<time::PrimitiveDateTime>,
    pub payout_initiated_at: Option<time::PrimitiveDateTime>,
    pub payout_attempted_at: Option<time::PrimitiveDateTime>,
    pub payout_updated_at: Option<time::PrimitiveDateTime>,
}

/// What a completed deposit tells us about the money received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowFunding {
    pub amount_paid: Option<Decimal>,
    pub currency_paid: Option<String>,
}

/// How a payout claim is given up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PayoutRelease {
    /// Recorded as `payout_error` together with `payout_attempted_at`.
    pub error: Option<String>,
    /// Drop the idempotency key. Only safe when the provider definitely did
    /// not create the payout.
    pub forget_request: bool,
}

const ESCROW_COLUMNS: &str = "escrow_id, payment_type, status, deposit_id, amount, \
    fiat_currency, fiat_amount_paid, fiat_currency_paid, seller_phone, seller_provider, \
    payout_id, payout_request_id, payout_status, payout_error, created_at, funded_at, \
    payout_claimed_at, payout_initiated_at, payout_attempted_at, payout_updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetEscrowById {
    pub escrow_id: Uuid,
}

impl Processor<GetEscrowById> for DatabaseProcessor {
    type Output = Option<Escrow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEscrowById")]
    async fn process(&self, query: GetEscrowById) -> Result<Option<Escrow>, sqlx::Error> {
        let sql = format!("SELECT {ESCROW_COLUMNS} FROM escrows WHERE escrow_id = $1");
        sqlx::query_as::<_, Escrow>(&sql)
            .bind(query.escrow_id)
            .fetch_optional(&self.pool)
            .await
    }
}

/// Fiat escrows paid by the given deposit, at most [`UNIQUE_LOOKUP_LIMIT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFiatEscrowsByDepositId {
    pub deposit_id: String,
}

impl Processor<GetFiatEscrowsByDepositId> for DatabaseProcessor {
    type Output = Vec<Escrow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetFiatEscrowsByDepositId")]
    async fn process(&self, query: GetFiatEscrowsByDepositId) -> Result<Vec<Escrow>, sqlx::Error> {
        let sql = format!(
            "SELECT {ESCROW_COLUMNS} FROM escrows \
             WHERE deposit_id = $1 AND payment_type = 'fiat' \
             ORDER BY created_at ASC LIMIT $2"
        );
        sqlx::query_as::<_, Escrow>(&sql)
            .bind(query.deposit_id)
            .bind(UNIQUE_LOOKUP_LIMIT)
            .fetch_all(&self.pool)
            .await
    }
}

/// Escrows whose payout carries the given provider id, at most [`UNIQUE_LOOKUP_LIMIT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEscrowsByPayoutId {
    pub payout_id: String,
}

impl Processor<GetEscrowsByPayoutId> for DatabaseProcessor {
    type Output = Vec<Escrow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEscrowsByPayoutId")]
    async fn process(&self, query: GetEscrowsByPayoutId) -> Result<Vec<Escrow>, sqlx::Error> {
        let sql = format!(
            "SELECT {ESCROW_COLUMNS} FROM escrows \
             WHERE payout_id = $1 \
             ORDER BY created_at ASC LIMIT $2"
        );
        sqlx::query_as::<_, Escrow>(&sql)
            .bind(query.payout_id)
            .bind(UNIQUE_LOOKUP_LIMIT)
            .fetch_all(&self.pool)
            .await
    }
}

/// Move a created fiat escrow to funded. Returns whether the row changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundEscrow {
    pub escrow_id: Uuid,
    pub funding: EscrowFunding,
}

impl Processor<FundEscrow> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FundEscrow")]
    async fn process(&self, fund: FundEscrow) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE escrows
            SET status = 'funded',
                funded_at = now(),
                fiat_amount_paid = $2,
                fiat_currency_paid = COALESCE($3, fiat_currency)
            WHERE escrow_id = $1 AND status = 'created' AND payment_type = 'fiat'
            "#,
        )
        .bind(fund.escrow_id)
        .bind(fund.funding.amount_paid)
        .bind(fund.funding.currency_paid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Take the payout claim on a completed fiat escrow that has no payout yet.
///
/// Yields the idempotency key to use: the one left by an earlier ambiguous
/// attempt if present, otherwise `request_id`. `None` means another worker
/// holds the claim or the payout already exists. A claim older than `lease`
/// is taken over; the kept key makes the provider collapse a repeated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimEscrowPayout {
    pub escrow_id: Uuid,
    pub request_id: Uuid,
    pub lease: Duration,
}

impl Processor<ClaimEscrowPayout> for DatabaseProcessor {
    type Output = Option<Uuid>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimEscrowPayout")]
    async fn process(&self, claim: ClaimEscrowPayout) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE escrows
            SET payout_claimed_at = now(),
                payout_request_id = COALESCE(payout_request_id, $2)
            WHERE escrow_id = $1
              AND status = 'completed'
              AND payment_type = 'fiat'
              AND payout_id IS NULL
              AND (payout_claimed_at IS NULL
                   OR payout_claimed_at < now() - make_interval(secs => $3))
            RETURNING payout_request_id
            "#,
        )
        .bind(claim.escrow_id)
        .bind(claim.request_id)
        .bind(claim.lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
    }
}

/// Store the provider payout id and drop the claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmEscrowPayout {
    pub escrow_id: Uuid,
    pub request_id: Uuid,
    pub payout_id: String,
}

impl Processor<ConfirmEscrowPayout> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ConfirmEscrowPayout")]
    async fn process(&self, confirm: ConfirmEscrowPayout) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE escrows
            SET payout_id = $3,
                payout_initiated_at = now(),
                payout_claimed_at = NULL,
                payout_error = NULL
            WHERE escrow_id = $1 AND payout_id IS NULL AND payout_request_id = $2
            "#,
        )
        .bind(confirm.escrow_id)
        .bind(confirm.request_id)
        .bind(confirm.payout_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEscrowPayout {
    pub escrow_id: Uuid,
    pub request_id: Uuid,
    pub release: PayoutRelease,
}

impl Processor<ReleaseEscrowPayout> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReleaseEscrowPayout")]
    async fn process(&self, release: ReleaseEscrowPayout) -> Result<bool, sqlx::Error> {
        let ReleaseEscrowPayout {
            escrow_id,
            request_id,
            release,
        } = release;
        let result = sqlx::query(
            r#"
            UPDATE escrows
            SET payout_claimed_at = NULL,
                payout_error = COALESCE($3, payout_error),
                payout_attempted_at = CASE WHEN $3 IS NULL THEN payout_attempted_at ELSE now() END,
                payout_request_id = CASE WHEN $4 THEN NULL ELSE payout_request_id END
            WHERE escrow_id = $1 AND payout_id IS NULL AND payout_request_id = $2
            "#,
        )
        .bind(escrow_id)
        .bind(request_id)
        .bind(release.error)
        .bind(release.forget_request)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Record why a payout could not be attempted at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEscrowPayoutError {
    pub escrow_id: Uuid,
    pub error: String,
}

impl Processor<RecordEscrowPayoutError> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordEscrowPayoutError")]
    async fn process(&self, record: RecordEscrowPayoutError) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE escrows
            SET payout_error = $2, payout_attempted_at = now()
            WHERE escrow_id = $1 AND payout_id IS NULL
            "#,
        )
        .bind(record.escrow_id)
        .bind(record.error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Overwrite the terminal payout status reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEscrowPayoutStatus {
    pub escrow_id: Uuid,
    pub status: PayoutStatus,
}

impl Processor<UpdateEscrowPayoutStatus> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateEscrowPayoutStatus")]
    async fn process(&self, update: UpdateEscrowPayoutStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE escrows
            SET payout_status = $2, payout_updated_at = now()
            WHERE escrow_id = $1
            "#,
        )
        .bind(update.escrow_id)
        .bind(update.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
