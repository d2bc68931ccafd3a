//! Gift subscriptions.

use chrono::{DateTime, Months, Utc};
use reel_core::{Query, QueryError, Row, Value};
use uuid::Uuid;

const GIFT_COLUMNS: &str = "id, gifter_name, gifter_email, giftee_name, giftee_email, message, \
     plan_code, months, deliver_at, activated, recipient_user_id";

/// A purchased gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    pub id: Uuid,
    pub gifter_name: String,
    pub gifter_email: String,
    pub giftee_name: String,
    pub giftee_email: String,
    pub message: String,
    pub plan_code: String,
    pub months: u32,
    pub deliver_at: DateTime<Utc>,
    /// Set once the billing provider reports the gift subscription active.
    pub activated: bool,
    pub recipient_user_id: Option<Uuid>,
}

/// A gift about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGift {
    pub gifter_name: String,
    pub gifter_email: String,
    pub giftee_name: String,
    pub giftee_email: String,
    pub message: String,
    pub plan_code: String,
    pub months: u32,
    pub deliver_at: DateTime<Utc>,
}

impl Gift {
    /// # Errors
    ///
    /// A [`QueryError`] for missing or mistyped columns.
    pub fn from_row(row: &Row) -> Result<Self, QueryError> {
        let months: i64 = row.get("months")?;
        Ok(Self {
            id: row.get("id")?,
            gifter_name: row.get("gifter_name")?,
            gifter_email: row.get("gifter_email")?,
            giftee_name: row.get("giftee_name")?,
            giftee_email: row.get("giftee_email")?,
            message: row.get("message")?,
            plan_code: row.get("plan_code")?,
            months: u32::try_from(months).map_err(|_| QueryError::Decode {
                column: "months".to_owned(),
                expected: "a non-negative month count",
            })?,
            deliver_at: row.get("deliver_at")?,
            activated: row.get("activated")?,
            recipient_user_id: row.get("recipient_user_id")?,
        })
    }

    /// The billing account code used for this gift's subscription.
    #[must_use]
    pub fn account_code(&self) -> String {
        account_code(self.id)
    }

    /// Whether the gift currently grants premium access.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.activated
            && self.deliver_at <= now
            && self
                .deliver_at
                .checked_add_months(Months::new(self.months))
                .is_some_and(|ends| now < ends)
    }
}

/// Billing account codes for gifts are `gift-<id>`.
#[must_use]
pub fn account_code(id: Uuid) -> String {
    format!("gift-{id}")
}

/// The gift id in a billing account code, if it is one.
#[must_use]
pub fn parse_account_code(code: &str) -> Option<Uuid> {
    code.strip_prefix("gift-")
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Store a new gift, returning its id.
#[must_use]
pub fn insert(gift: &NewGift) -> Query<Uuid> {
    Query::one(
        "INSERT INTO gifts (gifter_name, gifter_email, giftee_name, giftee_email, message, \
         plan_code, months, deliver_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        vec![
            Value::from(gift.gifter_name.as_str()),
            Value::from(gift.gifter_email.as_str()),
            Value::from(gift.giftee_name.as_str()),
            Value::from(gift.giftee_email.as_str()),
            Value::from(gift.message.as_str()),
            Value::from(gift.plan_code.as_str()),
            Value::from(i64::from(gift.months)),
            Value::from(gift.deliver_at),
        ],
        |row| row.get("id"),
    )
}

#[must_use]
pub fn find(id: Uuid) -> Query<Option<Gift>> {
    Query::optional(
        format!("SELECT {GIFT_COLUMNS} FROM gifts WHERE id = $1"),
        vec![Value::from(id)],
        Gift::from_row,
    )
}

/// The most recent activated gift received by `user_id`.
#[must_use]
pub fn received_by(user_id: Uuid) -> Query<Option<Gift>> {
    Query::optional(
        format!(
            "SELECT {GIFT_COLUMNS} FROM gifts WHERE recipient_user_id = $1 AND activated \
             ORDER BY deliver_at DESC LIMIT 1"
        ),
        vec![Value::from(user_id)],
        Gift::from_row,
    )
}

#[must_use]
pub fn activate(id: Uuid) -> Query<u64> {
    Query::command(
        "UPDATE gifts SET activated = true WHERE id = $1",
        vec![Value::from(id)],
    )
}

/// Give an activated gift to `user_id`. Claiming a gift someone else holds
/// matches nothing; claiming your own again is a no-op that still matches.
#[must_use]
pub fn redeem(id: Uuid, user_id: Uuid) -> Query<u64> {
    Query::command(
        "UPDATE gifts SET recipient_user_id = $2 WHERE id = $1 AND activated \
         AND (recipient_user_id IS NULL OR recipient_user_id = $2)",
        vec![Value::from(id), Value::from(user_id)],
    )
}
