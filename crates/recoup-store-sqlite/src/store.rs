//! [`SqliteStore`]: the SQLite implementation of [`RecoveryStore`].

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use recoup_core::{
  cart::{Attribution, Cart, CartQuery, CartStatus, CartUpsert, NewCart},
  customer::{Customer, NewCustomer},
  inquiry::{Inquiry, InquiryUpsert, InteractionSession, NewInquiry, NewSession, SESSION_ENDED},
  metadata,
  store::RecoveryStore,
};

use crate::{
  Error, Result,
  encode::{
    CART_COLUMNS, CUSTOMER_COLUMNS, INQUIRY_COLUMNS, RawCart, RawCustomer, RawInquiry,
    RawSession, SESSION_COLUMNS, decode_metadata, encode_decimal, encode_dt, encode_items,
    encode_metadata, encode_status, encode_uuid, status_list,
  },
  schema::SCHEMA,
};

/// Carry a decode failure out of a `conn.call` closure.
fn boxed(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A recoup store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    tracing::debug!(path = %path.display(), "opened sqlite store");
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn select_customer(&self, clause: &'static str, args: Vec<String>) -> Result<Option<Customer>> {
    let raw: Option<RawCustomer> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {clause}"),
            rusqlite::params_from_iter(args),
            RawCustomer::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCustomer::into_customer).transpose()
  }

  async fn select_cart(&self, clause: &'static str, args: Vec<String>) -> Result<Option<Cart>> {
    let raw: Option<RawCart> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CART_COLUMNS} FROM carts WHERE {clause}"),
            rusqlite::params_from_iter(args),
            RawCart::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCart::into_cart).transpose()
  }
}

// ─── RecoveryStore impl ──────────────────────────────────────────────────────

impl RecoveryStore for SqliteStore {
  type Error = Error;

  // ── Customers ─────────────────────────────────────────────────────────────

  async fn upsert_customer(&self, input: NewCustomer) -> Result<Customer> {
    let now = Utc::now();

    let customer = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let fresh = input.clone().into_customer(now);
        let inserted = tx.execute(
          "INSERT INTO customers (
             customer_id, tenant, email, upstream_id, first_name, last_name,
             metadata, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (tenant, email) DO NOTHING",
          rusqlite::params![
            encode_uuid(fresh.customer_id),
            fresh.tenant,
            fresh.email,
            fresh.upstream_id,
            fresh.first_name,
            fresh.last_name,
            encode_metadata(&fresh.metadata).map_err(boxed)?,
            encode_dt(fresh.created_at),
            encode_dt(fresh.updated_at),
          ],
        )?;

        let customer = if inserted == 1 {
          fresh
        } else {
          let raw = tx.query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant = ?1 AND email = ?2"),
            rusqlite::params![input.tenant, input.email],
            RawCustomer::from_row,
          )?;
          let mut existing = raw.into_customer().map_err(boxed)?;
          existing.absorb(input, now);

          tx.execute(
            "UPDATE customers
             SET upstream_id = ?2, first_name = ?3, last_name = ?4,
                 metadata = ?5, updated_at = ?6
             WHERE customer_id = ?1",
            rusqlite::params![
              encode_uuid(existing.customer_id),
              existing.upstream_id,
              existing.first_name,
              existing.last_name,
              encode_metadata(&existing.metadata).map_err(boxed)?,
              encode_dt(existing.updated_at),
            ],
          )?;
          existing
        };

        tx.commit()?;
        Ok(customer)
      })
      .await?;

    Ok(customer)
  }

  async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
    self
      .select_customer("customer_id = ?1", vec![encode_uuid(id)])
      .await
  }

  async fn find_customer(&self, tenant: &str, email: &str) -> Result<Option<Customer>> {
    self
      .select_customer("tenant = ?1 AND email = ?2", vec![
        tenant.to_owned(),
        email.to_owned(),
      ])
      .await
  }

  async fn list_customers(&self, tenant: &str) -> Result<Vec<Customer>> {
    let tenant = tenant.to_owned();

    let raws: Vec<RawCustomer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tenant], RawCustomer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCustomer::into_customer).collect()
  }

  async fn delete_customer(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM customers WHERE customer_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Carts ─────────────────────────────────────────────────────────────────

  async fn upsert_abandoned_cart(&self, input: NewCart) -> Result<CartUpsert> {
    let now = Utc::now();

    let upsert = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let fresh = input.clone().into_cart(now);
        let inserted = tx.execute(
          "INSERT INTO carts (
             cart_id, tenant, upstream_cart_id, customer_id, email, total,
             currency, items, status, metadata, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT (tenant, upstream_cart_id) DO NOTHING",
          rusqlite::params![
            encode_uuid(fresh.cart_id),
            fresh.tenant,
            fresh.upstream_cart_id,
            fresh.customer_id.map(encode_uuid),
            fresh.email,
            encode_decimal(fresh.total),
            fresh.currency,
            encode_items(&fresh.items).map_err(boxed)?,
            encode_status(fresh.status),
            encode_metadata(&fresh.metadata).map_err(boxed)?,
            encode_dt(fresh.created_at),
            encode_dt(fresh.updated_at),
          ],
        )?;

        if inserted == 1 {
          tx.commit()?;
          return Ok(CartUpsert::Created(fresh));
        }

        let select = format!(
          "SELECT {CART_COLUMNS} FROM carts WHERE tenant = ?1 AND upstream_cart_id = ?2"
        );
        let raw = tx.query_row(
          &select,
          rusqlite::params![input.tenant, input.upstream_cart_id],
          RawCart::from_row,
        )?;
        let mut existing = raw.into_cart().map_err(boxed)?;

        if existing.status == CartStatus::Recovered {
          return Ok(CartUpsert::Unchanged(existing));
        }

        existing.absorb(input, now);
        let changed = tx.execute(
          "UPDATE carts
           SET customer_id = ?2, email = ?3, total = ?4, currency = ?5,
               items = ?6, metadata = ?7, updated_at = ?8
           WHERE cart_id = ?1 AND status <> 'recovered'",
          rusqlite::params![
            encode_uuid(existing.cart_id),
            existing.customer_id.map(encode_uuid),
            existing.email,
            encode_decimal(existing.total),
            existing.currency,
            encode_items(&existing.items).map_err(boxed)?,
            encode_metadata(&existing.metadata).map_err(boxed)?,
            encode_dt(existing.updated_at),
          ],
        )?;
        tx.commit()?;

        Ok(if changed == 1 {
          CartUpsert::Merged(existing)
        } else {
          CartUpsert::Unchanged(existing)
        })
      })
      .await?;

    Ok(upsert)
  }

  async fn get_cart(&self, id: Uuid) -> Result<Option<Cart>> {
    self.select_cart("cart_id = ?1", vec![encode_uuid(id)]).await
  }

  async fn find_cart(&self, tenant: &str, upstream_cart_id: &str) -> Result<Option<Cart>> {
    self
      .select_cart("tenant = ?1 AND upstream_cart_id = ?2", vec![
        tenant.to_owned(),
        upstream_cart_id.to_owned(),
      ])
      .await
  }

  async fn list_carts(&self, query: &CartQuery) -> Result<Vec<Cart>> {
    let tenant = query.tenant.clone();
    let status = query.status.map(encode_status);
    let email = query.email.clone();
    // SQLite treats a negative LIMIT as unbounded.
    let limit = query
      .limit
      .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset = query
      .offset
      .map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));

    let raws: Vec<RawCart> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CART_COLUMNS} FROM carts
           WHERE (?1 IS NULL OR tenant = ?1)
             AND (?2 IS NULL OR status = ?2)
             AND (?3 IS NULL OR email  = ?3)
           ORDER BY updated_at DESC, cart_id
           LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![tenant, status, email, limit, offset],
            RawCart::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCart::into_cart).collect()
  }

  async fn recoverable_carts(&self, tenant: &str, email: &str) -> Result<Vec<Cart>> {
    let tenant = tenant.to_owned();
    let email = email.to_owned();
    let guard = status_list(CartStatus::Recovered.predecessors());

    let raws: Vec<RawCart> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CART_COLUMNS} FROM carts
           WHERE tenant = ?1 AND email = ?2 AND status IN ({guard})
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tenant, email], RawCart::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCart::into_cart).collect()
  }

  async fn mark_email_sent(&self, cart_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(cart_id);
    let at_str = encode_dt(Utc::now());
    let guard = status_list(CartStatus::EmailSent.predecessors());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!(
            "UPDATE carts SET status = 'email_sent', updated_at = ?2
             WHERE cart_id = ?1 AND status IN ({guard})"
          ),
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn mark_recovered(&self, cart_id: Uuid, attribution: Attribution) -> Result<bool> {
    let id_str = encode_uuid(cart_id);
    let guard = status_list(CartStatus::Recovered.predecessors());

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
          .query_row(
            &format!("SELECT metadata FROM carts WHERE cart_id = ?1 AND status IN ({guard})"),
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(current) = current else {
          return Ok(0);
        };

        let mut meta = decode_metadata(&current).map_err(boxed)?;
        metadata::merge(&mut meta, attribution.to_metadata());

        let changed = tx.execute(
          &format!(
            "UPDATE carts
             SET status = 'recovered', recovered_at = ?2, recovered_order_id = ?3,
                 metadata = ?4, updated_at = ?2
             WHERE cart_id = ?1 AND status IN ({guard})"
          ),
          rusqlite::params![
            id_str,
            encode_dt(attribution.recovered_at),
            attribution.order_id,
            encode_metadata(&meta).map_err(boxed)?,
          ],
        )?;
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    Ok(changed == 1)
  }

  // ── Interaction log ───────────────────────────────────────────────────────

  async fn record_session(&self, input: NewSession) -> Result<InteractionSession> {
    let now_str = encode_dt(Utc::now());
    let meta_str = encode_metadata(&input.metadata)?;
    let conversation_id = input.conversation_id.clone();

    let raw: RawSession = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO interaction_sessions (
             conversation_id, tenant, customer_email, status, summary,
             transcript, metadata, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
           ON CONFLICT (conversation_id) DO UPDATE SET
             tenant         = excluded.tenant,
             customer_email = excluded.customer_email,
             status         = excluded.status,
             summary        = excluded.summary,
             transcript     = excluded.transcript,
             metadata       = excluded.metadata,
             updated_at     = excluded.updated_at",
          rusqlite::params![
            input.conversation_id,
            input.tenant,
            input.customer_email,
            input.status,
            input.summary,
            input.transcript,
            meta_str,
            now_str,
          ],
        )?;

        Ok(conn.query_row(
          &format!(
            "SELECT {SESSION_COLUMNS} FROM interaction_sessions WHERE conversation_id = ?1"
          ),
          rusqlite::params![conversation_id],
          RawSession::from_row,
        )?)
      })
      .await?;

    raw.into_session()
  }

  async fn ended_sessions(&self) -> Result<Vec<InteractionSession>> {
    let raws: Vec<RawSession> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLUMNS} FROM interaction_sessions
           WHERE status = ?1 AND summary IS NOT NULL
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![SESSION_ENDED], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  // ── Inquiries ─────────────────────────────────────────────────────────────

  async fn inquiry_conversation_ids(&self) -> Result<HashSet<String>> {
    let ids = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT conversation_id FROM inquiries")?;
        let ids = stmt
          .query_map([], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
      })
      .await?;

    Ok(ids)
  }

  async fn upsert_inquiry(&self, input: NewInquiry) -> Result<InquiryUpsert> {
    let now = Utc::now();

    let upsert = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let fresh = input.into_inquiry(now);
        let inserted = tx.execute(
          "INSERT INTO inquiries (
             conversation_id, tenant, customer_email, cart_id, cart_value,
             currency, summary, full_transcript, status, response,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?10)
           ON CONFLICT (conversation_id) DO NOTHING",
          rusqlite::params![
            fresh.conversation_id,
            fresh.tenant,
            fresh.customer_email,
            fresh.cart.cart_id,
            fresh.cart.cart_value.map(encode_decimal),
            fresh.cart.currency,
            fresh.summary,
            fresh.full_transcript,
            fresh.status,
            encode_dt(now),
          ],
        )?;

        if inserted == 1 {
          tx.commit()?;
          return Ok(InquiryUpsert::Inserted(fresh));
        }

        tx.execute(
          "UPDATE inquiries
           SET tenant = ?2, customer_email = ?3, cart_id = ?4, cart_value = ?5,
               currency = ?6, summary = ?7, full_transcript = ?8, status = ?9,
               updated_at = ?10
           WHERE conversation_id = ?1",
          rusqlite::params![
            fresh.conversation_id,
            fresh.tenant,
            fresh.customer_email,
            fresh.cart.cart_id,
            fresh.cart.cart_value.map(encode_decimal),
            fresh.cart.currency,
            fresh.summary,
            fresh.full_transcript,
            fresh.status,
            encode_dt(now),
          ],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE conversation_id = ?1"),
          rusqlite::params![fresh.conversation_id],
          RawInquiry::from_row,
        )?;
        tx.commit()?;

        Ok(InquiryUpsert::Refreshed(raw.into_inquiry().map_err(boxed)?))
      })
      .await?;

    Ok(upsert)
  }

  async fn get_inquiry(&self, conversation_id: &str) -> Result<Option<Inquiry>> {
    let id = conversation_id.to_owned();

    let raw: Option<RawInquiry> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE conversation_id = ?1"),
            rusqlite::params![id],
            RawInquiry::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawInquiry::into_inquiry).transpose()
  }

  async fn list_inquiries(&self, tenant: Option<&str>) -> Result<Vec<Inquiry>> {
    let tenant = tenant.map(str::to_owned);

    let raws: Vec<RawInquiry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INQUIRY_COLUMNS} FROM inquiries
           WHERE (?1 IS NULL OR tenant = ?1)
           ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tenant], RawInquiry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInquiry::into_inquiry).collect()
  }
}
