use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use shopsense_core::domain::activity::{PurchaseEvent, PurchaseEventId, ViewEvent, ViewEventId};
use shopsense_core::domain::product::{Product, ProductId};
use shopsense_core::domain::promotion::{Promotion, PromotionId};
use shopsense_core::domain::user::{User, UserId};
use shopsense_core::store::{BehaviorStore, ProductCount, StoreError};

use super::{decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const USER_COLUMNS: &str = "SELECT id, name, email, registered_at FROM users";
const PRODUCT_COLUMNS: &str =
    "SELECT id, name, category, tags_json, price, description FROM products";
const VIEW_COLUMNS: &str =
    "SELECT id, user_id, product_id, viewed_at, view_duration_secs FROM views";
const PURCHASE_COLUMNS: &str =
    "SELECT id, user_id, product_id, purchased_at, amount FROM purchases";
const PROMOTION_COLUMNS: &str =
    "SELECT id, user_id, product_id, discount_pct, valid_until, generated_at, reason FROM promotions";

/// Newest first; rowid breaks timestamp ties in favor of the latest insert.
const VIEW_ORDER: &str = " ORDER BY viewed_at DESC, rowid DESC";

pub struct SqlBehaviorStore {
    pool: DbPool,
}

impl SqlBehaviorStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn db_error(error: sqlx::Error) -> StoreError {
    RepositoryError::Database(error).into()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|error| RepositoryError::Decode(format!("{name}: {error}")))
}

fn decimal(name: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|error| RepositoryError::Decode(format!("{name} `{raw}`: {error}")))
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let registered_at: String = column(row, "registered_at")?;
    Ok(User {
        id: UserId(column(row, "id")?),
        name: column(row, "name")?,
        email: column(row, "email")?,
        registered_at: decode_timestamp("registered_at", &registered_at)?,
    })
}

fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let tags_json: String = column(row, "tags_json")?;
    let price: String = column(row, "price")?;
    let tags = serde_json::from_str(&tags_json)
        .map_err(|error| RepositoryError::Decode(format!("tags_json: {error}")))?;

    Ok(Product {
        id: ProductId(column(row, "id")?),
        name: column(row, "name")?,
        category: column(row, "category")?,
        tags,
        price: decimal("price", &price)?,
        description: column(row, "description")?,
    })
}

fn row_to_view(row: &SqliteRow) -> Result<ViewEvent, RepositoryError> {
    let viewed_at: String = column(row, "viewed_at")?;
    let duration: i64 = column(row, "view_duration_secs")?;
    Ok(ViewEvent {
        id: ViewEventId(column(row, "id")?),
        user_id: UserId(column(row, "user_id")?),
        product_id: ProductId(column(row, "product_id")?),
        viewed_at: decode_timestamp("viewed_at", &viewed_at)?,
        view_duration_secs: u32::try_from(duration).map_err(|_| {
            RepositoryError::Decode(format!("view_duration_secs out of range: {duration}"))
        })?,
    })
}

fn row_to_purchase(row: &SqliteRow) -> Result<PurchaseEvent, RepositoryError> {
    let purchased_at: String = column(row, "purchased_at")?;
    let amount: String = column(row, "amount")?;
    Ok(PurchaseEvent {
        id: PurchaseEventId(column(row, "id")?),
        user_id: UserId(column(row, "user_id")?),
        product_id: ProductId(column(row, "product_id")?),
        purchased_at: decode_timestamp("purchased_at", &purchased_at)?,
        amount: decimal("amount", &amount)?,
    })
}

fn row_to_promotion(row: &SqliteRow) -> Result<Promotion, RepositoryError> {
    let discount_pct: i64 = column(row, "discount_pct")?;
    let valid_until: String = column(row, "valid_until")?;
    let generated_at: String = column(row, "generated_at")?;
    Ok(Promotion {
        id: PromotionId(column(row, "id")?),
        user_id: UserId(column(row, "user_id")?),
        product_id: ProductId(column(row, "product_id")?),
        discount_pct: u8::try_from(discount_pct).map_err(|_| {
            RepositoryError::Decode(format!("discount_pct out of range: {discount_pct}"))
        })?,
        valid_until: decode_timestamp("valid_until", &valid_until)?,
        generated_at: decode_timestamp("generated_at", &generated_at)?,
        reason: column(row, "reason")?,
    })
}

fn row_to_count(row: &SqliteRow) -> Result<ProductCount, RepositoryError> {
    let count: i64 = column(row, "count")?;
    Ok(ProductCount {
        product_id: ProductId(column(row, "product_id")?),
        count: u64::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("negative count: {count}")))?,
    })
}

fn decode_all<T>(
    rows: &[SqliteRow],
    decode: fn(&SqliteRow) -> Result<T, RepositoryError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(decode).collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
}

/// `{select} WHERE {column} IN (?, ?, ...){suffix}`
fn select_in(
    select: &str,
    column: &str,
    values: impl IntoIterator<Item = String>,
    suffix: &str,
) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(format!("{select} WHERE {column} IN ("));
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value);
    }
    separated.push_unseparated(")");
    builder.push(suffix);
    builder
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl BehaviorStore for SqlBehaviorStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("{USER_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        decode_all(&rows, row_to_user)
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("{USER_COLUMNS} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(row_to_user).transpose().map_err(StoreError::from)
    }

    async fn save_users(&self, users: Vec<User>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for user in &users {
            sqlx::query(
                "INSERT INTO users (id, name, email, registered_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     registered_at = excluded.registered_at",
            )
            .bind(user.id.as_str())
            .bind(&user.name)
            .bind(&user.email)
            .bind(encode_timestamp(user.registered_at))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!("{PRODUCT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        decode_all(&rows, row_to_product)
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query =
            select_in(PRODUCT_COLUMNS, "id", ids.iter().map(|id| id.0.clone()), " ORDER BY id");
        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        decode_all(&rows, row_to_product)
    }

    async fn products_in_categories(
        &self,
        categories: &[String],
    ) -> Result<Vec<Product>, StoreError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let mut query =
            select_in(PRODUCT_COLUMNS, "category", categories.iter().cloned(), " ORDER BY id");
        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        decode_all(&rows, row_to_product)
    }

    async fn save_products(&self, products: Vec<Product>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for product in &products {
            let tags_json = serde_json::to_string(&product.tags)
                .map_err(|error| StoreError::Decode(format!("tags: {error}")))?;
            sqlx::query(
                "INSERT INTO products (id, name, category, tags_json, price, description)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     category = excluded.category,
                     tags_json = excluded.tags_json,
                     price = excluded.price,
                     description = excluded.description",
            )
            .bind(product.id.as_str())
            .bind(&product.name)
            .bind(&product.category)
            .bind(tags_json)
            .bind(product.price.to_string())
            .bind(&product.description)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)
    }

    async fn record_view(&self, view: ViewEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO views (id, user_id, product_id, viewed_at, view_duration_secs)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&view.id.0)
        .bind(view.user_id.as_str())
        .bind(view.product_id.as_str())
        .bind(encode_timestamp(view.viewed_at))
        .bind(i64::from(view.view_duration_secs))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn recent_views_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ViewEvent>, StoreError> {
        let rows = sqlx::query(&format!("{VIEW_COLUMNS} WHERE user_id = ?{VIEW_ORDER} LIMIT ?"))
            .bind(user_id.as_str())
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        decode_all(&rows, row_to_view)
    }

    async fn views_for_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<ViewEvent>, StoreError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = select_in(
            VIEW_COLUMNS,
            "product_id",
            product_ids.iter().map(|id| id.0.clone()),
            VIEW_ORDER,
        );
        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        decode_all(&rows, row_to_view)
    }

    async fn views_for_users(&self, user_ids: &[UserId]) -> Result<Vec<ViewEvent>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query =
            select_in(VIEW_COLUMNS, "user_id", user_ids.iter().map(|id| id.0.clone()), VIEW_ORDER);
        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        decode_all(&rows, row_to_view)
    }

    async fn list_views(&self) -> Result<Vec<ViewEvent>, StoreError> {
        let rows = sqlx::query(&format!("{VIEW_COLUMNS}{VIEW_ORDER}"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        decode_all(&rows, row_to_view)
    }

    async fn record_purchase(&self, purchase: PurchaseEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO purchases (id, user_id, product_id, purchased_at, amount)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&purchase.id.0)
        .bind(purchase.user_id.as_str())
        .bind(purchase.product_id.as_str())
        .bind(encode_timestamp(purchase.purchased_at))
        .bind(purchase.amount.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn purchases_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PurchaseEvent>, StoreError> {
        let rows = sqlx::query(&format!(
            "{PURCHASE_COLUMNS} WHERE user_id = ? ORDER BY purchased_at DESC, rowid DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        decode_all(&rows, row_to_purchase)
    }

    async fn list_purchases(&self) -> Result<Vec<PurchaseEvent>, StoreError> {
        let rows =
            sqlx::query(&format!("{PURCHASE_COLUMNS} ORDER BY purchased_at DESC, rowid DESC"))
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        decode_all(&rows, row_to_purchase)
    }

    async fn upsert_promotions(&self, promotions: Vec<Promotion>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for promotion in &promotions {
            sqlx::query(
                "INSERT INTO promotions
                     (id, user_id, product_id, discount_pct, valid_until, generated_at, reason)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     discount_pct = excluded.discount_pct,
                     valid_until = excluded.valid_until,
                     generated_at = excluded.generated_at,
                     reason = excluded.reason",
            )
            .bind(&promotion.id.0)
            .bind(promotion.user_id.as_str())
            .bind(promotion.product_id.as_str())
            .bind(i64::from(promotion.discount_pct))
            .bind(encode_timestamp(promotion.valid_until))
            .bind(encode_timestamp(promotion.generated_at))
            .bind(&promotion.reason)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;

        debug!(event_name = "store.promotions.upserted", count = promotions.len(), "promotions upserted");
        Ok(())
    }

    async fn promotions_for_user(&self, user_id: &UserId) -> Result<Vec<Promotion>, StoreError> {
        let rows = sqlx::query(&format!(
            "{PROMOTION_COLUMNS} WHERE user_id = ? ORDER BY generated_at DESC, id ASC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        decode_all(&rows, row_to_promotion)
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>, StoreError> {
        let rows = sqlx::query(&format!(
            "{PROMOTION_COLUMNS} ORDER BY user_id ASC, generated_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        decode_all(&rows, row_to_promotion)
    }

    async fn view_counts_by_product(&self, limit: usize) -> Result<Vec<ProductCount>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, COUNT(*) AS count FROM views
             GROUP BY product_id ORDER BY count DESC, product_id ASC LIMIT ?",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        decode_all(&rows, row_to_count)
    }

    async fn purchase_counts_by_product(
        &self,
        limit: usize,
    ) -> Result<Vec<ProductCount>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, COUNT(*) AS count FROM purchases
             GROUP BY product_id ORDER BY count DESC, product_id ASC LIMIT ?",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        decode_all(&rows, row_to_count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use shopsense_core::domain::activity::{PurchaseEvent, PurchaseEventId, ViewEvent, ViewEventId};
    use shopsense_core::domain::product::{Product, ProductId};
    use shopsense_core::domain::promotion::{Promotion, PromotionId};
    use shopsense_core::domain::user::{User, UserId};
    use shopsense_core::store::{BehaviorStore, ProductCount};

    use super::SqlBehaviorStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlBehaviorStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlBehaviorStore::new(pool)
    }

    fn product(id: &str, category: &str, tags: &[&str], cents: i64) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: format!("Product {id}"),
            category: category.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            price: Decimal::new(cents, 2),
            description: "demo".to_string(),
        }
    }

    fn view(id: &str, user: &str, product_id: &str, minute: u32, secs: u32) -> ViewEvent {
        ViewEvent {
            id: ViewEventId(id.to_string()),
            user_id: UserId(user.to_string()),
            product_id: ProductId(product_id.to_string()),
            viewed_at: Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0).single().expect("valid"),
            view_duration_secs: secs,
        }
    }

    #[tokio::test]
    async fn products_round_trip_with_tags_and_decimal_price() {
        let store = setup().await;
        let galaxy = product("p-1", "Electronics", &["android", "smartphone"], 399_999);

        store.save_products(vec![galaxy.clone()]).await.expect("save");
        let found = store.products_by_ids(&[ProductId("p-1".to_string())]).await.expect("load");

        assert_eq!(found, vec![galaxy]);
    }

    #[tokio::test]
    async fn products_by_ids_omits_missing_ids() {
        let store = setup().await;
        store.save_products(vec![product("p-1", "Books", &[], 1_000)]).await.expect("save");

        let found = store
            .products_by_ids(&[ProductId("p-1".to_string()), ProductId("ghost".to_string())])
            .await
            .expect("load");

        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn products_in_categories_filters_and_orders_by_id() {
        let store = setup().await;
        store
            .save_products(vec![
                product("p-3", "Books", &[], 1_000),
                product("p-1", "Books", &[], 1_000),
                product("p-2", "Garden", &[], 1_000),
            ])
            .await
            .expect("save");

        let books = store.products_in_categories(&["Books".to_string()]).await.expect("load");
        let ids: Vec<&str> = books.iter().map(|product| product.id.as_str()).collect();

        assert_eq!(ids, vec!["p-1", "p-3"]);
    }

    #[tokio::test]
    async fn recent_views_are_newest_first_and_limited() {
        let store = setup().await;
        for (id, minute) in [("v-1", 1), ("v-2", 3), ("v-3", 2)] {
            store.record_view(view(id, "u-1", "p-1", minute, 10)).await.expect("record");
        }
        store.record_view(view("v-other", "u-2", "p-1", 9, 10)).await.expect("record");

        let recent =
            store.recent_views_for_user(&UserId("u-1".to_string()), 2).await.expect("load");
        let ids: Vec<&str> = recent.iter().map(|view| view.id.0.as_str()).collect();

        assert_eq!(ids, vec!["v-2", "v-3"]);
    }

    #[tokio::test]
    async fn equal_timestamps_prefer_latest_insert() {
        let store = setup().await;
        store.record_view(view("v-first", "u-1", "p-1", 5, 10)).await.expect("record");
        store.record_view(view("v-second", "u-1", "p-2", 5, 10)).await.expect("record");

        let recent =
            store.recent_views_for_user(&UserId("u-1".to_string()), 1).await.expect("load");

        assert_eq!(recent[0].id.0, "v-second");
    }

    #[tokio::test]
    async fn promotion_upsert_replaces_by_id() {
        let store = setup().await;
        let user = UserId("u-1".to_string());
        let product_id = ProductId("p-1".to_string());
        let generated_at = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).single().expect("valid");
        let first = Promotion {
            id: PromotionId::for_pair(&user, &product_id),
            user_id: user.clone(),
            product_id: product_id.clone(),
            discount_pct: 10,
            valid_until: generated_at + Duration::days(7),
            generated_at,
            reason: "first".to_string(),
        };
        let second = Promotion {
            valid_until: generated_at + Duration::days(8),
            generated_at: generated_at + Duration::days(1),
            reason: "second".to_string(),
            ..first.clone()
        };

        store.upsert_promotions(vec![first]).await.expect("first upsert");
        store.upsert_promotions(vec![second.clone()]).await.expect("second upsert");

        let stored = store.promotions_for_user(&user).await.expect("load");
        assert_eq!(stored, vec![second]);
    }

    #[tokio::test]
    async fn group_counts_order_by_count_then_id() {
        let store = setup().await;
        let events = [("v-1", "p-b"), ("v-2", "p-a"), ("v-3", "p-b"), ("v-4", "p-c"), ("v-5", "p-a")];
        for (id, product_id) in events {
            store.record_view(view(id, "u-1", product_id, 1, 10)).await.expect("record");
        }
        store
            .record_purchase(PurchaseEvent {
                id: PurchaseEventId("o-1".to_string()),
                user_id: UserId("u-1".to_string()),
                product_id: ProductId("p-c".to_string()),
                purchased_at: Utc::now(),
                amount: Decimal::new(59_999, 2),
            })
            .await
            .expect("record purchase");

        let views = store.view_counts_by_product(2).await.expect("views");
        let purchases = store.purchase_counts_by_product(10).await.expect("purchases");

        assert_eq!(
            views,
            vec![
                ProductCount { product_id: ProductId("p-a".to_string()), count: 2 },
                ProductCount { product_id: ProductId("p-b".to_string()), count: 2 },
            ]
        );
        assert_eq!(purchases, vec![ProductCount { product_id: ProductId("p-c".to_string()), count: 1 }]);
    }

    #[tokio::test]
    async fn users_round_trip() {
        let store = setup().await;
        let user = User {
            id: UserId("u-1".to_string()),
            name: "Maria Santos".to_string(),
            email: "maria@example.com".to_string(),
            registered_at: Utc.with_ymd_and_hms(2025, 12, 1, 8, 0, 0).single().expect("valid"),
        };

        store.save_users(vec![user.clone()]).await.expect("save");

        assert_eq!(store.find_user(&user.id).await.expect("find"), Some(user.clone()));
        assert_eq!(store.list_users().await.expect("list"), vec![user]);
        assert_eq!(store.find_user(&UserId("nobody".to_string())).await.expect("find"), None);
    }
}
