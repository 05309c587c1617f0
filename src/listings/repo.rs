use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::{escape_like, SortKey};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub county: String,
    pub price: Decimal,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub floor_area_sqm: Option<Decimal>,
    pub property_type: String,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct CountedListing {
    #[sqlx(flatten)]
    pub listing: Listing,
    pub total_count: i64,
}

/// Normalized predicate for the listing search. `owner` scopes to one
/// lister's rows; the remaining fields are the public filter set.
#[derive(Debug, Default, Clone)]
pub struct SearchFilter {
    pub owner: Option<Uuid>,
    pub only_active: bool,
    pub city: Option<String>,
    pub county: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub min_bedrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    pub property_types: Option<Vec<String>>,
}

const LISTING_COLUMNS: &str = "id, user_id, title, description, address, city, county, price, \
     bedrooms, bathrooms, floor_area_sqm, property_type, images, is_active, created_at, updated_at";

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &SearchFilter) {
    qb.push(" WHERE TRUE");
    if filter.only_active {
        qb.push(" AND is_active = TRUE");
    }
    if let Some(owner) = filter.owner {
        qb.push(" AND user_id = ").push_bind(owner);
    }
    if let Some(city) = &filter.city {
        qb.push(" AND city ILIKE ")
            .push_bind(format!("%{}%", escape_like(city)));
    }
    if let Some(county) = &filter.county {
        qb.push(" AND county ILIKE ").push_bind(escape_like(county));
    }
    if let Some(min) = filter.price_min {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.price_max {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(beds) = filter.min_bedrooms {
        qb.push(" AND bedrooms >= ").push_bind(beds);
    }
    if let Some(baths) = filter.min_bathrooms {
        qb.push(" AND bathrooms >= ").push_bind(baths);
    }
    if let Some(types) = &filter.property_types {
        qb.push(" AND property_type = ANY(").push_bind(types.clone()).push(")");
    }
}

/// One statement carries both the page and the total via `COUNT(*) OVER ()`,
/// so the count and the rows reflect the same snapshot.
pub async fn search(
    db: &PgPool,
    filter: &SearchFilter,
    sort: SortKey,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Listing>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {LISTING_COLUMNS}, COUNT(*) OVER () AS total_count FROM listings"
    ));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY ").push(sort.order_clause());
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows: Vec<CountedListing> = qb.build_query_as().fetch_all(db).await?;
    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    Ok((rows.into_iter().map(|r| r.listing).collect(), total))
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

#[derive(Debug)]
pub struct NewListing {
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub county: String,
    pub price: Decimal,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub floor_area_sqm: Option<Decimal>,
    pub property_type: String,
}

/// Inserts the row with an empty image list; images are attached after the
/// uploads succeed.
pub async fn insert(db: &PgPool, user_id: Uuid, new: &NewListing) -> sqlx::Result<Listing> {
    sqlx::query_as::<_, Listing>(&format!(
        r#"
        INSERT INTO listings
            (user_id, title, description, address, city, county, price,
             bedrooms, bathrooms, floor_area_sqm, property_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {LISTING_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.address)
    .bind(&new.city)
    .bind(&new.county)
    .bind(new.price)
    .bind(new.bedrooms)
    .bind(new.bathrooms)
    .bind(new.floor_area_sqm)
    .bind(&new.property_type)
    .fetch_one(db)
    .await
}

pub async fn set_images(db: &PgPool, id: Uuid, images: &[String]) -> sqlx::Result<Listing> {
    sqlx::query_as::<_, Listing>(&format!(
        "UPDATE listings SET images = $2, updated_at = now() WHERE id = $1 RETURNING {LISTING_COLUMNS}"
    ))
    .bind(id)
    .bind(images)
    .fetch_one(db)
    .await
}

pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub price: Option<Decimal>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor_area_sqm: Option<Decimal>,
    pub property_type: Option<String>,
}

pub async fn update_fields(db: &PgPool, id: Uuid, patch: &ListingPatch) -> sqlx::Result<Listing> {
    sqlx::query_as::<_, Listing>(&format!(
        r#"
        UPDATE listings SET
            title          = COALESCE($2, title),
            description    = COALESCE($3, description),
            address        = COALESCE($4, address),
            city           = COALESCE($5, city),
            county         = COALESCE($6, county),
            price          = COALESCE($7, price),
            bedrooms       = COALESCE($8, bedrooms),
            bathrooms      = COALESCE($9, bathrooms),
            floor_area_sqm = COALESCE($10, floor_area_sqm),
            property_type  = COALESCE($11, property_type),
            updated_at     = now()
        WHERE id = $1
        RETURNING {LISTING_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&patch.title)
    .bind(&patch.description)
    .bind(&patch.address)
    .bind(&patch.city)
    .bind(&patch.county)
    .bind(patch.price)
    .bind(patch.bedrooms)
    .bind(patch.bathrooms)
    .bind(patch.floor_area_sqm)
    .bind(&patch.property_type)
    .fetch_one(db)
    .await
}

pub async fn soft_delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("UPDATE listings SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Hard delete, only used to undo a create whose image uploads failed.
pub async fn delete_row(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM listings WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Of the given ids, returns those that exist and are active.
pub async fn active_ids(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM listings WHERE id = ANY($1) AND is_active = TRUE",
    )
    .bind(ids)
    .fetch_all(db)
    .await
}

pub async fn find_many(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<Vec<Listing>> {
    sqlx::query_as::<_, Listing>(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(db)
    .await
}
