//! Database queries for bid schedules and bid items.
//!
//! Line and item reads used during recalculation take a connection so they
//! can run inside the write-back transaction.

use sqlx::{PgConnection, PgPool};

use crate::error::AppError;

use super::calculators::BidItemTotals;
use super::models::{BidItem, BidItemEquipment, BidItemLabor, BidItemMaterial, BidScheduleLine};

/// Get a bid schedule with each row's stored bid item totals
pub async fn get_bid_schedule(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Vec<BidScheduleLine>, AppError> {
    let lines = sqlx::query_as::<_, BidScheduleLine>(
        r#"
        SELECT
            bs.id::bigint AS id,
            bs.item_code,
            bs.description,
            bs.engineer_estimate::numeric AS engineer_estimate,
            bs.status,
            bs.color_code,
            bs.sequence,
            bi.id::bigint AS bid_item_id,
            bi.our_cost::numeric AS our_cost,
            bi.sale_price::numeric AS sale_price
        FROM bid_bidschedule bs
        LEFT JOIN bid_biditem bi ON bi.bid_schedule_id = bs.id
        WHERE bs.opportunity_id = $1
        ORDER BY bs.sequence, bs.item_code
        "#,
    )
    .bind(opportunity_id)
    .fetch_all(pool)
    .await?;

    Ok(lines)
}

/// Lock a bid item for recalculation
pub async fn lock_bid_item(conn: &mut PgConnection, id: i64) -> Result<Option<BidItem>, AppError> {
    let item = sqlx::query_as::<_, BidItem>(
        r#"
        SELECT
            id::bigint AS id,
            bid_schedule_id::bigint AS bid_schedule_id,
            COALESCE(subcontractor_total, 0)::numeric AS subcontractor_total,
            COALESCE(margin_percent, 25)::numeric AS margin_percent
        FROM bid_biditem
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

pub async fn get_materials(
    conn: &mut PgConnection,
    bid_item_id: i64,
) -> Result<Vec<BidItemMaterial>, AppError> {
    let materials = sqlx::query_as::<_, BidItemMaterial>(
        r#"
        SELECT
            m.id::bigint AS id,
            m.name,
            m.quantity::numeric AS quantity,
            m.unit_cost::numeric AS unit_cost,
            p.std_cost::numeric AS product_std_cost,
            p.internal_id::bigint AS product_internal_id
        FROM bid_biditemmaterial m
        LEFT JOIN product_product p ON p.id = m.product_id
        WHERE m.bid_item_id = $1
        ORDER BY m.sequence, m.created_at
        "#,
    )
    .bind(bid_item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(materials)
}

pub async fn get_labor(
    conn: &mut PgConnection,
    bid_item_id: i64,
) -> Result<Vec<BidItemLabor>, AppError> {
    let labor = sqlx::query_as::<_, BidItemLabor>(
        r#"
        SELECT
            id::bigint AS id,
            classification,
            hours::numeric AS hours,
            rate::numeric AS rate
        FROM bid_biditemlabor
        WHERE bid_item_id = $1
        ORDER BY sequence, created_at
        "#,
    )
    .bind(bid_item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(labor)
}

pub async fn get_equipment(
    conn: &mut PgConnection,
    bid_item_id: i64,
) -> Result<Vec<BidItemEquipment>, AppError> {
    let equipment = sqlx::query_as::<_, BidItemEquipment>(
        r#"
        SELECT
            id::bigint AS id,
            equipment_type,
            hours::numeric AS hours,
            rate::numeric AS rate,
            COALESCE(fuel_gallons, 0)::numeric AS fuel_gallons,
            COALESCE(fuel_cost_per_gallon, 4.50)::numeric AS fuel_cost_per_gallon
        FROM bid_biditemequipment
        WHERE bid_item_id = $1
        ORDER BY sequence, created_at
        "#,
    )
    .bind(bid_item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(equipment)
}

/// Write recomputed line totals and item totals back
pub async fn save_bid_item_totals(
    conn: &mut PgConnection,
    bid_item_id: i64,
    materials: &[BidItemMaterial],
    labor: &[BidItemLabor],
    equipment: &[BidItemEquipment],
    totals: &BidItemTotals,
) -> Result<(), AppError> {
    for material in materials {
        sqlx::query(
            r#"
            UPDATE bid_biditemmaterial
            SET unit_cost = $2,
                total_cost = $3,
                netsuite_internal_id = COALESCE($4, netsuite_internal_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(material.id)
        .bind(material.effective_unit_cost())
        .bind(material.total_cost())
        .bind(material.product_internal_id)
        .execute(&mut *conn)
        .await?;
    }

    for line in labor {
        sqlx::query("UPDATE bid_biditemlabor SET total_cost = $2, updated_at = NOW() WHERE id = $1")
            .bind(line.id)
            .bind(line.total_cost())
            .execute(&mut *conn)
            .await?;
    }

    for line in equipment {
        sqlx::query(
            "UPDATE bid_biditemequipment SET total_cost = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(line.id)
        .bind(line.total_cost())
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE bid_biditem
        SET materials_total = $2,
            labor_total = $3,
            equipment_total = $4,
            our_cost = $5,
            margin_amount = $6,
            sale_price = $7,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(bid_item_id)
    .bind(totals.materials_total)
    .bind(totals.labor_total)
    .bind(totals.equipment_total)
    .bind(totals.our_cost)
    .bind(totals.margin_amount)
    .bind(totals.sale_price)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
