//! Validates a client's order against the live catalog and turns it into a [`NewOrder`].
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 0. the order has at least one item,
//! 1. the restaurant exists (`NOT_FOUND` otherwise) and is open for business,
//! 2. the declared delivery fee is the restaurant's fee,
//! 3. the address exists and belongs to the customer,
//! 4. every dish is on the restaurant's menu at the declared price, in a positive quantity,
//! 5. the declared subtotal is the exact sum of the lines,
//! 6. the declared total is the subtotal plus the delivery fee,
//! 7. the delivery time is `asap` or a valid `HH:MM`.
//!
//! Nothing is written to the database here.
use chrono::{DateTime, FixedOffset, Utc};
use log::*;

use crate::{
    db_types::{NewOrder, NewOrderItem},
    engine_api::{errors::OrderFlowError, order_objects::NewOrderRequest},
    helpers::{compute_totals, line_subtotal, new_order_number, resolve_delivery_time, verify_declared, DeliveryTime},
    traits::CatalogLookup,
};

pub async fn assemble_order<B: CatalogLookup>(
    catalog: &B,
    user_id: i64,
    request: &NewOrderRequest,
    now: DateTime<Utc>,
    service_utc_offset: FixedOffset,
) -> Result<NewOrder, OrderFlowError> {
    if request.items.is_empty() {
        return Err(reject(user_id, "An order must contain at least one item".to_string()));
    }

    let restaurant = catalog
        .fetch_restaurant(request.restaurant_id)
        .await?
        .ok_or_else(|| OrderFlowError::NotFound(format!("Restaurant {}", request.restaurant_id)))?;
    if !restaurant.is_active {
        return Err(reject(user_id, format!("Restaurant {} is not accepting orders", restaurant.id)));
    }

    if request.delivery_fee != restaurant.delivery_fee {
        return Err(reject(
            user_id,
            format!(
                "The declared delivery fee ({}) does not match the restaurant's delivery fee ({})",
                request.delivery_fee, restaurant.delivery_fee
            ),
        ));
    }

    let address = match catalog.fetch_address(request.address_id).await? {
        Some(a) if a.user_id == user_id => a,
        _ => return Err(reject(user_id, format!("Address {} is not one of your addresses", request.address_id))),
    };

    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        let dish = catalog
            .fetch_dish(line.dish_id, restaurant.id)
            .await?
            .ok_or_else(|| reject(user_id, format!("Dish {} is not on the menu of {}", line.dish_id, restaurant.name)))?;
        if dish.price != line.price {
            return Err(reject(
                user_id,
                format!("The price of {} has changed from {} to {}", dish.name, line.price, dish.price),
            ));
        }
        let subtotal = line_subtotal(dish.id, dish.price, line.quantity)?;
        if dish.name != line.name {
            debug!("🔄️ Dish {} is now called '{}', not '{}'. Using the current name.", dish.id, dish.name, line.name);
        }
        items.push(NewOrderItem {
            dish_id: dish.id,
            dish_name: dish.name,
            dish_image: dish.image,
            price: dish.price,
            quantity: line.quantity,
            subtotal,
        });
    }

    let totals = compute_totals(items.iter().map(|i| i.subtotal), restaurant.delivery_fee)?;
    verify_declared("subtotal", request.subtotal, totals.subtotal)?;
    verify_declared("total", request.total, totals.total)?;

    let delivery_time = request.delivery_time.parse::<DeliveryTime>()?;
    let estimated_delivery_time =
        resolve_delivery_time(delivery_time, now, service_utc_offset, restaurant.avg_delivery_minutes);

    trace!("🔄️ Order for user {user_id} at {} passed validation. Total {}", restaurant.name, totals.total);
    Ok(NewOrder {
        order_number: new_order_number(now),
        user_id,
        restaurant_id: restaurant.id,
        restaurant_name: restaurant.name,
        address_id: address.id,
        contact_name: address.contact_name,
        contact_phone: address.contact_phone,
        delivery_address: address.full_address,
        payment_method: request.payment_method,
        subtotal: totals.subtotal,
        delivery_fee: totals.delivery_fee,
        total_amount: totals.total,
        note: request.note.clone(),
        estimated_delivery_time,
        created_at: now,
        items,
    })
}

fn reject(user_id: i64, reason: String) -> OrderFlowError {
    warn!("🔄️ Order from user {user_id} rejected. {reason}");
    OrderFlowError::Validation(reason)
}
