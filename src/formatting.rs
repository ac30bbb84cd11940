//! Order formatting pipeline.
//!
//! Turns raw order documents into `FormattedOrder`s by joining customers,
//! products, colours and product thumbnails. Each related kind is fetched in a
//! single batch for the whole slice of orders.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::{
    models::{
        FormattedOrder, FormattedOrderItem, Image, Order, OrderCustomer, Product, ProductColor,
        User,
    },
    repository::{RepoResult, Repository, RepositoryError},
};

pub const UNKNOWN_PRODUCT: &str = "Unknown product";

/// Formats a batch of orders, preserving their order.
pub async fn format_orders(
    repo: &dyn Repository,
    orders: Vec<Order>,
) -> RepoResult<Vec<FormattedOrder>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let customer_ids: Vec<Uuid> = orders
        .iter()
        .map(|o| o.customer_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let product_ids: Vec<Uuid> = orders
        .iter()
        .flat_map(|o| o.items.iter().map(|i| i.product_id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let customers: HashMap<Uuid, User> = repo
        .get_users_by_ids(&customer_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let products: HashMap<Uuid, Product> = repo
        .get_products_by_ids(&product_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let thumbnail_ids: Vec<Uuid> = products
        .values()
        .filter_map(|p| p.image_ids.first().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let images: HashMap<Uuid, Image> = repo
        .get_images_by_ids(&thumbnail_ids)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| assemble(order, &customers, &products, &images))
        .collect())
}

/// Formats one order.
pub async fn format_order(repo: &dyn Repository, order: Order) -> RepoResult<FormattedOrder> {
    let mut formatted = format_orders(repo, vec![order]).await?;
    formatted
        .pop()
        .ok_or_else(|| RepositoryError::DataCorruption("order lost while formatting".to_string()))
}

fn assemble(
    order: Order,
    customers: &HashMap<Uuid, User>,
    products: &HashMap<Uuid, Product>,
    images: &HashMap<Uuid, Image>,
) -> FormattedOrder {
    let items: Vec<FormattedOrderItem> = order
        .items
        .iter()
        .map(|item| {
            let product = products.get(&item.product_id);
            FormattedOrderItem {
                product_id: item.product_id,
                product_name: product
                    .map_or_else(|| UNKNOWN_PRODUCT.to_string(), |p| p.name.clone()),
                sku: product.map(|p| p.sku.clone()),
                color: item.color.as_deref().map(|name| {
                    product
                        .and_then(|p| p.color(name).cloned())
                        // Colour removed from the product since the order was placed.
                        .unwrap_or_else(|| ProductColor {
                            name: name.to_string(),
                            hex: String::new(),
                        })
                }),
                image_url: product
                    .and_then(|p| p.image_ids.first())
                    .and_then(|id| images.get(id))
                    .map(|image| image.url.clone()),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
            }
        })
        .collect();

    FormattedOrder {
        id: order.id,
        order_number: order.order_number,
        status: order.status,
        customer: customers.get(&order.customer_id).map(|u| OrderCustomer {
            id: u.id,
            name: u.full_name(),
            email: u.email.clone(),
        }),
        item_count: order.items.iter().map(|i| i64::from(i.quantity)).sum(),
        items,
        currency: order.currency,
        subtotal: order.subtotal,
        tax: order.tax,
        total: order.total,
        shipping_address: order.shipping_address,
        note: order.note,
        is_deleted: order.is_deleted,
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}
