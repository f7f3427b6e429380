use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product entry held in the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: u64,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: String,
    pub amount: u32,
}

/// Maximum purchasable quantity for a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: u64,
    pub amount: u32,
}

/// Catalog metadata for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: String,
}

/// Request model for adding a product to the cart
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddProductRequest {
    pub product_id: u64,
}

/// Request model for changing the quantity of a product already in the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductAmount {
    pub product_id: u64,
    pub amount: u32,
}

/// Body of `PUT /api/cart/items/:product_id`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateAmountRequest {
    pub amount: u32,
}

/// Badge-style view of the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub distinct_items: usize,
    pub total_items: u32,
}

/// Ordered list of cart items.
///
/// Serializes as a bare JSON array, which is also the persisted format.
/// Every transition builds a new cart and leaves `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl CartItem {
    /// Create a cart entry holding a single unit of `product`
    pub fn from_product(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            price: product.price,
            image: product.image,
            amount: 1,
        }
    }
}

impl Cart {
    /// Create an empty cart
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from items already in insertion order
    pub fn from_items(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    /// Get a specific item from the cart
    pub fn get_item(&self, product_id: u64) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == product_id)
    }

    /// Check if a specific product is in the cart
    pub fn contains_item(&self, product_id: u64) -> bool {
        self.items.iter().any(|item| item.id == product_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all items
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.amount).sum()
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            distinct_items: self.len(),
            total_items: self.total_items(),
        }
    }

    /// Cart with one more unit of `product_id`; other items keep their position
    pub fn with_item_incremented(&self, product_id: u64) -> Cart {
        self.map_item(product_id, |item| CartItem {
            amount: item.amount.saturating_add(1),
            ..item.clone()
        })
    }

    /// Cart with `product_id` set to `amount`; other items keep their position
    pub fn with_item_amount(&self, product_id: u64, amount: u32) -> Cart {
        self.map_item(product_id, |item| CartItem {
            amount,
            ..item.clone()
        })
    }

    /// Cart with `item` appended at the end
    pub fn with_item_appended(&self, item: CartItem) -> Cart {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend(self.items.iter().cloned());
        items.push(item);
        Cart { items }
    }

    /// Cart without `product_id`, or `None` if it is not in the cart
    pub fn without_item(&self, product_id: u64) -> Option<Cart> {
        if !self.contains_item(product_id) {
            return None;
        }

        let items = self
            .items
            .iter()
            .filter(|item| item.id != product_id)
            .cloned()
            .collect();
        Some(Cart { items })
    }

    fn map_item<F>(&self, product_id: u64, f: F) -> Cart
    where
        F: Fn(&CartItem) -> CartItem,
    {
        let items = self
            .items
            .iter()
            .map(|item| {
                if item.id == product_id {
                    f(item)
                } else {
                    item.clone()
                }
            })
            .collect();
        Cart { items }
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}
