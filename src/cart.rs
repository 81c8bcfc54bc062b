use rand::RngCore;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// A product placed in the cart. `cart_id` is client-generated and unique
/// per entry, so the same product can be carted twice and removed
/// individually.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub cart_id: String,
    pub product_id: i64,
    pub seller_id: i64,
    pub seller_name: String,
    pub name: String,
    pub price: f64,
    pub selected: bool,
}

/// Selected cart items destined for one seller, processed as one
/// negotiation unit during checkout. Derived, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SellerGroup {
    pub seller_id: i64,
    pub seller_name: String,
    pub items: Vec<CartItem>,
}

/// Descriptor for adding a product to the cart.
#[derive(Debug, Clone)]
pub struct CartProduct {
    pub product_id: i64,
    pub seller_id: i64,
    pub seller_name: String,
    pub name: String,
    pub price: f64,
}

/// Cart state for the single active user session.
pub struct Cart {
    items: RwLock<Vec<CartItem>>,
    unique_id: String,
    id_counter: AtomicU64,
}

impl Cart {
    pub fn new() -> Self {
        let mut unique_id_bytes = [0u8; 2];
        rand::rng().fill_bytes(&mut unique_id_bytes);
        Self {
            items: RwLock::new(Vec::new()),
            unique_id: format!("{}.{}", unique_id_bytes[0], unique_id_bytes[1]),
            id_counter: AtomicU64::new(0),
        }
    }

    fn generate_cart_id(&self) -> String {
        let count = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.unique_id, count)
    }

    /// Adds an item, initially not selected for checkout. Returns its
    /// cart-entry id.
    pub fn add(&self, product: CartProduct) -> String {
        let cart_id = self.generate_cart_id();
        self.items.write().unwrap().push(CartItem {
            cart_id: cart_id.clone(),
            product_id: product.product_id,
            seller_id: product.seller_id,
            seller_name: product.seller_name,
            name: product.name,
            price: product.price,
            selected: false,
        });
        cart_id
    }

    /// Removes one entry by cart id. Returns whether it existed.
    pub fn remove(&self, cart_id: &str) -> bool {
        let mut items = self.items.write().unwrap();
        let before = items.len();
        items.retain(|item| item.cart_id != cart_id);
        items.len() != before
    }

    pub fn remove_many(&self, cart_ids: &[String]) {
        let mut items = self.items.write().unwrap();
        items.retain(|item| !cart_ids.iter().any(|id| id == &item.cart_id));
    }

    /// Flips the selected-for-checkout flag of one entry.
    pub fn toggle_selected(&self, cart_id: &str) -> bool {
        let mut items = self.items.write().unwrap();
        match items.iter_mut().find(|item| item.cart_id == cart_id) {
            Some(item) => {
                item.selected = !item.selected;
                true
            }
            None => false,
        }
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.items.read().unwrap().clone()
    }

    pub fn selected_items(&self) -> Vec<CartItem> {
        self.items
            .read()
            .unwrap()
            .iter()
            .filter(|item| item.selected)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().unwrap().is_empty()
    }

    /// Partitions the selected items into per-seller groups. Sellers appear
    /// in the order their first item is encountered in the cart; a seller
    /// without selected items gets no group.
    pub fn seller_groups(&self) -> Vec<SellerGroup> {
        let items = self.items.read().unwrap();
        let mut groups: Vec<SellerGroup> = Vec::new();
        for item in items.iter().filter(|item| item.selected) {
            match groups.iter_mut().find(|g| g.seller_id == item.seller_id) {
                Some(group) => group.items.push(item.clone()),
                None => groups.push(SellerGroup {
                    seller_id: item.seller_id,
                    seller_name: item.seller_name.clone(),
                    items: vec![item.clone()],
                }),
            }
        }
        groups
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, seller: i64, name: &str, price: f64) -> CartProduct {
        CartProduct {
            product_id: id,
            seller_id: seller,
            seller_name: format!("seller{seller}"),
            name: name.to_string(),
            price,
        }
    }

    #[test]
    fn cart_ids_are_unique() {
        let cart = Cart::new();
        let a = cart.add(product(1, 1, "a", 1.0));
        let b = cart.add(product(1, 1, "a", 1.0));
        assert_ne!(a, b);
    }

    #[test]
    fn grouping_covers_every_selected_item_exactly_once() {
        let cart = Cart::new();
        for (id, seller) in [(1, 10), (2, 20), (3, 10), (4, 30), (5, 20)] {
            let cart_id = cart.add(product(id, seller, "item", 1.0));
            cart.toggle_selected(&cart_id);
        }

        let groups = cart.seller_groups();
        assert_eq!(groups.len(), 3);
        // First-encounter order of sellers in the cart.
        assert_eq!(
            groups.iter().map(|g| g.seller_id).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
        for group in &groups {
            assert!(!group.items.is_empty());
            assert!(group.items.iter().all(|i| i.seller_id == group.seller_id));
        }
        let total: usize = groups.iter().map(|g| g.items.len()).sum();
        assert_eq!(total, cart.selected_items().len());
    }

    #[test]
    fn unselected_items_never_form_groups() {
        let cart = Cart::new();
        cart.add(product(1, 10, "a", 1.0));
        let selected = cart.add(product(2, 20, "b", 2.0));
        cart.toggle_selected(&selected);

        let groups = cart.seller_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].seller_id, 20);
    }

    #[test]
    fn toggle_and_remove_round_trip() {
        let cart = Cart::new();
        let id = cart.add(product(1, 1, "a", 1.0));
        assert!(cart.toggle_selected(&id));
        assert_eq!(cart.selected_items().len(), 1);
        assert!(cart.toggle_selected(&id));
        assert!(cart.selected_items().is_empty());

        assert!(cart.remove(&id));
        assert!(!cart.remove(&id));
        assert!(cart.is_empty());
    }
}
