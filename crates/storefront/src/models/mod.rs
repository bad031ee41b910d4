//! Domain models persisted in the document store.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;

pub use address::ShippingAddress;
pub use cart::{CartItem, CartKey, FavoriteItem, GuestCartItem};
pub use order::{Order, OrderLineItem};
pub use product::Product;
